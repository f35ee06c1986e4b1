//! Server side of the sealgate bridge.
//!
//! Two operations around a [`common::crypto::KeyStore`]:
//! - [`publish::publish_key`] answers discovery requests with the
//!   server's current public key
//! - [`gate::gate`] is middleware that unseals inbound envelope bodies
//!   with the server's private key and seals outbound response bodies
//!   with the caller's public key, so downstream handlers only ever see
//!   plaintext
//!
//! Wire the gate as an explicit layer around the routes it protects and
//! leave the key-publication route outside it:
//!
//! ```ignore
//! let bridge = ServerBridge::new(ServerConfig::default())?;
//! let app = Router::new()
//!     .route("/hi", post(hi))
//!     .layer(middleware::from_fn_with_state(bridge.clone(), gate))
//!     .route("/publickey", get(publish_key))
//!     .with_state(bridge);
//! ```

pub mod bridge;
pub mod gate;
pub mod publish;

// Re-export key types for convenience
pub use bridge::{ServerBridge, ServerConfig};
pub use gate::gate;
pub use publish::publish_key;
