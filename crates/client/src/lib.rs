//! Client side of the sealgate bridge.
//!
//! This crate composes a [`common::crypto::KeyStore`] with the
//! key-discovery handshake into a `connect`/`fetch` pair:
//! - [`ClientBridge::connect`] starts a retrying discovery loop against
//!   a server's key-publication endpoint
//! - [`ClientBridge::fetch`] waits for discovery, seals the outbound
//!   body with the peer's key, and unseals the reply with its own
//!
//! Application code never touches ciphertext; the bridge is the only
//! place the envelope shape appears.

pub mod bridge;
pub mod discovery;
pub mod events;

// Re-export key types for convenience
pub use bridge::{ClientBridge, ClientConfig, FetchError, FetchOptions, FetchOutcome};
pub use discovery::{DiscoveryError, PeerDiscovery, PeerRecord, RetryPolicy};
pub use events::{Lifecycle, LifecycleEvent, LifecycleState};
