use reqwest::{Method, StatusCode};
use serde::Deserialize;
use tokio::task::JoinHandle;
use url::Url;

use common::codec::TextEncoding;
use common::crypto::{ConfigError, CryptoError, KeyBits, KeyFormat, KeyMaterial, KeyStore};
use common::envelope::{Envelope, CLIENT_KEY_HEADER};

use crate::discovery::{DiscoveryError, PeerDiscovery, PeerRecord, RetryPolicy};
use crate::events::{Lifecycle, LifecycleEvent};

/// Configuration for a [`ClientBridge`]
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Keypair size when generating fresh keys
    pub bits: KeyBits,
    /// Explicit key material; a fresh keypair is generated when absent
    pub keys: Option<KeyMaterial>,
    /// Discovery retry behavior
    pub retry: RetryPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            bits: KeyBits::B2048,
            keys: None,
            retry: RetryPolicy::default(),
        }
    }
}

/// Per-call options for [`ClientBridge::fetch`]
#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    /// HTTP method; POST when unset
    pub method: Option<Method>,
    /// Request body, JSON-serialized then sealed for the peer
    pub body: Option<serde_json::Value>,
}

impl FetchOptions {
    pub fn with_body(body: impl Into<serde_json::Value>) -> Self {
        Self {
            method: None,
            body: Some(body.into()),
        }
    }
}

/// Result of a sealed fetch
///
/// `body` is the decrypted plaintext, or `None` when the peer answered
/// with an envelope-shaped object lacking the reserved field (or with
/// no body at all).
#[derive(Debug)]
pub struct FetchOutcome {
    pub status: StatusCode,
    pub body: Option<String>,
}

/// Errors surfaced by [`ClientBridge::fetch`]
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("refused by peer (HTTP {status}): {body}")]
    Refused { status: StatusCode, body: String },
    #[error("error decrypting response data: {0}")]
    Crypto(#[from] CryptoError),
    #[error("malformed response envelope: {0}")]
    Json(#[from] serde_json::Error),
    #[error("no peer key discovered")]
    NotConnected,
}

/// Classification of a response body: sealed envelope, application
/// rejection string, or neither
#[derive(Deserialize)]
#[serde(untagged)]
enum WirePayload {
    Sealed(Envelope),
    Rejection(String),
    Other(serde_json::Value),
}

/// Client side of the encryption bridge
///
/// Composes a [`KeyStore`] with [`PeerDiscovery`] into a
/// `connect`/`fetch` pair. `fetch` is unusable (it suspends) until at
/// least one handshake has completed.
#[derive(Debug)]
pub struct ClientBridge {
    keys: KeyStore,
    discovery: PeerDiscovery,
    http: reqwest::Client,
}

impl ClientBridge {
    /// Build a bridge, generating or importing its keypair
    ///
    /// # Errors
    ///
    /// Fails fast on invalid key material or unsupported bit size.
    pub fn new(config: ClientConfig) -> Result<Self, ConfigError> {
        let keys = match &config.keys {
            Some(material) => KeyStore::from_material(material)?,
            None => KeyStore::generate(config.bits)?,
        };
        Ok(Self {
            keys,
            discovery: PeerDiscovery::new(config.retry),
            http: reqwest::Client::new(),
        })
    }

    /// Start discovering the peer's public key
    ///
    /// See [`PeerDiscovery::connect`]; the handle may be dropped.
    pub fn connect(&self, endpoint: Url) -> JoinHandle<Result<PeerRecord, DiscoveryError>> {
        self.discovery.connect(endpoint)
    }

    /// Future resolving the first time `event` fires
    pub fn on(&self, event: LifecycleEvent) -> impl std::future::Future<Output = ()> {
        let lifecycle = self.discovery.lifecycle();
        async move { lifecycle.wait(event).await }
    }

    /// View over the handshake lifecycle
    pub fn lifecycle(&self) -> Lifecycle {
        self.discovery.lifecycle()
    }

    /// The discovered peer key, if any
    pub fn peer(&self) -> Option<PeerRecord> {
        self.discovery.peer()
    }

    /// This bridge's own public key PEM
    pub fn public_key(&self) -> Result<String, CryptoError> {
        self.keys.public_key()
    }

    /// Dispatch an HTTP call with a transparently sealed body
    ///
    /// Suspends until the active discovery cycle completes, seals the
    /// JSON-serialized body with the peer's key, attaches this bridge's
    /// public key on the `x-client-key` header, and unseals the reply.
    /// Sealed replies decrypt whatever their status; a plain-string
    /// reply (the peer's refusal shape) surfaces as
    /// [`FetchError::Refused`]. Errors are returned, never swallowed.
    pub async fn fetch(
        &self,
        target: Url,
        options: FetchOptions,
    ) -> Result<FetchOutcome, FetchError> {
        self.discovery.ready().await;
        let peer = self.discovery.peer().ok_or(FetchError::NotConnected)?;

        // canonical wire armor: pkcs1 pem, base64-encoded
        let armored_key = self
            .keys
            .public_key_as(Some(KeyFormat::Pkcs1Pem), Some(TextEncoding::Base64))?;

        let method = options.method.unwrap_or(Method::POST);
        let mut request = self
            .http
            .request(method, target.clone())
            .header(CLIENT_KEY_HEADER, armored_key);

        if let Some(body) = &options.body {
            let plaintext = serde_json::to_string(body)?;
            let sealed = self
                .keys
                .encrypt_with_key(&peer.key, &plaintext, Some(peer.format))?;
            request = request.json(&Envelope::new(sealed));
        }

        tracing::debug!(%target, "dispatching sealed request");
        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if text.is_empty() {
            if !status.is_success() {
                return Err(FetchError::Refused { status, body: text });
            }
            return Ok(FetchOutcome { status, body: None });
        }

        // Classify by body shape, not status: the peer seals handler
        // responses of every status, while refusals and bare rejections
        // arrive as plain strings.
        match serde_json::from_str::<WirePayload>(&text) {
            Ok(WirePayload::Sealed(envelope)) => {
                let body = self.keys.decrypt(&envelope.sealed)?;
                Ok(FetchOutcome {
                    status,
                    body: Some(body),
                })
            }
            Ok(WirePayload::Rejection(body)) => Err(FetchError::Refused { status, body }),
            Ok(WirePayload::Other(_)) if status.is_success() => {
                Ok(FetchOutcome { status, body: None })
            }
            Ok(WirePayload::Other(_)) => Err(FetchError::Refused { status, body: text }),
            Err(_) if !status.is_success() => Err(FetchError::Refused { status, body: text }),
            Err(err) => Err(FetchError::Json(err)),
        }
    }
}
