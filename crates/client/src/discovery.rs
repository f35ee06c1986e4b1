use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use url::Url;

use common::crypto::KeyFormat;
use common::envelope::KeyAnnouncement;

use crate::events::{Lifecycle, LifecycleState};

/// Cached read of a remote party's current public key
///
/// Absent until discovery succeeds; replaced wholesale on each
/// successful (re)discovery, never partially updated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeerRecord {
    pub key: String,
    pub format: KeyFormat,
}

impl From<KeyAnnouncement> for PeerRecord {
    fn from(announcement: KeyAnnouncement) -> Self {
        Self {
            key: announcement.key,
            format: announcement.format,
        }
    }
}

/// How a discovery cycle retries a failing key endpoint
///
/// The default preserves the handshake's original shape: a fixed
/// one-second delay and no attempt limit, so a permanently unreachable
/// endpoint hangs the handshake until the caller imposes a timeout.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub delay: Duration,
    pub max_attempts: Option<u32>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(1),
            max_attempts: None,
        }
    }
}

impl RetryPolicy {
    /// Retry forever with a custom delay between attempts
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            max_attempts: None,
        }
    }

    /// Give up after `attempts` tries
    pub fn bounded(delay: Duration, attempts: u32) -> Self {
        Self {
            delay,
            max_attempts: Some(attempts),
        }
    }
}

/// Errors surfaced on the discovery task handle
///
/// Only possible under a bounded [`RetryPolicy`]; the default policy
/// never gives up, and individual attempt failures are recovered
/// internally (logged, then retried), never surfaced to `connect()`.
#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    #[error("key endpoint still unreachable after {0} attempts")]
    AttemptsExhausted(u32),
}

#[derive(Debug, thiserror::Error)]
enum ProbeError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("announcement carries an empty key")]
    EmptyKey,
}

/// The retrying handshake by which a client learns a peer's public key
///
/// Each `connect()` call starts a fresh discovery cycle that supersedes
/// any in-flight one. A cycle probes the endpoint, sleeps the policy
/// delay on failure, and on success atomically replaces the shared
/// [`PeerRecord`] and signals `connected`.
///
/// There is no cancellation of a cycle that is already sleeping: a
/// stale cycle may still complete and overwrite the record
/// (last-write-wins), but it no longer emits `connected` once
/// superseded.
#[derive(Debug)]
pub struct PeerDiscovery {
    client: reqwest::Client,
    record: Arc<RwLock<Option<PeerRecord>>>,
    cycle: Arc<AtomicU64>,
    events: watch::Sender<LifecycleState>,
    lifecycle: Lifecycle,
    policy: RetryPolicy,
}

impl PeerDiscovery {
    pub fn new(policy: RetryPolicy) -> Self {
        let (events, rx) = watch::channel(LifecycleState::Idle);
        Self {
            client: reqwest::Client::new(),
            record: Arc::new(RwLock::new(None)),
            cycle: Arc::new(AtomicU64::new(0)),
            events,
            lifecycle: Lifecycle::new(rx),
            policy,
        }
    }

    /// Start a discovery cycle against a key-publication endpoint
    ///
    /// Emits `connecting` synchronously, then probes in a background
    /// task. The returned handle resolves with the discovered record,
    /// or with [`DiscoveryError::AttemptsExhausted`] under a bounded
    /// policy; callers that rely on the lifecycle events or on
    /// [`ClientBridge::fetch`](crate::ClientBridge::fetch) may drop it.
    pub fn connect(&self, endpoint: Url) -> JoinHandle<Result<PeerRecord, DiscoveryError>> {
        let cycle = self.cycle.fetch_add(1, Ordering::SeqCst) + 1;
        let _ = self.events.send(LifecycleState::Connecting { cycle });

        let client = self.client.clone();
        let record = self.record.clone();
        let current_cycle = self.cycle.clone();
        let events = self.events.clone();
        let policy = self.policy;

        tokio::spawn(async move {
            let mut attempts = 0u32;
            loop {
                attempts += 1;
                match probe(&client, &endpoint).await {
                    Ok(peer) => {
                        *record.write() = Some(peer.clone());
                        // a superseded cycle still updates the record
                        // (last-write-wins) but no longer signals
                        if current_cycle.load(Ordering::SeqCst) == cycle {
                            let _ = events.send(LifecycleState::Connected { cycle });
                        }
                        tracing::info!(%endpoint, attempts, "peer key discovered");
                        return Ok(peer);
                    }
                    Err(err) => {
                        tracing::warn!(%endpoint, attempts, "can't connect to rsa peer: {err}");
                        if let Some(max) = policy.max_attempts {
                            if attempts >= max {
                                return Err(DiscoveryError::AttemptsExhausted(attempts));
                            }
                        }
                        tokio::time::sleep(policy.delay).await;
                    }
                }
            }
        })
    }

    /// The discovered peer key, if any cycle has succeeded yet
    pub fn peer(&self) -> Option<PeerRecord> {
        self.record.read().clone()
    }

    /// View over the handshake lifecycle
    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle.clone()
    }

    /// Suspend until the latest cycle has connected
    ///
    /// Hangs until `connect()` is called and succeeds at least once.
    pub async fn ready(&self) {
        let latest = self.cycle.load(Ordering::SeqCst);
        self.lifecycle.wait_connected_from(latest).await;
    }
}

impl Default for PeerDiscovery {
    fn default() -> Self {
        Self::new(RetryPolicy::default())
    }
}

async fn probe(client: &reqwest::Client, endpoint: &Url) -> Result<PeerRecord, ProbeError> {
    let response = client
        .get(endpoint.clone())
        .send()
        .await?
        .error_for_status()?;
    // a body missing either field fails deserialization and retries
    let announcement: KeyAnnouncement = response.json().await?;
    if announcement.key.is_empty() {
        return Err(ProbeError::EmptyKey);
    }
    Ok(announcement.into())
}
