use std::sync::Arc;

use serde::{Deserialize, Serialize};

use common::crypto::{ConfigError, CryptoError, KeyBits, KeyMaterial, KeyStore};
use common::envelope::KeyAnnouncement;

/// Configuration for a [`ServerBridge`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Keypair size when generating fresh keys
    #[serde(default = "default_bits")]
    pub bits: KeyBits,
    /// Explicit key material; a fresh keypair is generated when absent
    #[serde(default)]
    pub keys: Option<KeyMaterial>,
    /// Pass non-enveloped request bodies through to handlers instead of
    /// refusing them. Off by default; a missing caller key is refused
    /// regardless of this setting.
    #[serde(default)]
    pub allow_unencrypted_in: bool,
}

fn default_bits() -> KeyBits {
    KeyBits::B2048
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bits: default_bits(),
            keys: None,
            allow_unencrypted_in: false,
        }
    }
}

/// Shared server-side state for the gate and the publication endpoint
///
/// Cheap to clone; the keypair is immutable after construction, so
/// concurrent requests decrypt without coordination.
#[derive(Debug, Clone)]
pub struct ServerBridge {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    keys: KeyStore,
    allow_unencrypted_in: bool,
}

impl ServerBridge {
    /// Build a bridge, generating or importing its keypair
    ///
    /// # Errors
    ///
    /// Fails fast on invalid key material or unsupported bit size.
    pub fn new(config: ServerConfig) -> Result<Self, ConfigError> {
        let keys = match &config.keys {
            Some(material) => KeyStore::from_material(material)?,
            None => KeyStore::generate(config.bits)?,
        };
        Ok(Self {
            inner: Arc::new(Inner {
                keys,
                allow_unencrypted_in: config.allow_unencrypted_in,
            }),
        })
    }

    pub fn keys(&self) -> &KeyStore {
        &self.inner.keys
    }

    pub fn allow_unencrypted_in(&self) -> bool {
        self.inner.allow_unencrypted_in
    }

    /// The body served by the key-publication endpoint
    pub fn announcement(&self) -> Result<KeyAnnouncement, CryptoError> {
        Ok(KeyAnnouncement {
            key: self.inner.keys.public_key()?,
            format: self.inner.keys.formats().public,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_config_defaults_from_partial_json() {
        let config: ServerConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.bits, KeyBits::B2048);
        assert!(config.keys.is_none());
        assert!(!config.allow_unencrypted_in);

        let config: ServerConfig =
            serde_json::from_str(r#"{"bits":512,"allow_unencrypted_in":true}"#).unwrap();
        assert_eq!(config.bits, KeyBits::B512);
        assert!(config.allow_unencrypted_in);
    }

    #[test]
    fn test_config_rejects_unsupported_bits() {
        assert!(serde_json::from_str::<ServerConfig>(r#"{"bits":768}"#).is_err());
    }
}

