use serde::{Deserialize, Serialize};

/// Errors raised while validating key configuration
///
/// These are fatal: a store that cannot be constructed from its
/// configuration fails fast instead of failing lazily on first use.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("unsupported key size: {0} bits (expected 512, 1024, 2048 or 4096)")]
    UnsupportedBits(u32),
    #[error("invalid public key material: {0}")]
    InvalidPublicKey(String),
    #[error("invalid private key material: {0}")]
    InvalidPrivateKey(String),
    #[error("key generation failed: {0}")]
    Generation(rsa::Error),
}

/// Supported RSA keypair sizes
///
/// The enumeration (rather than a bare integer) makes an out-of-range
/// bit size unrepresentable past the configuration boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum KeyBits {
    B512,
    B1024,
    B2048,
    B4096,
}

impl KeyBits {
    /// Keypair size as a bit count, for handoff to the RSA backend
    pub fn bits(&self) -> usize {
        match self {
            KeyBits::B512 => 512,
            KeyBits::B1024 => 1024,
            KeyBits::B2048 => 2048,
            KeyBits::B4096 => 4096,
        }
    }
}

impl TryFrom<u32> for KeyBits {
    type Error = ConfigError;

    fn try_from(bits: u32) -> Result<Self, Self::Error> {
        match bits {
            512 => Ok(KeyBits::B512),
            1024 => Ok(KeyBits::B1024),
            2048 => Ok(KeyBits::B2048),
            4096 => Ok(KeyBits::B4096),
            other => Err(ConfigError::UnsupportedBits(other)),
        }
    }
}

impl From<KeyBits> for u32 {
    fn from(bits: KeyBits) -> Self {
        bits.bits() as u32
    }
}

/// How a single key string is structured on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum KeyFormat {
    /// PKCS#1 PEM armor (`-----BEGIN RSA PUBLIC KEY-----`)
    #[default]
    #[serde(rename = "pkcs1-pem")]
    Pkcs1Pem,
    /// PKCS#8 PEM armor (`-----BEGIN PUBLIC KEY-----`)
    #[serde(rename = "pkcs8-pem")]
    Pkcs8Pem,
}

impl std::fmt::Display for KeyFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeyFormat::Pkcs1Pem => write!(f, "pkcs1-pem"),
            KeyFormat::Pkcs8Pem => write!(f, "pkcs8-pem"),
        }
    }
}

/// Format descriptor covering both halves of a keypair
///
/// Either a single format applied to public and private alike, or an
/// explicit pair. The split form requires both sub-formats; a format
/// naming only one half does not deserialize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FormatSpec {
    Single(KeyFormat),
    Split {
        public: KeyFormat,
        private: KeyFormat,
    },
}

impl FormatSpec {
    /// Resolve to a `(public, private)` pair
    pub fn split(&self) -> (KeyFormat, KeyFormat) {
        match *self {
            FormatSpec::Single(format) => (format, format),
            FormatSpec::Split { public, private } => (public, private),
        }
    }
}

impl Default for FormatSpec {
    fn default() -> Self {
        FormatSpec::Single(KeyFormat::default())
    }
}

/// Caller-supplied keypair material
///
/// All three fields are required together: partial key material is
/// unrepresentable, which is the invariant the original configuration
/// surface could only check at runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyMaterial {
    pub public: String,
    pub private: String,
    pub format: FormatSpec,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_key_bits_conversion() {
        assert_eq!(KeyBits::try_from(2048).unwrap(), KeyBits::B2048);
        assert_eq!(KeyBits::B4096.bits(), 4096);
        assert!(matches!(
            KeyBits::try_from(777),
            Err(ConfigError::UnsupportedBits(777))
        ));
    }

    #[test]
    fn test_format_spec_split() {
        let single = FormatSpec::Single(KeyFormat::Pkcs8Pem);
        assert_eq!(single.split(), (KeyFormat::Pkcs8Pem, KeyFormat::Pkcs8Pem));

        let split = FormatSpec::Split {
            public: KeyFormat::Pkcs1Pem,
            private: KeyFormat::Pkcs8Pem,
        };
        assert_eq!(split.split(), (KeyFormat::Pkcs1Pem, KeyFormat::Pkcs8Pem));
    }

    #[test]
    fn test_format_spec_deserializes_both_shapes() {
        let single: FormatSpec = serde_json::from_str("\"pkcs1-pem\"").unwrap();
        assert_eq!(single, FormatSpec::Single(KeyFormat::Pkcs1Pem));

        let split: FormatSpec =
            serde_json::from_str(r#"{"public":"pkcs1-pem","private":"pkcs8-pem"}"#).unwrap();
        assert_eq!(
            split,
            FormatSpec::Split {
                public: KeyFormat::Pkcs1Pem,
                private: KeyFormat::Pkcs8Pem,
            }
        );

        // naming only one half is invalid
        assert!(serde_json::from_str::<FormatSpec>(r#"{"public":"pkcs1-pem"}"#).is_err());
    }
}
