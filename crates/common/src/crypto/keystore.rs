use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use rsa::pkcs1::{DecodeRsaPrivateKey, DecodeRsaPublicKey, EncodeRsaPublicKey};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePublicKey, LineEnding};
use rsa::traits::PublicKeyParts;
use rsa::{Pkcs1v15Encrypt, RsaPrivateKey, RsaPublicKey};

use crate::codec::{transcode, TextEncoding};

use super::material::{ConfigError, KeyBits, KeyFormat, KeyMaterial};

/// PKCS#1 v1.5 padding overhead per RSA block, in bytes
const PKCS1V15_OVERHEAD: usize = 11;

/// Errors raised by per-message crypto operations
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("encryption failed: {0}")]
    Encryption(String),
    #[error("decryption failed: {0}")]
    Decryption(String),
    #[error("invalid peer key: {0}")]
    PeerKey(String),
    #[error("key export failed: {0}")]
    Export(String),
    #[error(transparent)]
    Codec(#[from] crate::codec::CodecError),
}

/// Resolved formats for the two halves of a keypair
#[derive(Debug, Clone, Copy, Default)]
pub struct KeyFormats {
    pub public: KeyFormat,
    pub private: KeyFormat,
}

/// Holder of a single RSA keypair and its encode/decode operations
///
/// A `KeyStore` owns its key material exclusively and never mutates it
/// after construction, so `encrypt`/`decrypt` are safe to call
/// concurrently for independent messages. Peer keys are never retained:
/// [`KeyStore::encrypt_with_key`] parses and uses them one-shot.
///
/// Plaintext longer than one RSA block is chunked across blocks and the
/// ciphertext blocks concatenated, so callers never see a size limit.
#[derive(Debug, Clone)]
pub struct KeyStore {
    public: RsaPublicKey,
    private: RsaPrivateKey,
    formats: KeyFormats,
}

impl KeyStore {
    /// Generate a fresh keypair of the given size
    pub fn generate(bits: KeyBits) -> Result<Self, ConfigError> {
        let mut rng = rand::thread_rng();
        let private = RsaPrivateKey::new(&mut rng, bits.bits()).map_err(ConfigError::Generation)?;
        let public = private.to_public_key();
        Ok(Self {
            public,
            private,
            formats: KeyFormats::default(),
        })
    }

    /// Build a store from caller-supplied PEM material
    ///
    /// # Errors
    ///
    /// Fails fast with a [`ConfigError`] when either half does not parse
    /// under its declared format; a store is never constructed around
    /// unusable keys.
    pub fn from_material(material: &KeyMaterial) -> Result<Self, ConfigError> {
        let (public_format, private_format) = material.format.split();

        let public = parse_public_key(&material.public, public_format)
            .map_err(ConfigError::InvalidPublicKey)?;
        let private = match private_format {
            KeyFormat::Pkcs1Pem => RsaPrivateKey::from_pkcs1_pem(&material.private)
                .map_err(|err| ConfigError::InvalidPrivateKey(err.to_string()))?,
            KeyFormat::Pkcs8Pem => RsaPrivateKey::from_pkcs8_pem(&material.private)
                .map_err(|err| ConfigError::InvalidPrivateKey(err.to_string()))?,
        };

        Ok(Self {
            public,
            private,
            formats: KeyFormats {
                public: public_format,
                private: private_format,
            },
        })
    }

    /// Encrypt text with this store's own public key, returning base64
    pub fn encrypt(&self, data: &str) -> Result<String, CryptoError> {
        encrypt_blocks(&self.public, data.as_bytes())
    }

    /// Decrypt base64 ciphertext with this store's own private key
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::Decryption`] when the ciphertext was not
    /// produced for this keypair, is malformed, or does not decode to
    /// UTF-8 text.
    pub fn decrypt(&self, data: &str) -> Result<String, CryptoError> {
        let ciphertext = BASE64
            .decode(data)
            .map_err(|err| CryptoError::Decryption(format!("ciphertext is not base64: {err}")))?;
        let plaintext = decrypt_blocks(&self.private, &ciphertext)?;
        String::from_utf8(plaintext)
            .map_err(|_| CryptoError::Decryption("plaintext is not valid utf-8".to_string()))
    }

    /// One-shot encryption with an arbitrary external public key
    ///
    /// The key is parsed, used, and dropped; nothing about the peer is
    /// retained on the store. Used to seal outbound data for a peer
    /// whose key was discovered at runtime.
    pub fn encrypt_with_key(
        &self,
        key: &str,
        data: &str,
        format: Option<KeyFormat>,
    ) -> Result<String, CryptoError> {
        let public =
            parse_public_key(key, format.unwrap_or_default()).map_err(CryptoError::PeerKey)?;
        encrypt_blocks(&public, data.as_bytes())
    }

    /// Export the public half as PEM in its configured format
    pub fn public_key(&self) -> Result<String, CryptoError> {
        self.public_key_as(None, None)
    }

    /// Export the public half, optionally re-formatted and transcoded
    ///
    /// `encoding` re-armors the PEM text itself (e.g. base64 for header
    /// transport); `None` means plain UTF-8.
    pub fn public_key_as(
        &self,
        format: Option<KeyFormat>,
        encoding: Option<TextEncoding>,
    ) -> Result<String, CryptoError> {
        let pem = match format.unwrap_or(self.formats.public) {
            KeyFormat::Pkcs1Pem => self
                .public
                .to_pkcs1_pem(LineEnding::LF)
                .map_err(|err| CryptoError::Export(err.to_string()))?,
            KeyFormat::Pkcs8Pem => self
                .public
                .to_public_key_pem(LineEnding::LF)
                .map_err(|err| CryptoError::Export(err.to_string()))?,
        };

        match encoding {
            None | Some(TextEncoding::Utf8) => Ok(pem),
            Some(encoding) => Ok(transcode(&pem, TextEncoding::Utf8, encoding)?),
        }
    }

    /// Formats declared for the two halves of this keypair
    pub fn formats(&self) -> KeyFormats {
        self.formats
    }
}

fn parse_public_key(key: &str, format: KeyFormat) -> Result<RsaPublicKey, String> {
    match format {
        KeyFormat::Pkcs1Pem => RsaPublicKey::from_pkcs1_pem(key).map_err(|err| err.to_string()),
        KeyFormat::Pkcs8Pem => {
            RsaPublicKey::from_public_key_pem(key).map_err(|err| err.to_string())
        }
    }
}

/// Encrypt plaintext across as many RSA blocks as it needs
///
/// Each block carries at most `modulus_len - 11` bytes of plaintext.
/// Empty plaintext still produces one block so the envelope is never
/// an empty string.
fn encrypt_blocks(key: &RsaPublicKey, data: &[u8]) -> Result<String, CryptoError> {
    let mut rng = rand::thread_rng();
    let capacity = key.size() - PKCS1V15_OVERHEAD;

    let mut ciphertext = Vec::new();
    let chunks: Vec<&[u8]> = if data.is_empty() {
        vec![&[][..]]
    } else {
        data.chunks(capacity).collect()
    };
    for chunk in chunks {
        let block = key
            .encrypt(&mut rng, Pkcs1v15Encrypt, chunk)
            .map_err(|err| CryptoError::Encryption(err.to_string()))?;
        ciphertext.extend_from_slice(&block);
    }

    Ok(BASE64.encode(ciphertext))
}

fn decrypt_blocks(key: &RsaPrivateKey, ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let block_len = key.size();
    if ciphertext.is_empty() || ciphertext.len() % block_len != 0 {
        return Err(CryptoError::Decryption(format!(
            "ciphertext length {} is not a whole number of {}-byte blocks",
            ciphertext.len(),
            block_len
        )));
    }

    let mut plaintext = Vec::new();
    for block in ciphertext.chunks(block_len) {
        let decrypted = key.decrypt(Pkcs1v15Encrypt, block).map_err(|_| {
            CryptoError::Decryption("ciphertext does not match this keypair".to_string())
        })?;
        plaintext.extend_from_slice(&decrypted);
    }

    Ok(plaintext)
}

#[cfg(test)]
mod test {
    use rsa::pkcs1::EncodeRsaPrivateKey;

    use super::*;

    #[test]
    fn test_round_trip_supported_sizes() {
        for bits in [KeyBits::B512, KeyBits::B1024, KeyBits::B2048] {
            let store = KeyStore::generate(bits).unwrap();
            let encrypted = store.encrypt("hello world").unwrap();
            assert_eq!(store.decrypt(&encrypted).unwrap(), "hello world");
        }
    }

    #[test]
    #[ignore = "4096-bit key generation is slow in debug builds"]
    fn test_round_trip_4096() {
        let store = KeyStore::generate(KeyBits::B4096).unwrap();
        let encrypted = store.encrypt("hello world").unwrap();
        assert_eq!(store.decrypt(&encrypted).unwrap(), "hello world");
    }

    #[test]
    fn test_round_trip_chunked() {
        // 512-bit modulus holds 53 bytes per block; force several blocks
        let store = KeyStore::generate(KeyBits::B512).unwrap();
        let long = "a long message that does not fit in a single rsa block ".repeat(5);

        let encrypted = store.encrypt(&long).unwrap();
        assert_eq!(store.decrypt(&encrypted).unwrap(), long);
    }

    #[test]
    fn test_round_trip_empty() {
        let store = KeyStore::generate(KeyBits::B512).unwrap();
        let encrypted = store.encrypt("").unwrap();
        assert!(!encrypted.is_empty());
        assert_eq!(store.decrypt(&encrypted).unwrap(), "");
    }

    #[test]
    fn test_cross_key_encryption_is_one_directional() {
        let a = KeyStore::generate(KeyBits::B512).unwrap();
        let b = KeyStore::generate(KeyBits::B512).unwrap();

        let b_public = b.public_key().unwrap();
        let sealed_for_b = a.encrypt_with_key(&b_public, "secret", None).unwrap();

        // only the holder of the matching private key can decrypt
        assert!(a.decrypt(&sealed_for_b).is_err());
        assert_eq!(b.decrypt(&sealed_for_b).unwrap(), "secret");
    }

    #[test]
    fn test_tampered_ciphertext_fails_decryption() {
        let store = KeyStore::generate(KeyBits::B512).unwrap();
        let encrypted = store.encrypt("integrity matters").unwrap();

        let mut raw = BASE64.decode(&encrypted).unwrap();
        raw[10] ^= 0xFF;
        let tampered = BASE64.encode(raw);

        assert!(matches!(
            store.decrypt(&tampered),
            Err(CryptoError::Decryption(_))
        ));
    }

    #[test]
    fn test_truncated_ciphertext_fails_decryption() {
        let store = KeyStore::generate(KeyBits::B512).unwrap();
        let encrypted = store.encrypt("short").unwrap();

        let mut raw = BASE64.decode(&encrypted).unwrap();
        raw.truncate(raw.len() - 1);
        let truncated = BASE64.encode(raw);

        assert!(matches!(
            store.decrypt(&truncated),
            Err(CryptoError::Decryption(_))
        ));
    }

    #[test]
    fn test_from_material_round_trip() {
        let mut rng = rand::thread_rng();
        let private = rsa::RsaPrivateKey::new(&mut rng, 512).unwrap();
        let public = private.to_public_key();

        let material = KeyMaterial {
            public: public.to_pkcs1_pem(LineEnding::LF).unwrap(),
            private: private.to_pkcs1_pem(LineEnding::LF).unwrap().to_string(),
            format: crate::crypto::FormatSpec::default(),
        };

        let store = KeyStore::from_material(&material).unwrap();
        let encrypted = store.encrypt("from material").unwrap();
        assert_eq!(store.decrypt(&encrypted).unwrap(), "from material");
    }

    #[test]
    fn test_invalid_material_fails_fast() {
        let material = KeyMaterial {
            public: "not a pem".to_string(),
            private: "also not a pem".to_string(),
            format: crate::crypto::FormatSpec::default(),
        };
        assert!(matches!(
            KeyStore::from_material(&material),
            Err(ConfigError::InvalidPublicKey(_))
        ));
    }

    #[test]
    fn test_public_key_export_encodings() {
        let store = KeyStore::generate(KeyBits::B512).unwrap();

        let pem = store.public_key().unwrap();
        assert!(pem.starts_with("-----BEGIN RSA PUBLIC KEY-----"));

        let armored = store
            .public_key_as(Some(KeyFormat::Pkcs1Pem), Some(TextEncoding::Base64))
            .unwrap();
        let unarmored = transcode(&armored, TextEncoding::Base64, TextEncoding::Utf8).unwrap();
        assert_eq!(unarmored, pem);

        let pkcs8 = store
            .public_key_as(Some(KeyFormat::Pkcs8Pem), None)
            .unwrap();
        assert!(pkcs8.starts_with("-----BEGIN PUBLIC KEY-----"));
    }
}
