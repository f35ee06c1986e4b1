/**
 * Cryptographic types and operations.
 *  - KeyStore: RSA keypair holder with encrypt/decrypt
 *    and one-shot encryption against a peer's key
 *  - Key material, formats, and bit-size configuration
 */
pub mod crypto;
/**
 * Text-encoding transcoding helper.
 * Keys travel base64-armored in headers; this converts
 *  between utf8, base64, and hex representations.
 */
pub mod codec;
/**
 * Wire shapes shared by both sides of the bridge.
 *  - The sealed JSON envelope carrying base64 ciphertext
 *  - The key-announcement body served by the discovery endpoint
 *  - Header names and fixed refusal/diagnostic strings
 */
pub mod envelope;

pub mod prelude {
    pub use crate::codec::{transcode, TextEncoding};
    pub use crate::crypto::{ConfigError, CryptoError, KeyBits, KeyFormat, KeyMaterial, KeyStore};
    pub use crate::envelope::{Envelope, KeyAnnouncement, CLIENT_KEY_HEADER};
}
