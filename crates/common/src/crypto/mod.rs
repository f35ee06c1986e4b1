//! Cryptographic foundation for sealgate
//!
//! This module provides the asymmetric half of the bridge:
//!
//! - **KeyStore**: an RSA keypair plus the PEM formats of its halves,
//!   with `encrypt`/`decrypt` against its own keys and a one-shot
//!   `encrypt_with_key` against an arbitrary peer key
//! - **Key material**: the configuration surface for building a store
//!   from caller-supplied PEM strings or generating a fresh keypair
//!
//! # Scheme
//!
//! Payloads are encrypted with PKCS#1 v1.5 padding and chunked across
//! RSA blocks, so plaintext longer than one modulus block round-trips
//! transparently. Ciphertext is always exchanged as base64 text.
//! There is no session key and no forward secrecy; every message is
//! independently wrapped with the recipient's public key.

mod keystore;
mod material;

pub use keystore::{CryptoError, KeyFormats, KeyStore};
pub use material::{ConfigError, FormatSpec, KeyBits, KeyFormat, KeyMaterial};
