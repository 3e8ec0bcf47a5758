//! # Cryptographic Operations Module
//!
//! Primitives the engines are assembled from:
//! - **Derivation**: PBKDF2-HMAC-SHA512 stretches a passphrase and salt into
//!   a 32-byte key ([`derive`]).
//! - **Multi-key cipher**: one XChaCha20-Poly1305 instance per derived key,
//!   encrypting with the first and decrypting with whichever authenticates
//!   ([`MultiKeyCipher`]).
//! - **Integrity**: SHA-256 content digests ([`hash`]).
//! - **Asymmetric wrap**: optional X25519 layer over a symmetric token, with
//!   an AES-256-GCM protected private key ([`wrap`]).
//!
//! ## Key Order
//!
//! The key set is ordered. Encryption always uses index 0 and decryption
//! tries keys strictly in insertion order, so the order of `decipher_keys`
//! in a persisted record stays meaningful.

mod aes_gcm;
mod chacha20poly1305;
pub mod derive;
pub mod hash;
pub mod wrap;

pub use aes_gcm::AesGcm;
pub use chacha20poly1305::ChaCha20Poly1305;
pub use derive::{Derivation, Derive, DerivedKey, Salt};

use crate::error::{CipherError, DecryptFailure, Result};

/// An ordered, non-empty set of symmetric keys acting as one cipher.
pub struct MultiKeyCipher {
    ciphers: Vec<ChaCha20Poly1305>,
}

impl MultiKeyCipher {
    /// Builds the cipher from derived keys, preserving their order.
    ///
    /// # Errors
    ///
    /// Returns a validation error if `keys` is empty or a key does not
    /// decode to 32 bytes.
    pub fn new(keys: &[DerivedKey]) -> Result<Self> {
        if keys.is_empty() {
            return Err(CipherError::Validation("a multi-key cipher needs at least one key".to_owned()));
        }

        let ciphers = keys.iter().map(|key| ChaCha20Poly1305::new(&key.to_bytes()?)).collect::<Result<Vec<_>>>()?;
        Ok(Self { ciphers })
    }

    /// Builds the cipher from persisted base64url key strings.
    ///
    /// Used by the stored-key fallback, where any defect in the record is a
    /// failed attempt rather than a hard error.
    pub fn from_encoded<S: AsRef<str>>(keys: &[S]) -> std::result::Result<Self, DecryptFailure> {
        let keys = keys.iter().map(|key| DerivedKey::from_encoded(key.as_ref())).collect::<Result<Vec<_>>>().map_err(|_| DecryptFailure::UnusableKeys)?;
        Self::new(&keys).map_err(|_| DecryptFailure::UnusableKeys)
    }

    /// Encrypts with the primary key and returns a base64url token.
    ///
    /// # Errors
    ///
    /// Returns an error if `plaintext` is empty or encryption fails.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<String> {
        let primary = self.ciphers.first().ok_or_else(|| CipherError::Validation("empty key set".to_owned()))?;
        primary.encrypt(plaintext)
    }

    /// Tries every key in order; the first that authenticates wins.
    pub fn decrypt(&self, token: &[u8]) -> std::result::Result<Vec<u8>, DecryptFailure> {
        let sealed = self::chacha20poly1305::decode_token(token)?;

        let mut failure = DecryptFailure::NoMatchingKey;
        for cipher in &self.ciphers {
            match cipher.open(&sealed) {
                Ok(plaintext) => return Ok(plaintext),
                Err(e) => failure = e,
            }
        }

        Err(failure)
    }

    pub fn len(&self) -> usize {
        self.ciphers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ciphers.is_empty()
    }
}
