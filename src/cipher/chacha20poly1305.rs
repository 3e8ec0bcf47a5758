//! XChaCha20-Poly1305 token encryption for a single derived key.
//!
//! Every derived key of a multi-key set drives one instance of this cipher.
//!
//! # Token Format
//!
//! `base64url([Nonce (24 bytes)] || [Ciphertext] || [Auth Tag (16 bytes)])`
//!
//! The token is text so that framed ciphertext of an encrypted string stays
//! valid UTF-8 and can be stored in a persisted record as is.
//!
//! # Why XChaCha20?
//!
//! The 192-bit nonce can be drawn at random for every token without any
//! practical risk of collision, so no nonce state has to be kept per key.

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE;
use chacha20poly1305::aead::{Aead, KeyInit, OsRng};
use chacha20poly1305::{AeadCore, XChaCha20Poly1305, XNonce};

use crate::config::{CHACHA_NONCE_SIZE, KEY_SIZE, TAG_SIZE};
use crate::error::{CipherError, DecryptFailure, Result};

/// A wrapper struct for XChaCha20-Poly1305 token operations.
pub struct ChaCha20Poly1305 {
    /// The inner XChaCha20-Poly1305 state.
    inner: XChaCha20Poly1305,
}

impl ChaCha20Poly1305 {
    /// Initializes a new context with the provided raw key.
    ///
    /// # Errors
    ///
    /// Returns an error if the key length is invalid.
    #[inline]
    pub fn new(key: &[u8; KEY_SIZE]) -> Result<Self> {
        let inner = XChaCha20Poly1305::new_from_slice(key).map_err(|e| CipherError::Crypto(format!("invalid xchacha20poly1305 key: {e}")))?;
        Ok(Self { inner })
    }

    /// Encrypts raw bytes and returns the token bytes (not yet base64url).
    ///
    /// Returns `[Nonce (24B)][Ciphertext][Tag (16B)]`.
    ///
    /// # Errors
    ///
    /// Returns an error if the plaintext is empty or encryption fails.
    pub fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        if plaintext.is_empty() {
            return Err(CipherError::Validation("plaintext cannot be empty".to_owned()));
        }

        let nonce_bytes = XChaCha20Poly1305::generate_nonce(&mut OsRng);

        let mut result = self
            .inner
            .encrypt(XNonce::from_slice(&nonce_bytes), plaintext)
            .map_err(|e| CipherError::Crypto(format!("xchacha20poly1305 encryption failed: {e}")))?;

        result.splice(0..0, nonce_bytes.iter().copied());

        Ok(result)
    }

    /// Decrypts bytes produced by [`Self::seal`].
    ///
    /// # Errors
    ///
    /// Returns [`DecryptFailure::MalformedToken`] if the input is too short and
    /// [`DecryptFailure::NoMatchingKey`] if the tag does not verify.
    pub fn open(&self, sealed: &[u8]) -> std::result::Result<Vec<u8>, DecryptFailure> {
        if sealed.len() < CHACHA_NONCE_SIZE + TAG_SIZE {
            return Err(DecryptFailure::MalformedToken);
        }

        let (nonce_bytes, data) = sealed.split_at(CHACHA_NONCE_SIZE);
        self.inner.decrypt(XNonce::from_slice(nonce_bytes), data).map_err(|_| DecryptFailure::NoMatchingKey)
    }

    /// Encrypts and base64url-encodes in one step.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<String> {
        Ok(URL_SAFE.encode(self.seal(plaintext)?))
    }

    /// Decodes a base64url token and decrypts it.
    pub fn decrypt(&self, token: &[u8]) -> std::result::Result<Vec<u8>, DecryptFailure> {
        let sealed = decode_token(token)?;
        self.open(&sealed)
    }
}

/// Decodes a base64url token into its raw nonce, ciphertext and tag.
pub fn decode_token(token: &[u8]) -> std::result::Result<Vec<u8>, DecryptFailure> {
    URL_SAFE.decode(token).map_err(|_| DecryptFailure::MalformedToken)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let cipher = ChaCha20Poly1305::new(&[7u8; KEY_SIZE]).unwrap();
        let plaintext = b"Hello, XChaCha20!";

        let token = cipher.encrypt(plaintext).unwrap();
        assert_ne!(token.as_bytes(), plaintext);

        let decrypted = cipher.decrypt(token.as_bytes()).unwrap();
        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn test_seal_length() {
        let cipher = ChaCha20Poly1305::new(&[0u8; KEY_SIZE]).unwrap();
        let sealed = cipher.seal(b"abc").unwrap();
        assert_eq!(sealed.len(), CHACHA_NONCE_SIZE + 3 + TAG_SIZE);
    }

    #[test]
    fn test_encrypt_empty_plaintext() {
        let cipher = ChaCha20Poly1305::new(&[0u8; KEY_SIZE]).unwrap();
        assert!(cipher.encrypt(&[]).is_err());
    }

    #[test]
    fn test_decrypt_too_short() {
        let cipher = ChaCha20Poly1305::new(&[0u8; KEY_SIZE]).unwrap();
        let sealed = vec![0u8; CHACHA_NONCE_SIZE];
        assert_eq!(cipher.open(&sealed), Err(DecryptFailure::MalformedToken));
    }

    #[test]
    fn test_decrypt_not_base64() {
        let cipher = ChaCha20Poly1305::new(&[0u8; KEY_SIZE]).unwrap();
        assert_eq!(cipher.decrypt(b"***not base64***"), Err(DecryptFailure::MalformedToken));
    }

    #[test]
    fn test_decrypt_tampered_ciphertext() {
        let cipher = ChaCha20Poly1305::new(&[0u8; KEY_SIZE]).unwrap();
        let mut sealed = cipher.seal(b"Secret Message").unwrap();
        sealed[CHACHA_NONCE_SIZE] ^= 0x01;

        assert_eq!(cipher.open(&sealed), Err(DecryptFailure::NoMatchingKey));
    }

    #[test]
    fn test_decrypt_with_other_key() {
        let a = ChaCha20Poly1305::new(&[1u8; KEY_SIZE]).unwrap();
        let b = ChaCha20Poly1305::new(&[2u8; KEY_SIZE]).unwrap();
        let token = a.encrypt(b"payload").unwrap();
        assert!(b.decrypt(token.as_bytes()).is_err());
    }
}
