use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{AeadCore, Aes256Gcm, Nonce};

use crate::config::{AES_NONCE_SIZE, KEY_SIZE};
use crate::error::{CipherError, Result};

/// AES-256-GCM, used to protect the private key of the asymmetric layer.
pub struct AesGcm {
    inner: Aes256Gcm,
}

impl AesGcm {
    #[inline]
    pub fn new(key: &[u8; KEY_SIZE]) -> Result<Self> {
        let inner = Aes256Gcm::new_from_slice(key).map_err(|e| CipherError::Crypto(format!("invalid aes-256-gcm key: {e}")))?;
        Ok(Self { inner })
    }

    #[inline]
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        if plaintext.is_empty() {
            return Err(CipherError::Validation("plaintext cannot be empty".to_owned()));
        }

        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let mut result = self.inner.encrypt(&nonce, plaintext).map_err(|e| CipherError::Crypto(format!("aes-gcm encryption failed: {e}")))?;

        result.splice(0..0, nonce.iter().copied());
        Ok(result)
    }

    #[inline]
    pub fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>> {
        if ciphertext.len() < AES_NONCE_SIZE {
            return Err(CipherError::Crypto(format!("ciphertext too short: need at least {AES_NONCE_SIZE} bytes, got {}", ciphertext.len())));
        }

        let (nonce, data) = ciphertext.split_at(AES_NONCE_SIZE);
        self.inner.decrypt(Nonce::from_slice(nonce), data).map_err(|_| CipherError::Crypto("aes-gcm authentication failed".to_owned()))
    }
}
