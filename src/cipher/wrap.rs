//! # Asymmetric Wrap Layer
//!
//! Optional second layer sealed on top of a symmetric token.
//!
//! ## Sealing
//!
//! A fresh X25519 key pair is generated per operation. The token is sealed
//! to its public key with an ephemeral X25519 exchange:
//!
//! ```text
//! key   = SHA-256(context || shared || ephemeral_public || recipient_public)
//! wire  = base64url(ephemeral_public (32) || nonce (24) || ciphertext || tag (16))
//! ```
//!
//! ## Private Key Protection
//!
//! The recipient's private key never leaves this module in the clear. It is
//! encrypted with AES-256-GCM under a PBKDF2-HMAC-SHA512 key derived from a
//! key-protection passphrase:
//!
//! ```text
//! private_key = base64url(salt (16) || nonce (12) || ciphertext || tag (16))
//! ```

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE;
use rand::TryRngCore;
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};
use x25519_dalek::{PublicKey, StaticSecret};

use crate::cipher::derive::{Derive, Salt};
use crate::cipher::{AesGcm, ChaCha20Poly1305};
use crate::config::{FALLBACK_SALT_SIZE, KEY_SIZE, WRAP_KDF_CONTEXT, X25519_KEY_SIZE};
use crate::error::{CipherError, Result};

/// Output of [`seal`]: everything needed to open the wrapped token later.
#[derive(Debug, Clone)]
pub struct Sealed {
    /// Protected private key, base64url.
    pub private_key: String,
    /// Recipient public key, hex.
    pub public_key: String,
    /// Sealed token, base64url.
    pub ciphertext: String,
}

fn random_secret() -> Result<StaticSecret> {
    let mut bytes = [0u8; X25519_KEY_SIZE];
    OsRng.try_fill_bytes(&mut bytes).map_err(|e| CipherError::Crypto(format!("rng failed: {e}")))?;
    Ok(StaticSecret::from(bytes))
}

fn shared_key(shared: &[u8; 32], ephemeral: &PublicKey, recipient: &PublicKey) -> [u8; KEY_SIZE] {
    let mut hasher = Sha256::new();
    hasher.update(WRAP_KDF_CONTEXT);
    hasher.update(shared);
    hasher.update(ephemeral.as_bytes());
    hasher.update(recipient.as_bytes());
    hasher.finalize().into()
}

fn protection_cipher(key_passphrase: &str, salt: &Salt, key_iterations: u32) -> Result<AesGcm> {
    let derivation = Derive::new(key_passphrase.as_bytes())?.derive_key(Some(salt), key_iterations)?;
    AesGcm::new(&derivation.key.to_bytes()?)
}

fn protect(secret: &StaticSecret, key_passphrase: &str, key_iterations: u32) -> Result<String> {
    let salt = Salt::random(FALLBACK_SALT_SIZE)?;
    let sealed = protection_cipher(key_passphrase, &salt, key_iterations)?.encrypt(&secret.to_bytes())?;

    let mut out = salt.as_bytes().to_vec();
    out.extend_from_slice(&sealed);
    Ok(URL_SAFE.encode(out))
}

fn recover(private_key: &str, key_passphrase: &str, key_iterations: u32) -> Result<StaticSecret> {
    let raw = URL_SAFE.decode(private_key.trim()).map_err(|e| CipherError::Validation(format!("private key is not valid base64url: {e}")))?;
    if raw.len() <= FALLBACK_SALT_SIZE {
        return Err(CipherError::Validation("private key is truncated".to_owned()));
    }

    let (salt, sealed) = raw.split_at(FALLBACK_SALT_SIZE);
    let bytes = protection_cipher(key_passphrase, &Salt::from(salt.to_vec()), key_iterations)?
        .decrypt(sealed)
        .map_err(|_| CipherError::Decryption("the private key could not be unlocked with the stored key passphrase".to_owned()))?;

    let bytes: [u8; X25519_KEY_SIZE] = bytes.as_slice().try_into().map_err(|_| CipherError::Validation("private key has an invalid length".to_owned()))?;
    Ok(StaticSecret::from(bytes))
}

/// Seals `plaintext` to a freshly generated key pair.
///
/// # Errors
///
/// Returns an error if the passphrase is empty, the iteration count is
/// invalid or any primitive fails.
pub fn seal(plaintext: &[u8], key_passphrase: &str, key_iterations: u32) -> Result<Sealed> {
    let recipient_secret = random_secret()?;
    let recipient = PublicKey::from(&recipient_secret);

    let ephemeral_secret = random_secret()?;
    let ephemeral = PublicKey::from(&ephemeral_secret);
    let shared = ephemeral_secret.diffie_hellman(&recipient);

    let sealed = ChaCha20Poly1305::new(&shared_key(shared.as_bytes(), &ephemeral, &recipient))?.seal(plaintext)?;

    let mut wire = ephemeral.as_bytes().to_vec();
    wire.extend_from_slice(&sealed);

    Ok(Sealed {
        private_key: protect(&recipient_secret, key_passphrase, key_iterations)?,
        public_key: hex::encode(recipient.as_bytes()),
        ciphertext: URL_SAFE.encode(wire),
    })
}

/// Opens a token produced by [`seal`].
///
/// # Errors
///
/// Returns [`CipherError::Decryption`] if the private key cannot be unlocked
/// or the sealed token does not authenticate.
pub fn unseal(ciphertext: &str, private_key: &str, key_passphrase: &str, key_iterations: u32) -> Result<Vec<u8>> {
    let recipient_secret = recover(private_key, key_passphrase, key_iterations)?;
    let recipient = PublicKey::from(&recipient_secret);

    let wire = URL_SAFE.decode(ciphertext.trim()).map_err(|e| CipherError::Validation(format!("wrapped ciphertext is not valid base64url: {e}")))?;
    if wire.len() <= X25519_KEY_SIZE {
        return Err(CipherError::Validation("wrapped ciphertext is truncated".to_owned()));
    }

    let (ephemeral, sealed) = wire.split_at(X25519_KEY_SIZE);
    let ephemeral: [u8; X25519_KEY_SIZE] = ephemeral.try_into().map_err(|_| CipherError::Validation("invalid ephemeral key".to_owned()))?;
    let ephemeral = PublicKey::from(ephemeral);
    let shared = recipient_secret.diffie_hellman(&ephemeral);

    ChaCha20Poly1305::new(&shared_key(shared.as_bytes(), &ephemeral, &recipient))?
        .open(sealed)
        .map_err(|e| CipherError::Decryption(format!("the asymmetric layer could not be opened: {e}")))
}
