//! # Key Derivation with PBKDF2-HMAC-SHA512
//!
//! Stretches a (passphrase, salt) pair into 32 bytes of key material.
//!
//! ## Determinism
//!
//! The same passphrase, salt and iteration count always reproduce the same
//! key. Decryption relies on this: it re-derives every key from the salts
//! stored in the record. Any change of algorithm, hash, output length or
//! iteration count silently produces different keys, which then surface
//! as authentication failures and finally as a hard decryption error.
//!
//! ## Encoding
//!
//! Derived keys are kept base64url encoded (padded). This is the form in
//! which they are persisted in a record and from which the multi-key cipher
//! is constructed.

use std::fmt;

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE;
use pbkdf2::pbkdf2_hmac;
use rand::TryRngCore;
use rand::rngs::OsRng;
use sha2::Sha512;

use crate::config::{FALLBACK_SALT_SIZE, KEY_SIZE, MAX_CAPACITY};
use crate::error::{CipherError, Result};

/// Random bytes mixed into a single key derivation.
#[derive(Clone, PartialEq, Eq)]
pub struct Salt(Vec<u8>);

impl Salt {
    /// Draws `size` bytes from the operating system CSPRNG.
    ///
    /// # Errors
    ///
    /// Returns an error if `size` is zero or the OS generator fails.
    pub fn random(size: usize) -> Result<Self> {
        if size == 0 {
            return Err(CipherError::Validation("salt size must be at least 1 byte".to_owned()));
        }

        let mut bytes = vec![0u8; size];
        OsRng.try_fill_bytes(&mut bytes).map_err(|e| CipherError::Crypto(format!("rng failed: {e}")))?;

        Ok(Self(bytes))
    }

    /// Parses a hex encoded salt as stored in a record.
    pub fn from_hex(encoded: &str) -> Result<Self> {
        let bytes = hex::decode(encoded).map_err(|e| CipherError::Validation(format!("invalid hex salt {encoded:?}: {e}")))?;
        if bytes.is_empty() {
            return Err(CipherError::Validation("salt values must not be empty".to_owned()));
        }
        Ok(Self(bytes))
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<u8>> for Salt {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl fmt::Debug for Salt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Salt({})", self.to_hex())
    }
}

/// A base64url encoded 32-byte key produced by [`Derive`].
#[derive(Clone, PartialEq, Eq)]
pub struct DerivedKey {
    encoded: String,
}

impl DerivedKey {
    /// Wraps raw key material.
    pub fn from_bytes(bytes: &[u8; KEY_SIZE]) -> Self {
        Self { encoded: URL_SAFE.encode(bytes) }
    }

    /// Accepts a previously persisted key, checking that it decodes to
    /// exactly [`KEY_SIZE`] bytes.
    pub fn from_encoded(encoded: &str) -> Result<Self> {
        let key = Self { encoded: encoded.trim().to_owned() };
        key.to_bytes()?;
        Ok(key)
    }

    /// The persisted form of the key.
    pub fn as_str(&self) -> &str {
        &self.encoded
    }

    /// Decodes the key back to raw bytes for cipher construction.
    pub fn to_bytes(&self) -> Result<[u8; KEY_SIZE]> {
        let bytes = URL_SAFE.decode(&self.encoded).map_err(|e| CipherError::Validation(format!("derived key is not valid base64url: {e}")))?;
        bytes.as_slice().try_into().map_err(|_| CipherError::Validation(format!("derived key must decode to {KEY_SIZE} bytes, got {}", bytes.len())))
    }
}

impl fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("DerivedKey([REDACTED])")
    }
}

/// The outcome of one derivation: the key and the salt that produced it.
#[derive(Debug, Clone)]
pub struct Derivation {
    pub key: DerivedKey,
    pub salt: Salt,
}

/// Validates an iteration count against the hard capacity ceiling.
///
/// # Errors
///
/// Returns a validation error for zero and a capacity error at or above
/// [`MAX_CAPACITY`].
pub fn validate_iterations(iterations: u64) -> Result<u32> {
    if iterations == 0 {
        return Err(CipherError::Validation("iterations must be a positive integer".to_owned()));
    }

    if iterations >= MAX_CAPACITY {
        return Err(CipherError::Capacity(format!(
            "the specified iterations surpass the computational capacity; a count of 1_000 <= x <= 1_000_000 is recommended \
             (specified: {iterations}, max: {MAX_CAPACITY})"
        )));
    }

    u32::try_from(iterations).map_err(|_| CipherError::Capacity(format!("iterations out of range: {iterations}")))
}

/// PBKDF2-HMAC-SHA512 key deriver bound to one passphrase.
pub struct Derive {
    passphrase: Vec<u8>,
}

impl Derive {
    /// Creates a deriver for `passphrase`.
    ///
    /// # Errors
    ///
    /// Returns an error if the passphrase is empty.
    pub fn new(passphrase: &[u8]) -> Result<Self> {
        if passphrase.is_empty() {
            return Err(CipherError::Validation("passphrase cannot be empty".to_owned()));
        }
        Ok(Self { passphrase: passphrase.to_vec() })
    }

    /// Derives a key from `salt`, or from a fresh salt when `salt` is `None`.
    ///
    /// A fresh salt is only meant for the very first derivation of a
    /// session; the returned [`Derivation`] carries it so later calls can
    /// reproduce the key.
    ///
    /// # Errors
    ///
    /// Returns an error if the iteration count is invalid or salt
    /// generation fails.
    pub fn derive_key(&self, salt: Option<&Salt>, iterations: u32) -> Result<Derivation> {
        let rounds = validate_iterations(u64::from(iterations))?;

        let salt = match salt {
            Some(salt) => salt.clone(),
            None => Salt::random(FALLBACK_SALT_SIZE)?,
        };

        let mut key = [0u8; KEY_SIZE];
        pbkdf2_hmac::<Sha512>(&self.passphrase, salt.as_bytes(), rounds, &mut key);

        Ok(Derivation { key: DerivedKey::from_bytes(&key), salt })
    }
}
