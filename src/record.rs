//! The persisted cipher record.
//!
//! A record is everything a later decryption needs. It is created once by
//! an encryption and only read afterwards. Exported records are pretty JSON
//! with two sections:
//!
//! ```json
//! {
//!   "CIPHER_INFO": { "original_text": "...", "encrypted_text": "..." },
//!   "SECURITY_PARAMS": { "decipher_keys": [...], "layering": "symmetric", ... }
//! }
//! ```
//!
//! The content section is either the file or the text form, never a mix,
//! and the asymmetric wrap fields only exist when `layering` says so.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{CipherError, Result};
use crate::framing::Identifiers;

/// What was encrypted and where the ciphertext lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Content {
    File { original_file: PathBuf, encrypted_file: PathBuf },
    Text { original_text: String, encrypted_text: String },
}

/// Metadata of the optional asymmetric layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WrapMetadata {
    /// Protected X25519 private key, base64url.
    pub private_key: String,
    /// X25519 public key, hex.
    pub public_key: String,
    #[serde(rename = "rsa_bits_size")]
    pub key_bits_size: u32,
    /// PBKDF2 iterations protecting `private_key`.
    #[serde(rename = "rsa_iterations")]
    pub key_iterations: u32,
    #[serde(rename = "rsa_passphrase")]
    pub key_passphrase: String,
    /// The framed symmetric token before it was sealed.
    #[serde(rename = "fernet_encrypted_text")]
    pub symmetric_ciphertext: String,
}

/// Whether the framed payload is the symmetric token itself or a sealed
/// form of it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "layering", rename_all = "snake_case")]
pub enum Layering {
    Symmetric,
    Asymmetric(WrapMetadata),
}

/// Key material and verification data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityParams {
    /// Derived keys in encryption order, base64url.
    pub decipher_keys: Vec<String>,
    /// SHA-256 of the plaintext, hex.
    pub hash_value: String,
    pub id1: String,
    pub id2: String,
    pub iterations: u32,
    pub passkey: String,
    /// Salts paired positionally with `decipher_keys`, hex.
    pub salt_values: Vec<String>,
    #[serde(rename = "salt_byte_size")]
    pub salt_bytes_size: usize,
    #[serde(flatten)]
    pub layering: Layering,
}

impl SecurityParams {
    /// Rebuilds the identifiers the payload was framed with.
    pub fn identifiers(&self) -> Result<Identifiers> {
        Identifiers::new(self.id1.clone(), self.id2.clone())
    }
}

/// A complete record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CipherRecord {
    #[serde(rename = "CIPHER_INFO")]
    pub content: Content,
    #[serde(rename = "SECURITY_PARAMS")]
    pub security: SecurityParams,
}

impl CipherRecord {
    /// Pretty JSON form.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parses and checks a JSON record.
    ///
    /// # Errors
    ///
    /// Returns a validation error naming the missing or malformed part.
    pub fn from_json(json: &str) -> Result<Self> {
        let record: Self = serde_json::from_str(json).map_err(|e| CipherError::Validation(format!("invalid passkey record: {e}")))?;
        record.validate()?;
        Ok(record)
    }

    /// Reads a record exported by [`Self::export`].
    ///
    /// # Errors
    ///
    /// I/O errors propagate as is; shape errors are validation errors.
    pub fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        Self::from_json(&json).map_err(|e| match e {
            CipherError::Validation(msg) => CipherError::Validation(format!("{}: {msg}", path.display())),
            other => other,
        })
    }

    /// Writes the record to `path`, creating parent directories.
    pub fn export(&self, path: &Path) -> Result<PathBuf> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.to_json()?)?;
        info!(path = %path.display(), "passkey record exported");
        Ok(path.to_path_buf())
    }

    /// The framed ciphertext for text records.
    pub fn encrypted_text(&self) -> Option<&str> {
        match &self.content {
            Content::Text { encrypted_text, .. } => Some(encrypted_text),
            Content::File { .. } => None,
        }
    }

    /// The encrypted file for file records.
    pub fn encrypted_file(&self) -> Option<&Path> {
        match &self.content {
            Content::File { encrypted_file, .. } => Some(encrypted_file),
            Content::Text { .. } => None,
        }
    }

    /// Structural checks serde cannot express.
    pub(crate) fn validate(&self) -> Result<()> {
        let security = &self.security;
        if security.decipher_keys.is_empty() || security.salt_values.is_empty() {
            return Err(CipherError::Validation("'decipher_keys' and 'salt_values' must not be empty".to_owned()));
        }
        if security.hash_value.is_empty() {
            return Err(CipherError::Validation("'hash_value' must not be empty".to_owned()));
        }
        if security.iterations == 0 {
            return Err(CipherError::Validation("'iterations' must be a positive integer".to_owned()));
        }
        security.identifiers()?;
        Ok(())
    }
}
