//! CipherEngine - Multi-key symmetric encryption for text and files.
//!
//! A passphrase (given or generated) is stretched with PBKDF2-HMAC-SHA512
//! against several random salts. The first derived key encrypts with
//! XChaCha20-Poly1305; the whole key set is kept for decryption. The token
//! is framed between two identifiers and every plaintext is hashed with
//! SHA-256 so a decryption can prove it recovered the original bytes.
//!
//! Decryption runs in two attempts: keys re-derived from the stored salts
//! first, the stored keys second. An optional X25519 layer can seal the
//! symmetric token once more.
//!
//! The free functions below share one lazily built [`Engine`] with default
//! resources, so the derivation pool is created once per process. Hold an
//! [`Engine`] directly to size the pool or to inject an
//! [`IterationBudget`].

pub mod budget;
pub mod cipher;
pub mod config;
pub mod engine;
pub mod error;
pub mod file;
pub mod framing;
pub mod keygen;
pub mod options;
pub mod record;
pub mod secret;
pub mod types;

use std::path::Path;
use std::sync::OnceLock;

pub use budget::{CoreScaledBudget, FixedBudget, IterationBudget};
pub use engine::Engine;
pub use error::{CipherError, DecryptFailure, Result};
pub use framing::Identifiers;
pub use keygen::{GeneratedKey, TokenAdvisory};
pub use options::{DecryptOptions, EncryptOptions, KeyOptions};
pub use record::CipherRecord;
pub use secret::Secret;
pub use types::{DecryptedFile, DecryptedText};

static DEFAULT_ENGINE: OnceLock<Engine> = OnceLock::new();

/// The process-wide engine behind the free functions.
fn default_engine() -> Result<&'static Engine> {
    if let Some(engine) = DEFAULT_ENGINE.get() {
        return Ok(engine);
    }
    let engine = Engine::with_defaults()?;
    Ok(DEFAULT_ENGINE.get_or_init(|| engine))
}

/// Generates a passphrase from the configured character pool.
///
/// # Errors
///
/// See [`keygen::generate_passphrase`].
pub fn generate_key(options: &KeyOptions) -> Result<GeneratedKey> {
    keygen::generate_passphrase(options)
}

/// Encrypts `text` with the shared default [`Engine`].
///
/// # Errors
///
/// See [`Engine::encrypt_text`].
pub fn encrypt_text(text: &str, options: &EncryptOptions) -> Result<CipherRecord> {
    default_engine()?.encrypt_text(text, options)
}

/// Decrypts a text record with the shared default [`Engine`].
///
/// # Errors
///
/// See [`Engine::decrypt_text`].
pub fn decrypt_text(options: &DecryptOptions) -> Result<DecryptedText> {
    default_engine()?.decrypt_text(options)
}

/// Encrypts the file at `path` with the shared default [`Engine`].
///
/// # Errors
///
/// See [`Engine::encrypt_file`].
pub fn encrypt_file(path: &Path, options: &EncryptOptions) -> Result<CipherRecord> {
    default_engine()?.encrypt_file(path, options)
}

/// Decrypts a file record with the shared default [`Engine`].
///
/// # Errors
///
/// See [`Engine::decrypt_file`].
pub fn decrypt_file(options: &DecryptOptions) -> Result<DecryptedFile> {
    default_engine()?.decrypt_file(options)
}
