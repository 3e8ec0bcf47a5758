//! Error taxonomy for the cipher engine.
//!
//! Configuration, validation and capacity errors fail fast at the point of
//! detection. Tier-1 decryption failures never surface here directly; the
//! engine matches on [`DecryptFailure`] and falls back to tier 2. Only when
//! both tiers fail does a [`CipherError::Decryption`] reach the caller.

use thiserror::Error;

/// Errors returned by every public operation of the crate.
#[derive(Debug, Error)]
pub enum CipherError {
    /// Mutually exclusive or missing options.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Malformed input, empty required fields or invalid paths.
    #[error("validation error: {0}")]
    Validation(String),

    /// A request crossed a hard ceiling.
    #[error("capacity error: {0}")]
    Capacity(String),

    /// Input already carries the framing identifiers at encryption time.
    #[error("already encrypted: {0}")]
    AlreadyEncrypted(String),

    /// Input lacks the framing identifiers at decryption time.
    #[error("missing identifiers: {0}")]
    MissingIdentifiers(String),

    /// Both decryption tiers failed.
    #[error("decryption failed: {0}")]
    Decryption(String),

    /// Decryption succeeded but the recomputed hash does not match.
    #[error(
        "the discrepancy in hashed values points to a critical integrity issue, suggesting potential data loss \
         (original hash: {original}, decrypted hash: {recomputed})"
    )]
    Integrity { original: String, recomputed: String },

    /// A primitive refused its inputs (bad key length, sealing failure).
    #[error("crypto error: {0}")]
    Crypto(String),

    /// A persisted record could not be read or written.
    #[error("record serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, CipherError>;

/// Typed failure of a single multi-key decryption attempt.
///
/// Returned by the cipher layer instead of an error so the caller decides
/// whether to escalate or fall back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DecryptFailure {
    /// The token is not valid base64url or is shorter than a nonce and tag.
    #[error("malformed token")]
    MalformedToken,

    /// No key in the set authenticated the token.
    #[error("no key in the set authenticated the token")]
    NoMatchingKey,

    /// The key set was empty or contained an unusable key.
    #[error("unusable key set")]
    UnusableKeys,
}
