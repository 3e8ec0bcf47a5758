//! Common type definitions.
//!
//! - [`EncryptStage`] / [`DecryptStage`]: per-operation state machines
//! - [`Stages`]: records and logs the transitions of one operation
//! - [`DecryptedText`] / [`DecryptedFile`]: decryption results

use std::fmt::{self, Display, Formatter};
use std::path::PathBuf;

use tracing::{debug, warn};

/// States of one encryption.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncryptStage {
    Init,
    Validated,
    KeysDerived,
    Encrypted,
    Framed,
    Persisted,
    Done,
    Failed,
}

impl EncryptStage {
    #[inline]
    pub fn label(self) -> &'static str {
        match self {
            Self::Init => "INIT",
            Self::Validated => "VALIDATED",
            Self::KeysDerived => "KEYS_DERIVED",
            Self::Encrypted => "ENCRYPTED",
            Self::Framed => "FRAMED",
            Self::Persisted => "PERSISTED",
            Self::Done => "DONE",
            Self::Failed => "FAILED",
        }
    }
}

/// States of one decryption. `DecryptAttempt2` only occurs when the first
/// attempt fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecryptStage {
    Init,
    InputSelected,
    Unframed,
    KeysReady,
    DecryptAttempt1,
    DecryptAttempt2,
    HashVerified,
    Done,
    Failed,
}

impl DecryptStage {
    #[inline]
    pub fn label(self) -> &'static str {
        match self {
            Self::Init => "INIT",
            Self::InputSelected => "INPUT_SELECTED",
            Self::Unframed => "UNFRAMED",
            Self::KeysReady => "KEYS_READY",
            Self::DecryptAttempt1 => "DECRYPT_ATTEMPT_1",
            Self::DecryptAttempt2 => "DECRYPT_ATTEMPT_2",
            Self::HashVerified => "HASH_VERIFIED",
            Self::Done => "DONE",
            Self::Failed => "FAILED",
        }
    }
}

impl Display for EncryptStage {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl Display for DecryptStage {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Transition history of a single operation.
///
/// Every transition is emitted as a `debug!` event tagged with the
/// operation name.
pub struct Stages<S> {
    operation: &'static str,
    history: Vec<S>,
}

impl<S: Copy + Display> Stages<S> {
    pub fn new(operation: &'static str, init: S) -> Self {
        debug!(operation, stage = %init, "stage");
        Self { operation, history: vec![init] }
    }

    pub fn advance(&mut self, stage: S) {
        debug!(operation = self.operation, stage = %stage, "stage");
        self.history.push(stage);
    }

    /// Moves to `done` or `failed` depending on `result`.
    pub fn finish<T, E: Display>(&mut self, result: &Result<T, E>, done: S, failed: S) {
        match result {
            Ok(_) => self.advance(done),
            Err(e) => {
                warn!(operation = self.operation, error = %e, "operation failed");
                self.advance(failed);
            }
        }
    }

    pub fn history(&self) -> &[S] {
        &self.history
    }
}

/// Result of a text decryption.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecryptedText {
    pub text: String,
    /// SHA-256 of `text`, verified against the record.
    pub hash_value: String,
}

/// Result of a file decryption.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecryptedFile {
    pub path: PathBuf,
    /// SHA-256 of the written file, verified against the record.
    pub hash_value: String,
}
