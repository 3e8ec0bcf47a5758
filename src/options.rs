//! Per-operation options.
//!
//! Every option has a default, and every `with_*` setter consumes and
//! returns the options so calls can be chained.

use std::path::PathBuf;

use crate::config::{DEFAULT_NUM_SALTS, MAX_TOKENS, MIN_PASSPHRASE_LENGTH};
use crate::framing::Identifiers;
use crate::record::CipherRecord;
use crate::secret::Secret;

/// Options for passphrase generation.
#[derive(Debug, Clone)]
pub struct KeyOptions {
    /// Number of characters to draw.
    pub key_length: usize,
    /// A named preset or a literal set of characters to leave out.
    pub exclude_chars: Option<String>,
    /// Also draw from punctuation.
    pub include_all_chars: bool,
    /// Allow lengths below the 32 character floor.
    pub bypass_keylength: bool,
    /// Length the alphabet is cycled to before sampling.
    pub max_tokens: u64,
}

impl Default for KeyOptions {
    fn default() -> Self {
        Self { key_length: MIN_PASSPHRASE_LENGTH, exclude_chars: None, include_all_chars: false, bypass_keylength: false, max_tokens: MAX_TOKENS }
    }
}

impl KeyOptions {
    #[must_use]
    pub fn with_key_length(mut self, key_length: usize) -> Self {
        self.key_length = key_length;
        self
    }

    #[must_use]
    pub fn with_exclude_chars(mut self, exclude_chars: impl Into<String>) -> Self {
        self.exclude_chars = Some(exclude_chars.into());
        self
    }

    #[must_use]
    pub fn with_include_all_chars(mut self, include_all_chars: bool) -> Self {
        self.include_all_chars = include_all_chars;
        self
    }

    #[must_use]
    pub fn with_bypass_keylength(mut self, bypass_keylength: bool) -> Self {
        self.bypass_keylength = bypass_keylength;
        self
    }

    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u64) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

/// Options shared by text and file encryption.
#[derive(Debug, Clone)]
pub struct EncryptOptions {
    /// Caller passphrase; generated from `key` when absent.
    pub passphrase: Option<Secret>,
    /// Generation rules, also used to validate a caller passphrase.
    pub key: KeyOptions,
    pub num_of_salts: usize,
    /// Byte size of each salt; `None` means 32.
    pub salt_bytes_size: Option<usize>,
    /// Fixed iteration count; `None` asks the engine's iteration budget.
    pub iterations: Option<u32>,
    pub identifiers: Identifiers,
    /// Replace the original file instead of writing a sibling.
    pub overwrite_file: bool,
    pub backup_file: bool,
    /// Write the record as a passkey file. Off by default; the CLI turns
    /// it on unless `--no-export` is given.
    pub export_passkey: bool,
    /// Directory of the passkey file; defaults to the input file's parent
    /// or the working directory for text.
    pub export_path: Option<PathBuf>,
    /// Stem of the passkey file.
    pub passkey_file_name: Option<String>,
    /// Seal the symmetric token with the asymmetric layer.
    pub advanced_encryption: bool,
    /// Passphrase protecting the asymmetric private key.
    pub key_passphrase: Option<Secret>,
    pub key_iterations: Option<u32>,
}

impl Default for EncryptOptions {
    fn default() -> Self {
        Self {
            passphrase: None,
            key: KeyOptions::default(),
            num_of_salts: DEFAULT_NUM_SALTS,
            salt_bytes_size: None,
            iterations: None,
            identifiers: Identifiers::default(),
            overwrite_file: false,
            backup_file: true,
            export_passkey: false,
            export_path: None,
            passkey_file_name: None,
            advanced_encryption: false,
            key_passphrase: None,
            key_iterations: None,
        }
    }
}

impl EncryptOptions {
    #[must_use]
    pub fn with_passphrase(mut self, passphrase: impl Into<String>) -> Self {
        self.passphrase = Some(Secret::from_string(passphrase.into()));
        self
    }

    #[must_use]
    pub fn with_key(mut self, key: KeyOptions) -> Self {
        self.key = key;
        self
    }

    #[must_use]
    pub fn with_num_of_salts(mut self, num_of_salts: usize) -> Self {
        self.num_of_salts = num_of_salts;
        self
    }

    #[must_use]
    pub fn with_salt_bytes_size(mut self, salt_bytes_size: usize) -> Self {
        self.salt_bytes_size = Some(salt_bytes_size);
        self
    }

    #[must_use]
    pub fn with_iterations(mut self, iterations: u32) -> Self {
        self.iterations = Some(iterations);
        self
    }

    #[must_use]
    pub fn with_identifiers(mut self, identifiers: Identifiers) -> Self {
        self.identifiers = identifiers;
        self
    }

    #[must_use]
    pub fn with_overwrite_file(mut self, overwrite_file: bool) -> Self {
        self.overwrite_file = overwrite_file;
        self
    }

    #[must_use]
    pub fn with_backup_file(mut self, backup_file: bool) -> Self {
        self.backup_file = backup_file;
        self
    }

    #[must_use]
    pub fn with_export_passkey(mut self, export_passkey: bool) -> Self {
        self.export_passkey = export_passkey;
        self
    }

    #[must_use]
    pub fn with_export_path(mut self, export_path: impl Into<PathBuf>) -> Self {
        self.export_path = Some(export_path.into());
        self
    }

    #[must_use]
    pub fn with_passkey_file_name(mut self, name: impl Into<String>) -> Self {
        self.passkey_file_name = Some(name.into());
        self
    }

    #[must_use]
    pub fn with_advanced_encryption(mut self, advanced_encryption: bool) -> Self {
        self.advanced_encryption = advanced_encryption;
        self
    }

    #[must_use]
    pub fn with_key_passphrase(mut self, key_passphrase: impl Into<String>) -> Self {
        self.key_passphrase = Some(Secret::from_string(key_passphrase.into()));
        self
    }

    #[must_use]
    pub fn with_key_iterations(mut self, key_iterations: u32) -> Self {
        self.key_iterations = Some(key_iterations);
        self
    }
}

/// Options shared by text and file decryption.
///
/// Exactly one of `record` and `passkey_file` must be set.
#[derive(Debug, Clone, Default)]
pub struct DecryptOptions {
    pub record: Option<CipherRecord>,
    pub passkey_file: Option<PathBuf>,
    /// Overrides the passkey stored in the record.
    pub passphrase: Option<Secret>,
    /// Restore the original file and remove the encrypted one.
    pub overwrite_file: bool,
}

impl DecryptOptions {
    #[must_use]
    pub fn with_record(mut self, record: CipherRecord) -> Self {
        self.record = Some(record);
        self
    }

    #[must_use]
    pub fn with_passkey_file(mut self, passkey_file: impl Into<PathBuf>) -> Self {
        self.passkey_file = Some(passkey_file.into());
        self
    }

    #[must_use]
    pub fn with_passphrase(mut self, passphrase: impl Into<String>) -> Self {
        self.passphrase = Some(Secret::from_string(passphrase.into()));
        self
    }

    #[must_use]
    pub fn with_overwrite_file(mut self, overwrite_file: bool) -> Self {
        self.overwrite_file = overwrite_file;
        self
    }
}
