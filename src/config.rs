//! Global Configuration Constants
//!
//! This module contains the parameters shared by the key generator, the key
//! deriver, the multi-key cipher and both engines. Values that end up in a
//! persisted record (key size, identifiers, prefixes) must never change
//! between releases, or previously exported records stop decrypting.
//!
//! ## Ceilings
//!
//! Two kinds of limits exist:
//! - **Hard ceilings** (`MAX_CAPACITY`): requests at or above them fail
//!   with a capacity error before any cryptographic work starts.
//! - **Soft thresholds** (`MAX_TOKENS`): crossing them only produces a
//!   warning or an advisory value.

/// Application name used in log lines and the CLI banner.
pub const APP_NAME: &str = "CipherEngine";

// === Key Derivation Parameters ===

/// Length of every derived key in bytes.
///
/// PBKDF2-HMAC-SHA512 is asked for exactly this many bytes, which is also
/// the XChaCha20-Poly1305 key size.
pub const KEY_SIZE: usize = 32;

/// Salt size used when a derivation is requested without a salt.
pub const FALLBACK_SALT_SIZE: usize = 16;

/// Default byte size of each generated salt.
pub const DEFAULT_SALT_BYTES: usize = 32;

/// Default number of salts (and therefore derived keys) per operation.
pub const DEFAULT_NUM_SALTS: usize = 2;

/// Lower bound picked by the default iteration budget.
pub const MIN_ITERATIONS: u32 = 100_000;

/// Upper bound for iterations, key lengths, salt sizes and repeat counts.
///
/// Anything at or above this value is rejected outright.
pub const MAX_CAPACITY: u64 = 100_000_000;

/// Soft threshold for salt counts and the passphrase token budget.
///
/// Salt counts at or above this value log a warning. The passphrase
/// generator cycles its character pool up to this many tokens.
pub const MAX_TOKENS: u64 = 100_000;

/// Minimum passphrase length unless `bypass_keylength` is set.
pub const MIN_PASSPHRASE_LENGTH: usize = 32;

/// Number of iterations protecting the private key of the asymmetric layer
/// when neither the caller nor the symmetric iteration count lowers it.
pub const DEFAULT_KEY_ITERATIONS: u32 = 100_000;

// === Cipher Parameters ===

/// Size of XChaCha20 nonce in bytes.
pub const CHACHA_NONCE_SIZE: usize = 24;

/// Size of AES-GCM nonce in bytes.
pub const AES_NONCE_SIZE: usize = 12;

/// Size of the Poly1305 / GCM authentication tag in bytes.
pub const TAG_SIZE: usize = 16;

/// Size of an X25519 public or private key in bytes.
pub const X25519_KEY_SIZE: usize = 32;

/// Key size reported for the asymmetric layer, in bits.
pub const WRAP_KEY_BITS: u32 = 256;

/// Domain separation tag mixed into the asymmetric layer's key derivation.
pub const WRAP_KDF_CONTEXT: &[u8] = b"cipher-engine/x25519-wrap/v1";

// === Integrity ===

/// Chunk size used when streaming a file through SHA-256.
pub const HASH_CHUNK_SIZE: usize = 4 * 1024;

// === Framing ===

/// Template for the default identifiers; `{}` becomes `BEGIN` or `END`.
pub const IDENTIFIER_TEMPLATE: &str = "-----{} CIPHERENGINE CRYPTOGRAPHIC ENCRYPTED KEY-----";

// === File Layout ===

/// Extension of encrypted files.
pub const ENCRYPTED_EXTENSION: &str = "aes";

/// Stem prefix of encrypted files written next to the original.
pub const ENCRYPTED_PREFIX: &str = "encrypted";

/// Stem prefix of decrypted files written next to the encrypted one.
pub const DECRYPTED_PREFIX: &str = "decrypted";

/// Directory (relative to the original file) that receives backups.
pub const BACKUP_DIR: &str = "backup";

/// `chrono` format of the timestamp prefixed to backup file names.
pub const BACKUP_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%I-%M-%S%p";

/// Extension of exported passkey files.
pub const PASSKEY_EXTENSION: &str = "json";

/// Default exported passkey file name for text encryption.
pub const TEXT_PASSKEY_NAME: &str = "ciphertext_passkey";

/// Suffix appended to the encrypted stem for file passkey exports.
pub const FILE_PASSKEY_SUFFIX: &str = "_passkey";

// === Character Sets ===

/// Decimal digits.
pub const DIGITS: &str = "0123456789";

/// Lowercase ASCII letters.
pub const ASCII_LOWERCASE: &str = "abcdefghijklmnopqrstuvwxyz";

/// Uppercase ASCII letters.
pub const ASCII_UPPERCASE: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// ASCII punctuation.
pub const PUNCTUATION: &str = r##"!"#$%&'()*+,-./:;<=>?@[\]^_`{|}~"##;

/// Whitespace, always stripped from generated passphrases because it breaks
/// exported passkey files.
pub const WHITESPACE: &str = " \t\n\r\x0b\x0c";
