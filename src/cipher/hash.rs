//! Content integrity verification using SHA-256.
//!
//! Every record carries the hex digest of the plaintext taken before
//! encryption. After a successful decryption the digest is recomputed over
//! the recovered bytes (for files: over the file actually written) and
//! compared in constant time.
//!
//! Files are streamed in 4 KiB chunks so arbitrarily large inputs never have
//! to be held in memory just to be hashed.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::config::HASH_CHUNK_SIZE;
use crate::error::{CipherError, Result};

/// A computed SHA-256 digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hash {
    digest: [u8; 32],
}

impl Hash {
    /// Hashes a reader until EOF, [`HASH_CHUNK_SIZE`] bytes at a time.
    ///
    /// # Errors
    ///
    /// Returns an error if reading from the underlying source fails.
    pub fn new<R: Read>(mut reader: R) -> Result<Self> {
        let mut hasher = Sha256::new();
        let mut buffer = [0u8; HASH_CHUNK_SIZE];

        loop {
            let bytes_read = reader.read(&mut buffer)?;
            if bytes_read == 0 {
                break;
            }
            hasher.update(&buffer[..bytes_read]);
        }

        Ok(Self { digest: hasher.finalize().into() })
    }

    /// Hashes an in-memory byte slice.
    pub fn from_bytes(data: &[u8]) -> Self {
        Self { digest: Sha256::digest(data).into() }
    }

    /// Lowercase hex form, as stored in `hash_value`.
    pub fn to_hex(&self) -> String {
        hex::encode(self.digest)
    }
}

/// Hex SHA-256 digest of a file's contents.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or read.
pub fn hash_file(path: &Path) -> Result<String> {
    let file = File::open(path)?;
    Ok(Hash::new(BufReader::new(file))?.to_hex())
}

/// Hex SHA-256 digest of a string's UTF-8 bytes.
pub fn hash_text(text: &str) -> String {
    Hash::from_bytes(text.as_bytes()).to_hex()
}

/// Compares two hex digests in constant time.
///
/// # Errors
///
/// Returns [`CipherError::Integrity`] carrying both digests on mismatch.
pub fn verify(original: &str, recomputed: &str) -> Result<()> {
    let matches = original.len() == recomputed.len() && bool::from(original.as_bytes().ct_eq(recomputed.as_bytes()));
    if !matches {
        return Err(CipherError::Integrity { original: original.to_owned(), recomputed: recomputed.to_owned() });
    }
    Ok(())
}
