//! Identifier framing of ciphertext.
//!
//! An envelope is `start || token || end` with no separators. The markers
//! make previously encrypted data recognisable: framed data is never
//! encrypted again, and unframed data is never handed to the cipher.

use crate::config::IDENTIFIER_TEMPLATE;
use crate::error::{CipherError, Result};

/// The start and end markers wrapped around every token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identifiers {
    start: String,
    end: String,
}

impl Default for Identifiers {
    fn default() -> Self {
        Self { start: IDENTIFIER_TEMPLATE.replacen("{}", "BEGIN", 1), end: IDENTIFIER_TEMPLATE.replacen("{}", "END", 1) }
    }
}

impl Identifiers {
    /// Custom identifiers.
    ///
    /// # Errors
    ///
    /// Returns a validation error if either marker is empty.
    pub fn new(start: impl Into<String>, end: impl Into<String>) -> Result<Self> {
        let (start, end) = (start.into(), end.into());
        if start.is_empty() || end.is_empty() {
            return Err(CipherError::Validation("encryption identifiers must not be empty".to_owned()));
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> &str {
        &self.start
    }

    pub fn end(&self) -> &str {
        &self.end
    }

    /// Wraps a token with both markers.
    pub fn frame(&self, token: &str) -> String {
        let mut framed = String::with_capacity(self.start.len() + token.len() + self.end.len());
        framed.push_str(&self.start);
        framed.push_str(token);
        framed.push_str(&self.end);
        framed
    }

    /// Strips both markers.
    ///
    /// # Errors
    ///
    /// Returns [`CipherError::MissingIdentifiers`] unless `data` starts with
    /// the start marker and ends with the end marker without overlap.
    pub fn unframe<'a>(&self, data: &'a [u8]) -> Result<&'a [u8]> {
        check_headers(data, self, true, "the provided data is missing its encryption identifiers")?;
        if data.len() < self.start.len() + self.end.len() {
            return Err(CipherError::MissingIdentifiers("the encryption identifiers overlap".to_owned()));
        }
        Ok(&data[self.start.len()..data.len() - self.end.len()])
    }
}

/// Single header check with a sense flag.
///
/// With `expect_framed == false` data that starts with the start marker
/// *or* ends with the end marker is rejected as already encrypted. With
/// `expect_framed == true` data lacking either marker is rejected.
///
/// # Errors
///
/// [`CipherError::AlreadyEncrypted`] or [`CipherError::MissingIdentifiers`],
/// carrying `message`.
pub fn check_headers(data: &[u8], identifiers: &Identifiers, expect_framed: bool, message: &str) -> Result<()> {
    let starts = data.starts_with(identifiers.start.as_bytes());
    let ends = data.ends_with(identifiers.end.as_bytes());

    if expect_framed {
        if !(starts && ends) {
            return Err(CipherError::MissingIdentifiers(message.to_owned()));
        }
    } else if starts || ends {
        return Err(CipherError::AlreadyEncrypted(message.to_owned()));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_identifiers() {
        let ids = Identifiers::default();
        assert_eq!(ids.start(), "-----BEGIN CIPHERENGINE CRYPTOGRAPHIC ENCRYPTED KEY-----");
        assert_eq!(ids.end(), "-----END CIPHERENGINE CRYPTOGRAPHIC ENCRYPTED KEY-----");
    }

    #[test]
    fn test_frame_unframe() {
        let ids = Identifiers::default();
        let framed = ids.frame("token");
        assert!(framed.starts_with(ids.start()));
        assert_eq!(ids.unframe(framed.as_bytes()).unwrap(), b"token");
    }

    #[test]
    fn test_reject_reencryption_on_either_marker() {
        let ids = Identifiers::new("<<", ">>").unwrap();
        assert!(matches!(check_headers(b"<<abc", &ids, false, "x"), Err(CipherError::AlreadyEncrypted(_))));
        assert!(matches!(check_headers(b"abc>>", &ids, false, "x"), Err(CipherError::AlreadyEncrypted(_))));
        assert!(check_headers(b"abc", &ids, false, "x").is_ok());
    }

    #[test]
    fn test_reject_decryption_without_both_markers() {
        let ids = Identifiers::new("<<", ">>").unwrap();
        assert!(matches!(check_headers(b"<<abc", &ids, true, "x"), Err(CipherError::MissingIdentifiers(_))));
        assert!(matches!(ids.unframe(b"abc"), Err(CipherError::MissingIdentifiers(_))));
        assert!(check_headers(b"<<abc>>", &ids, true, "x").is_ok());
    }

    #[test]
    fn test_overlapping_markers() {
        let ids = Identifiers::new("aba", "aba").unwrap();
        assert!(ids.unframe(b"aba").is_err());
        assert_eq!(ids.unframe(b"abaaba").unwrap(), b"");
    }

    #[test]
    fn test_empty_identifiers() {
        assert!(Identifiers::new("", "end").is_err());
    }
}
