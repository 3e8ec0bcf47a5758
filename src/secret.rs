use std::fmt;

use secrecy::{ExposeSecret, SecretString};

/// A passphrase that never shows up in `Debug` output or logs.
pub struct Secret {
    inner: SecretString,
}

impl Secret {
    pub fn new(passphrase: &str) -> Self {
        Self { inner: SecretString::from(passphrase.to_owned()) }
    }

    pub fn from_string(passphrase: String) -> Self {
        Self { inner: SecretString::from(passphrase) }
    }

    pub fn expose_secret(&self) -> &str {
        self.inner.expose_secret()
    }

    pub fn len(&self) -> usize {
        self.expose_secret().chars().count()
    }

    pub fn is_empty(&self) -> bool {
        self.expose_secret().is_empty()
    }
}

impl Clone for Secret {
    fn clone(&self) -> Self {
        Self::new(self.expose_secret())
    }
}

impl From<SecretString> for Secret {
    fn from(secret: SecretString) -> Self {
        Self { inner: secret }
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Secret([... {} chars ...])", self.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_is_redacted() {
        let secret = Secret::new("hunter2hunter2");
        let debug = format!("{secret:?}");
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("14 chars"));
    }

    #[test]
    fn test_clone_preserves_value() {
        let secret = Secret::from_string("abc".to_owned());
        assert_eq!(secret.clone().expose_secret(), "abc");
    }
}
