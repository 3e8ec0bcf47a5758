//! # Encryption and Decryption Engines
//!
//! [`Engine`] orchestrates key generation, derivation, the multi-key cipher,
//! framing and integrity checks in both directions, for in-memory text and
//! for files on disk.
//!
//! ## Resources
//!
//! The engine owns nothing mutable. It holds a rayon [`ThreadPool`] used to
//! derive the keys of one operation in parallel, and an
//! [`IterationBudget`] consulted when the caller gives no iteration count.
//! Both are injected, so several engines may share one pool.
//!
//! ## Ordering
//!
//! Derived keys are collected in salt order regardless of which worker
//! finishes first: `salt_values[i]` always produced `decipher_keys[i]`.

mod decrypt;
mod encrypt;

use std::sync::Arc;

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use tracing::{debug, warn};

use crate::budget::{CoreScaledBudget, IterationBudget};
use crate::cipher::derive::validate_iterations;
use crate::cipher::{Derive, DerivedKey, Salt};
use crate::error::{CipherError, Result};
use crate::keygen::{generate_passphrase, validate_passphrase};
use crate::options::KeyOptions;
use crate::secret::Secret;

/// Stateless orchestrator for encryption and decryption.
#[derive(Clone)]
pub struct Engine {
    pool: Arc<ThreadPool>,
    budget: Arc<dyn IterationBudget>,
}

impl Engine {
    pub fn new(pool: Arc<ThreadPool>, budget: Arc<dyn IterationBudget>) -> Self {
        Self { pool, budget }
    }

    /// An engine with a pool sized to the available cores and a
    /// [`CoreScaledBudget`].
    ///
    /// # Errors
    ///
    /// Returns an error if the thread pool cannot be built.
    pub fn with_defaults() -> Result<Self> {
        let budget = CoreScaledBudget::detect();
        let pool = ThreadPoolBuilder::new()
            .thread_name(|i| format!("cipher-engine-derive-{i}"))
            .build()
            .map_err(|e| CipherError::Configuration(format!("failed to build the derivation thread pool: {e}")))?;
        Ok(Self::new(Arc::new(pool), Arc::new(budget)))
    }

    /// Requested iterations, or the budget's choice, checked against the
    /// capacity ceiling.
    fn iterations(&self, requested: Option<u32>) -> Result<u32> {
        let iterations = requested.unwrap_or_else(|| self.budget.iterations());
        validate_iterations(u64::from(iterations))
    }

    /// Checks a caller passphrase or generates one.
    fn resolve_passphrase(passphrase: Option<&Secret>, key: &KeyOptions) -> Result<Secret> {
        if key.exclude_chars.is_some() && key.include_all_chars {
            return Err(CipherError::Configuration("cannot specify both 'exclude_chars' and 'include_all_chars'".to_owned()));
        }

        if let Some(passphrase) = passphrase {
            validate_passphrase(passphrase, key.bypass_keylength)?;
            return Ok(passphrase.clone());
        }

        let generated = generate_passphrase(key)?;
        if let Some(advisory) = generated.advisory {
            warn!(
                configured = advisory.configured,
                recommended = advisory.recommended,
                "the key length exceeds the characters that can be cycled; a larger token budget is recommended"
            );
        }
        Ok(generated.key)
    }

    /// Derives one key per salt on the engine's pool, in salt order.
    fn derive_keys(&self, passphrase: &Secret, salts: &[Salt], iterations: u32) -> Result<Vec<DerivedKey>> {
        let deriver = Derive::new(passphrase.expose_secret().as_bytes())?;
        debug!(keys = salts.len(), iterations, "deriving keys");

        self.pool.install(|| salts.par_iter().map(|salt| deriver.derive_key(Some(salt), iterations).map(|d| d.key)).collect())
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::tempdir;

    use super::*;
    use crate::budget::FixedBudget;
    use crate::cipher::hash::hash_text;
    use crate::config::BACKUP_DIR;
    use crate::framing::Identifiers;
    use crate::options::{DecryptOptions, EncryptOptions};
    use crate::record::{Content, Layering};
    use crate::types::DecryptStage;

    const ITERATIONS: u32 = 1_000;

    fn engine() -> Engine {
        let pool = ThreadPoolBuilder::new().num_threads(2).build().unwrap();
        Engine::new(Arc::new(pool), Arc::new(FixedBudget(ITERATIONS)))
    }

    fn options() -> EncryptOptions {
        EncryptOptions::default().with_passphrase("a".repeat(40)).with_num_of_salts(2).with_iterations(ITERATIONS)
    }

    #[test]
    fn test_text_round_trip() {
        let engine = engine();
        let record = engine.encrypt_text("hello world", &options()).unwrap();

        assert_eq!(record.security.decipher_keys.len(), 2);
        assert_eq!(record.security.salt_values.len(), 2);
        assert_eq!(record.security.iterations, ITERATIONS);
        assert!(record.encrypted_text().unwrap().starts_with(Identifiers::default().start()));

        let decrypted = engine.decrypt_text(&DecryptOptions::default().with_record(record)).unwrap();
        assert_eq!(decrypted.text, "hello world");
        assert_eq!(decrypted.hash_value, hash_text("hello world"));
    }

    #[test]
    fn test_derived_keys_pair_with_salts() {
        let engine = engine();
        let record = engine.encrypt_text("pairing", &options().with_num_of_salts(5)).unwrap();

        let passphrase = Secret::new(&"a".repeat(40));
        let salts: Vec<Salt> = record.security.salt_values.iter().map(|s| Salt::from_hex(s).unwrap()).collect();
        let keys = engine.derive_keys(&passphrase, &salts, ITERATIONS).unwrap();
        let keys: Vec<&str> = keys.iter().map(DerivedKey::as_str).collect();
        assert_eq!(keys, record.security.decipher_keys);
    }

    #[test]
    fn test_file_round_trip_with_backup() {
        let dir = tempdir().unwrap();
        let note = dir.path().join("note.txt");
        fs::write(&note, b"line one\nline two\n").unwrap();

        let engine = engine();
        let record = engine.encrypt_file(&note, &options().with_backup_file(true)).unwrap();

        let encrypted = dir.path().join("encrypted_note.aes");
        assert_eq!(record.encrypted_file(), Some(encrypted.as_path()));
        assert!(encrypted.exists());
        assert!(note.exists());

        let backups: Vec<_> = fs::read_dir(dir.path().join(BACKUP_DIR)).unwrap().map(|e| e.unwrap().file_name().into_string().unwrap()).collect();
        assert_eq!(backups.len(), 1);
        assert!(backups[0].ends_with("-backup_note.txt"));

        let decrypted = engine.decrypt_file(&DecryptOptions::default().with_record(record.clone())).unwrap();
        assert_eq!(decrypted.path, dir.path().join("decrypted_note.txt"));
        assert_eq!(fs::read(&decrypted.path).unwrap(), b"line one\nline two\n");
        assert_eq!(decrypted.hash_value, record.security.hash_value);
    }

    #[test]
    fn test_file_overwrite_round_trip() {
        let dir = tempdir().unwrap();
        let note = dir.path().join("note.txt");
        fs::write(&note, b"overwrite me").unwrap();

        let engine = engine();
        let record = engine.encrypt_file(&note, &options().with_overwrite_file(true).with_backup_file(false)).unwrap();
        let encrypted = dir.path().join("note.aes");
        assert!(!note.exists());
        assert!(encrypted.exists());
        assert!(!dir.path().join(BACKUP_DIR).exists());

        let decrypted = engine.decrypt_file(&DecryptOptions::default().with_record(record).with_overwrite_file(true)).unwrap();
        assert_eq!(decrypted.path, note);
        assert_eq!(fs::read(&note).unwrap(), b"overwrite me");
        assert!(!encrypted.exists());
    }

    #[test]
    fn test_conflicting_options() {
        let dir = tempdir().unwrap();
        let options = EncryptOptions::default()
            .with_key(KeyOptions::default().with_exclude_chars("!").with_include_all_chars(true))
            .with_export_passkey(true)
            .with_export_path(dir.path());

        assert!(matches!(engine().encrypt_text("x", &options), Err(CipherError::Configuration(_))));
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_ambiguous_decryption_input() {
        let engine = engine();
        assert!(matches!(engine.decrypt_text(&DecryptOptions::default()), Err(CipherError::Configuration(_))));

        let record = engine.encrypt_text("hello", &options()).unwrap();
        let both = DecryptOptions::default().with_record(record).with_passkey_file("passkey.json");
        assert!(matches!(engine.decrypt_text(&both), Err(CipherError::Configuration(_))));
    }

    #[test]
    fn test_double_encryption_rejected() {
        let engine = engine();
        let record = engine.encrypt_text("hello", &options()).unwrap();
        let framed = record.encrypted_text().unwrap();
        assert!(matches!(engine.encrypt_text(framed, &options()), Err(CipherError::AlreadyEncrypted(_))));

        let dir = tempdir().unwrap();
        let file = dir.path().join("framed.txt");
        fs::write(&file, format!("{}payload", Identifiers::default().start())).unwrap();
        assert!(matches!(engine.encrypt_file(&file, &options()), Err(CipherError::AlreadyEncrypted(_))));
    }

    #[test]
    fn test_unframed_input_rejected() {
        let engine = engine();
        let mut record = engine.encrypt_text("hello", &options()).unwrap();
        if let Content::Text { encrypted_text, .. } = &mut record.content {
            *encrypted_text = encrypted_text.replace(Identifiers::default().end(), "");
        }
        assert!(matches!(engine.decrypt_text(&DecryptOptions::default().with_record(record)), Err(CipherError::MissingIdentifiers(_))));
    }

    #[test]
    fn test_fallback_to_stored_keys() {
        let engine = engine();
        let mut record = engine.encrypt_text("rotated salts", &options()).unwrap();
        record.security.salt_values = vec!["00".repeat(32), "11".repeat(32)];

        let (result, history) = engine.decrypt_text_staged(&DecryptOptions::default().with_record(record));
        assert_eq!(result.unwrap().text, "rotated salts");
        assert!(history.contains(&DecryptStage::DecryptAttempt2));
        assert_eq!(history.last(), Some(&DecryptStage::Done));
    }

    #[test]
    fn test_first_attempt_succeeds_without_fallback() {
        let engine = engine();
        let record = engine.encrypt_text("plain path", &options()).unwrap();

        let (result, history) = engine.decrypt_text_staged(&DecryptOptions::default().with_record(record));
        assert!(result.is_ok());
        assert!(!history.contains(&DecryptStage::DecryptAttempt2));
        assert!(history.contains(&DecryptStage::HashVerified));
    }

    #[test]
    fn test_complete_failure() {
        let engine = engine();
        let mut record = engine.encrypt_text("lost", &options()).unwrap();
        record.security.salt_values = vec!["00".repeat(32)];
        record.security.decipher_keys = vec![DerivedKey::from_bytes(&[9u8; 32]).as_str().to_owned()];

        let (result, history) = engine.decrypt_text_staged(&DecryptOptions::default().with_record(record));
        assert!(matches!(result, Err(CipherError::Decryption(ref msg)) if msg.contains("complete failure")));
        assert_eq!(history.last(), Some(&DecryptStage::Failed));
    }

    #[test]
    fn test_tampered_ciphertext_never_returns_plaintext() {
        let engine = engine();
        let record = engine.encrypt_text("tamper evident", &options()).unwrap();
        let ids = Identifiers::default();
        let framed = record.encrypted_text().unwrap().to_owned();

        let body = ids.start().len()..framed.len() - ids.end().len();
        for pos in [body.start, body.start + 30, body.end - 5] {
            let mut bytes = framed.clone().into_bytes();
            bytes[pos] = if bytes[pos] == b'A' { b'B' } else { b'A' };

            let mut tampered = record.clone();
            if let Content::Text { encrypted_text, .. } = &mut tampered.content {
                *encrypted_text = String::from_utf8(bytes).unwrap();
            }

            let result = engine.decrypt_text(&DecryptOptions::default().with_record(tampered));
            assert!(matches!(result, Err(CipherError::Decryption(_) | CipherError::Integrity { .. })), "position {pos}");
        }
    }

    #[test]
    fn test_integrity_mismatch_is_fatal() {
        let engine = engine();
        let mut record = engine.encrypt_text("hello", &options()).unwrap();
        record.security.hash_value = hash_text("hellp");
        assert!(matches!(engine.decrypt_text(&DecryptOptions::default().with_record(record)), Err(CipherError::Integrity { .. })));
    }

    #[test]
    fn test_capacity_enforced_before_work() {
        let engine = engine();
        let too_many = options().with_iterations(100_000_000);
        assert!(matches!(engine.encrypt_text("x", &too_many), Err(CipherError::Capacity(_))));

        let long_key = EncryptOptions::default().with_key(KeyOptions::default().with_key_length(100_000_000));
        assert!(matches!(engine.encrypt_text("x", &long_key), Err(CipherError::Capacity(_))));
    }

    #[test]
    fn test_generated_passphrase_and_export() {
        let dir = tempdir().unwrap();
        let engine = engine();
        let options = EncryptOptions::default().with_iterations(ITERATIONS).with_export_passkey(true).with_export_path(dir.path());

        let record = engine.encrypt_text("exported", &options).unwrap();
        assert_eq!(record.security.passkey.len(), 32);

        let passkey_file = dir.path().join("ciphertext_passkey.json");
        let decrypted = engine.decrypt_text(&DecryptOptions::default().with_passkey_file(&passkey_file)).unwrap();
        assert_eq!(decrypted.text, "exported");
    }

    #[test]
    fn test_file_passkey_export() {
        let dir = tempdir().unwrap();
        let note = dir.path().join("report.csv");
        fs::write(&note, b"a,b\n1,2\n").unwrap();

        let engine = engine();
        engine.encrypt_file(&note, &options().with_backup_file(false).with_export_passkey(true)).unwrap();

        let passkey_file = dir.path().join("encrypted_report_passkey.json");
        let decrypted = engine.decrypt_file(&DecryptOptions::default().with_passkey_file(&passkey_file)).unwrap();
        assert_eq!(fs::read(decrypted.path).unwrap(), b"a,b\n1,2\n");
    }

    #[test]
    fn test_custom_identifiers() {
        let engine = engine();
        let ids = Identifiers::new("<<CE>>", "<</CE>>").unwrap();
        let record = engine.encrypt_text("custom", &options().with_identifiers(ids)).unwrap();
        assert_eq!(record.security.id1, "<<CE>>");
        assert!(record.encrypted_text().unwrap().ends_with("<</CE>>"));
        assert_eq!(engine.decrypt_text(&DecryptOptions::default().with_record(record)).unwrap().text, "custom");
    }

    #[test]
    fn test_advanced_encryption_round_trip() {
        let engine = engine();
        let record = engine.encrypt_text("wrapped", &options().with_advanced_encryption(true)).unwrap();

        match &record.security.layering {
            Layering::Asymmetric(wrap) => {
                assert_eq!(wrap.key_iterations, ITERATIONS);
                assert_eq!(wrap.key_bits_size, 256);
                assert_ne!(Some(wrap.symmetric_ciphertext.as_str()), record.encrypted_text());
            }
            Layering::Symmetric => panic!("expected an asymmetric layer"),
        }

        let decrypted = engine.decrypt_text(&DecryptOptions::default().with_record(record)).unwrap();
        assert_eq!(decrypted.text, "wrapped");
    }

    #[test]
    fn test_advanced_encryption_file() {
        let dir = tempdir().unwrap();
        let note = dir.path().join("note.txt");
        fs::write(&note, b"sealed file").unwrap();

        let engine = engine();
        let record = engine.encrypt_file(&note, &options().with_backup_file(false).with_advanced_encryption(true).with_key_iterations(500)).unwrap();
        let decrypted = engine.decrypt_file(&DecryptOptions::default().with_record(record)).unwrap();
        assert_eq!(fs::read(decrypted.path).unwrap(), b"sealed file");
    }

    #[test]
    fn test_passphrase_override() {
        let engine = engine();
        let record = engine.encrypt_text("override", &options()).unwrap();
        let options = DecryptOptions::default().with_record(record).with_passphrase("a".repeat(40));
        assert_eq!(engine.decrypt_text(&options).unwrap().text, "override");
    }

    #[test]
    fn test_invalid_inputs() {
        let engine = engine();
        assert!(matches!(engine.encrypt_text("", &options()), Err(CipherError::Validation(_))));
        assert!(matches!(engine.encrypt_text("x", &options().with_num_of_salts(0)), Err(CipherError::Validation(_))));
        assert!(matches!(engine.encrypt_text("x", &EncryptOptions::default().with_passphrase("short")), Err(CipherError::Validation(_))));

        let dir = tempdir().unwrap();
        assert!(matches!(engine.encrypt_file(&dir.path().join("missing.txt"), &options()), Err(CipherError::Validation(_))));

        let record = engine.encrypt_text("text", &options()).unwrap();
        assert!(matches!(engine.decrypt_file(&DecryptOptions::default().with_record(record)), Err(CipherError::Validation(_))));
    }

    #[test]
    fn test_budget_used_when_iterations_unset() {
        let engine = engine();
        let record = engine.encrypt_text("budget", &EncryptOptions::default().with_passphrase("b".repeat(32))).unwrap();
        assert_eq!(record.security.iterations, ITERATIONS);
    }
}
