use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use super::Engine;
use crate::cipher::hash::{Hash, hash_file};
use crate::cipher::{MultiKeyCipher, wrap};
use crate::config::{DEFAULT_KEY_ITERATIONS, WRAP_KEY_BITS};
use crate::error::{CipherError, Result};
use crate::file::{create_backup, encrypted_path, passkey_path, validate_file};
use crate::framing::check_headers;
use crate::keygen::generate_salts;
use crate::options::{EncryptOptions, KeyOptions};
use crate::record::{CipherRecord, Content, Layering, SecurityParams, WrapMetadata};
use crate::types::{EncryptStage, Stages};

/// Output of the shared key/cipher/framing steps.
struct Sealed {
    framed: String,
    security: SecurityParams,
}

impl Engine {
    /// Encrypts `text` and returns the record needed to decrypt it.
    ///
    /// # Errors
    ///
    /// - Configuration errors for conflicting options.
    /// - Validation errors for empty text or an invalid passphrase.
    /// - [`CipherError::AlreadyEncrypted`] if `text` carries either identifier.
    /// - Capacity errors for iteration counts or key lengths at the ceiling.
    pub fn encrypt_text(&self, text: &str, options: &EncryptOptions) -> Result<CipherRecord> {
        let mut stages = Stages::new("encrypt_text", EncryptStage::Init);
        let result = self.encrypt_text_inner(text, options, &mut stages);
        stages.finish(&result, EncryptStage::Done, EncryptStage::Failed);
        result
    }

    /// Encrypts the file at `path`.
    ///
    /// The ciphertext goes to `encrypted_<name>.aes` next to the original,
    /// or to `<name>.aes` with `overwrite_file`, in which case the original
    /// is removed once the ciphertext is on disk.
    ///
    /// # Errors
    ///
    /// As [`Self::encrypt_text`], plus validation errors for missing or
    /// empty files and propagated I/O errors.
    pub fn encrypt_file(&self, path: &Path, options: &EncryptOptions) -> Result<CipherRecord> {
        let mut stages = Stages::new("encrypt_file", EncryptStage::Init);
        let result = self.encrypt_file_inner(path, options, &mut stages);
        stages.finish(&result, EncryptStage::Done, EncryptStage::Failed);
        result
    }

    fn encrypt_text_inner(&self, text: &str, options: &EncryptOptions, stages: &mut Stages<EncryptStage>) -> Result<CipherRecord> {
        check_options(options)?;
        if text.is_empty() {
            return Err(CipherError::Validation("the text to encrypt must not be empty".to_owned()));
        }
        check_headers(text.as_bytes(), &options.identifiers, false, "the provided text already carries the encryption identifiers")?;
        stages.advance(EncryptStage::Validated);

        let hash_value = Hash::from_bytes(text.as_bytes()).to_hex();
        let sealed = self.seal(text.as_bytes(), hash_value, options, stages)?;

        let record = CipherRecord { content: Content::Text { original_text: text.to_owned(), encrypted_text: sealed.framed }, security: sealed.security };
        persist(&record, None, options)?;
        stages.advance(EncryptStage::Persisted);

        Ok(record)
    }

    fn encrypt_file_inner(&self, path: &Path, options: &EncryptOptions, stages: &mut Stages<EncryptStage>) -> Result<CipherRecord> {
        check_options(options)?;
        validate_file(path)?;
        let plaintext = fs::read(path)?;
        if plaintext.is_empty() {
            return Err(CipherError::Validation(format!("file is empty: {}", path.display())));
        }
        check_headers(&plaintext, &options.identifiers, false, &format!("{} is already encrypted", path.display()))?;
        stages.advance(EncryptStage::Validated);

        if !options.backup_file {
            warn!(
                file = %path.display(),
                "disabling 'backup_file' risks data loss; back up your data before encrypting"
            );
        }

        let hash_value = hash_file(path)?;
        let sealed = self.seal(&plaintext, hash_value, options, stages)?;

        if options.backup_file {
            create_backup(path)?;
        }

        let output = encrypted_path(path, options.overwrite_file)?;
        fs::write(&output, sealed.framed.as_bytes())?;
        if options.overwrite_file && output != path {
            info!(file = %path.display(), "overwriting original");
            fs::remove_file(path)?;
        }

        let record = CipherRecord { content: Content::File { original_file: path.to_path_buf(), encrypted_file: output.clone() }, security: sealed.security };
        persist(&record, Some(&output), options)?;
        stages.advance(EncryptStage::Persisted);

        info!(file = %output.display(), "file encrypted");
        Ok(record)
    }

    /// Salts, keys, encryption, optional wrap and framing.
    fn seal(&self, plaintext: &[u8], hash_value: String, options: &EncryptOptions, stages: &mut Stages<EncryptStage>) -> Result<Sealed> {
        let iterations = self.iterations(options.iterations)?;
        let passphrase = Self::resolve_passphrase(options.passphrase.as_ref(), &options.key)?;

        let salts = generate_salts(options.num_of_salts, options.salt_bytes_size)?;
        let keys = self.derive_keys(&passphrase, &salts, iterations)?;
        stages.advance(EncryptStage::KeysDerived);

        let token = MultiKeyCipher::new(&keys)?.encrypt(plaintext)?;
        stages.advance(EncryptStage::Encrypted);

        let ids = &options.identifiers;
        let (framed, layering) = if options.advanced_encryption {
            let key_passphrase = Self::resolve_passphrase(options.key_passphrase.as_ref(), &KeyOptions::default())?;
            let key_iterations = options.key_iterations.unwrap_or_else(|| iterations.min(DEFAULT_KEY_ITERATIONS));

            let wrapped = wrap::seal(token.as_bytes(), key_passphrase.expose_secret(), key_iterations)?;
            let metadata = WrapMetadata {
                private_key: wrapped.private_key,
                public_key: wrapped.public_key,
                key_bits_size: WRAP_KEY_BITS,
                key_iterations,
                key_passphrase: key_passphrase.expose_secret().to_owned(),
                symmetric_ciphertext: ids.frame(&token),
            };
            (ids.frame(&wrapped.ciphertext), Layering::Asymmetric(metadata))
        } else {
            (ids.frame(&token), Layering::Symmetric)
        };
        stages.advance(EncryptStage::Framed);

        let salt_bytes_size = salts.first().map_or(0, |s| s.len());
        let security = SecurityParams {
            decipher_keys: keys.iter().map(|k| k.as_str().to_owned()).collect(),
            hash_value,
            id1: ids.start().to_owned(),
            id2: ids.end().to_owned(),
            iterations,
            passkey: passphrase.expose_secret().to_owned(),
            salt_values: salts.iter().map(|s| s.to_hex()).collect(),
            salt_bytes_size,
            layering,
        };

        Ok(Sealed { framed, security })
    }
}

/// Conflicts that must fail before any key material exists.
fn check_options(options: &EncryptOptions) -> Result<()> {
    if options.key.exclude_chars.is_some() && options.key.include_all_chars {
        return Err(CipherError::Configuration("cannot specify both 'exclude_chars' and 'include_all_chars'".to_owned()));
    }
    if options.num_of_salts == 0 {
        return Err(CipherError::Validation("'num_of_salts' must be at least 1".to_owned()));
    }
    if options.passkey_file_name.as_deref().is_some_and(str::is_empty) {
        return Err(CipherError::Validation("the passkey file name must not be empty".to_owned()));
    }
    Ok(())
}

fn persist(record: &CipherRecord, source: Option<&Path>, options: &EncryptOptions) -> Result<Option<PathBuf>> {
    if !options.export_passkey {
        return Ok(None);
    }
    let path = passkey_path(source, options.export_path.as_deref(), options.passkey_file_name.as_deref())?;
    record.export(&path).map(Some)
}
