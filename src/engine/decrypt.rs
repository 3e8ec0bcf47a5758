//! Tiered decryption.
//!
//! The first attempt re-derives every key from the stored salts, the stored
//! iteration count and the passphrase. When it yields nothing the stored
//! `decipher_keys` are tried directly, which recovers records whose salts
//! were altered while the original keys are still on file. Both attempts
//! failing is fatal. A successful attempt is always followed by a hash
//! check, and a mismatch there is fatal too.

use std::fs;

use tracing::{info, warn};

use super::Engine;
use crate::cipher::hash::{Hash, hash_file, verify};
use crate::cipher::{MultiKeyCipher, Salt, wrap};
use crate::error::{CipherError, DecryptFailure, Result};
use crate::file::{decrypted_path, validate_file};
use crate::options::DecryptOptions;
use crate::record::{CipherRecord, Content, Layering, SecurityParams};
use crate::secret::Secret;
use crate::types::{DecryptStage, DecryptedFile, DecryptedText, Stages};

impl Engine {
    /// Decrypts a text record.
    ///
    /// # Errors
    ///
    /// - Configuration error unless exactly one of `record` and
    ///   `passkey_file` is set.
    /// - [`CipherError::MissingIdentifiers`] for unframed ciphertext.
    /// - [`CipherError::Decryption`] when both attempts fail.
    /// - [`CipherError::Integrity`] when the recovered text does not hash to
    ///   the stored value.
    pub fn decrypt_text(&self, options: &DecryptOptions) -> Result<DecryptedText> {
        self.decrypt_text_staged(options).0
    }

    /// Decrypts a file record.
    ///
    /// Writes `decrypted_<name>` next to the encrypted file, or restores the
    /// original path with `overwrite_file` and then removes the encrypted
    /// file. Nothing is written unless the recovered bytes match the stored
    /// hash; the hash is then checked again on the file actually written.
    ///
    /// # Errors
    ///
    /// As [`Self::decrypt_text`], plus propagated I/O errors.
    pub fn decrypt_file(&self, options: &DecryptOptions) -> Result<DecryptedFile> {
        let mut stages = Stages::new("decrypt_file", DecryptStage::Init);
        let result = self.decrypt_file_inner(options, &mut stages);
        stages.finish(&result, DecryptStage::Done, DecryptStage::Failed);
        result
    }

    pub(crate) fn decrypt_text_staged(&self, options: &DecryptOptions) -> (Result<DecryptedText>, Vec<DecryptStage>) {
        let mut stages = Stages::new("decrypt_text", DecryptStage::Init);
        let result = self.decrypt_text_inner(options, &mut stages);
        stages.finish(&result, DecryptStage::Done, DecryptStage::Failed);
        (result, stages.history().to_vec())
    }

    fn decrypt_text_inner(&self, options: &DecryptOptions, stages: &mut Stages<DecryptStage>) -> Result<DecryptedText> {
        let record = select_input(options)?;
        let passphrase = decrypt_passphrase(options, &record.security)?;
        let encrypted = record.encrypted_text().ok_or_else(|| CipherError::Validation("the record describes a file; use file decryption".to_owned()))?;
        stages.advance(DecryptStage::InputSelected);

        let plaintext = self.open(encrypted.as_bytes(), &record.security, &passphrase, stages)?;

        let recomputed = Hash::from_bytes(&plaintext).to_hex();
        verify(&record.security.hash_value, &recomputed)?;
        stages.advance(DecryptStage::HashVerified);

        let text = String::from_utf8(plaintext).map_err(|e| CipherError::Validation(format!("decrypted text is not valid UTF-8: {e}")))?;
        Ok(DecryptedText { text, hash_value: recomputed })
    }

    fn decrypt_file_inner(&self, options: &DecryptOptions, stages: &mut Stages<DecryptStage>) -> Result<DecryptedFile> {
        let record = select_input(options)?;
        let passphrase = decrypt_passphrase(options, &record.security)?;
        let Content::File { original_file, encrypted_file } = &record.content else {
            return Err(CipherError::Validation("the record describes text; use text decryption".to_owned()));
        };
        validate_file(encrypted_file)?;
        stages.advance(DecryptStage::InputSelected);

        let data = fs::read(encrypted_file)?;
        let plaintext = self.open(&data, &record.security, &passphrase, stages)?;

        verify(&record.security.hash_value, &Hash::from_bytes(&plaintext).to_hex())?;

        let output = if options.overwrite_file { original_file.clone() } else { decrypted_path(encrypted_file, original_file)? };
        fs::write(&output, &plaintext)?;

        let recomputed = hash_file(&output)?;
        verify(&record.security.hash_value, &recomputed)?;
        stages.advance(DecryptStage::HashVerified);

        if options.overwrite_file && output != *encrypted_file {
            info!(file = %encrypted_file.display(), "removing encrypted file");
            fs::remove_file(encrypted_file)?;
        }

        info!(file = %output.display(), "file decrypted");
        Ok(DecryptedFile { path: output, hash_value: recomputed })
    }

    /// Unframes, unwraps and runs both attempts.
    fn open(&self, framed: &[u8], security: &SecurityParams, passphrase: &Secret, stages: &mut Stages<DecryptStage>) -> Result<Vec<u8>> {
        let identifiers = security.identifiers()?;
        let payload = identifiers.unframe(framed)?;
        stages.advance(DecryptStage::Unframed);

        let token = match &security.layering {
            Layering::Symmetric => payload.to_vec(),
            Layering::Asymmetric(metadata) => {
                let payload = std::str::from_utf8(payload).map_err(|_| CipherError::Validation("wrapped ciphertext is not valid UTF-8".to_owned()))?;
                wrap::unseal(payload, &metadata.private_key, &metadata.key_passphrase, metadata.key_iterations)?
            }
        };

        let derived = self.rederive(security, passphrase);
        stages.advance(DecryptStage::KeysReady);

        stages.advance(DecryptStage::DecryptAttempt1);
        let first = derived.and_then(|cipher| cipher.decrypt(&token));

        match first {
            Ok(plaintext) => Ok(plaintext),
            Err(first) => {
                warn!(
                    reason = %first,
                    "decryption with the re-derived keys failed; attempting the stored decipher keys"
                );
                stages.advance(DecryptStage::DecryptAttempt2);

                MultiKeyCipher::from_encoded(&security.decipher_keys).and_then(|cipher| cipher.decrypt(&token)).map_err(|second| {
                    CipherError::Decryption(format!(
                        "the decryption process has encountered a complete failure with the specified salts ({first}) and decipher keys ({second}); \
                         verify that the record has not been modified"
                    ))
                })
            }
        }
    }

    /// Rebuilds the key set from the record's salts.
    ///
    /// Any defect here is a failed first attempt, not an error.
    fn rederive(&self, security: &SecurityParams, passphrase: &Secret) -> std::result::Result<MultiKeyCipher, DecryptFailure> {
        let salts = security.salt_values.iter().map(|s| Salt::from_hex(s)).collect::<Result<Vec<_>>>().map_err(|_| DecryptFailure::UnusableKeys)?;
        let keys = self.derive_keys(passphrase, &salts, security.iterations).map_err(|_| DecryptFailure::UnusableKeys)?;
        MultiKeyCipher::new(&keys).map_err(|_| DecryptFailure::UnusableKeys)
    }
}

/// Exactly one input mode.
fn select_input(options: &DecryptOptions) -> Result<CipherRecord> {
    match (&options.record, &options.passkey_file) {
        (Some(_), Some(_)) => Err(CipherError::Configuration("cannot specify both 'record' and 'passkey_file'; provide exactly one".to_owned())),
        (None, None) => Err(CipherError::Configuration("one of 'record' or 'passkey_file' is required; provide exactly one".to_owned())),
        (Some(record), None) => {
            record.validate()?;
            Ok(record.clone())
        }
        (None, Some(path)) => {
            validate_file(path)?;
            CipherRecord::load(path)
        }
    }
}

fn decrypt_passphrase(options: &DecryptOptions, security: &SecurityParams) -> Result<Secret> {
    match &options.passphrase {
        Some(passphrase) if !passphrase.is_empty() => Ok(passphrase.clone()),
        _ if !security.passkey.is_empty() => Ok(Secret::new(&security.passkey)),
        _ => Err(CipherError::Validation("no passphrase given and the record holds no passkey".to_owned())),
    }
}
