//! File validation, naming and backups.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use tracing::info;

use crate::config::{BACKUP_DIR, BACKUP_TIMESTAMP_FORMAT, DECRYPTED_PREFIX, ENCRYPTED_EXTENSION, ENCRYPTED_PREFIX, FILE_PASSKEY_SUFFIX, PASSKEY_EXTENSION, TEXT_PASSKEY_NAME};
use crate::error::{CipherError, Result};

/// Checks that `path` names an existing regular file.
///
/// # Errors
///
/// Validation error for an empty path, a missing file or a directory.
pub fn validate_file(path: &Path) -> Result<()> {
    if path.as_os_str().is_empty() {
        return Err(CipherError::Validation("a file path is required".to_owned()));
    }

    match fs::metadata(path) {
        Ok(meta) if meta.is_dir() => Err(CipherError::Validation(format!("path is a directory: {}", path.display()))),
        Ok(_) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(CipherError::Validation(format!("file not found: {}", path.display()))),
        Err(e) => Err(e.into()),
    }
}

/// File stem cut at its first dot, so `archive.tar.gz` yields `archive`.
fn base_name(path: &Path) -> Result<String> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| CipherError::Validation(format!("file name is not valid UTF-8: {}", path.display())))?;

    Ok(name.split('.').next().unwrap_or(name).to_owned())
}

fn sibling(path: &Path, name: &str) -> PathBuf {
    path.parent().map_or_else(|| PathBuf::from(name), |parent| parent.join(name))
}

/// Copies `path` to `<parent>/backup/<timestamp>-backup_<name>`.
///
/// # Errors
///
/// I/O errors while creating the directory or copying propagate.
pub fn create_backup(path: &Path) -> Result<PathBuf> {
    let name = path.file_name().and_then(|n| n.to_str()).ok_or_else(|| CipherError::Validation(format!("invalid file name: {}", path.display())))?;
    let dir = sibling(path, BACKUP_DIR);
    fs::create_dir_all(&dir)?;

    let timestamp = Local::now().format(BACKUP_TIMESTAMP_FORMAT);
    let backup = dir.join(format!("{timestamp}-backup_{name}"));
    fs::copy(path, &backup)?;

    info!(backup = %backup.display(), "backup created");
    Ok(backup)
}

/// Where an encrypted file is written.
///
/// `note.txt` becomes `encrypted_note.aes`, or `note.aes` when overwriting.
pub fn encrypted_path(original: &Path, overwrite: bool) -> Result<PathBuf> {
    let base = base_name(original)?;
    let name = if overwrite { format!("{base}.{ENCRYPTED_EXTENSION}") } else { format!("{ENCRYPTED_PREFIX}_{base}.{ENCRYPTED_EXTENSION}") };
    Ok(sibling(original, &name))
}

/// Where a decrypted file is written when not overwriting.
///
/// `encrypted_note.aes` restoring `note.txt` becomes `decrypted_note.txt`.
pub fn decrypted_path(encrypted: &Path, original: &Path) -> Result<PathBuf> {
    let base = base_name(encrypted)?;
    let base = base.strip_prefix(&format!("{ENCRYPTED_PREFIX}_")).unwrap_or(&base);

    let mut name = format!("{DECRYPTED_PREFIX}_{base}");
    if let Some(ext) = original.extension().and_then(|e| e.to_str()) {
        name.push('.');
        name.push_str(ext);
    }
    Ok(sibling(encrypted, &name))
}

/// Where a passkey record is exported.
///
/// `source` is the encrypted file, or `None` for text.
pub fn passkey_path(source: Option<&Path>, export_dir: Option<&Path>, file_name: Option<&str>) -> Result<PathBuf> {
    let name = match (file_name, source) {
        (Some(name), _) => name.to_owned(),
        (None, Some(file)) => format!("{}{FILE_PASSKEY_SUFFIX}", base_name(file)?),
        (None, None) => TEXT_PASSKEY_NAME.to_owned(),
    };

    let dir = match (export_dir, source) {
        (Some(dir), _) => dir.to_path_buf(),
        (None, Some(file)) => file.parent().map(Path::to_path_buf).unwrap_or_default(),
        (None, None) => PathBuf::new(),
    };

    Ok(dir.join(format!("{name}.{PASSKEY_EXTENSION}")))
}
