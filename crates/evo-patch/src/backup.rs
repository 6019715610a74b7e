//! Backup manager
//!
//! One backup per allow-listed file, taken before a mutation attempt. The
//! snapshot lives in memory and in a sibling file (`<file>.evo-backup`), so a
//! crashed run can still be recovered from disk. A new snapshot of the same
//! file replaces the previous one.

use std::collections::HashMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use evo_artifact::ContentHash;

use crate::error::BackupError;
use crate::patcher::write_atomic;
use crate::scope::MutableFiles;

/// Default suffix of the sibling backup file
pub const DEFAULT_BACKUP_SUFFIX: &str = ".evo-backup";

/// Snapshot of one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backup {
    /// Resolved path of the backed-up file
    pub file_path: PathBuf,
    /// Sibling file holding the same bytes
    pub backup_path: PathBuf,
    pub snapshot: Vec<u8>,
    pub checksum: ContentHash,
    pub created_at: DateTime<Utc>,
}

/// Scoped snapshot/restore around mutation attempts
#[derive(Debug)]
pub struct BackupManager {
    scope: Arc<MutableFiles>,
    suffix: String,
    backups: HashMap<PathBuf, Backup>,
}

impl BackupManager {
    #[must_use]
    pub fn new(scope: Arc<MutableFiles>) -> Self {
        Self {
            scope,
            suffix: DEFAULT_BACKUP_SUFFIX.to_string(),
            backups: HashMap::new(),
        }
    }

    /// Override the sibling file suffix
    #[must_use]
    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = suffix.into();
        self
    }

    /// Sibling backup path for a resolved file path
    #[must_use]
    pub fn backup_path(&self, file: &Path) -> PathBuf {
        let mut name = file.file_name().map(OsString::from).unwrap_or_default();
        name.push(&self.suffix);
        file.with_file_name(name)
    }

    /// In-memory backup of `file`, if any
    #[must_use]
    pub fn get(&self, file: impl AsRef<Path>) -> Option<&Backup> {
        let path = self.scope.resolve(file).ok()?;
        self.backups.get(&path)
    }

    /// Snapshot current bytes of `file`
    ///
    /// # Errors
    /// Scope violation, or I/O failure reading the file or writing the
    /// sibling backup.
    pub fn snapshot(&mut self, file: impl AsRef<Path>) -> Result<&Backup, BackupError> {
        let path = self.scope.resolve(file)?;
        let snapshot = std::fs::read(&path).map_err(|e| BackupError::io_error(&path, e))?;
        let backup_path = self.backup_path(&path);
        write_atomic(&backup_path, &snapshot).map_err(|e| BackupError::io_error(&backup_path, e))?;

        let backup = Backup {
            checksum: ContentHash::compute(&snapshot),
            file_path: path.clone(),
            backup_path,
            snapshot,
            created_at: Utc::now(),
        };
        tracing::debug!(
            file = %path.display(),
            checksum = %backup.checksum.short(),
            bytes = backup.snapshot.len(),
            "snapshot taken"
        );

        self.backups.insert(path.clone(), backup);
        Ok(&self.backups[&path])
    }

    /// Copy the snapshot back over `file`
    ///
    /// Uses the in-memory snapshot, falling back to the sibling backup file.
    /// Idempotent. Returns `false` when no backup exists.
    ///
    /// # Errors
    /// Scope violation, I/O failure, or [`BackupError::ChecksumMismatch`] when
    /// the file does not hold the snapshot bytes afterwards.
    pub fn restore(&self, file: impl AsRef<Path>) -> Result<bool, BackupError> {
        let path = self.scope.resolve(file)?;

        let (bytes, expected) = if let Some(backup) = self.backups.get(&path) {
            (backup.snapshot.clone(), backup.checksum)
        } else {
            let backup_path = self.backup_path(&path);
            match std::fs::read(&backup_path) {
                Ok(bytes) => {
                    let checksum = ContentHash::compute(&bytes);
                    (bytes, checksum)
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    tracing::debug!(file = %path.display(), "no backup to restore");
                    return Ok(false);
                }
                Err(e) => return Err(BackupError::io_error(&backup_path, e)),
            }
        };

        let current_matches = std::fs::read(&path).is_ok_and(|current| expected.matches(&current));
        if !current_matches {
            write_atomic(&path, &bytes).map_err(|e| BackupError::io_error(&path, e))?;
        }

        let restored = std::fs::read(&path).map_err(|e| BackupError::io_error(&path, e))?;
        if !expected.matches(&restored) {
            return Err(BackupError::ChecksumMismatch {
                path,
                expected: expected.to_string(),
                actual: ContentHash::compute(&restored).to_string(),
            });
        }

        tracing::info!(file = %path.display(), checksum = %expected.short(), "file restored");
        Ok(true)
    }

    /// Drop the backup of `file`, in memory and on disk
    ///
    /// Returns whether a backup existed.
    ///
    /// # Errors
    /// Scope violation, or I/O failure removing the sibling file.
    pub fn discard(&mut self, file: impl AsRef<Path>) -> Result<bool, BackupError> {
        let path = self.scope.resolve(file)?;
        let in_memory = self.backups.remove(&path).is_some();

        let backup_path = self.backup_path(&path);
        let on_disk = match std::fs::remove_file(&backup_path) {
            Ok(()) => true,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
            Err(e) => return Err(BackupError::io_error(&backup_path, e)),
        };

        tracing::debug!(file = %path.display(), "backup discarded");
        Ok(in_memory || on_disk)
    }
}
