//! Error types for patching and backups
//!
//! Rejections of a candidate (syntax failure) are not errors: they are
//! reported through [`PatchResult`](crate::PatchResult). The errors here are
//! contract violations and I/O failures.

use std::path::PathBuf;

use evo_artifact::SyntaxError;

/// Errors while patching a file
#[derive(Debug, thiserror::Error)]
pub enum PatchError {
    /// Target is not an allow-listed mutable file
    #[error("contract violation: {} is not an allow-listed mutable file", path.display())]
    OutsideScope { path: PathBuf },

    /// Allow-list entry is absolute or escapes the project root
    #[error("invalid allow-list entry {}: {reason}", entry.display())]
    InvalidScopeEntry { entry: PathBuf, reason: String },

    /// IO error reading or writing the target
    #[error("io error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Parser could not be initialized
    #[error("syntax backend error: {0}")]
    Syntax(#[from] SyntaxError),
}

impl PatchError {
    /// Create scope violation for path
    pub fn outside_scope(path: impl Into<PathBuf>) -> Self {
        Self::OutsideScope { path: path.into() }
    }

    /// Create IO error for path
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether this is a contract violation rather than a runtime failure
    #[inline]
    #[must_use]
    pub fn is_contract_violation(&self) -> bool {
        matches!(self, Self::OutsideScope { .. } | Self::InvalidScopeEntry { .. })
    }
}

/// Errors while snapshotting or restoring a file
#[derive(Debug, thiserror::Error)]
pub enum BackupError {
    /// Target is not an allow-listed mutable file
    #[error(transparent)]
    Scope(#[from] PatchError),

    /// IO error on the target or its backup
    #[error("io error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Restored bytes do not match the snapshot
    #[error("checksum mismatch restoring {}: expected {expected}, got {actual}", path.display())]
    ChecksumMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },
}

impl BackupError {
    /// Create IO error for path
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
