//! Error types for Evolve Core
//!
//! Per-attempt failures (no code, unsafe fragment, rejected patch, I/O) are
//! not errors here: they end the attempt as `Skipped` and the batch goes on.
//! What remains stops a batch:
//! - allow-list contract violations
//! - failed recovery after a write
//! - configuration and ledger problems

use std::path::PathBuf;

use evo_patch::{BackupError, PatchError};

use crate::state::AttemptPhase;

/// Main Evolve error type
#[derive(Debug, thiserror::Error)]
pub enum EvolutionError {
    /// Invalid configuration
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Target outside the allow-list, or a malformed allow-list
    #[error(transparent)]
    ContractViolation(PatchError),

    /// Patch failure that is not a contract violation
    #[error("patch failed: {0}")]
    Patch(PatchError),

    /// Restore failed after a write; the file may hold unvalidated bytes
    #[error("recovery failed for {}: {source}", path.display())]
    RecoveryFailure {
        path: PathBuf,
        #[source]
        source: BackupError,
    },

    /// Attempt state machine misuse
    #[error("illegal attempt transition {from:?} -> {to:?}")]
    IllegalTransition { from: AttemptPhase, to: AttemptPhase },

    /// Ledger hash chain broken
    #[error("ledger integrity violation at record {index}")]
    LedgerIntegrity { index: usize },
}

impl EvolutionError {
    /// Create recovery failure for path
    pub fn recovery_failure(path: impl Into<PathBuf>, source: BackupError) -> Self {
        Self::RecoveryFailure {
            path: path.into(),
            source,
        }
    }

    /// Whether the batch must stop
    ///
    /// Every variant is fatal except configuration errors, which are raised
    /// before a batch starts.
    #[inline]
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Config(_))
    }

    /// Whether files may have been left in a modified state
    #[inline]
    #[must_use]
    pub fn requires_human(&self) -> bool {
        matches!(self, Self::RecoveryFailure { .. })
    }
}

impl From<PatchError> for EvolutionError {
    fn from(e: PatchError) -> Self {
        if e.is_contract_violation() {
            Self::ContractViolation(e)
        } else {
            Self::Patch(e)
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("cannot read config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid TOML for [`EvolutionConfig`](crate::EvolutionConfig)
    #[error("invalid config syntax: {0}")]
    Parse(#[from] toml::de::Error),

    /// Config parsed but a value is out of range
    #[error("invalid config value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl ConfigError {
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}
