//! Evolve Patch Layer
//!
//! The only component that writes to mutable source files.
//!
//! # Core Operations
//!
//! - **Scope**: [`MutableFiles`] decides which files may be touched at all
//! - **Patch**: [`Patcher`] applies a classified fragment, validating the
//!   whole candidate file before an atomic write
//! - **Backup**: [`BackupManager`] snapshots a file before an attempt and
//!   restores it on rollback
//!
//! ```text
//! ClassifiedFragment → Patcher ─┬→ candidate → validate → temp file → rename
//!                               └→ rejected (file untouched)
//!                  BackupManager: snapshot ↔ restore / discard
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use evo_patch::{BackupManager, MutableFiles, Patcher};
//!
//! let scope = Arc::new(MutableFiles::new("/project", ["src/agent.py"])?);
//! let patcher = Patcher::new(Arc::clone(&scope));
//! let mut backups = BackupManager::new(scope);
//!
//! backups.snapshot("src/agent.py")?;
//! let result = patcher.apply("src/agent.py", &fragment)?;
//! if !result.applied {
//!     backups.restore("src/agent.py")?;
//! }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod backup;
pub mod error;
pub mod patcher;
pub mod scope;
mod span;

pub use backup::{Backup, BackupManager, DEFAULT_BACKUP_SUFFIX};
pub use error::{BackupError, PatchError};
pub use patcher::{Candidate, PatchMethod, PatchResult, Patcher, KNOWN_DECORATOR_IMPORTS};
pub use scope::MutableFiles;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
