//! Mutable file allow-list
//!
//! [`MutableFiles`] is the single configuration object deciding which files
//! may be mutated. Entries are relative to the project root. Requests are
//! normalized lexically; anything that climbs out of the root or is not an
//! exact entry is a contract violation.

use std::collections::BTreeSet;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::PatchError;

/// Allow-list of files the engine may mutate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutableFiles {
    root: PathBuf,
    entries: BTreeSet<PathBuf>,
}

impl MutableFiles {
    /// Create allow-list under `root`
    ///
    /// # Errors
    /// [`PatchError::InvalidScopeEntry`] for absolute entries or entries
    /// containing `..`.
    pub fn new<I, P>(root: impl Into<PathBuf>, entries: I) -> Result<Self, PatchError>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        let root = root.into();
        let mut normalized = BTreeSet::new();

        for entry in entries {
            let entry = entry.as_ref();
            if entry.is_absolute() {
                return Err(PatchError::InvalidScopeEntry {
                    entry: entry.to_path_buf(),
                    reason: "entries must be relative to the project root".into(),
                });
            }
            let relative = normalize(entry).ok_or_else(|| PatchError::InvalidScopeEntry {
                entry: entry.to_path_buf(),
                reason: "entries must not leave the project root".into(),
            })?;
            if relative.as_os_str().is_empty() {
                return Err(PatchError::InvalidScopeEntry {
                    entry: entry.to_path_buf(),
                    reason: "entry names no file".into(),
                });
            }
            normalized.insert(relative);
        }

        Ok(Self {
            root,
            entries: normalized,
        })
    }

    /// Project root
    #[inline]
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Normalized relative entries, sorted
    pub fn entries(&self) -> impl Iterator<Item = &Path> {
        self.entries.iter().map(PathBuf::as_path)
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolve a request to the on-disk path of an allow-listed file
    ///
    /// Accepts paths relative to the root or absolute paths under it.
    ///
    /// # Errors
    /// [`PatchError::OutsideScope`] when the request is not an entry.
    pub fn resolve(&self, target: impl AsRef<Path>) -> Result<PathBuf, PatchError> {
        let target = target.as_ref();
        let relative = self
            .relative(target)
            .ok_or_else(|| PatchError::outside_scope(target))?;

        if self.entries.contains(&relative) {
            Ok(self.root.join(relative))
        } else {
            Err(PatchError::outside_scope(target))
        }
    }

    /// Whether `target` is allow-listed
    #[must_use]
    pub fn contains(&self, target: impl AsRef<Path>) -> bool {
        self.resolve(target).is_ok()
    }

    fn relative(&self, target: &Path) -> Option<PathBuf> {
        if target.is_absolute() {
            let root = normalize_absolute(&self.root)?;
            let target = normalize_absolute(target)?;
            target.strip_prefix(&root).ok().map(Path::to_path_buf)
        } else {
            normalize(target)
        }
    }
}

/// Lexically normalize a relative path; `None` if it escapes upward
fn normalize(path: &Path) -> Option<PathBuf> {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::Normal(part) => out.push(part),
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    Some(out)
}

fn normalize_absolute(path: &Path) -> Option<PathBuf> {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => return None,
            other => out.push(other.as_os_str()),
        }
    }
    Some(out)
}
