//! Proposal batch files
//!
//! A batch is a list of `{target, proposal}` entries, either bare or under a
//! `proposals` key. `.json` files are read as JSON, anything else as YAML:
//!
//! ```yaml
//! proposals:
//!   - target: agent.py
//!     proposal: |
//!       MODIFICATION: add a greeting helper
//!       CODE:
//!       def greet(name): return f"hello {name}"
//! ```

use std::path::Path;

use anyhow::{bail, Context, Result};
use evo_core::MutationRequest;
use serde::Deserialize;

#[derive(Deserialize)]
#[serde(untagged)]
enum BatchFile {
    List(Vec<MutationRequest>),
    Wrapped { proposals: Vec<MutationRequest> },
}

impl BatchFile {
    fn into_requests(self) -> Vec<MutationRequest> {
        match self {
            Self::List(requests) | Self::Wrapped { proposals: requests } => requests,
        }
    }
}

/// File format of a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchFormat {
    Json,
    Yaml,
}

impl BatchFormat {
    /// `.json` is JSON, everything else YAML
    #[must_use]
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Self::Json,
            _ => Self::Yaml,
        }
    }
}

/// Parse batch text
///
/// # Errors
/// Malformed input, or a batch with no entries.
pub fn parse_requests(text: &str, format: BatchFormat) -> Result<Vec<MutationRequest>> {
    let file: BatchFile = match format {
        BatchFormat::Json => serde_json::from_str(text).context("invalid JSON proposal batch")?,
        BatchFormat::Yaml => serde_yaml::from_str(text).context("invalid YAML proposal batch")?,
    };
    let requests = file.into_requests();
    if requests.is_empty() {
        bail!("proposal batch is empty");
    }
    Ok(requests)
}

/// Read and parse a batch file
///
/// # Errors
/// Unreadable file, or as [`parse_requests`].
pub fn load_requests(path: &Path) -> Result<Vec<MutationRequest>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read proposals from {}", path.display()))?;
    let requests = parse_requests(&text, BatchFormat::from_path(path))
        .with_context(|| format!("in {}", path.display()))?;
    tracing::debug!(file = %path.display(), count = requests.len(), "proposals loaded");
    Ok(requests)
}
