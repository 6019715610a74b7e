//! Engine configuration
//!
//! Loaded from TOML. Every field has a default, so a file only needs the
//! allow-list:
//!
//! ```toml
//! project_root = "."
//! mutable_files = ["agent.py"]
//!
//! [retry]
//! max_retries = 5
//!
//! [oracle]
//! model = "gpt-4o-mini"
//! ```

use std::path::{Path, PathBuf};

use evo_benchmark::{HttpOracleConfig, RetryPolicy};
use evo_patch::{MutableFiles, DEFAULT_BACKUP_SUFFIX};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Items asked per measurement when unset: the whole standard bank
pub const DEFAULT_SAMPLE_SIZE: usize = 40;

/// Evolution engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvolutionConfig {
    /// Directory allow-list entries are relative to
    pub project_root: PathBuf,
    /// Files the engine may mutate
    pub mutable_files: Vec<PathBuf>,
    /// Items asked for the baseline measurement
    pub baseline_sample_size: usize,
    /// Items asked after each patch
    pub attempt_sample_size: usize,
    /// Fixed sampling seed; OS entropy when unset
    pub seed: Option<u64>,
    /// Suffix of sibling backup files
    pub backup_suffix: String,
    pub retry: RetryPolicy,
    pub oracle: HttpOracleConfig,
}

impl Default for EvolutionConfig {
    fn default() -> Self {
        Self {
            project_root: PathBuf::from("."),
            mutable_files: Vec::new(),
            baseline_sample_size: DEFAULT_SAMPLE_SIZE,
            attempt_sample_size: DEFAULT_SAMPLE_SIZE,
            seed: None,
            backup_suffix: DEFAULT_BACKUP_SUFFIX.to_string(),
            retry: RetryPolicy::default(),
            oracle: HttpOracleConfig::default(),
        }
    }
}

impl EvolutionConfig {
    /// Default configuration rooted at `project_root`
    #[must_use]
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        Self {
            project_root: project_root.into(),
            ..Self::default()
        }
    }

    /// With mutable files
    #[must_use]
    pub fn with_mutable_files<I, P>(mut self, files: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.mutable_files = files.into_iter().map(Into::into).collect();
        self
    }

    /// Same sample size for baseline and attempts
    #[inline]
    #[must_use]
    pub fn with_sample_size(mut self, sample_size: usize) -> Self {
        self.baseline_sample_size = sample_size;
        self.attempt_sample_size = sample_size;
        self
    }

    #[inline]
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    #[must_use]
    pub fn with_backup_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.backup_suffix = suffix.into();
        self
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    #[must_use]
    pub fn with_oracle(mut self, oracle: HttpOracleConfig) -> Self {
        self.oracle = oracle;
        self
    }

    /// Parse and validate TOML
    ///
    /// # Errors
    /// [`ConfigError::Parse`] or [`ConfigError::Invalid`].
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file
    ///
    /// A relative `project_root` is resolved against the file's directory.
    ///
    /// # Errors
    /// [`ConfigError::Io`] if the file cannot be read, otherwise as
    /// [`from_toml_str`](Self::from_toml_str).
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_toml_str(&text)?;
        if config.project_root.is_relative() {
            if let Some(dir) = path.parent() {
                config.project_root = dir.join(&config.project_root);
            }
        }
        tracing::debug!(config = %path.display(), files = config.mutable_files.len(), "config loaded");
        Ok(config)
    }

    /// Check value ranges and the allow-list
    ///
    /// # Errors
    /// [`ConfigError::Invalid`] naming the offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.scope()?;
        if self.baseline_sample_size == 0 {
            return Err(ConfigError::invalid("baseline_sample_size", "must be at least 1"));
        }
        if self.attempt_sample_size == 0 {
            return Err(ConfigError::invalid("attempt_sample_size", "must be at least 1"));
        }
        if self.backup_suffix.is_empty() {
            return Err(ConfigError::invalid("backup_suffix", "must not be empty"));
        }
        if self.backup_suffix.contains(['/', '\\']) {
            return Err(ConfigError::invalid("backup_suffix", "must not contain path separators"));
        }
        if self.retry.multiplier.is_nan() || self.retry.multiplier < 1.0 {
            return Err(ConfigError::invalid(
                "retry.multiplier",
                format!("{} is below 1", self.retry.multiplier),
            ));
        }
        if self.retry.initial_backoff_ms > self.retry.max_backoff_ms {
            return Err(ConfigError::invalid(
                "retry.initial_backoff_ms",
                "exceeds retry.max_backoff_ms",
            ));
        }
        Ok(())
    }

    /// The allow-list as a [`MutableFiles`]
    ///
    /// # Errors
    /// [`ConfigError::Invalid`] for an empty list, absolute entries, or
    /// entries leaving the project root.
    pub fn scope(&self) -> Result<MutableFiles, ConfigError> {
        if self.mutable_files.is_empty() {
            return Err(ConfigError::invalid("mutable_files", "allow-list is empty"));
        }
        MutableFiles::new(&self.project_root, &self.mutable_files)
            .map_err(|e| ConfigError::invalid("mutable_files", e.to_string()))
    }
}
