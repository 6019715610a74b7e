//! Core type definitions for Evolve

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use evo_artifact::ChangeProposal;
use evo_patch::PatchResult;
use evo_proposal::RiskTier;
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Unique attempt identifier (ULID for sortability)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AttemptId(pub Ulid);

impl AttemptId {
    /// Generate new attempt ID
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for AttemptId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for AttemptId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Proposal text for one allow-listed file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationRequest {
    /// Path relative to the project root
    pub target: PathBuf,
    /// Freeform proposal text
    pub proposal: String,
}

impl MutationRequest {
    pub fn new(target: impl Into<PathBuf>, proposal: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            proposal: proposal.into(),
        }
    }
}

/// Terminal state of an attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    /// Patched and measured better than the running best; kept
    Accepted,
    /// Patched but not better; file restored
    RolledBack,
    /// Not measured; file unchanged
    Skipped,
}

impl std::fmt::Display for AttemptOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Accepted => "accepted",
            Self::RolledBack => "rolled_back",
            Self::Skipped => "skipped",
        };
        write!(f, "{name}")
    }
}

/// Why an attempt was skipped
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    /// Proposal had no code fragments
    NoCode,
    /// A fragment screened as high risk
    UnsafeFragment { patterns: Vec<String> },
    /// A fragment's candidate failed validation
    PatchRejected { error: String },
    /// Reading or writing the target failed
    Io { message: String },
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoCode => write!(f, "no code in proposal"),
            Self::UnsafeFragment { patterns } => {
                write!(f, "unsafe fragment: {}", patterns.join(", "))
            }
            Self::PatchRejected { error } => write!(f, "patch rejected: {error}"),
            Self::Io { message } => write!(f, "io failure: {message}"),
        }
    }
}

/// Ledger entry for one attempt; immutable once appended
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvolutionRecord {
    pub attempt_id: AttemptId,
    /// Path as requested, relative to the project root
    pub target_file: PathBuf,
    pub proposal: ChangeProposal,
    /// Highest tier across fragments
    pub risk_tier: RiskTier,
    /// Pattern descriptions matched across fragments
    pub matched_patterns: Vec<String>,
    /// One result per fragment applied, in order
    pub patches: Vec<PatchResult>,
    /// Running best when the attempt started
    pub score_before: f64,
    /// `None` unless the attempt was measured
    pub score_after: Option<f64>,
    /// `score_after - score_before`, when measured
    pub delta: Option<f64>,
    pub outcome: AttemptOutcome,
    pub skip_reason: Option<SkipReason>,
    pub timestamp: DateTime<Utc>,
    /// Hex sha256 of the previous record, zeros for the first
    pub prev_hash: String,
    /// Hex sha256 over this record and `prev_hash`
    pub hash: String,
}

/// Batch totals
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub baseline_score: f64,
    /// Running best after the last attempt
    pub final_score: f64,
    pub delta: f64,
    pub accepted_count: usize,
    /// Attempts measured and rolled back
    pub rejected_count: usize,
    pub skipped_count: usize,
}

impl BatchSummary {
    /// Summarize `records` against a baseline
    #[must_use]
    pub fn from_records(baseline_score: f64, records: &[EvolutionRecord]) -> Self {
        let count = |outcome| records.iter().filter(|r| r.outcome == outcome).count();
        let final_score = records
            .iter()
            .filter(|r| r.outcome == AttemptOutcome::Accepted)
            .filter_map(|r| r.score_after)
            .fold(baseline_score, f64::max);

        Self {
            baseline_score,
            final_score,
            delta: final_score - baseline_score,
            accepted_count: count(AttemptOutcome::Accepted),
            rejected_count: count(AttemptOutcome::RolledBack),
            skipped_count: count(AttemptOutcome::Skipped),
        }
    }

    #[inline]
    #[must_use]
    pub fn attempts(&self) -> usize {
        self.accepted_count + self.rejected_count + self.skipped_count
    }
}

/// Serializable batch report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    pub generated_at: DateTime<Utc>,
    pub summary: BatchSummary,
    pub records: Vec<EvolutionRecord>,
}

impl BatchReport {
    #[must_use]
    pub fn new(summary: BatchSummary, records: Vec<EvolutionRecord>) -> Self {
        Self {
            generated_at: Utc::now(),
            summary,
            records,
        }
    }

    /// `evolution_report_<YYYYmmdd_HHMMSS>.json`
    #[must_use]
    pub fn file_name(&self) -> String {
        format!(
            "evolution_report_{}.json",
            self.generated_at.format("%Y%m%d_%H%M%S")
        )
    }
}
