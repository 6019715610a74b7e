//! Subcommand implementations

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use evo_artifact::{ChangeKind, ChangeProposal};
use evo_benchmark::{BenchmarkScore, CapabilityBenchmark, HttpOracle, Probe};
use evo_core::{BatchReport, EvolutionConfig, MutationRequest, Orchestrator};
use evo_patch::BackupManager;
use evo_proposal::{ChangeClassifier, ProposalParser, RiskAssessment, SafetyScreen};
use serde::Serialize;

/// Benchmark backed by the configured HTTP oracle
///
/// # Errors
/// The HTTP client cannot be built.
pub fn oracle_probe(config: &EvolutionConfig) -> Result<CapabilityBenchmark> {
    let oracle = HttpOracle::new(config.oracle.clone()).context("cannot build oracle client")?;
    let benchmark = CapabilityBenchmark::new(Arc::new(oracle)).with_retry(config.retry.clone());
    Ok(match config.seed {
        Some(seed) => benchmark.with_seed(seed),
        None => benchmark,
    })
}

/// Run a batch and write its report into `report_dir`
///
/// # Errors
/// Invalid configuration, a fatal batch error, a broken ledger, or a report
/// that cannot be written.
pub async fn run<P: Probe>(
    config: EvolutionConfig,
    probe: P,
    requests: &[MutationRequest],
    report_dir: &Path,
) -> Result<(BatchReport, PathBuf)> {
    let mut orchestrator = Orchestrator::new(config, probe)?;
    let outcome = orchestrator.run_batch(requests).await?;
    outcome.ledger.verify_integrity()?;

    let report = outcome.into_report();
    let path = write_report(&report, report_dir)?;
    tracing::info!(report = %path.display(), "report written");
    Ok((report, path))
}

/// Write `report` as pretty JSON under its timestamped name
///
/// # Errors
/// The directory cannot be created or the file cannot be written.
pub fn write_report(report: &BatchReport, dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("cannot create report directory {}", dir.display()))?;
    let path = dir.join(report.file_name());
    let json = serde_json::to_vec_pretty(report).context("cannot serialize report")?;
    std::fs::write(&path, json).with_context(|| format!("cannot write {}", path.display()))?;
    Ok(path)
}

/// One fragment as the engine would see it
#[derive(Debug, Clone, Serialize)]
pub struct FragmentCheck {
    pub kind: ChangeKind,
    pub identifier: Option<String>,
    pub parses: bool,
    pub risk: RiskAssessment,
}

/// Dry-run view of a proposal
#[derive(Debug, Clone, Serialize)]
pub struct CheckReport {
    pub proposal: ChangeProposal,
    pub fragments: Vec<FragmentCheck>,
}

impl CheckReport {
    /// Whether the orchestrator would skip this proposal before patching
    #[must_use]
    pub fn would_skip(&self) -> bool {
        !self.proposal.has_code() || self.fragments.iter().any(|f| f.risk.is_blocked())
    }
}

/// Parse, screen and classify without touching any file
#[must_use]
pub fn check(text: &str) -> CheckReport {
    let proposal = ProposalParser::new().parse(text);
    let classifier = ChangeClassifier::new();
    let screen = SafetyScreen::new();

    let fragments = proposal
        .fragments
        .iter()
        .map(|fragment| {
            let classified = classifier.classify(fragment);
            FragmentCheck {
                identifier: classified.identifier().map(str::to_string),
                parses: fragment.parses,
                risk: screen.assess(&fragment.raw_text),
                kind: classified.kind,
            }
        })
        .collect();

    CheckReport {
        proposal,
        fragments,
    }
}

/// Score the probe once
pub async fn benchmark<P: Probe>(probe: &P, sample_size: usize) -> BenchmarkScore {
    probe.measure(sample_size).await
}

/// Restore an allow-listed file from its sibling backup
///
/// Returns `false` when there is no backup. The backup is kept.
///
/// # Errors
/// Invalid allow-list, a target outside it, or a failed restore.
pub fn restore(config: &EvolutionConfig, file: &Path) -> Result<bool> {
    let scope = Arc::new(config.scope()?);
    let manager = BackupManager::new(scope).with_suffix(config.backup_suffix.clone());
    manager
        .restore(file)
        .with_context(|| format!("cannot restore {}", file.display()))
}
