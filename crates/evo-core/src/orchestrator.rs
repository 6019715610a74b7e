//! Mutation orchestrator
//!
//! Runs attempts one after another. Each attempt walks the
//! [`AttemptPhase`] machine:
//!
//! 1. parse the proposal; no code ends the attempt as `Skipped`
//! 2. screen every fragment; any high-risk fragment ends it as `Skipped`
//!    before a backup is taken
//! 3. snapshot the target, then patch fragment by fragment; a rejected
//!    fragment restores the snapshot and ends it as `Skipped`
//! 4. measure, then keep the change only if the score beats the running best
//!
//! The running best starts at a baseline measured once per batch and never
//! decreases. A failed restore is fatal and stops the batch.

use std::path::Path;
use std::sync::Arc;

use evo_artifact::ChangeProposal;
use evo_benchmark::{BenchmarkScore, Probe};
use evo_patch::{BackupError, BackupManager, MutableFiles, PatchError, PatchResult, Patcher};
use evo_proposal::{ChangeClassifier, ProposalParser, RiskAssessment, RiskTier, SafetyScreen};
use tracing::{debug, error, info, warn};

use crate::config::EvolutionConfig;
use crate::error::EvolutionError;
use crate::ledger::Ledger;
use crate::state::{AttemptPhase, AttemptState};
use crate::types::{
    AttemptId, AttemptOutcome, BatchReport, BatchSummary, EvolutionRecord, MutationRequest,
    SkipReason,
};

/// Result of a completed batch
#[derive(Debug, Clone)]
pub struct BatchOutcome {
    pub summary: BatchSummary,
    pub ledger: Ledger,
}

impl BatchOutcome {
    #[must_use]
    pub fn into_report(self) -> BatchReport {
        BatchReport::new(self.summary, self.ledger.into_records())
    }
}

/// Sequences parse, screen, patch, measure and decide over allow-listed files
pub struct Orchestrator<P: Probe> {
    config: EvolutionConfig,
    scope: Arc<MutableFiles>,
    parser: ProposalParser,
    classifier: ChangeClassifier,
    screen: SafetyScreen,
    patcher: Patcher,
    backups: BackupManager,
    probe: P,
}

impl<P: Probe> std::fmt::Debug for Orchestrator<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("scope", &self.scope)
            .field("baseline_sample_size", &self.config.baseline_sample_size)
            .field("attempt_sample_size", &self.config.attempt_sample_size)
            .finish_non_exhaustive()
    }
}

impl<P: Probe> Orchestrator<P> {
    /// Create orchestrator from validated configuration
    ///
    /// # Errors
    /// [`EvolutionError::Config`] if the configuration does not validate.
    pub fn new(config: EvolutionConfig, probe: P) -> Result<Self, EvolutionError> {
        config.validate()?;
        let scope = Arc::new(config.scope()?);
        let backups =
            BackupManager::new(Arc::clone(&scope)).with_suffix(config.backup_suffix.clone());

        Ok(Self {
            patcher: Patcher::new(Arc::clone(&scope)),
            parser: ProposalParser::new(),
            classifier: ChangeClassifier::new(),
            screen: SafetyScreen::new(),
            config,
            scope,
            backups,
            probe,
        })
    }

    #[inline]
    #[must_use]
    pub fn config(&self) -> &EvolutionConfig {
        &self.config
    }

    #[inline]
    #[must_use]
    pub fn scope(&self) -> &MutableFiles {
        &self.scope
    }

    #[inline]
    #[must_use]
    pub fn probe(&self) -> &P {
        &self.probe
    }

    /// Measure with the baseline sample size
    pub async fn measure_baseline(&self) -> BenchmarkScore {
        let score = self.probe.measure(self.config.baseline_sample_size).await;
        log_score("baseline", &score);
        score
    }

    /// Run every request in order against one baseline
    ///
    /// All targets are checked against the allow-list before anything is
    /// measured or written.
    ///
    /// # Errors
    /// [`EvolutionError::ContractViolation`] for an out-of-list target, or a
    /// fatal error from an attempt, which stops the batch.
    pub async fn run_batch(
        &mut self,
        requests: &[MutationRequest],
    ) -> Result<BatchOutcome, EvolutionError> {
        for request in requests {
            self.scope.resolve(&request.target)?;
        }

        let baseline = self.measure_baseline().await.percentage;
        info!(baseline, attempts = requests.len(), "batch started");

        let mut best = baseline;
        let mut ledger = Ledger::new();
        for request in requests {
            let record = self.run_attempt(request, best).await?;
            if record.outcome == AttemptOutcome::Accepted {
                if let Some(after) = record.score_after {
                    debug_assert!(after > best);
                    best = after;
                }
            }
            ledger.append(record);
        }

        let summary = BatchSummary::from_records(baseline, ledger.records());
        info!(
            baseline = summary.baseline_score,
            final_score = summary.final_score,
            delta = summary.delta,
            accepted = summary.accepted_count,
            rejected = summary.rejected_count,
            skipped = summary.skipped_count,
            "batch finished"
        );
        Ok(BatchOutcome { summary, ledger })
    }

    /// Run one attempt against `running_best`
    ///
    /// The returned record is not yet sealed; append it to a [`Ledger`].
    ///
    /// # Errors
    /// Contract violations, and [`EvolutionError::RecoveryFailure`] when the
    /// snapshot cannot be put back.
    pub async fn run_attempt(
        &mut self,
        request: &MutationRequest,
        running_best: f64,
    ) -> Result<EvolutionRecord, EvolutionError> {
        let target = request.target.as_path();
        let mut state = AttemptState::new();

        state.advance(AttemptPhase::ParseProposal)?;
        let proposal = self.parser.parse(&request.proposal);
        let mut trace = AttemptTrace::new(request, proposal, running_best);
        info!(
            attempt = %trace.attempt_id,
            file = %target.display(),
            category = %trace.proposal.category,
            fragments = trace.proposal.fragments.len(),
            "attempt started"
        );

        if !trace.proposal.has_code() {
            warn!(attempt = %trace.attempt_id, "proposal has no code, skipping");
            state.advance(AttemptPhase::Skipped)?;
            return Ok(trace.skipped(SkipReason::NoCode));
        }

        state.advance(AttemptPhase::ScreenSafety)?;
        let assessments: Vec<RiskAssessment> = trace
            .proposal
            .fragments
            .iter()
            .map(|fragment| self.screen.assess(&fragment.raw_text))
            .collect();
        trace.record_risk(&assessments);

        if assessments.iter().any(RiskAssessment::is_blocked) {
            let patterns: Vec<String> = assessments
                .iter()
                .filter(|a| a.is_blocked())
                .flat_map(|a| a.matched_patterns.iter().cloned())
                .collect();
            warn!(attempt = %trace.attempt_id, patterns = ?patterns, "high-risk fragment, skipping");
            state.advance(AttemptPhase::Skipped)?;
            return Ok(trace.skipped(SkipReason::UnsafeFragment { patterns }));
        }
        if trace.risk_tier == RiskTier::Medium {
            warn!(
                attempt = %trace.attempt_id,
                patterns = ?trace.matched_patterns,
                "medium-risk fragment, proceeding"
            );
        }

        let classified = self.classifier.classify_all(&trace.proposal.fragments);

        state.advance(AttemptPhase::Snapshot)?;
        match self.backups.snapshot(target) {
            Ok(_) => {}
            Err(BackupError::Scope(e)) => return Err(e.into()),
            Err(e) => {
                warn!(attempt = %trace.attempt_id, error = %e, "snapshot failed, skipping");
                state.advance(AttemptPhase::Skipped)?;
                return Ok(trace.skipped(SkipReason::Io {
                    message: e.to_string(),
                }));
            }
        }

        state.advance(AttemptPhase::Patch)?;
        let mut failure = None;
        for fragment in &classified {
            match self.patcher.apply(target, fragment) {
                Ok(result) if result.applied => {
                    debug!(kind = fragment.kind.tag(), method = ?result.method, "fragment applied");
                    trace.patches.push(result);
                }
                Ok(result) => {
                    let error = result.error.clone().unwrap_or_default();
                    warn!(attempt = %trace.attempt_id, kind = fragment.kind.tag(), error = %error, "patch rejected");
                    trace.patches.push(result);
                    failure = Some(SkipReason::PatchRejected { error });
                    break;
                }
                Err(e) if e.is_contract_violation() => {
                    self.restore(target)?;
                    return Err(e.into());
                }
                Err(e) => {
                    warn!(attempt = %trace.attempt_id, error = %e, "patch failed");
                    trace.patches.push(PatchResult::rejected(e.to_string()));
                    failure = Some(skip_reason_for(&e));
                    break;
                }
            }
        }

        if let Some(reason) = failure {
            state.advance(AttemptPhase::Restore)?;
            self.restore(target)?;
            state.advance(AttemptPhase::Skipped)?;
            return Ok(trace.skipped(reason));
        }

        state.advance(AttemptPhase::MeasureAfter)?;
        let score = self.probe.measure(self.config.attempt_sample_size).await;
        log_score("attempt", &score);
        let after = score.percentage;

        state.advance(AttemptPhase::Decide)?;
        if after > running_best {
            self.discard(target);
            state.advance(AttemptPhase::Accepted)?;
            Ok(trace.measured(AttemptOutcome::Accepted, after))
        } else {
            state.advance(AttemptPhase::Restore)?;
            self.restore(target)?;
            state.advance(AttemptPhase::RolledBack)?;
            Ok(trace.measured(AttemptOutcome::RolledBack, after))
        }
    }

    /// Put the snapshot back and drop it
    fn restore(&mut self, target: &Path) -> Result<(), EvolutionError> {
        let source = match self.backups.restore(target) {
            Ok(true) => {
                self.discard(target);
                return Ok(());
            }
            Ok(false) => BackupError::io_error(
                target,
                std::io::Error::new(std::io::ErrorKind::NotFound, "no backup to restore"),
            ),
            Err(e) => e,
        };
        error!(file = %target.display(), error = %source, "recovery failed, stopping batch");
        Err(EvolutionError::recovery_failure(target, source))
    }

    fn discard(&mut self, target: &Path) {
        if let Err(e) = self.backups.discard(target) {
            warn!(file = %target.display(), error = %e, "could not remove backup");
        }
    }
}

fn skip_reason_for(error: &PatchError) -> SkipReason {
    match error {
        PatchError::Syntax(e) => SkipReason::PatchRejected {
            error: e.to_string(),
        },
        other => SkipReason::Io {
            message: other.to_string(),
        },
    }
}

fn log_score(phase: &'static str, score: &BenchmarkScore) {
    debug!(
        phase,
        raw = score.raw_points,
        max = score.max_points,
        percentage = score.percentage,
        "score measured"
    );
    if score.failed_calls > 0 {
        warn!(phase, failed_calls = score.failed_calls, "oracle calls failed during measurement");
    }
}

/// Fields collected while an attempt runs
struct AttemptTrace {
    attempt_id: AttemptId,
    target_file: std::path::PathBuf,
    proposal: ChangeProposal,
    risk_tier: RiskTier,
    matched_patterns: Vec<String>,
    patches: Vec<PatchResult>,
    score_before: f64,
}

impl AttemptTrace {
    fn new(request: &MutationRequest, proposal: ChangeProposal, score_before: f64) -> Self {
        Self {
            attempt_id: AttemptId::new(),
            target_file: request.target.clone(),
            proposal,
            risk_tier: RiskTier::Low,
            matched_patterns: Vec::new(),
            patches: Vec::new(),
            score_before,
        }
    }

    fn record_risk(&mut self, assessments: &[RiskAssessment]) {
        self.risk_tier = assessments.iter().map(|a| a.tier).max().unwrap_or(RiskTier::Low);
        let patterns: std::collections::BTreeSet<&String> =
            assessments.iter().flat_map(|a| &a.matched_patterns).collect();
        self.matched_patterns = patterns.into_iter().cloned().collect();
    }

    fn skipped(self, reason: SkipReason) -> EvolutionRecord {
        self.finish(AttemptOutcome::Skipped, None, Some(reason))
    }

    fn measured(self, outcome: AttemptOutcome, score_after: f64) -> EvolutionRecord {
        self.finish(outcome, Some(score_after), None)
    }

    fn finish(
        self,
        outcome: AttemptOutcome,
        score_after: Option<f64>,
        skip_reason: Option<SkipReason>,
    ) -> EvolutionRecord {
        let delta = score_after.map(|after| after - self.score_before);
        info!(
            attempt = %self.attempt_id,
            file = %self.target_file.display(),
            outcome = ?outcome,
            score_before = self.score_before,
            score_after = ?score_after,
            reason = ?skip_reason,
            "attempt finished"
        );

        EvolutionRecord {
            attempt_id: self.attempt_id,
            target_file: self.target_file,
            proposal: self.proposal,
            risk_tier: self.risk_tier,
            matched_patterns: self.matched_patterns,
            patches: self.patches,
            score_before: self.score_before,
            score_after,
            delta,
            outcome,
            skip_reason,
            timestamp: chrono::Utc::now(),
            prev_hash: String::new(),
            hash: String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use evo_test_utils::{ScriptedProbe, TempProject};

    const CLEAN: &str = "MODIFICATION: add helper\nREASON: speed\nCODE:\n```\ndef helper():\n    return 1\n```";

    fn orchestrator(project: &TempProject, scores: &[u32]) -> Orchestrator<ScriptedProbe> {
        let config = EvolutionConfig::new(project.root()).with_mutable_files(["agent.py"]);
        Orchestrator::new(config, ScriptedProbe::new(scores)).unwrap()
    }

    #[tokio::test]
    async fn no_code_is_skipped_without_measuring() {
        let project = TempProject::new().with_file("agent.py", "x = 1\n");
        let mut orch = orchestrator(&project, &[40]);

        let record = orch
            .run_attempt(&MutationRequest::new("agent.py", "just make it better"), 40.0)
            .await
            .unwrap();
        assert_eq!(record.outcome, AttemptOutcome::Skipped);
        assert_eq!(record.skip_reason, Some(SkipReason::NoCode));
        assert_eq!(record.score_after, None);
        assert_eq!(orch.probe().calls(), 0);
    }

    #[tokio::test]
    async fn equal_score_rolls_back() {
        let project = TempProject::new().with_file("agent.py", "x = 1\n");
        let mut orch = orchestrator(&project, &[40]);

        let record = orch
            .run_attempt(&MutationRequest::new("agent.py", CLEAN), 40.0)
            .await
            .unwrap();
        assert_eq!(record.outcome, AttemptOutcome::RolledBack);
        assert_eq!(record.delta, Some(0.0));
        assert_eq!(project.read("agent.py"), "x = 1\n");
        assert!(!project.path("agent.py.evo-backup").exists());
    }

    #[tokio::test]
    async fn medium_risk_is_recorded_and_applied() {
        let project = TempProject::new().with_file("agent.py", "x = 1\n");
        let mut orch = orchestrator(&project, &[50]);
        let proposal = "CODE:\n```\nimport requests\n\ndef fetch(url):\n    return requests.get(url).text\n```";

        let record = orch
            .run_attempt(&MutationRequest::new("agent.py", proposal), 40.0)
            .await
            .unwrap();
        assert_eq!(record.outcome, AttemptOutcome::Accepted);
        assert_eq!(record.risk_tier, RiskTier::Medium);
        assert!(!record.matched_patterns.is_empty());
        assert!(project.read("agent.py").contains("def fetch(url):"));
    }

    #[tokio::test]
    async fn out_of_scope_target_fails_before_baseline() {
        let project = TempProject::new().with_file("agent.py", "x = 1\n");
        let mut orch = orchestrator(&project, &[40]);

        let err = orch
            .run_batch(&[MutationRequest::new("other.py", CLEAN)])
            .await
            .unwrap_err();
        assert!(matches!(err, EvolutionError::ContractViolation(_)));
        assert_eq!(orch.probe().calls(), 0);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let project = TempProject::new();
        let config = EvolutionConfig::new(project.root());
        assert!(matches!(
            Orchestrator::new(config, ScriptedProbe::new(&[40])),
            Err(EvolutionError::Config(_))
        ));
    }
}
