//! End-to-end batches over a temporary project

use std::sync::Arc;

use evo_artifact::syntax;
use evo_benchmark::{BenchmarkScore, CapabilityBenchmark, Probe};
use evo_core::{
    AttemptOutcome, EvolutionConfig, EvolutionError, MutationRequest, Orchestrator, SkipReason,
};
use evo_patch::PatchMethod;
use evo_test_utils::{ScriptedOracle, ScriptedProbe, TempProject};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

const HOST: &str = "import os\n\n\ndef g():\n    return 2\n";

const ADD_CACHE: &str =
    "MODIFICATION: add cache\nREASON: speed\nCODE:\n```\ndef f(): return 1\n```";

fn orchestrator(project: &TempProject, scores: &[u32]) -> Orchestrator<ScriptedProbe> {
    let config = EvolutionConfig::new(project.root()).with_mutable_files(["agent.py"]);
    Orchestrator::new(config, ScriptedProbe::new(scores)).unwrap()
}

#[tokio::test]
async fn new_function_is_appended() {
    let project = TempProject::new().with_file("agent.py", HOST);
    let mut orch = orchestrator(&project, &[40, 45]);

    let outcome = orch
        .run_batch(&[MutationRequest::new("agent.py", ADD_CACHE)])
        .await
        .unwrap();
    let record = &outcome.ledger.records()[0];

    assert_eq!(record.patches.len(), 1);
    assert!(record.patches[0].applied);
    assert_eq!(record.patches[0].method, PatchMethod::Append);
    assert_eq!(record.outcome, AttemptOutcome::Accepted);

    let content = project.read("agent.py");
    assert!(content.starts_with(HOST.trim_end()));
    assert!(content.ends_with("def f(): return 1\n"));
    syntax::validate(&content).unwrap();
}

#[tokio::test]
async fn dangerous_fragment_is_skipped_without_backup() {
    let project = TempProject::new().with_file("agent.py", HOST);
    let mut orch = orchestrator(&project, &[40, 90]);
    let proposal = "MODIFICATION: clean up\nCODE:\n```\nimport shutil\n\ndef wipe():\n    shutil.rmtree('/')\n```";

    let outcome = orch
        .run_batch(&[MutationRequest::new("agent.py", proposal)])
        .await
        .unwrap();
    let record = &outcome.ledger.records()[0];

    assert_eq!(record.outcome, AttemptOutcome::Skipped);
    match &record.skip_reason {
        Some(SkipReason::UnsafeFragment { patterns }) => {
            assert!(patterns.iter().any(|p| p == "deletes directory trees"));
        }
        other => panic!("unexpected skip reason {other:?}"),
    }
    assert!(record.patches.is_empty());
    assert_eq!(record.score_after, None);
    assert_eq!(project.read("agent.py"), HOST);
    assert!(!project.path("agent.py.evo-backup").exists());
    // baseline only
    assert_eq!(orch.probe().calls(), 1);
}

#[tokio::test]
async fn worse_score_rolls_back() {
    let project = TempProject::new().with_file("agent.py", HOST);
    let before = project.read_bytes("agent.py");
    let mut orch = orchestrator(&project, &[40, 35]);

    let outcome = orch
        .run_batch(&[MutationRequest::new("agent.py", ADD_CACHE)])
        .await
        .unwrap();
    let record = &outcome.ledger.records()[0];

    assert_eq!(record.outcome, AttemptOutcome::RolledBack);
    assert_eq!(record.score_before, 40.0);
    assert_eq!(record.score_after, Some(35.0));
    assert_eq!(record.delta, Some(-5.0));
    assert_eq!(outcome.summary.final_score, 40.0);
    assert_eq!(outcome.summary.rejected_count, 1);
    assert_eq!(project.read_bytes("agent.py"), before);
    assert!(!project.path("agent.py.evo-backup").exists());
}

#[cfg(unix)]
#[tokio::test]
async fn rollback_keeps_file_mode() {
    use std::os::unix::fs::PermissionsExt;

    let project = TempProject::new().with_file("agent.py", HOST);
    let target = project.path("agent.py");
    std::fs::set_permissions(&target, std::fs::Permissions::from_mode(0o644)).unwrap();
    let mut orch = orchestrator(&project, &[40, 35]);

    let outcome = orch
        .run_batch(&[MutationRequest::new("agent.py", ADD_CACHE)])
        .await
        .unwrap();

    assert_eq!(outcome.ledger.records()[0].outcome, AttemptOutcome::RolledBack);
    assert_eq!(project.read("agent.py"), HOST);
    let mode = std::fs::metadata(&target).unwrap().permissions().mode() & 0o777;
    assert_eq!(mode, 0o644);
}

#[tokio::test]
async fn unreadable_target_is_skipped_and_batch_continues() {
    let project = TempProject::new().with_file("agent.py", HOST);
    let config = EvolutionConfig::new(project.root()).with_mutable_files(["agent.py", "tools.py"]);
    let mut orch = Orchestrator::new(config, ScriptedProbe::new(&[40, 55])).unwrap();

    let outcome = orch
        .run_batch(&[
            MutationRequest::new("tools.py", ADD_CACHE),
            MutationRequest::new("agent.py", ADD_CACHE),
        ])
        .await
        .unwrap();
    let records = outcome.ledger.records();

    assert_eq!(records.len(), 2);
    assert_eq!(records[0].outcome, AttemptOutcome::Skipped);
    assert!(matches!(records[0].skip_reason, Some(SkipReason::Io { .. })));
    assert!(records[0].patches.is_empty());
    assert_eq!(records[0].score_after, None);
    assert!(!project.path("tools.py").exists());

    assert_eq!(records[1].outcome, AttemptOutcome::Accepted);
    assert_eq!(outcome.summary.skipped_count, 1);
    assert_eq!(outcome.summary.final_score, 55.0);
    // baseline plus the second attempt
    assert_eq!(orch.probe().calls(), 2);
    outcome.ledger.verify_integrity().unwrap();
}

#[tokio::test]
async fn better_score_is_accepted() {
    let project = TempProject::new().with_file("agent.py", HOST);
    let mut orch = orchestrator(&project, &[40, 55]);

    let outcome = orch
        .run_batch(&[MutationRequest::new("agent.py", ADD_CACHE)])
        .await
        .unwrap();
    let summary = &outcome.summary;

    assert_eq!(outcome.ledger.records()[0].outcome, AttemptOutcome::Accepted);
    assert_eq!(summary.baseline_score, 40.0);
    assert_eq!(summary.final_score, 55.0);
    assert_eq!(summary.delta, 15.0);
    assert_eq!(summary.accepted_count, 1);
    assert!(project.read("agent.py").contains("def f(): return 1"));
    assert!(!project.path("agent.py.evo-backup").exists());
}

#[tokio::test]
async fn rejected_fragment_undoes_earlier_fragments() {
    let project = TempProject::new().with_file("agent.py", HOST);
    let mut orch = orchestrator(&project, &[40, 99]);
    let proposal = "CODE:\n```\ndef good():\n    return 1\n```\n\n```\ndef broken(:\n    pass\n```";

    let outcome = orch
        .run_batch(&[MutationRequest::new("agent.py", proposal)])
        .await
        .unwrap();
    let record = &outcome.ledger.records()[0];

    assert_eq!(record.outcome, AttemptOutcome::Skipped);
    assert!(matches!(record.skip_reason, Some(SkipReason::PatchRejected { .. })));
    assert_eq!(record.patches.len(), 2);
    assert!(record.patches[0].applied);
    assert_eq!(record.patches[1].method, PatchMethod::Rejected);
    assert_eq!(project.read("agent.py"), HOST);
    // rejected attempts are never measured
    assert_eq!(orch.probe().calls(), 1);
}

#[tokio::test]
async fn running_best_carries_across_attempts() {
    let project = TempProject::new().with_file("agent.py", HOST);
    let mut orch = orchestrator(&project, &[40, 55, 50, 60]);
    let requests: Vec<MutationRequest> = ["a", "b", "c"]
        .iter()
        .map(|name| MutationRequest::new("agent.py", format!("CODE:\n```\ndef {name}():\n    return 0\n```")))
        .collect();

    let outcome = orch.run_batch(&requests).await.unwrap();
    let records = outcome.ledger.records();

    let outcomes: Vec<AttemptOutcome> = records.iter().map(|r| r.outcome).collect();
    assert_eq!(
        outcomes,
        vec![AttemptOutcome::Accepted, AttemptOutcome::RolledBack, AttemptOutcome::Accepted]
    );
    assert_eq!(records[1].score_before, 55.0);
    assert_eq!(records[2].score_before, 55.0);
    assert_eq!(outcome.summary.final_score, 60.0);

    let content = project.read("agent.py");
    assert!(content.contains("def a():"));
    assert!(!content.contains("def b():"));
    assert!(content.contains("def c():"));
    outcome.ledger.verify_integrity().unwrap();
}

#[tokio::test]
async fn sample_sizes_come_from_config() {
    let project = TempProject::new().with_file("agent.py", HOST);
    let mut config = EvolutionConfig::new(project.root()).with_mutable_files(["agent.py"]);
    config.baseline_sample_size = 40;
    config.attempt_sample_size = 10;
    let mut orch = Orchestrator::new(config, ScriptedProbe::new(&[40, 30])).unwrap();

    orch.run_batch(&[MutationRequest::new("agent.py", ADD_CACHE)])
        .await
        .unwrap();
    assert_eq!(orch.probe().sample_sizes(), vec![40, 10]);
}

#[tokio::test]
async fn oracle_backed_benchmark_drives_a_batch() {
    let project = TempProject::new().with_file("agent.py", HOST);
    let config = EvolutionConfig::new(project.root())
        .with_mutable_files(["agent.py"])
        .with_seed(7);
    let probe = CapabilityBenchmark::new(Arc::new(ScriptedOracle::answering_bank())).with_seed(7);
    let mut orch = Orchestrator::new(config, probe).unwrap();

    let outcome = orch
        .run_batch(&[MutationRequest::new("agent.py", ADD_CACHE)])
        .await
        .unwrap();

    // a perfect baseline cannot be beaten
    assert_eq!(outcome.summary.baseline_score, 100.0);
    assert_eq!(outcome.ledger.records()[0].outcome, AttemptOutcome::RolledBack);
    assert_eq!(project.read("agent.py"), HOST);
}

/// Replaces the target with a directory, so nothing can be written back
struct SabotageProbe {
    target: std::path::PathBuf,
    calls: parking_lot::Mutex<usize>,
}

#[async_trait::async_trait]
impl Probe for SabotageProbe {
    async fn measure(&self, _sample_size: usize) -> BenchmarkScore {
        let mut calls = self.calls.lock();
        *calls += 1;
        if *calls == 2 {
            std::fs::remove_file(&self.target).unwrap();
            std::fs::create_dir_all(self.target.join("occupied")).unwrap();
        }
        BenchmarkScore::from_points(if *calls == 1 { 40 } else { 10 }, 100)
    }
}

#[tokio::test]
async fn failed_restore_stops_the_batch() {
    let project = TempProject::new().with_file("agent.py", HOST);
    let config = EvolutionConfig::new(project.root()).with_mutable_files(["agent.py"]);
    let probe = SabotageProbe {
        target: project.path("agent.py"),
        calls: parking_lot::Mutex::new(0),
    };
    let mut orch = Orchestrator::new(config, probe).unwrap();

    let err = orch
        .run_batch(&[
            MutationRequest::new("agent.py", ADD_CACHE),
            MutationRequest::new("agent.py", ADD_CACHE),
        ])
        .await
        .unwrap_err();

    assert!(matches!(err, EvolutionError::RecoveryFailure { .. }));
    assert!(err.is_fatal());
    assert_eq!(*orch.probe().calls.lock(), 2);
    // the on-disk snapshot survives for manual recovery
    assert_eq!(
        std::fs::read_to_string(project.path("agent.py.evo-backup")).unwrap(),
        HOST
    );
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn running_best_never_decreases(
        baseline in 0u32..=100,
        scores in prop::collection::vec(0u32..=100, 1..6),
    ) {
        let project = TempProject::new().with_file("agent.py", HOST);
        let mut script = vec![baseline];
        script.extend(&scores);
        let mut orch = orchestrator(&project, &script);

        let requests: Vec<MutationRequest> = (0..scores.len())
            .map(|i| MutationRequest::new("agent.py", format!("CODE:\n```\ndef f{i}():\n    return {i}\n```")))
            .collect();
        let outcome = runtime().block_on(orch.run_batch(&requests)).unwrap();
        let records = outcome.ledger.records();

        let mut best = f64::from(baseline);
        for (i, record) in records.iter().enumerate() {
            prop_assert_eq!(record.score_before, best);
            let after = f64::from(scores[i]);
            if after > best {
                prop_assert_eq!(record.outcome, AttemptOutcome::Accepted);
                best = after;
            } else {
                prop_assert_eq!(record.outcome, AttemptOutcome::RolledBack);
            }
        }
        prop_assert_eq!(outcome.summary.final_score, best);

        let content = project.read("agent.py");
        prop_assert!(syntax::is_valid(&content));
        for (i, record) in records.iter().enumerate() {
            let present = content.contains(&format!("def f{i}():"));
            prop_assert_eq!(present, record.outcome == AttemptOutcome::Accepted);
        }
    }
}
