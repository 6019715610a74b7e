//! Patching real files inside a temporary project

use std::path::Path;
use std::sync::Arc;

use evo_artifact::{syntax, ClassifiedFragment, CodeFragment};
use evo_patch::{BackupManager, MutableFiles, PatchError, PatchMethod, Patcher};
use evo_proposal::{ChangeClassifier, ProposalParser};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use tempfile::TempDir;

const HOST: &str = "import os\n\n\ndef g():\n    return 2\n";

fn project(content: &str) -> (TempDir, Arc<MutableFiles>) {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("src")).unwrap();
    std::fs::write(dir.path().join("src/agent.py"), content).unwrap();
    std::fs::write(dir.path().join("main.py"), "print('hi')\n").unwrap();
    let scope = MutableFiles::new(dir.path(), ["src/agent.py"]).unwrap();
    (dir, Arc::new(scope))
}

fn classify(text: &str) -> ClassifiedFragment {
    ChangeClassifier::new().classify(&CodeFragment::new(text))
}

fn read(dir: &Path, file: &str) -> String {
    std::fs::read_to_string(dir.join(file)).unwrap()
}

#[test]
fn proposal_appends_new_function() {
    let (dir, scope) = project(HOST);
    let proposal = ProposalParser::new()
        .parse("MODIFICATION: add cache\nREASON: speed\nCODE:\n```\ndef f(): return 1\n```");
    let fragment = ChangeClassifier::new().classify(&proposal.fragments[0]);

    let result = Patcher::new(scope).apply("src/agent.py", &fragment).unwrap();
    assert!(result.applied);
    assert_eq!(result.method, PatchMethod::Append);

    let content = read(dir.path(), "src/agent.py");
    assert!(content.ends_with("def f(): return 1\n"));
    assert!(syntax::is_valid(&content));
}

#[test]
fn rejected_patch_leaves_file_untouched() {
    let (dir, scope) = project(HOST);
    let result = Patcher::new(scope)
        .apply("src/agent.py", &classify("def broken(:\n  ???"))
        .unwrap();

    assert!(!result.applied);
    assert_eq!(result.method, PatchMethod::Rejected);
    assert_eq!(read(dir.path(), "src/agent.py"), HOST);
}

#[test]
fn out_of_scope_target_is_contract_violation() {
    let (dir, scope) = project(HOST);
    let err = Patcher::new(scope)
        .apply("main.py", &classify("def f(): return 1"))
        .unwrap_err();

    assert!(matches!(err, PatchError::OutsideScope { .. }));
    assert!(err.is_contract_violation());
    assert_eq!(read(dir.path(), "main.py"), "print('hi')\n");
}

#[test]
fn missing_target_is_io_error() {
    let (dir, scope) = project(HOST);
    std::fs::remove_file(dir.path().join("src/agent.py")).unwrap();
    let err = Patcher::new(scope)
        .apply("src/agent.py", &classify("def f(): return 1"))
        .unwrap_err();
    assert!(matches!(err, PatchError::Io { .. }));
}

#[test]
fn import_twice_is_already_present() {
    let (dir, scope) = project(HOST);
    let patcher = Patcher::new(scope);
    let fragment = classify("from functools import lru_cache");

    let first = patcher.apply("src/agent.py", &fragment).unwrap();
    assert_eq!(first.method, PatchMethod::Append);
    let after_first = read(dir.path(), "src/agent.py");

    let second = patcher.apply("src/agent.py", &fragment).unwrap();
    assert!(second.applied);
    assert_eq!(second.method, PatchMethod::AlreadyPresent);
    assert_eq!(read(dir.path(), "src/agent.py"), after_first);
}

#[test]
fn snapshot_patch_restore_is_byte_identical() {
    let (dir, scope) = project(HOST);
    let patcher = Patcher::new(Arc::clone(&scope));
    let mut backups = BackupManager::new(scope);

    backups.snapshot("src/agent.py").unwrap();
    patcher
        .apply("src/agent.py", &classify("def g():\n    return 3\n"))
        .unwrap();
    assert_ne!(read(dir.path(), "src/agent.py"), HOST);

    assert!(backups.restore("src/agent.py").unwrap());
    assert_eq!(std::fs::read(dir.path().join("src/agent.py")).unwrap(), HOST.as_bytes());
}

#[cfg(unix)]
#[test]
fn patch_and_restore_keep_file_mode() {
    use std::os::unix::fs::PermissionsExt;

    let (dir, scope) = project(HOST);
    let target = dir.path().join("src/agent.py");
    std::fs::set_permissions(&target, std::fs::Permissions::from_mode(0o644)).unwrap();
    let mode = || std::fs::metadata(&target).unwrap().permissions().mode() & 0o777;

    let patcher = Patcher::new(Arc::clone(&scope));
    let mut backups = BackupManager::new(scope);
    backups.snapshot("src/agent.py").unwrap();

    patcher.apply("src/agent.py", &classify("def f(): return 1")).unwrap();
    assert_eq!(mode(), 0o644);

    assert!(backups.restore("src/agent.py").unwrap());
    assert_eq!(mode(), 0o644);
}

fn identifier() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9]{0,8}".prop_map(|s| format!("fn_{s}"))
}

fn host_file() -> impl Strategy<Value = String> {
    prop::collection::vec((identifier(), 0u32..100), 0..5).prop_map(|defs| {
        let mut out = String::from("import os\n");
        for (name, value) in defs {
            out.push_str(&format!("\n\ndef {name}(x):\n    y = x + {value}\n    return y\n"));
        }
        out
    })
}

proptest! {
    #[test]
    fn valid_function_into_valid_host_always_reparses(
        host in host_file(),
        name in identifier(),
        value in 0u32..100,
    ) {
        prop_assert!(syntax::is_valid(&host));
        let fragment = classify(&format!("def {name}(a, b):\n    return a * b + {value}\n"));

        let candidate = Patcher::candidate(&host, &fragment).unwrap();
        prop_assert!(candidate.result.applied);
        prop_assert!(matches!(candidate.result.method, PatchMethod::Replace | PatchMethod::Append));
        prop_assert!(syntax::is_valid(&candidate.content));
    }

    #[test]
    fn import_insertion_is_idempotent(host in host_file(), module in "mod_[a-z]{1,6}") {
        let fragment = classify(&format!("import {module}"));
        let once = Patcher::candidate(&host, &fragment).unwrap();
        prop_assert!(once.result.applied);

        let twice = Patcher::candidate(&once.content, &fragment).unwrap();
        prop_assert_eq!(twice.result.method, PatchMethod::AlreadyPresent);
        prop_assert_eq!(twice.content, once.content);
    }
}
