//! Supervisor integration tests against real OS processes
//!
//! Requires a unix `/bin/sh`.
#![cfg(unix)]

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use procman_core::application::{shutdown_channel, ProcessState, Supervisor};
use procman_core::domain::{ProcessSet, ProcessSpec, RestartPolicy};
use procman_core::port::time_provider::SystemTimeProvider;
use procman_infra_system::SubprocessSpawner;
use tempfile::TempDir;

fn supervisor() -> Supervisor {
    Supervisor::new(
        Arc::new(SubprocessSpawner::new()),
        Arc::new(SystemTimeProvider),
    )
    .with_stop_timeout(Duration::from_secs(2))
}

fn sh(dir: &Path, name: &str, script: &str, policy: RestartPolicy) -> ProcessSpec {
    ProcessSpec::new(
        name,
        "sh",
        dir,
        dir.join(format!("{}.out", name)),
        dir.join(format!("{}.err", name)),
    )
    .with_args(["-c", script])
    .with_restart_policy(policy)
}

/// A crashing process is restarted until max_restarts, then marked errored
#[tokio::test]
async fn test_crash_loop_is_bounded() {
    let dir = TempDir::new().unwrap();
    let policy = RestartPolicy {
        max_restarts: 3,
        ..RestartPolicy::default()
    };
    let spec = sh(dir.path(), "crashy", "echo attempt; exit 3", policy);
    let set = ProcessSet::new(vec![spec.clone()]).unwrap();
    let (_tx, token) = shutdown_channel();

    let records = tokio::time::timeout(Duration::from_secs(10), supervisor().run(&set, token))
        .await
        .expect("supervisor did not give up on a crash loop");

    assert_eq!(records[0].state, ProcessState::Errored);
    assert_eq!(records[0].restarts, 3);
    assert_eq!(records[0].last_exit.and_then(|e| e.code), Some(3));

    // initial run + 3 restarts, all appended to the same log
    let out = fs::read_to_string(spec.stdout_log()).unwrap();
    assert_eq!(out.lines().count(), 4);
}

/// Shutdown terminates long-running children
#[tokio::test]
async fn test_shutdown_terminates_children() {
    let dir = TempDir::new().unwrap();
    let set = ProcessSet::new(vec![
        sh(dir.path(), "a", "exec sleep 30", RestartPolicy::default()),
        sh(dir.path(), "b", "exec sleep 30", RestartPolicy::default()),
    ])
    .unwrap();
    let (tx, token) = shutdown_channel();

    let sup = supervisor();
    let stopper = async {
        tokio::time::sleep(Duration::from_millis(300)).await;
        tx.shutdown();
    };
    let (records, _) = tokio::join!(sup.run(&set, token), stopper);

    assert_eq!(records.len(), 2);
    for record in &records {
        assert_eq!(record.state, ProcessState::Stopped);
        assert_eq!(record.restarts, 0);
        assert_eq!(record.last_exit.and_then(|e| e.signal), Some(15));
    }
}

/// Without autorestart a clean exit leaves the process exited
#[tokio::test]
async fn test_exit_without_autorestart() {
    let dir = TempDir::new().unwrap();
    let set = ProcessSet::new(vec![sh(
        dir.path(),
        "oneshot",
        "exit 0",
        RestartPolicy::never(),
    )])
    .unwrap();
    let (_tx, token) = shutdown_channel();

    let records = supervisor().run(&set, token).await;

    assert_eq!(records[0].state, ProcessState::Exited);
    assert!(records[0].last_exit.unwrap().success());
}

/// A spawn failure is reported without affecting siblings
#[tokio::test]
async fn test_spawn_failure_alongside_running_process() {
    let dir = TempDir::new().unwrap();
    let broken = ProcessSpec::new(
        "broken",
        "sh",
        "/nonexistent",
        dir.path().join("broken.out"),
        dir.path().join("broken.err"),
    );
    let set = ProcessSet::new(vec![
        broken,
        sh(dir.path(), "alive", "exec sleep 30", RestartPolicy::default()),
    ])
    .unwrap();
    let (tx, token) = shutdown_channel();

    let sup = supervisor();
    let stopper = async {
        tokio::time::sleep(Duration::from_millis(300)).await;
        tx.shutdown();
    };
    let (records, _) = tokio::join!(sup.run(&set, token), stopper);

    assert_eq!(records[0].name, "broken");
    assert_eq!(records[0].state, ProcessState::Errored);
    assert!(records[0]
        .last_error
        .as_deref()
        .unwrap()
        .contains("Working directory not found"));

    assert_eq!(records[1].name, "alive");
    assert_eq!(records[1].state, ProcessState::Stopped);
}
