// Process launcher: one spawn attempt per spec, failures isolated per process
use crate::domain::{ProcessName, ProcessSet};
use crate::port::{ChildHandle, ProcessSpawner, SpawnError, TimeProvider};
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{error, info};

/// A successfully spawned process
pub struct RunningProcess {
    pub name: ProcessName,
    pub pid: Option<u32>,
    pub started_at: i64, // epoch ms
    /// Monotonic spawn time, used for uptime
    pub launched_at: Instant,
    pub handle: Box<dyn ChildHandle>,
}

impl std::fmt::Debug for RunningProcess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunningProcess")
            .field("name", &self.name)
            .field("pid", &self.pid)
            .field("started_at", &self.started_at)
            .finish_non_exhaustive()
    }
}

/// Result of launching one spec
#[derive(Debug)]
pub struct LaunchOutcome {
    pub name: ProcessName,
    pub result: Result<RunningProcess, SpawnError>,
}

/// Per-process outcomes, in configuration order
#[derive(Debug, Default)]
pub struct LaunchReport {
    pub outcomes: Vec<LaunchOutcome>,
}

impl LaunchReport {
    pub fn all_succeeded(&self) -> bool {
        self.outcomes.iter().all(|o| o.result.is_ok())
    }

    pub fn running(&self) -> impl Iterator<Item = &RunningProcess> {
        self.outcomes.iter().filter_map(|o| o.result.as_ref().ok())
    }

    pub fn failures(&self) -> impl Iterator<Item = (&str, &SpawnError)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().err().map(|e| (o.name.as_str(), e)))
    }

    /// Take ownership of the running processes, dropping failures
    pub fn into_running(self) -> Vec<RunningProcess> {
        self.outcomes
            .into_iter()
            .filter_map(|o| o.result.ok())
            .collect()
    }
}

/// Process launcher
///
/// Spawns are sequential and do not wait for the children. A failed spawn is
/// recorded in its own outcome and never prevents the remaining specs from
/// being attempted.
pub struct Launcher {
    spawner: Arc<dyn ProcessSpawner>,
    time_provider: Arc<dyn TimeProvider>,
}

impl Launcher {
    /// Create a new launcher
    ///
    /// # Example
    /// ```ignore
    /// let launcher = Launcher::new(
    ///     Arc::new(SubprocessSpawner::new()),
    ///     Arc::new(SystemTimeProvider),
    /// );
    /// let report = launcher.launch_all(&set).await;
    /// ```
    pub fn new(spawner: Arc<dyn ProcessSpawner>, time_provider: Arc<dyn TimeProvider>) -> Self {
        Self {
            spawner,
            time_provider,
        }
    }

    /// Attempt exactly one spawn per spec, in order
    pub async fn launch_all(&self, set: &ProcessSet) -> LaunchReport {
        let mut outcomes = Vec::with_capacity(set.len());

        for spec in set {
            let result = match self.spawner.spawn(spec).await {
                Ok(handle) => {
                    let pid = handle.pid();
                    info!(
                        name = %spec.name(),
                        command = %spec.command(),
                        pid = ?pid,
                        "Process launched"
                    );
                    Ok(RunningProcess {
                        name: spec.name().to_string(),
                        pid,
                        started_at: self.time_provider.now_millis(),
                        launched_at: Instant::now(),
                        handle,
                    })
                }
                Err(e) => {
                    error!(name = %spec.name(), error = %e, "Process failed to launch");
                    Err(e)
                }
            };

            outcomes.push(LaunchOutcome {
                name: spec.name().to_string(),
                result,
            });
        }

        let report = LaunchReport { outcomes };
        info!(
            total = set.len(),
            failed = report.failures().count(),
            "Launch completed"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ProcessSpec;
    use crate::port::process_spawner::mocks::{MockBehavior, MockProcessSpawner};
    use crate::port::time_provider::FixedTimeProvider;
    use std::path::PathBuf;

    fn set(names: &[&str]) -> ProcessSet {
        ProcessSet::new(
            names
                .iter()
                .map(|n| ProcessSpec::new(*n, "true", "/tmp", "out.log", "err.log"))
                .collect(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_one_spawn_per_entry() {
        let spawner = Arc::new(MockProcessSpawner::new_running());
        let launcher = Launcher::new(spawner.clone(), Arc::new(FixedTimeProvider(42)));

        let report = launcher.launch_all(&set(&["a", "b", "c"])).await;

        assert_eq!(spawner.calls(), vec!["a", "b", "c"]);
        assert!(report.all_succeeded());
        assert_eq!(report.running().count(), 3);
        assert!(report.running().all(|p| p.started_at == 42));
    }

    #[tokio::test]
    async fn test_failure_does_not_stop_later_spawns() {
        let spawner = Arc::new(MockProcessSpawner::new_running().with_behavior(
            "b",
            MockBehavior::Fail(SpawnError::WorkingDirNotFound(PathBuf::from(
                "/nonexistent",
            ))),
        ));
        let launcher = Launcher::new(spawner.clone(), Arc::new(FixedTimeProvider(0)));

        let report = launcher.launch_all(&set(&["a", "b", "c"])).await;

        assert_eq!(spawner.call_count(), 3);
        assert!(!report.all_succeeded());

        let failures: Vec<_> = report.failures().collect();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].0, "b");
        assert!(matches!(failures[0].1, SpawnError::WorkingDirNotFound(_)));

        let running: Vec<&str> = report.running().map(|p| p.name.as_str()).collect();
        assert_eq!(running, vec!["a", "c"]);
    }

    #[tokio::test]
    async fn test_empty_set() {
        let spawner = Arc::new(MockProcessSpawner::new_running());
        let launcher = Launcher::new(spawner.clone(), Arc::new(FixedTimeProvider(0)));

        let report = launcher.launch_all(&ProcessSet::default()).await;

        assert_eq!(spawner.call_count(), 0);
        assert!(report.all_succeeded());
        assert!(report.into_running().is_empty());
    }
}
