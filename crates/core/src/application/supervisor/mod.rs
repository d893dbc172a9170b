// Supervisor - launches a process set and keeps it running

pub mod constants;
mod shutdown;

pub use shutdown::{shutdown_channel, ShutdownSender, ShutdownToken};

use crate::application::launcher::{Launcher, RunningProcess};
use crate::application::restart::{RestartDecision, RestartTracker};
use crate::domain::{ProcessName, ProcessSet, ProcessSpec};
use crate::port::{ChildHandle, ExitInfo, ProcessSpawner, TimeProvider};
use constants::DEFAULT_STOP_TIMEOUT;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};
use tracing::{error, info, warn};

/// Final state of a supervised process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    /// Terminated by the supervisor on shutdown
    Stopped,
    /// Exited on its own and autorestart is disabled
    Exited,
    /// Failed to spawn, or exceeded max unstable restarts
    Errored,
}

impl std::fmt::Display for ProcessState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProcessState::Stopped => write!(f, "stopped"),
            ProcessState::Exited => write!(f, "exited"),
            ProcessState::Errored => write!(f, "errored"),
        }
    }
}

/// Outcome of supervising one process
#[derive(Debug, Clone)]
pub struct ProcessRecord {
    pub name: ProcessName,
    pub state: ProcessState,
    pub restarts: u32,
    pub last_exit: Option<ExitInfo>,
    pub last_error: Option<String>,
}

impl ProcessRecord {
    fn new(name: impl Into<String>, state: ProcessState) -> Self {
        Self {
            name: name.into(),
            state,
            restarts: 0,
            last_exit: None,
            last_error: None,
        }
    }
}

enum Slot {
    Done(ProcessRecord),
    Watching(ProcessName, JoinHandle<ProcessRecord>),
}

/// Process supervisor
///
/// Initial launch follows `Launcher` semantics. Every process that started is
/// then watched by its own task, restarted according to its `RestartPolicy`,
/// and terminated when the shutdown token fires.
pub struct Supervisor {
    spawner: Arc<dyn ProcessSpawner>,
    time_provider: Arc<dyn TimeProvider>,
    stop_timeout: Duration,
}

impl Supervisor {
    pub fn new(spawner: Arc<dyn ProcessSpawner>, time_provider: Arc<dyn TimeProvider>) -> Self {
        Self {
            spawner,
            time_provider,
            stop_timeout: DEFAULT_STOP_TIMEOUT,
        }
    }

    /// Grace period between SIGTERM and SIGKILL
    pub fn with_stop_timeout(mut self, stop_timeout: Duration) -> Self {
        self.stop_timeout = stop_timeout;
        self
    }

    /// Launch `set` and supervise it until shutdown or until every process is done
    ///
    /// Records are returned in configuration order.
    pub async fn run(&self, set: &ProcessSet, shutdown: ShutdownToken) -> Vec<ProcessRecord> {
        let launcher = Launcher::new(self.spawner.clone(), self.time_provider.clone());
        let report = launcher.launch_all(set).await;

        let slots: Vec<Slot> = report
            .outcomes
            .into_iter()
            .map(|outcome| match (outcome.result, set.get(&outcome.name)) {
                (Ok(running), Some(spec)) => {
                    let watch = Watch {
                        spec: spec.clone(),
                        spawner: self.spawner.clone(),
                        stop_timeout: self.stop_timeout,
                        shutdown: shutdown.clone(),
                    };
                    Slot::Watching(outcome.name, tokio::spawn(watch.run(running)))
                }
                (Ok(_), None) => {
                    let mut record = ProcessRecord::new(outcome.name, ProcessState::Errored);
                    record.last_error = Some("spec missing from process set".to_string());
                    Slot::Done(record)
                }
                (Err(e), _) => {
                    let mut record = ProcessRecord::new(outcome.name, ProcessState::Errored);
                    record.last_error = Some(e.to_string());
                    Slot::Done(record)
                }
            })
            .collect();

        let mut records = Vec::with_capacity(slots.len());
        for slot in slots {
            let record = match slot {
                Slot::Done(record) => record,
                Slot::Watching(name, handle) => match handle.await {
                    Ok(record) => record,
                    Err(e) => {
                        error!(name = %name, error = %e, "Supervisor task failed");
                        let mut record = ProcessRecord::new(name, ProcessState::Errored);
                        record.last_error = Some(format!("supervisor task failed: {}", e));
                        record
                    }
                },
            };
            records.push(record);
        }

        info!(processes = records.len(), "Supervisor finished");
        records
    }
}

/// Per-process supervision task
struct Watch {
    spec: ProcessSpec,
    spawner: Arc<dyn ProcessSpawner>,
    stop_timeout: Duration,
    shutdown: ShutdownToken,
}

impl Watch {
    async fn run(mut self, first: RunningProcess) -> ProcessRecord {
        let name = self.spec.name().to_string();
        let mut record = ProcessRecord::new(name.as_str(), ProcessState::Stopped);
        let mut tracker = RestartTracker::new();

        let mut child = first.handle;
        let mut launched_at = first.launched_at;

        loop {
            // Wait for exit or shutdown
            let exit = tokio::select! {
                exit = child.wait() => exit,
                _ = self.shutdown.wait() => {
                    self.stop(&mut child, &mut record).await;
                    return record;
                }
            };

            let mut uptime = launched_at.elapsed();
            match exit {
                Ok(info) => {
                    warn!(
                        name = %name,
                        exit = %info,
                        uptime_ms = %uptime.as_millis(),
                        "Process exited"
                    );
                    record.last_exit = Some(info);
                }
                Err(e) => {
                    error!(name = %name, error = %e, "Failed to wait for process");
                    record.last_error = Some(e.to_string());
                }
            }

            // Restart until a spawn succeeds or the policy stops us
            loop {
                let delay = match tracker.on_exit(&name, self.spec.restart_policy(), uptime) {
                    RestartDecision::Restart(delay) => delay,
                    RestartDecision::Stop => {
                        record.state = ProcessState::Exited;
                        return record;
                    }
                    RestartDecision::GiveUp => {
                        error!(
                            name = %name,
                            restarts = %record.restarts,
                            "Process errored, giving up"
                        );
                        record.state = ProcessState::Errored;
                        return record;
                    }
                };

                tokio::select! {
                    _ = sleep(delay) => {},
                    _ = self.shutdown.wait() => {
                        info!(name = %name, "Shutdown during restart delay");
                        record.state = ProcessState::Stopped;
                        return record;
                    }
                }

                if self.shutdown.is_shutdown() {
                    info!(name = %name, "Shutdown requested, not restarting");
                    record.state = ProcessState::Stopped;
                    return record;
                }

                record.restarts = tracker.total_restarts();
                match self.spawner.spawn(&self.spec).await {
                    Ok(handle) => {
                        info!(
                            name = %name,
                            pid = ?handle.pid(),
                            restarts = %record.restarts,
                            "Process restarted"
                        );
                        child = handle;
                        launched_at = Instant::now();
                        break;
                    }
                    Err(e) => {
                        error!(name = %name, error = %e, "Restart spawn failed");
                        record.last_error = Some(e.to_string());
                        uptime = Duration::ZERO;
                    }
                }
            }
        }
    }

    async fn stop(&self, child: &mut Box<dyn ChildHandle>, record: &mut ProcessRecord) {
        let name = self.spec.name();
        info!(name = %name, pid = ?child.pid(), "Stopping process");

        match child.terminate(self.stop_timeout).await {
            Ok(info) => {
                info!(name = %name, exit = %info, "Process stopped");
                record.last_exit = Some(info);
            }
            Err(e) => {
                error!(name = %name, error = %e, "Failed to stop process");
                record.last_error = Some(e.to_string());
            }
        }
        record.state = ProcessState::Stopped;
    }
}
