// Process Spawner Port
// Abstraction over OS process creation so launch/supervision logic stays testable

use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::domain::ProcessSpec;

/// How a child process ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitInfo {
    /// Exit code, if the process exited normally
    pub code: Option<i32>,
    /// Terminating signal (unix only)
    pub signal: Option<i32>,
}

impl ExitInfo {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

impl std::fmt::Display for ExitInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.code, self.signal) {
            (Some(code), _) => write!(f, "exit code {}", code),
            (None, Some(sig)) => write!(f, "signal {}", sig),
            (None, None) => write!(f, "unknown exit"),
        }
    }
}

/// Spawn errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SpawnError {
    #[error("Working directory not found: {0}")]
    WorkingDirNotFound(PathBuf),

    #[error("Executable not found: {0}")]
    ExecutableNotFound(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Cannot open log file {path}: {reason}")]
    LogFile { path: PathBuf, reason: String },

    #[error("Termination failed: {0}")]
    Terminate(String),

    #[error("IO error: {0}")]
    IoError(String),
}

/// Handle to a running child process
#[async_trait]
pub trait ChildHandle: Send {
    /// OS process id (None once the process has been reaped)
    fn pid(&self) -> Option<u32>;

    /// Wait for the process to exit
    async fn wait(&mut self) -> Result<ExitInfo, SpawnError>;

    /// Ask the process to stop, forcing it after `grace`
    ///
    /// # Errors
    /// - SpawnError::Terminate if no signal could be delivered
    async fn terminate(&mut self, grace: Duration) -> Result<ExitInfo, SpawnError>;
}

/// Process Spawner trait
///
/// Implementations:
/// - SubprocessSpawner: real OS processes (infra-system)
/// - MockProcessSpawner: scripted behaviour for tests
#[async_trait]
pub trait ProcessSpawner: Send + Sync {
    /// Spawn one child for `spec` with its args, cwd, env and log redirection applied
    ///
    /// # Errors
    /// - SpawnError::WorkingDirNotFound if the cwd does not exist
    /// - SpawnError::ExecutableNotFound if the command cannot be located
    /// - SpawnError::PermissionDenied if the command cannot be executed
    /// - SpawnError::LogFile if a log destination cannot be opened
    async fn spawn(&self, spec: &ProcessSpec) -> Result<Box<dyn ChildHandle>, SpawnError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    /// Scripted behaviour for one process name
    #[derive(Debug, Clone)]
    pub enum MockBehavior {
        /// Spawn succeeds; child runs until terminated
        RunForever,
        /// Spawn succeeds; child exits after `after` with `code`
        ExitAfter { after: Duration, code: i32 },
        /// Spawn fails with this error
        Fail(SpawnError),
    }

    /// Mock spawner recording every spawn attempt
    pub struct MockProcessSpawner {
        behaviors: Mutex<HashMap<String, MockBehavior>>,
        default_behavior: MockBehavior,
        calls: Arc<Mutex<Vec<String>>>,
        next_pid: Mutex<u32>,
    }

    impl MockProcessSpawner {
        pub fn new(default_behavior: MockBehavior) -> Self {
            Self {
                behaviors: Mutex::new(HashMap::new()),
                default_behavior,
                calls: Arc::new(Mutex::new(Vec::new())),
                next_pid: Mutex::new(1000),
            }
        }

        pub fn new_running() -> Self {
            Self::new(MockBehavior::RunForever)
        }

        /// Override behaviour for one process name
        pub fn with_behavior(self, name: impl Into<String>, behavior: MockBehavior) -> Self {
            self.behaviors.lock().unwrap().insert(name.into(), behavior);
            self
        }

        /// Names passed to `spawn`, in call order
        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        pub fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }

        pub fn spawn_count(&self, name: &str) -> usize {
            self.calls.lock().unwrap().iter().filter(|n| *n == name).count()
        }
    }

    struct MockChild {
        pid: Option<u32>,
        exit_after: Option<(Duration, i32)>,
    }

    #[async_trait]
    impl ChildHandle for MockChild {
        fn pid(&self) -> Option<u32> {
            self.pid
        }

        async fn wait(&mut self) -> Result<ExitInfo, SpawnError> {
            match self.exit_after {
                Some((after, code)) => {
                    tokio::time::sleep(after).await;
                    self.pid = None;
                    Ok(ExitInfo {
                        code: Some(code),
                        signal: None,
                    })
                }
                None => std::future::pending::<Result<ExitInfo, SpawnError>>().await,
            }
        }

        async fn terminate(&mut self, _grace: Duration) -> Result<ExitInfo, SpawnError> {
            self.pid = None;
            Ok(ExitInfo {
                code: None,
                signal: Some(15),
            })
        }
    }

    #[async_trait]
    impl ProcessSpawner for MockProcessSpawner {
        async fn spawn(&self, spec: &ProcessSpec) -> Result<Box<dyn ChildHandle>, SpawnError> {
            self.calls.lock().unwrap().push(spec.name().to_string());

            let behavior = self
                .behaviors
                .lock()
                .unwrap()
                .get(spec.name())
                .cloned()
                .unwrap_or_else(|| self.default_behavior.clone());

            let exit_after = match behavior {
                MockBehavior::Fail(err) => return Err(err),
                MockBehavior::RunForever => None,
                MockBehavior::ExitAfter { after, code } => Some((after, code)),
            };

            let mut next_pid = self.next_pid.lock().unwrap();
            *next_pid += 1;

            Ok(Box::new(MockChild {
                pid: Some(*next_pid),
                exit_after,
            }))
        }
    }
}
