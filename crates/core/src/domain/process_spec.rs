// Process Spec Domain Model

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Process name (unique within a ProcessSet)
pub type ProcessName = String;

/// Exec Mode
///
/// Only `Fork` can be launched. `Cluster` is accepted by the wire format so that
/// existing ecosystem files parse, and is rejected during ProcessSet validation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecMode {
    #[default]
    #[serde(alias = "fork_mode")]
    Fork,
    #[serde(alias = "cluster_mode")]
    Cluster,
}

impl std::fmt::Display for ExecMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecMode::Fork => write!(f, "fork"),
            ExecMode::Cluster => write!(f, "cluster"),
        }
    }
}

/// Restart policy attached to every process
#[derive(Debug, Clone, PartialEq)]
pub struct RestartPolicy {
    /// Restart the process whenever it exits
    pub autorestart: bool,
    /// Consecutive unstable restarts allowed before giving up
    pub max_restarts: u32,
    /// A run shorter than this counts as unstable
    pub min_uptime: Duration,
    /// Fixed delay before each restart
    pub restart_delay: Duration,
    /// Base delay for exponential backoff (overrides `restart_delay` when set)
    pub exp_backoff_restart_delay: Option<Duration>,
}

impl RestartPolicy {
    /// Policy that never restarts
    pub fn never() -> Self {
        Self {
            autorestart: false,
            ..Self::default()
        }
    }
}

impl Default for RestartPolicy {
    fn default() -> Self {
        use crate::application::supervisor::constants::{DEFAULT_MAX_RESTARTS, DEFAULT_MIN_UPTIME};

        Self {
            autorestart: true,
            max_restarts: DEFAULT_MAX_RESTARTS,
            min_uptime: DEFAULT_MIN_UPTIME,
            restart_delay: Duration::ZERO,
            exp_backoff_restart_delay: None,
        }
    }
}

/// Process Spec Entity
///
/// Built once at configuration load and immutable afterwards: fields are private
/// and only exposed through accessors. The `with_*` methods consume and return the
/// spec, so they are only usable while it is being assembled.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessSpec {
    name: ProcessName,
    command: String,
    args: Vec<String>,
    working_dir: PathBuf,
    stdout_log: PathBuf,
    stderr_log: PathBuf,
    env: BTreeMap<String, String>,
    exec_mode: ExecMode,
    restart: RestartPolicy,
}

impl ProcessSpec {
    /// Create a new ProcessSpec
    ///
    /// # Arguments
    ///
    /// * `name` - Unique process name
    /// * `command` - Executable path or name (looked up on PATH)
    /// * `working_dir` - Directory the child is started in
    /// * `stdout_log` - File receiving the child's stdout
    /// * `stderr_log` - File receiving the child's stderr
    pub fn new(
        name: impl Into<String>,
        command: impl Into<String>,
        working_dir: impl Into<PathBuf>,
        stdout_log: impl Into<PathBuf>,
        stderr_log: impl Into<PathBuf>,
    ) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            args: Vec::new(),
            working_dir: working_dir.into(),
            stdout_log: stdout_log.into(),
            stderr_log: stderr_log.into(),
            env: BTreeMap::new(),
            exec_mode: ExecMode::Fork,
            restart: RestartPolicy::default(),
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_env(mut self, env: BTreeMap<String, String>) -> Self {
        self.env = env;
        self
    }

    pub fn with_exec_mode(mut self, exec_mode: ExecMode) -> Self {
        self.exec_mode = exec_mode;
        self
    }

    pub fn with_restart_policy(mut self, restart: RestartPolicy) -> Self {
        self.restart = restart;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    pub fn stdout_log(&self) -> &Path {
        &self.stdout_log
    }

    pub fn stderr_log(&self) -> &Path {
        &self.stderr_log
    }

    pub fn env(&self) -> &BTreeMap<String, String> {
        &self.env
    }

    pub fn exec_mode(&self) -> ExecMode {
        self.exec_mode
    }

    pub fn restart_policy(&self) -> &RestartPolicy {
        &self.restart
    }

    /// True when stdout and stderr go to the same file
    pub fn merges_logs(&self) -> bool {
        self.stdout_log == self.stderr_log
    }
}
