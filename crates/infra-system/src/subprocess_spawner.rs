// Subprocess spawner implementation
// reason: async-trait, tokio for async process management
use async_trait::async_trait;
use std::ffi::OsString;
use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::process::{Child, Command};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use procman_core::domain::ProcessSpec;
use procman_core::port::{ChildHandle, ExitInfo, ProcessSpawner, SpawnError};

/// Subprocess spawner
///
/// Spawns detached-from-stdin child processes with stdout/stderr appended to the
/// spec's log files. The parent environment is inherited unless an allowlist is set.
#[derive(Debug, Default, Clone)]
pub struct SubprocessSpawner {
    env_allowlist: Option<Vec<String>>,
}

impl SubprocessSpawner {
    /// Create a spawner that passes the full parent environment through
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a spawner that only passes allowlisted parent variables through
    ///
    /// Variables from `ProcessSpec::env` are always applied.
    ///
    /// # Example
    /// ```ignore
    /// let spawner = SubprocessSpawner::with_env_allowlist(
    ///     vec!["PATH".to_string(), "HOME".to_string(), "USER".to_string()],
    /// );
    /// ```
    pub fn with_env_allowlist(env_allowlist: Vec<String>) -> Self {
        Self {
            env_allowlist: Some(env_allowlist),
        }
    }

    /// Filter environment variables to allowlist only
    ///
    /// Names that are not valid UTF-8 can never match and are dropped.
    fn filter_env<I>(&self, env: I) -> Vec<(OsString, OsString)>
    where
        I: IntoIterator<Item = (OsString, OsString)>,
    {
        match &self.env_allowlist {
            Some(allowlist) => env
                .into_iter()
                .filter(|(k, _)| k.to_str().is_some_and(|k| allowlist.iter().any(|a| a == k)))
                .collect(),
            None => env.into_iter().collect(),
        }
    }

    /// Build the command with args, cwd, env and log redirection applied
    fn build_command(&self, spec: &ProcessSpec) -> Result<Command, SpawnError> {
        let stdout = open_log(spec.stdout_log())?;
        let stderr = if spec.merges_logs() {
            stdout.try_clone().map_err(|e| SpawnError::LogFile {
                path: spec.stderr_log().to_path_buf(),
                reason: e.to_string(),
            })?
        } else {
            open_log(spec.stderr_log())?
        };

        let mut command = Command::new(spec.command());
        command
            .args(spec.args())
            .current_dir(spec.working_dir())
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(stderr));

        if self.env_allowlist.is_some() {
            command.env_clear().envs(self.filter_env(std::env::vars_os()));
        }
        command.envs(spec.env());

        Ok(command)
    }
}

/// Open a log file for appending, creating parent directories as needed
fn open_log(path: &Path) -> Result<File, SpawnError> {
    let to_err = |e: io::Error| SpawnError::LogFile {
        path: path.to_path_buf(),
        reason: e.to_string(),
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(to_err)?;
    }

    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(to_err)
}

/// Map a spawn-time io::Error (cwd already verified) to a SpawnError
fn classify_spawn_error(command: &str, err: io::Error) -> SpawnError {
    match err.kind() {
        io::ErrorKind::NotFound => SpawnError::ExecutableNotFound(command.to_string()),
        io::ErrorKind::PermissionDenied => SpawnError::PermissionDenied(command.to_string()),
        _ => SpawnError::IoError(format!("{}: {}", command, err)),
    }
}

fn exit_info(status: ExitStatus) -> ExitInfo {
    #[cfg(unix)]
    let signal = {
        use std::os::unix::process::ExitStatusExt;
        status.signal()
    };

    #[cfg(not(unix))]
    let signal = None;

    ExitInfo {
        code: status.code(),
        signal,
    }
}

#[async_trait]
impl ProcessSpawner for SubprocessSpawner {
    async fn spawn(&self, spec: &ProcessSpec) -> Result<Box<dyn ChildHandle>, SpawnError> {
        let is_dir = tokio::fs::metadata(spec.working_dir())
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false);
        if !is_dir {
            return Err(SpawnError::WorkingDirNotFound(
                spec.working_dir().to_path_buf(),
            ));
        }

        info!(
            name = %spec.name(),
            command = %spec.command(),
            args = ?spec.args(),
            working_dir = %spec.working_dir().display(),
            stdout_log = %spec.stdout_log().display(),
            stderr_log = %spec.stderr_log().display(),
            "Spawning subprocess"
        );

        let child = self
            .build_command(spec)?
            .spawn()
            .map_err(|e| classify_spawn_error(spec.command(), e))?;

        debug!(name = %spec.name(), pid = ?child.id(), "Subprocess spawned");

        Ok(Box::new(SubprocessChild {
            name: spec.name().to_string(),
            child,
        }))
    }
}

/// Running OS child process
pub struct SubprocessChild {
    name: String,
    child: Child,
}

impl SubprocessChild {
    /// Send SIGTERM first, then SIGKILL if the grace period elapses
    async fn terminate_graceful(&mut self, grace: Duration) -> Result<ExitInfo, SpawnError> {
        #[cfg(unix)]
        if let Some(pid) = self.child.id() {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;

            info!(name = %self.name, pid = %pid, "Sending SIGTERM for graceful shutdown");
            kill(Pid::from_raw(pid as i32), Signal::SIGTERM)
                .map_err(|e| SpawnError::Terminate(format!("SIGTERM failed: {}", e)))?;

            match timeout(grace, self.child.wait()).await {
                Ok(Ok(status)) => {
                    info!(
                        name = %self.name,
                        pid = %pid,
                        "Process exited gracefully after SIGTERM"
                    );
                    return Ok(exit_info(status));
                }
                Ok(Err(e)) => return Err(SpawnError::IoError(e.to_string())),
                Err(_) => {
                    warn!(
                        name = %self.name,
                        pid = %pid,
                        "Process did not exit after SIGTERM, sending SIGKILL"
                    );
                }
            }
        }

        // Non-unix, timed-out, or already-reaped child: force kill and reap
        if self.child.id().is_some() {
            self.child
                .kill()
                .await
                .map_err(|e| SpawnError::Terminate(format!("kill failed: {}", e)))?;
        }

        self.child
            .wait()
            .await
            .map(exit_info)
            .map_err(|e| SpawnError::IoError(e.to_string()))
    }
}

#[async_trait]
impl ChildHandle for SubprocessChild {
    fn pid(&self) -> Option<u32> {
        self.child.id()
    }

    async fn wait(&mut self) -> Result<ExitInfo, SpawnError> {
        self.child
            .wait()
            .await
            .map(exit_info)
            .map_err(|e| SpawnError::IoError(e.to_string()))
    }

    async fn terminate(&mut self, grace: Duration) -> Result<ExitInfo, SpawnError> {
        self.terminate_graceful(grace).await
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    fn sh_spec(dir: &TempDir, name: &str, script: &str) -> ProcessSpec {
        ProcessSpec::new(
            name,
            "sh",
            dir.path(),
            dir.path().join("logs").join(format!("{}-out.log", name)),
            dir.path().join("logs").join(format!("{}-err.log", name)),
        )
        .with_args(["-c", script])
    }

    #[tokio::test]
    async fn test_spawn_redirects_output() {
        let dir = TempDir::new().unwrap();
        let spec = sh_spec(&dir, "echo", "echo hello; echo oops >&2");

        let mut child = SubprocessSpawner::new().spawn(&spec).await.unwrap();
        let exit = child.wait().await.unwrap();

        assert!(exit.success());
        let out = std::fs::read_to_string(spec.stdout_log()).unwrap();
        let err = std::fs::read_to_string(spec.stderr_log()).unwrap();
        assert_eq!(out, "hello\n");
        assert_eq!(err, "oops\n");
    }

    #[tokio::test]
    async fn test_logs_are_appended() {
        let dir = TempDir::new().unwrap();
        let spec = sh_spec(&dir, "twice", "echo run");
        let spawner = SubprocessSpawner::new();

        for _ in 0..2 {
            spawner.spawn(&spec).await.unwrap().wait().await.unwrap();
        }

        let out = std::fs::read_to_string(spec.stdout_log()).unwrap();
        assert_eq!(out, "run\nrun\n");
    }

    #[tokio::test]
    async fn test_merged_logs_share_one_file() {
        let dir = TempDir::new().unwrap();
        let log = dir.path().join("all.log");
        let spec = ProcessSpec::new("merged", "sh", dir.path(), &log, &log)
            .with_args(["-c", "echo out; echo err >&2"]);

        let mut child = SubprocessSpawner::new().spawn(&spec).await.unwrap();
        child.wait().await.unwrap();

        let all = std::fs::read_to_string(&log).unwrap();
        assert!(all.contains("out\n"));
        assert!(all.contains("err\n"));
    }

    #[tokio::test]
    async fn test_missing_working_dir() {
        let dir = TempDir::new().unwrap();
        let spec = ProcessSpec::new(
            "nowhere",
            "sh",
            "/nonexistent",
            dir.path().join("out.log"),
            dir.path().join("err.log"),
        );

        let result = SubprocessSpawner::new().spawn(&spec).await;

        assert!(matches!(
            result,
            Err(SpawnError::WorkingDirNotFound(p)) if p == Path::new("/nonexistent")
        ));
    }

    #[tokio::test]
    async fn test_missing_executable() {
        let dir = TempDir::new().unwrap();
        let spec = ProcessSpec::new(
            "ghost",
            "definitely-not-a-real-binary-4711",
            dir.path(),
            dir.path().join("out.log"),
            dir.path().join("err.log"),
        );

        let result = SubprocessSpawner::new().spawn(&spec).await;

        assert!(matches!(result, Err(SpawnError::ExecutableNotFound(_))));
    }

    #[tokio::test]
    async fn test_spec_env_is_applied() {
        let dir = TempDir::new().unwrap();
        let mut env = BTreeMap::new();
        env.insert("GREETING".to_string(), "bonjour".to_string());
        let spec = sh_spec(&dir, "env", "echo $GREETING").with_env(env);

        let spawner = SubprocessSpawner::with_env_allowlist(vec!["PATH".to_string()]);
        spawner.spawn(&spec).await.unwrap().wait().await.unwrap();

        let out = std::fs::read_to_string(spec.stdout_log()).unwrap();
        assert_eq!(out, "bonjour\n");
    }

    #[tokio::test]
    async fn test_terminate_sends_sigterm() {
        let dir = TempDir::new().unwrap();
        let spec = sh_spec(&dir, "sleeper", "exec sleep 30");

        let mut child = SubprocessSpawner::new().spawn(&spec).await.unwrap();
        assert!(child.pid().is_some());

        let exit = child.terminate(Duration::from_secs(5)).await.unwrap();

        assert_eq!(exit.signal, Some(15));
    }

    #[tokio::test]
    async fn test_terminate_escalates_to_sigkill() {
        let dir = TempDir::new().unwrap();
        let spec = sh_spec(&dir, "stubborn", "trap '' TERM; while true; do sleep 0.05; done");

        let mut child = SubprocessSpawner::new().spawn(&spec).await.unwrap();
        // let the shell install its trap
        tokio::time::sleep(Duration::from_millis(200)).await;

        let exit = child.terminate(Duration::from_millis(200)).await.unwrap();

        assert_eq!(exit.signal, Some(9));
    }

    #[test]
    fn test_env_filtering() {
        use std::os::unix::ffi::OsStringExt;

        let spawner = SubprocessSpawner::with_env_allowlist(vec!["ALLOWED_VAR".to_string()]);

        let env = vec![
            (OsString::from("ALLOWED_VAR"), OsString::from("value1")),
            (OsString::from("BLOCKED_VAR"), OsString::from("value2")),
            (OsString::from_vec(vec![0xff, 0xfe]), OsString::from("value3")),
        ];

        let filtered = spawner.filter_env(env);

        assert_eq!(
            filtered,
            vec![(OsString::from("ALLOWED_VAR"), OsString::from("value1"))]
        );
    }

    #[tokio::test]
    async fn test_allowlist_hides_parent_env() {
        let dir = TempDir::new().unwrap();
        let spec = sh_spec(&dir, "filtered", "echo \"home=${HOME:-unset}\"");

        let spawner = SubprocessSpawner::with_env_allowlist(vec!["PATH".to_string()]);
        spawner.spawn(&spec).await.unwrap().wait().await.unwrap();

        let out = std::fs::read_to_string(spec.stdout_log()).unwrap();
        assert_eq!(out, "home=unset\n");
    }

    #[tokio::test]
    async fn test_non_executable_command() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let script = dir.path().join("noexec.sh");
        std::fs::write(&script, "#!/bin/sh\necho never\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o644)).unwrap();

        let spec = ProcessSpec::new(
            "noexec",
            script.to_string_lossy(),
            dir.path(),
            dir.path().join("out.log"),
            dir.path().join("err.log"),
        );

        let result = SubprocessSpawner::new().spawn(&spec).await;

        assert!(matches!(
            result,
            Err(SpawnError::PermissionDenied(cmd)) if cmd == script.to_string_lossy()
        ));
    }

    #[tokio::test]
    async fn test_log_under_regular_file() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "not a directory").unwrap();

        let spec = ProcessSpec::new(
            "blocked",
            "sh",
            dir.path(),
            blocker.join("out.log"),
            dir.path().join("err.log"),
        )
        .with_args(["-c", "true"]);

        let result = SubprocessSpawner::new().spawn(&spec).await;

        assert!(matches!(
            result,
            Err(SpawnError::LogFile { path, .. }) if path == blocker.join("out.log")
        ));
    }
}
