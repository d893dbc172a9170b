// Ecosystem file wire format (pm2-style `apps` array)

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::domain::error::Result;
use crate::domain::process_set::ProcessSet;
use crate::domain::process_spec::{ExecMode, ProcessSpec, RestartPolicy};

/// Top-level ecosystem document
#[derive(Debug, Clone, Deserialize)]
pub struct EcosystemFile {
    pub apps: Vec<AppEntry>,
}

/// `args` accepts a list or a single whitespace-separated string
///
/// The string form has no shell quoting: `"-c 'echo hi'"` yields three
/// arguments `-c`, `'echo` and `hi'`. Use the list form for arguments with
/// spaces.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Args {
    List(Vec<String>),
    Line(String),
}

impl Args {
    pub fn into_vec(self) -> Vec<String> {
        match self {
            Args::List(list) => list,
            Args::Line(line) => line.split_whitespace().map(str::to_string).collect(),
        }
    }
}

/// Environment values may be written as strings, numbers or booleans
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum EnvValue {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl std::fmt::Display for EnvValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EnvValue::Str(s) => write!(f, "{}", s),
            EnvValue::Int(i) => write!(f, "{}", i),
            EnvValue::Float(x) => write!(f, "{}", x),
            EnvValue::Bool(b) => write!(f, "{}", b),
        }
    }
}

/// One entry of the `apps` array
///
/// Durations (`min_uptime`, `restart_delay`, `exp_backoff_restart_delay`) are in ms.
#[derive(Debug, Clone, Deserialize)]
pub struct AppEntry {
    pub name: String,
    #[serde(alias = "command")]
    pub script: String,
    #[serde(default)]
    pub exec_mode: ExecMode,
    #[serde(default)]
    pub args: Option<Args>,
    #[serde(default)]
    pub cwd: Option<String>,
    #[serde(default, alias = "output")]
    pub out_file: Option<String>,
    #[serde(default, alias = "error")]
    pub error_file: Option<String>,
    #[serde(default)]
    pub env: BTreeMap<String, EnvValue>,
    #[serde(default)]
    pub autorestart: Option<bool>,
    #[serde(default)]
    pub max_restarts: Option<u32>,
    #[serde(default)]
    pub min_uptime: Option<u64>,
    #[serde(default)]
    pub restart_delay: Option<u64>,
    #[serde(default)]
    pub exp_backoff_restart_delay: Option<u64>,
}

/// Directories used to resolve relative paths
#[derive(Debug, Clone)]
pub struct ResolveContext {
    /// Directory containing the ecosystem file; base for relative `cwd`
    pub base_dir: PathBuf,
    /// Directory for default log files; relative values resolve against the process cwd
    pub log_dir: PathBuf,
}

impl EcosystemFile {
    pub fn from_json_str(s: &str) -> serde_json::Result<Self> {
        serde_json::from_str(s)
    }

    /// Apply `f` to every path-like string field (script, cwd, out_file, error_file)
    pub fn map_paths<E, F>(&mut self, mut f: F) -> std::result::Result<(), E>
    where
        F: FnMut(&str) -> std::result::Result<String, E>,
    {
        for app in &mut self.apps {
            app.script = f(&app.script)?;
            for field in [&mut app.cwd, &mut app.out_file, &mut app.error_file] {
                if let Some(value) = field.as_mut() {
                    *value = f(value)?;
                }
            }
        }
        Ok(())
    }

    /// Resolve every entry and validate the resulting set
    pub fn into_process_set(self, ctx: &ResolveContext) -> Result<ProcessSet> {
        let specs = self
            .apps
            .into_iter()
            .map(|app| app.into_spec(ctx))
            .collect();
        ProcessSet::new(specs)
    }
}

impl AppEntry {
    /// Convert to a ProcessSpec, resolving relative paths
    pub fn into_spec(self, ctx: &ResolveContext) -> ProcessSpec {
        let cwd = match &self.cwd {
            Some(dir) => resolve(&ctx.base_dir, Path::new(dir)),
            None => ctx.base_dir.clone(),
        };

        let default_log = |suffix: &str| ctx.log_dir.join(format!("{}-{}.log", self.name, suffix));
        let stdout_log = self
            .out_file
            .as_deref()
            .map(PathBuf::from)
            .unwrap_or_else(|| default_log("out"));
        let stderr_log = self
            .error_file
            .as_deref()
            .map(PathBuf::from)
            .unwrap_or_else(|| default_log("error"));

        let stdout_log = resolve(&cwd, &stdout_log);
        let stderr_log = resolve(&cwd, &stderr_log);

        let defaults = RestartPolicy::default();
        let restart = RestartPolicy {
            autorestart: self.autorestart.unwrap_or(defaults.autorestart),
            max_restarts: self.max_restarts.unwrap_or(defaults.max_restarts),
            min_uptime: self
                .min_uptime
                .map(Duration::from_millis)
                .unwrap_or(defaults.min_uptime),
            restart_delay: self
                .restart_delay
                .map(Duration::from_millis)
                .unwrap_or(defaults.restart_delay),
            exp_backoff_restart_delay: self.exp_backoff_restart_delay.map(Duration::from_millis),
        };

        let env = self
            .env
            .into_iter()
            .map(|(k, v)| (k, v.to_string()))
            .collect();

        ProcessSpec::new(self.name, self.script, cwd, stdout_log, stderr_log)
            .with_args(self.args.map(Args::into_vec).unwrap_or_default())
            .with_env(env)
            .with_exec_mode(self.exec_mode)
            .with_restart_policy(restart)
    }
}

fn resolve(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}
