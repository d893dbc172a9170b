//! Supervisor settings
//!
//! Layered with the `config` crate: built-in defaults, then `PROCMAN_*`
//! environment variables.
//!
//! | Variable                  | Default  |
//! |---------------------------|----------|
//! | `PROCMAN_LOG_FORMAT`      | `pretty` |
//! | `PROCMAN_LOG_FILE`        | unset    |
//! | `PROCMAN_LOG_DIR`         | `logs`   |
//! | `PROCMAN_STOP_TIMEOUT_MS` | `5000`   |
//! | `PROCMAN_ENV_ALLOWLIST`   | unset    |
//!
//! `PROCMAN_ENV_ALLOWLIST` is a comma-separated list of variable names. When
//! set, children inherit only those variables from the supervisor.

use config::{Config, ConfigError, Environment};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

const ENV_PREFIX: &str = "PROCMAN";
const LIST_SEPARATOR: &str = ",";

/// Output format for the supervisor's own logs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub log_format: LogFormat,
    /// Optional file receiving the supervisor's own logs
    pub log_file: Option<PathBuf>,
    /// Directory for child logs when an app sets no out_file / error_file
    pub log_dir: PathBuf,
    pub stop_timeout_ms: u64,
    /// Parent variables children may inherit (all when unset)
    pub env_allowlist: Option<Vec<String>>,
}

impl Settings {
    /// Load from defaults and the process environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_env(Environment::with_prefix(ENV_PREFIX))
    }

    fn from_env(env: Environment) -> Result<Self, ConfigError> {
        Config::builder()
            .set_default("log_format", "pretty")?
            .set_default("log_dir", "logs")?
            .set_default("stop_timeout_ms", 5000)?
            .add_source(
                env.try_parsing(true)
                    .list_separator(LIST_SEPARATOR)
                    .with_list_parse_key("env_allowlist"),
            )
            .build()?
            .try_deserialize()
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(vars: &[(&str, &str)]) -> Environment {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Environment::with_prefix(ENV_PREFIX).source(Some(map))
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::from_env(env(&[])).unwrap();

        assert_eq!(settings.log_format, LogFormat::Pretty);
        assert_eq!(settings.log_dir, PathBuf::from("logs"));
        assert!(settings.log_file.is_none());
        assert_eq!(settings.stop_timeout(), Duration::from_secs(5));
        assert!(settings.env_allowlist.is_none());
    }

    #[test]
    fn test_env_overrides() {
        let settings = Settings::from_env(env(&[
            ("PROCMAN_LOG_FORMAT", "json"),
            ("PROCMAN_LOG_DIR", "/var/log/procman"),
            ("PROCMAN_LOG_FILE", "/var/log/procman/supervisor.log"),
            ("PROCMAN_STOP_TIMEOUT_MS", "250"),
        ]))
        .unwrap();

        assert_eq!(settings.log_format, LogFormat::Json);
        assert_eq!(settings.log_dir, PathBuf::from("/var/log/procman"));
        assert_eq!(
            settings.log_file,
            Some(PathBuf::from("/var/log/procman/supervisor.log"))
        );
        assert_eq!(settings.stop_timeout(), Duration::from_millis(250));
    }

    #[test]
    fn test_env_allowlist_is_split() {
        let settings = Settings::from_env(env(&[
            ("PROCMAN_ENV_ALLOWLIST", "PATH,HOME,LANG"),
            ("PROCMAN_LOG_FILE", "/tmp/a,b.log"),
        ]))
        .unwrap();

        assert_eq!(
            settings.env_allowlist,
            Some(vec!["PATH".to_string(), "HOME".to_string(), "LANG".to_string()])
        );
        assert_eq!(settings.log_file, Some(PathBuf::from("/tmp/a,b.log")));
    }

    #[test]
    fn test_single_allowlist_entry() {
        let settings = Settings::from_env(env(&[("PROCMAN_ENV_ALLOWLIST", "PATH")])).unwrap();

        assert_eq!(settings.env_allowlist, Some(vec!["PATH".to_string()]));
    }

    #[test]
    fn test_invalid_format_rejected() {
        assert!(Settings::from_env(env(&[("PROCMAN_LOG_FORMAT", "xml")])).is_err());
    }
}
