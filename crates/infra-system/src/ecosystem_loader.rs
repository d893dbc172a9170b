// Ecosystem file loader
// reason: serde_json / toml for the file formats, shellexpand for `~` and `$VAR`
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use procman_core::domain::{EcosystemFile, ProcessSet, ResolveContext};
use procman_core::{AppError, Result};

/// Supported ecosystem file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Json,
    Toml,
}

impl FileFormat {
    /// Pick the format from the file extension
    pub fn from_path(path: &Path) -> Result<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Ok(FileFormat::Json),
            Some("toml") => Ok(FileFormat::Toml),
            other => Err(AppError::Config(format!(
                "unsupported ecosystem file extension {:?} (expected .json or .toml)",
                other.unwrap_or("")
            ))),
        }
    }
}

/// Parse an ecosystem document
pub fn parse_ecosystem(text: &str, format: FileFormat) -> Result<EcosystemFile> {
    match format {
        FileFormat::Json => Ok(EcosystemFile::from_json_str(text)?),
        FileFormat::Toml => {
            toml::from_str(text).map_err(|e| AppError::Config(format!("invalid TOML: {}", e)))
        }
    }
}

/// Expand `~`, `$VAR` and `${VAR}` in every path-like field
pub fn expand_paths(file: &mut EcosystemFile) -> Result<()> {
    file.map_paths(|value| {
        shellexpand::full(value)
            .map(|expanded| expanded.into_owned())
            .map_err(|e| AppError::Config(format!("cannot expand '{}': {}", value, e)))
    })
}

/// Load, expand, resolve and validate an ecosystem file
///
/// Relative `cwd` values resolve against the file's directory; `log_dir` is used for
/// entries without `out_file` / `error_file`.
pub fn load_ecosystem(path: &Path, log_dir: &Path) -> Result<ProcessSet> {
    let format = FileFormat::from_path(path)?;
    let text = std::fs::read_to_string(path)?;

    let mut file = parse_ecosystem(&text, format)?;
    expand_paths(&mut file)?;

    let ctx = ResolveContext {
        base_dir: base_dir_of(path)?,
        log_dir: log_dir.to_path_buf(),
    };
    debug!(base_dir = %ctx.base_dir.display(), apps = file.apps.len(), "Resolving ecosystem file");

    let set = file.into_process_set(&ctx)?;
    info!(path = %path.display(), processes = set.len(), "Ecosystem file loaded");
    Ok(set)
}

fn base_dir_of(path: &Path) -> Result<PathBuf> {
    let parent = path.parent().filter(|p| !p.as_os_str().is_empty());
    match parent {
        Some(dir) if dir.is_absolute() => Ok(dir.to_path_buf()),
        Some(dir) => Ok(std::env::current_dir()?.join(dir)),
        None => Ok(std::env::current_dir()?),
    }
}
