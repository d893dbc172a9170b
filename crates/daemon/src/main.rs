//! Procman - Main Entry Point
//! Launches and supervises the processes declared in an ecosystem file

mod logging;
mod output;
mod settings;
mod signals;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{info, warn};

// Import workspace crates
use procman_core::application::{shutdown_channel, Launcher, ProcessState, Supervisor};
use procman_core::domain::ProcessSet;
use procman_core::port::time_provider::SystemTimeProvider;
use procman_infra_system::{load_ecosystem, SubprocessSpawner};
use settings::{LogFormat, Settings};
use signals::ShutdownSignal;

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "procman")]
#[command(about = "Launch and supervise processes from an ecosystem file", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log format for supervisor output (overrides PROCMAN_LOG_FORMAT)
    #[arg(long, global = true, value_enum)]
    log_format: Option<LogFormat>,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate an ecosystem file and show the resolved processes
    Check {
        /// Ecosystem file (.json or .toml)
        file: PathBuf,
    },

    /// Spawn every process once and exit without supervising
    Launch {
        /// Ecosystem file (.json or .toml)
        file: PathBuf,

        /// Only launch these processes (repeatable)
        #[arg(long = "only", value_name = "NAME")]
        only: Vec<String>,
    },

    /// Launch and supervise until Ctrl+C / SIGTERM
    Start {
        /// Ecosystem file (.json or .toml)
        file: PathBuf,

        /// Only start these processes (repeatable)
        #[arg(long = "only", value_name = "NAME")]
        only: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // 1. Load settings and initialize logging
    let settings = Settings::load().context("Failed to load PROCMAN_* settings")?;
    let format = cli.log_format.unwrap_or(settings.log_format);
    let _log_guard = logging::init(format, settings.log_file.as_deref())?;

    info!("Procman v{} starting...", VERSION);

    match cli.command {
        Commands::Check { file } => check(&file, &settings),
        Commands::Launch { file, only } => launch(&file, &only, &settings).await,
        Commands::Start { file, only } => start(&file, &only, &settings).await,
    }
}

fn load_set(file: &Path, only: &[String], settings: &Settings) -> Result<ProcessSet> {
    let set = load_ecosystem(file, &settings.log_dir)
        .with_context(|| format!("Failed to load {}", file.display()))?;

    if only.is_empty() {
        Ok(set)
    } else {
        Ok(set.select(only)?)
    }
}

fn spawner(settings: &Settings) -> SubprocessSpawner {
    match &settings.env_allowlist {
        Some(allowlist) => SubprocessSpawner::with_env_allowlist(allowlist.clone()),
        None => SubprocessSpawner::new(),
    }
}

fn check(file: &Path, settings: &Settings) -> Result<ExitCode> {
    match load_set(file, &[], settings) {
        Ok(set) => {
            println!(
                "{}",
                format!("✓ {} is valid ({} processes)", file.display(), set.len())
                    .green()
                    .bold()
            );
            println!();
            println!("{}", output::spec_table(&set));
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            println!("{} {:#}", "✗ Invalid ecosystem file:".red().bold(), e);
            Ok(ExitCode::FAILURE)
        }
    }
}

async fn launch(file: &Path, only: &[String], settings: &Settings) -> Result<ExitCode> {
    let set = load_set(file, only, settings)?;

    let launcher = Launcher::new(Arc::new(spawner(settings)), Arc::new(SystemTimeProvider));
    let report = launcher.launch_all(&set).await;

    println!("{}", output::launch_table(&report));

    if report.all_succeeded() {
        println!("{}", "✓ All processes launched".green().bold());
        Ok(ExitCode::SUCCESS)
    } else {
        let failed = report.failures().count();
        println!(
            "{}",
            format!("✗ {} of {} processes failed to launch", failed, set.len())
                .red()
                .bold()
        );
        Ok(ExitCode::FAILURE)
    }
}

async fn start(file: &Path, only: &[String], settings: &Settings) -> Result<ExitCode> {
    let set = load_set(file, only, settings)?;

    let supervisor = Supervisor::new(Arc::new(spawner(settings)), Arc::new(SystemTimeProvider))
        .with_stop_timeout(settings.stop_timeout());

    let (shutdown_tx, shutdown_rx) = shutdown_channel();
    let signal = ShutdownSignal::install().context("Failed to install signal handlers")?;

    tokio::spawn(async move {
        match signal.recv().await {
            Ok(()) => info!("Shutdown signal received. Stopping processes..."),
            Err(e) => warn!(error = %e, "Signal handler failed, stopping processes"),
        }
        shutdown_tx.shutdown();
    });

    info!(processes = set.len(), "Supervising. Press Ctrl+C to stop");
    let records = supervisor.run(&set, shutdown_rx).await;

    println!("{}", output::record_table(&records));

    let errored = records
        .iter()
        .filter(|r| r.state == ProcessState::Errored)
        .count();
    if errored == 0 {
        info!("Shutdown complete.");
        Ok(ExitCode::SUCCESS)
    } else {
        warn!(errored, "Some processes ended in errored state");
        Ok(ExitCode::FAILURE)
    }
}
