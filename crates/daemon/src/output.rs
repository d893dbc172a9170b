//! Table rendering for CLI output

use procman_core::application::{LaunchReport, ProcessRecord};
use procman_core::domain::{ProcessSet, ProcessSpec};
use tabled::{Table, Tabled};

#[derive(Tabled)]
struct SpecRow {
    name: String,
    command: String,
    cwd: String,
    stdout: String,
    stderr: String,
    autorestart: String,
}

impl From<&ProcessSpec> for SpecRow {
    fn from(spec: &ProcessSpec) -> Self {
        let mut command = spec.command().to_string();
        for arg in spec.args() {
            command.push(' ');
            command.push_str(arg);
        }

        let policy = spec.restart_policy();
        let autorestart = if policy.autorestart {
            format!("yes (max {})", policy.max_restarts)
        } else {
            "no".to_string()
        };

        Self {
            name: spec.name().to_string(),
            command,
            cwd: spec.working_dir().display().to_string(),
            stdout: spec.stdout_log().display().to_string(),
            stderr: spec.stderr_log().display().to_string(),
            autorestart,
        }
    }
}

#[derive(Tabled)]
struct LaunchRow {
    name: String,
    status: &'static str,
    pid: String,
    detail: String,
}

#[derive(Tabled)]
struct RecordRow {
    name: String,
    state: String,
    restarts: u32,
    last_exit: String,
    last_error: String,
}

pub fn spec_table(set: &ProcessSet) -> String {
    Table::new(set.iter().map(SpecRow::from)).to_string()
}

pub fn launch_table(report: &LaunchReport) -> String {
    let rows = report.outcomes.iter().map(|outcome| match &outcome.result {
        Ok(running) => LaunchRow {
            name: outcome.name.clone(),
            status: "launched",
            pid: running.pid.map(|p| p.to_string()).unwrap_or_default(),
            detail: String::new(),
        },
        Err(e) => LaunchRow {
            name: outcome.name.clone(),
            status: "failed",
            pid: String::new(),
            detail: e.to_string(),
        },
    });
    Table::new(rows).to_string()
}

pub fn record_table(records: &[ProcessRecord]) -> String {
    let rows = records.iter().map(|record| RecordRow {
        name: record.name.clone(),
        state: record.state.to_string(),
        restarts: record.restarts,
        last_exit: record.last_exit.map(|e| e.to_string()).unwrap_or_default(),
        last_error: record.last_error.clone().unwrap_or_default(),
    });
    Table::new(rows).to_string()
}
