// Application Layer - Use Cases

pub mod launcher;
pub mod restart;
pub mod supervisor;

// Re-exports
pub use launcher::{LaunchOutcome, LaunchReport, Launcher, RunningProcess};
pub use restart::{RestartDecision, RestartTracker};
pub use supervisor::{
    shutdown_channel, ProcessRecord, ProcessState, ShutdownSender, ShutdownToken, Supervisor,
};
