// Restart decisions for supervised processes
use crate::application::supervisor::constants::{BACKOFF_FACTOR, MAX_BACKOFF_DELAY};
use crate::domain::RestartPolicy;
use std::time::Duration;
use tracing::{info, warn};

/// Restart decision result
#[derive(Debug, PartialEq, Eq)]
pub enum RestartDecision {
    /// Restart the process after the given delay
    Restart(Duration),
    /// Too many unstable restarts, process is errored
    GiveUp,
    /// Autorestart disabled, leave the process stopped
    Stop,
}

/// Tracks consecutive unstable restarts for one process
///
/// A run shorter than `min_uptime` is unstable. A stable run resets the count.
#[derive(Debug, Default, Clone)]
pub struct RestartTracker {
    unstable_restarts: u32,
    total_restarts: u32,
}

impl RestartTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restarts performed so far (stable and unstable)
    pub fn total_restarts(&self) -> u32 {
        self.total_restarts
    }

    pub fn unstable_restarts(&self) -> u32 {
        self.unstable_restarts
    }

    /// Decide what to do after the process ran for `uptime` and exited
    ///
    /// Backoff formula:
    /// delay = base * (BACKOFF_FACTOR ^ (unstable_restarts - 1)), capped at MAX_BACKOFF_DELAY
    pub fn on_exit(
        &mut self,
        name: &str,
        policy: &RestartPolicy,
        uptime: Duration,
    ) -> RestartDecision {
        if !policy.autorestart {
            info!(name = %name, "Autorestart disabled, not restarting");
            return RestartDecision::Stop;
        }

        if uptime >= policy.min_uptime {
            self.unstable_restarts = 0;
        } else {
            self.unstable_restarts += 1;
        }

        if self.unstable_restarts > policy.max_restarts {
            warn!(
                name = %name,
                unstable_restarts = %self.unstable_restarts,
                max_restarts = %policy.max_restarts,
                "Max unstable restarts reached"
            );
            return RestartDecision::GiveUp;
        }

        let delay = match policy.exp_backoff_restart_delay {
            Some(base) => {
                let exponent = self.unstable_restarts.saturating_sub(1) as i32;
                let scaled_ms = base.as_millis() as f64 * BACKOFF_FACTOR.powi(exponent);
                Duration::from_millis(scaled_ms.round() as u64).min(MAX_BACKOFF_DELAY)
            }
            None => policy.restart_delay,
        };

        self.total_restarts += 1;

        info!(
            name = %name,
            restarts = %self.total_restarts,
            unstable_restarts = %self.unstable_restarts,
            delay_ms = %delay.as_millis(),
            "Scheduling restart"
        );

        RestartDecision::Restart(delay)
    }
}
