// Supervisor constants (no magic values)
use std::time::Duration;

/// Consecutive unstable restarts before a process is marked errored
pub const DEFAULT_MAX_RESTARTS: u32 = 16;

/// Runs shorter than this count as unstable (1s)
pub const DEFAULT_MIN_UPTIME: Duration = Duration::from_millis(1000);

/// Grace period between SIGTERM and SIGKILL on shutdown (5s)
pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// Growth factor for exponential restart backoff
pub const BACKOFF_FACTOR: f64 = 1.5;

/// Upper bound for exponential restart backoff (15s)
pub const MAX_BACKOFF_DELAY: Duration = Duration::from_secs(15);
