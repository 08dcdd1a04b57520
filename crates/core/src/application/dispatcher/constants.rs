// Dispatcher constants (no magic values)
use std::time::Duration;

/// Sleep duration when no jobs are available (1s)
pub const IDLE_SLEEP_DURATION: Duration = Duration::from_secs(1);

/// Sleep duration after a store error before polling again (5s)
pub const ERROR_RECOVERY_SLEEP_DURATION: Duration = Duration::from_secs(5);

/// Floor for the idle poll interval; zero would spin on an empty queue
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(10);
