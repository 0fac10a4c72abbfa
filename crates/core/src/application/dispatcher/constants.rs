// Dispatcher constants (No magic values)
use std::time::Duration;

/// Interval between drain attempts when nothing else wakes the dispatcher (500ms)
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Sleep duration after a dispatcher error before retry (1s)
pub const ERROR_RECOVERY_SLEEP_DURATION: Duration = Duration::from_secs(1);

/// Maximum admissions per drain
pub const DEFAULT_DRAIN_LIMIT: usize = 16;
