use std::time::Duration;

/// Model-file events closer together than this collapse into one reload.
pub const DEBOUNCE_WINDOW: Duration = Duration::from_millis(500);

pub const STARTUP_ATTEMPTS: u32 = 15;
pub const STARTUP_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Client-side retries while the daemon socket is coming up.
pub const STATUS_ATTEMPTS: u32 = 5;
pub const STATUS_RETRY_DELAY: Duration = Duration::from_millis(100);
