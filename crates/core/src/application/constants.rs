// Verification constants (no magic values)
use std::time::Duration;

/// Key prefix of every job record in the shared store
pub const JOB_KEY_PREFIX: &str = "verify-";

/// Record TTL between registration and the start of execution (5 minutes)
pub const DEFAULT_REGISTRATION_TTL: Duration = Duration::from_secs(300);

/// Record TTL refreshed on every progress event and state change (30 minutes)
pub const DEFAULT_ACTIVE_TTL: Duration = Duration::from_secs(1800);

/// Attempts at generating a job id whose key is not already taken
pub const MAX_ID_ATTEMPTS: u32 = 5;

/// Concurrent job executions on the default worker pool
pub const DEFAULT_MAX_WORKERS: usize = 4;

/// How often status pollers re-read a job record
pub const STATUS_POLL_INTERVAL: Duration = Duration::from_millis(500);
