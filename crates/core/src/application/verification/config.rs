// Verifier configuration

use crate::application::constants::{DEFAULT_ACTIVE_TTL, DEFAULT_REGISTRATION_TTL};
use crate::error::{AppError, Result};
use std::time::Duration;

/// Policies and TTL windows of the verification orchestrator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifierConfig {
    /// Record lifetime between registration and the first state change
    pub registration_ttl: Duration,

    /// Record lifetime refreshed on every progress event and state change
    pub active_ttl: Duration,

    /// Keep downloaded trees after comparison (and reuse them as a cache).
    /// Must match the caching mode of the configured `DownloadStorage`.
    pub keep_downloads: bool,

    /// Remove recorded download directories when a job ends in `error`
    pub cleanup_on_error: bool,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            registration_ttl: DEFAULT_REGISTRATION_TTL,
            active_ttl: DEFAULT_ACTIVE_TTL,
            keep_downloads: false,
            cleanup_on_error: true,
        }
    }
}

impl VerifierConfig {
    pub fn validate(&self) -> Result<()> {
        if self.registration_ttl.is_zero() || self.active_ttl.is_zero() {
            return Err(AppError::Config("TTL windows must be non-zero".to_string()));
        }
        if self.active_ttl < self.registration_ttl {
            return Err(AppError::Config(format!(
                "active TTL ({}s) shorter than registration TTL ({}s)",
                self.active_ttl.as_secs(),
                self.registration_ttl.as_secs()
            )));
        }
        Ok(())
    }
}
