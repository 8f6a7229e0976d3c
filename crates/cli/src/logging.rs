// Logging setup: EnvFilter + pretty or JSON formatting, always on stderr

use anyhow::{Context, Result};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

// Prefix match: also covers mirrorcheck_core and the infra crates
const DEFAULT_FILTER: &str = "mirrorcheck=info";

/// Initialize logging
///
/// # Environment Variables
///
/// - `RUST_LOG`: filter directives (default: info for mirrorcheck crates)
/// - `MIRRORCHECK_LOG_FORMAT`: `json` for structured output, anything else for pretty
pub fn init_logging() -> Result<()> {
    let log_format =
        std::env::var("MIRRORCHECK_LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(DEFAULT_FILTER))
        .context("Failed to create env filter")?;

    match log_format.as_str() {
        "json" => tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init(),
        _ => tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().pretty().with_writer(std::io::stderr))
            .try_init(),
    }
    .context("Failed to install tracing subscriber")
}
