//! Logging setup using `tracing` + `tracing-subscriber`.
//!
//! Priority for determining the filter:
//! 1. `--log-level` CLI flag (if provided)
//! 2. `--verbose` (debug)
//! 3. `EXECMUX_LOG` environment variable (any `EnvFilter` directive)
//! 4. default to `warn`
//!
//! Logs go to stderr so stdout carries only the commands' output.

use anyhow::{anyhow, Result};
use tracing_subscriber::EnvFilter;

use super::commands::LogLevel;

/// Environment variable holding the log filter
pub const LOG_ENV: &str = "EXECMUX_LOG";

const DEFAULT_DIRECTIVE: &str = "warn";

/// Build the filter for the given CLI settings
pub fn build_filter(cli_level: Option<LogLevel>, verbose: bool) -> EnvFilter {
    match (cli_level, verbose) {
        (Some(level), _) => EnvFilter::new(level.as_str()),
        (None, true) => EnvFilter::new(LogLevel::Debug.as_str()),
        (None, false) => {
            EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE))
        }
    }
}

/// Install the global subscriber. Call once at startup.
pub fn init_logging(cli_level: Option<LogLevel>, verbose: bool) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(build_filter(cli_level, verbose))
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow!("Failed to initialise logging: {}", e))
}
