//! Logging setup for binaries and tests.

use crate::{Error, ErrorContext, Result};
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Parse a level name. Accepts tracing names plus `warning` and `critical`.
pub fn parse_level(level: &str) -> Result<Level> {
    match level.trim().to_ascii_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" | "warning" => Ok(Level::WARN),
        "error" | "critical" => Ok(Level::ERROR),
        other => Err(Error::configuration_with_context(
            format!("Invalid log level: {}", other),
            ErrorContext::new()
                .with_field_path("log_level")
                .with_details("expected one of trace, debug, info, warning, error, critical")
                .with_source("logging"),
        )),
    }
}

/// Install a global fmt subscriber at `level`.
///
/// `RUST_LOG` takes precedence when set. Calling this again after a
/// subscriber is installed is a no-op.
pub fn init_logging(level: &str) -> Result<()> {
    let level = parse_level(level)?;
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_ascii_lowercase()));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
    Ok(())
}
