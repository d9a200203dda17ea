//! Log level resolution and subscriber setup

use thiserror::Error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Environment variable consulted when `--log` is not given
pub const LOG_LEVEL_ENV: &str = "LOG_LEVEL";

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("Unknown log level {0:?} (expected trace, debug, info, warn or error)")]
    UnknownLevel(String),

    #[error("Failed to install logger: {0}")]
    Init(String),
}

/// Canonical filter directive for a user-supplied level name.
pub fn normalize_level(level: &str) -> Result<&'static str, LoggingError> {
    match level.trim().to_ascii_lowercase().as_str() {
        "trace" => Ok("trace"),
        "debug" => Ok("debug"),
        "info" => Ok("info"),
        "warn" | "warning" => Ok("warn"),
        "error" => Ok("error"),
        _ => Err(LoggingError::UnknownLevel(level.to_string())),
    }
}

/// Pick the level: `--log` flag, then `LOG_LEVEL`, then the config file.
pub fn resolve_level(
    flag: Option<&str>,
    env: Option<&str>,
    configured: &str,
) -> Result<&'static str, LoggingError> {
    let chosen = flag
        .or_else(|| env.filter(|value| !value.trim().is_empty()))
        .unwrap_or(configured);
    normalize_level(chosen)
}

/// Install a stderr fmt subscriber filtered at `level`.
pub fn init(level: &str) -> Result<(), LoggingError> {
    let level = normalize_level(level)?;
    let filter = EnvFilter::try_new(level).map_err(|e| LoggingError::Init(e.to_string()))?;

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| LoggingError::Init(e.to_string()))?;

    tracing::debug!(level, "logging initialized");
    Ok(())
}
