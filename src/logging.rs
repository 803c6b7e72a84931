// src/logging.rs

//! Logging setup for `edgewatch` using `tracing` + `tracing-subscriber`.
//!
//! Priority for determining the log level:
//! 1. `--log-level` CLI flag (if provided)
//! 2. `EDGEWATCH_LOG` environment variable (e.g. "info", "debug")
//! 3. `DEBUG` environment variable (any truthy value selects "debug")
//! 4. default to `info`
//!
//! Logs are sent to STDERR so that the runtime's stdout stays readable.

use anyhow::Result;
use tracing_subscriber::fmt;

use crate::cli::LogLevel;

/// Initialise global logging subscriber.
///
/// Safe to call once at startup.
pub fn init_logging(cli_level: Option<LogLevel>) -> Result<()> {
    let level = match cli_level {
        Some(lvl) => level_from_log_level(lvl),
        None => level_from_env(
            std::env::var("EDGEWATCH_LOG").ok().as_deref(),
            std::env::var("DEBUG").ok().as_deref(),
        ),
    };

    fmt()
        .with_max_level(level)
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .init();

    Ok(())
}

/// Pick a level from the `EDGEWATCH_LOG` and `DEBUG` variables.
pub fn level_from_env(log_var: Option<&str>, debug_var: Option<&str>) -> tracing::Level {
    if let Some(level) = log_var.and_then(parse_level_str) {
        return level;
    }
    if debug_var.is_some_and(is_truthy) {
        return tracing::Level::DEBUG;
    }
    tracing::Level::INFO
}

fn is_truthy(s: &str) -> bool {
    !matches!(s.trim().to_lowercase().as_str(), "" | "0" | "false" | "off" | "no")
}

fn level_from_log_level(lvl: LogLevel) -> tracing::Level {
    match lvl {
        LogLevel::Error => tracing::Level::ERROR,
        LogLevel::Warn => tracing::Level::WARN,
        LogLevel::Info => tracing::Level::INFO,
        LogLevel::Debug => tracing::Level::DEBUG,
        LogLevel::Trace => tracing::Level::TRACE,
    }
}

fn parse_level_str(s: &str) -> Option<tracing::Level> {
    match s.trim().to_lowercase().as_str() {
        "error" => Some(tracing::Level::ERROR),
        "warn" | "warning" => Some(tracing::Level::WARN),
        "info" => Some(tracing::Level::INFO),
        "debug" => Some(tracing::Level::DEBUG),
        "trace" => Some(tracing::Level::TRACE),
        _ => None,
    }
}
