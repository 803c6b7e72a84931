// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Command-line arguments for `edgewatch`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "edgewatch",
    version,
    about = "Serve local edge functions and restart the runtime when their sources change.",
    long_about = None
)]
pub struct CliArgs {
    /// Project root (the directory containing `supabase/`).
    #[arg(long, value_name = "PATH", default_value = ".")]
    pub workdir: PathBuf,

    /// Shell command that runs the edge runtime.
    ///
    /// It is started once at boot and again after every restart, with the
    /// mount plan passed as JSON in `EDGEWATCH_MOUNT_PLAN`.
    #[arg(long, value_name = "CMD", default_value = "echo edge runtime started")]
    pub runtime_cmd: String,

    /// Quiet interval (milliseconds) before a burst of changes restarts the runtime.
    #[arg(long, value_name = "MS", default_value_t = 500)]
    pub debounce_ms: u64,

    /// Start the runtime without watching for changes.
    #[arg(long)]
    pub no_reload: bool,

    /// Print the function table, watch-set and mount plan, then exit.
    #[arg(long)]
    pub dry_run: bool,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `EDGEWATCH_LOG`, `DEBUG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
