// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

/// Command-line arguments for `procqueue`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "procqueue",
    version,
    about = "Run a graph of shell procedures with dependency gating and a concurrency limit.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the procedure file (TOML).
    #[arg(long, value_name = "PATH", default_value = "Procqueue.toml")]
    pub config: String,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `PROCQUEUE_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse and validate, print the procedure graph, run nothing.
    #[arg(long)]
    pub dry_run: bool,

    /// Override `[queue].max_concurrent` (0 = unlimited).
    #[arg(long, value_name = "N")]
    pub max_concurrent: Option<usize>,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
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
