// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

use crate::config::loader::DEFAULT_CONFIG_FILE;
use crate::workspace::ParameterArg;

/// Command-line arguments for `phasegraph`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "phasegraph",
    version,
    about = "Run the phases of every project in a monorepo in dependency order.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    #[arg(long, value_name = "PATH", default_value = DEFAULT_CONFIG_FILE)]
    pub config: String,

    /// Phase to run, together with the phases it depends on. Repeatable.
    ///
    /// Default: every declared phase.
    #[arg(long = "phase", value_name = "NAME")]
    pub phases: Vec<String>,

    /// Only run these projects and the projects they depend on. Repeatable.
    #[arg(long = "to", value_name = "PROJECT")]
    pub to: Vec<String>,

    /// Maximum number of operations executing at once.
    ///
    /// Overrides `settings.parallelism`.
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u16).range(1..))]
    pub parallelism: Option<u16>,

    /// Always execute, never reuse earlier results.
    #[arg(long)]
    pub no_incremental: bool,

    /// Custom parameter forwarded to the phases that declare it, as
    /// `NAME` or `NAME=VALUE`. Repeatable.
    #[arg(long = "param", value_name = "NAME[=VALUE]", allow_hyphen_values = true)]
    pub params: Vec<ParameterArg>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `PHASEGRAPH_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse + validate, print the operation graph, but don't execute
    /// anything.
    #[arg(long)]
    pub dry_run: bool,
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
