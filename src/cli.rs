// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

use crate::types::FailurePolicy;

/// Command-line arguments for `dagrun`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "dagrun",
    version,
    about = "Run a dependency graph of shell commands on a worker pool, one or more cycles.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    #[arg(long, value_name = "PATH", default_value = "Dagrun.toml")]
    pub config: String,

    /// Number of cycles to run (overrides `[config].cycles`).
    #[arg(long, value_name = "N")]
    pub cycles: Option<usize>,

    /// Number of worker threads (overrides `[config].workers`).
    #[arg(long, value_name = "N")]
    pub workers: Option<usize>,

    /// `skip_dependents` or `fail_fast` (overrides `[config].failure_policy`).
    #[arg(long, value_name = "POLICY")]
    pub failure_policy: Option<FailurePolicy>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `DAGRUN_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse + validate, print the graph and an execution order, but don't
    /// run any commands.
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_parse() {
        let args = CliArgs::try_parse_from([
            "dagrun",
            "--config",
            "x.toml",
            "--cycles",
            "3",
            "--failure-policy",
            "fail_fast",
            "--log-level",
            "debug",
        ])
        .unwrap();
        assert_eq!(args.config, "x.toml");
        assert_eq!(args.cycles, Some(3));
        assert_eq!(args.workers, None);
        assert_eq!(args.failure_policy, Some(FailurePolicy::FailFast));
        assert!(!args.dry_run);
    }
}
