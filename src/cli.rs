// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, Subcommand, ValueEnum};

use crate::types::Mode;

/// Command-line arguments for `dockship`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "dockship",
    version,
    about = "Build and ship container images, and redeploy them as they arrive.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    #[arg(long, global = true, value_name = "PATH", default_value = "dockship.toml")]
    pub config: String,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `--verbose`, `DOCKSHIP_LOG` or the config's `log_level`
    /// is used, in that order.
    #[arg(long, global = true, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Shorthand for `--log-level debug`.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Run in the mode set by the config file.
    Run {
        /// Override the configured mode.
        #[arg(long, value_parser = parse_mode)]
        mode: Option<Mode>,
    },
    /// Build, export and push one archive, then exit.
    Upload,
    /// Watch the drop directory and redeploy from arriving archives.
    Watch,
    /// Write a sample config file.
    Init {
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
    /// Show the status of the managed container.
    Status,
    /// Print recent output of the managed container.
    Logs {
        /// Number of lines from the end.
        #[arg(long, short = 'n', default_value_t = 50)]
        lines: usize,
    },
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

fn parse_mode(s: &str) -> Result<Mode, String> {
    s.parse()
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_override_and_global_flags_parse() {
        let args = CliArgs::try_parse_from([
            "dockship", "run", "--mode", "uploader", "--config", "/etc/ds.toml", "-v",
        ])
        .unwrap();
        assert_eq!(args.config, "/etc/ds.toml");
        assert!(args.verbose);
        assert!(matches!(args.command, Command::Run { mode: Some(Mode::Uploader) }));
    }

    #[test]
    fn logs_defaults_to_fifty_lines() {
        let args = CliArgs::try_parse_from(["dockship", "logs"]).unwrap();
        assert_eq!(args.config, "dockship.toml");
        assert!(matches!(args.command, Command::Logs { lines: 50 }));
    }

    #[test]
    fn unknown_mode_is_rejected() {
        assert!(CliArgs::try_parse_from(["dockship", "run", "--mode", "both"]).is_err());
    }
}
