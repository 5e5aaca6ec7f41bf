//! Command-line interface for backtrail.
//!
//! This module provides the CLI structure for the `backtrail` binary and the
//! text renderers its commands share.

mod commands;
pub mod output;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{
    ConfigCommand, ListCommand, OutputFormat, ProviderArg, RecordCommand, StatusCommand,
};

/// backtrail - Record where you have been
///
/// Records significant location changes into a local database and shows them
/// as a table and a trail.
#[derive(Debug, Parser)]
#[command(name = "backtrail")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Record significant location changes until the source ends or Ctrl-C
    Record(RecordCommand),

    /// List recorded locations, newest first
    List(ListCommand),

    /// Show database status
    Status(StatusCommand),

    /// View or validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> crate::logging::Verbosity {
        crate::logging::Verbosity::from_flags(self.quiet, self.verbose)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn status_cli(verbose: u8, quiet: bool) -> Cli {
        Cli {
            config: None,
            verbose,
            quiet,
            command: Command::Status(StatusCommand { json: false }),
        }
    }

    #[test]
    fn test_cli_name() {
        let cli = Cli::command();
        assert_eq!(cli.get_name(), "backtrail");
    }

    #[test]
    fn test_verbosity_levels() {
        use crate::logging::Verbosity;

        assert_eq!(status_cli(0, true).verbosity(), Verbosity::Quiet);
        assert_eq!(status_cli(3, true).verbosity(), Verbosity::Quiet);
        assert_eq!(status_cli(0, false).verbosity(), Verbosity::Normal);
        assert_eq!(status_cli(1, false).verbosity(), Verbosity::Verbose);
        assert_eq!(status_cli(2, false).verbosity(), Verbosity::Trace);
    }

    #[test]
    fn test_cli_verify() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_record_defaults() {
        let cli = Cli::try_parse_from(["backtrail", "record"]).unwrap();
        match cli.command {
            Command::Record(cmd) => {
                assert!(cmd.provider.is_none());
                assert!(cmd.replay.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_record_replay() {
        let cli = Cli::try_parse_from([
            "backtrail",
            "record",
            "--provider",
            "replay",
            "--replay",
            "trip.jsonl",
        ])
        .unwrap();
        match cli.command {
            Command::Record(cmd) => {
                assert_eq!(cmd.provider, Some(ProviderArg::Replay));
                assert_eq!(cmd.replay, Some(PathBuf::from("trip.jsonl")));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_record_rejects_unknown_provider() {
        assert!(Cli::try_parse_from(["backtrail", "record", "--provider", "wifi"]).is_err());
    }

    #[test]
    fn test_parse_list() {
        let cli =
            Cli::try_parse_from(["backtrail", "list", "--limit", "5", "--format", "json"]).unwrap();
        match cli.command {
            Command::List(cmd) => {
                assert_eq!(cmd.limit, Some(5));
                assert_eq!(cmd.format, OutputFormat::Json);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_list_defaults() {
        let cli = Cli::try_parse_from(["backtrail", "list"]).unwrap();
        match cli.command {
            Command::List(cmd) => {
                assert!(cmd.limit.is_none());
                assert_eq!(cmd.format, OutputFormat::Plain);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_status() {
        let cli = Cli::try_parse_from(["backtrail", "status", "--json"]).unwrap();
        assert!(matches!(cli.command, Command::Status(StatusCommand { json: true })));
    }

    #[test]
    fn test_parse_config_validate() {
        let cli =
            Cli::try_parse_from(["backtrail", "config", "validate", "--file", "x.toml"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Config(ConfigCommand::Validate { file: Some(_) })
        ));
    }

    #[test]
    fn test_parse_with_config() {
        let cli =
            Cli::try_parse_from(["backtrail", "-c", "/custom/config.toml", "status"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/custom/config.toml")));
    }

    #[test]
    fn test_parse_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["backtrail", "list", "-vv"]).unwrap();
        assert_eq!(cli.verbose, 2);

        let cli = Cli::try_parse_from(["backtrail", "status", "-q"]).unwrap();
        assert!(cli.quiet);
    }
}
