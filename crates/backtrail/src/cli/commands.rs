//! CLI command definitions.
//!
//! This module defines the structure of all CLI subcommands.

use std::path::PathBuf;

use clap::{Args, Subcommand, ValueEnum};

use crate::config::ProviderKind;

/// Record command arguments.
#[derive(Debug, Args)]
pub struct RecordCommand {
    /// Location provider to record from (overrides the config file)
    #[arg(short, long, value_enum)]
    pub provider: Option<ProviderArg>,

    /// JSON Lines file to replay (implies --provider replay)
    #[arg(short, long, value_name = "FILE")]
    pub replay: Option<PathBuf>,
}

/// List command arguments.
#[derive(Debug, Args)]
pub struct ListCommand {
    /// Maximum number of records to show
    #[arg(short, long)]
    pub limit: Option<usize>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "plain")]
    pub format: OutputFormat,
}

/// Status command arguments.
#[derive(Debug, Args)]
pub struct StatusCommand {
    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

/// Provider argument for `record`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ProviderArg {
    /// Live fixes from gpsd
    Gpsd,
    /// Fixes replayed from a file
    Replay,
}

impl From<ProviderArg> for ProviderKind {
    fn from(arg: ProviderArg) -> Self {
        match arg {
            ProviderArg::Gpsd => Self::Gpsd,
            ProviderArg::Replay => Self::Replay,
        }
    }
}

/// Output format for commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Plain text output
    #[default]
    Plain,
    /// Formatted table
    Table,
    /// JSON output
    Json,
}
