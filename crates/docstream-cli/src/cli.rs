//! CLI command definitions and argument parsing.

use clap::{Parser, Subcommand};

/// docstream - Run and watch streaming document analyses.
#[derive(Debug, Parser)]
#[command(name = "docstream")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Output format
    #[arg(short, long, value_enum, global = true)]
    pub format: Option<CliFormat>,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Configuration file path (default: ~/.docstream/config.toml)
    #[arg(short, long, global = true, env = "DOCSTREAM_CONFIG")]
    pub config: Option<String>,

    /// Profile to use
    #[arg(short, long, global = true)]
    pub profile: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum CliFormat {
    /// Table format (default)
    Table,
    /// JSON format
    Json,
    /// Quiet format (one status line per document)
    Quiet,
}

/// CLI commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Analyze documents through the relay and watch progress
    Analyze(AnalyzeArgs),

    /// Stop one upstream generation by task id
    Stop(StopArgs),

    /// Manage configuration profiles
    Profile(ProfileArgs),
}

/// Arguments for the analyze command.
#[derive(Debug, Parser)]
pub struct AnalyzeArgs {
    /// Document ids to analyze
    #[arg(required = true)]
    pub document_ids: Vec<String>,

    /// Print final results as JSON (same as --format json)
    #[arg(long)]
    pub json: bool,

    /// Inactivity window in seconds before a task fails
    #[arg(short, long)]
    pub timeout: Option<u64>,

    /// Append completed results to this file, one JSON object per line
    #[arg(short, long)]
    pub output: Option<String>,

    /// Hide live progress lines
    #[arg(short, long)]
    pub quiet: bool,
}

/// Arguments for the stop command.
#[derive(Debug, Parser)]
pub struct StopArgs {
    /// Upstream task id, as shown by `analyze`
    pub task_id: String,
}

/// Arguments for profile management.
#[derive(Debug, Parser)]
pub struct ProfileArgs {
    #[command(subcommand)]
    pub action: ProfileAction,
}

/// Profile management actions.
#[derive(Debug, Subcommand)]
pub enum ProfileAction {
    /// List all profiles
    List,

    /// Show active profile
    Show,

    /// Switch to a different profile
    Use {
        /// Profile name
        name: String,
    },

    /// Create or update a profile
    Add {
        /// Profile name
        name: String,
        /// Relay URL
        #[arg(short, long)]
        url: String,
        /// User id forwarded to the generation service
        #[arg(long)]
        user: Option<String>,
    },

    /// Delete a profile
    Delete {
        /// Profile name
        name: String,
    },
}

impl From<CliFormat> for crate::config::OutputFormat {
    fn from(format: CliFormat) -> Self {
        match format {
            CliFormat::Table => crate::config::OutputFormat::Table,
            CliFormat::Json => crate::config::OutputFormat::Json,
            CliFormat::Quiet => crate::config::OutputFormat::Quiet,
        }
    }
}
