//! CLI definitions and entry point.

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

pub mod commands;

/// Extract Jira issues and their changelog into flat CSV tables
#[derive(Parser, Debug)]
#[command(name = "jx", author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (default: ./jx.yaml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Output the run summary as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Also append JSON log lines to this file
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (no output except errors)
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fetch issues with their changelog and write the issues and changelog tables
    Extract(ExtractArgs),

    /// Rebuild the tables from a raw dump (*-raw.csv)
    Parse(ParseArgs),

    /// Export the issues of every agile board
    Boards(BoardsArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

/// Server connection flags.
#[derive(Args, Debug, Clone, Default)]
pub struct ServerArgs {
    /// Jira server URL
    #[arg(short, long)]
    pub server: Option<String>,

    /// Username for basic auth
    #[arg(short, long)]
    pub username: Option<String>,

    /// Password or API token for basic auth
    #[arg(short, long, env = "JX_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,
}

/// Arguments for the extract command.
#[derive(Args, Debug, Clone, Default)]
#[allow(clippy::struct_excessive_bools)]
pub struct ExtractArgs {
    #[command(flatten)]
    pub server: ServerArgs,

    /// Project key (default: all projects)
    #[arg(long)]
    pub project: Option<String>,

    /// Only issues created on or after this date (YYYY-MM-DD)
    #[arg(long, alias = "startdate")]
    pub start: Option<String>,

    /// Only issues created on or before this date (YYYY-MM-DD)
    #[arg(long, alias = "enddate")]
    pub end: Option<String>,

    /// Issues requested per block
    #[arg(short, long, alias = "blocksize")]
    pub block_size: Option<usize>,

    /// File name for the issues table
    #[arg(long, alias = "issuefile")]
    pub issue_file: Option<String>,

    /// File name for the changelog table
    #[arg(long, alias = "changelogfile")]
    pub changelog_file: Option<String>,

    /// Directory for all output files
    #[arg(long)]
    pub out_dir: Option<PathBuf>,

    /// Replace identity columns with pseudonyms
    #[arg(long)]
    pub anonymize: bool,

    /// Write each block as it arrives (columns first seen later are dropped)
    #[arg(long)]
    pub streaming: bool,

    /// Expand arrays into indexed columns instead of one JSON cell
    #[arg(long)]
    pub explode_arrays: bool,
}

/// Arguments for the parse command.
#[derive(Args, Debug, Clone)]
pub struct ParseArgs {
    /// Raw dump written by `extract`
    #[arg(long, alias = "parsefile")]
    pub file: PathBuf,

    /// Number of chunks to process one at a time
    #[arg(short, long, default_value_t = 1)]
    pub split: usize,

    /// Replace identity columns with pseudonyms
    #[arg(long)]
    pub anonymize: bool,

    /// Keep the per-chunk files
    #[arg(long)]
    pub keep_chunks: bool,

    /// Expand arrays into indexed columns instead of one JSON cell
    #[arg(long)]
    pub explode_arrays: bool,
}

/// Arguments for the boards command.
#[derive(Args, Debug, Clone)]
pub struct BoardsArgs {
    #[command(flatten)]
    pub server: ServerArgs,

    /// Issues requested per page
    #[arg(short, long)]
    pub block_size: Option<usize>,

    /// Output file
    #[arg(long, short = 'o', default_value = "boards-issues.csv")]
    pub output: PathBuf,
}

/// Arguments for the completions command.
#[derive(Args, Debug, Clone)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: ShellType,

    /// Output file (default: stdout)
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,
}

/// Supported shells for completion generation.
#[derive(ValueEnum, Debug, Clone, Copy, Eq, PartialEq)]
pub enum ShellType {
    /// Bash shell
    Bash,
    /// Zsh shell
    Zsh,
    /// Fish shell
    Fish,
    #[value(name = "powershell")]
    #[value(alias = "pwsh")]
    /// `PowerShell`
    PowerShell,
    /// Elvish
    Elvish,
}
