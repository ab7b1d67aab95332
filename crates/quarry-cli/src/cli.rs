//! CLI command definitions and argument parsing.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Quarry - batch extraction of structured records from document collections.
#[derive(Debug, Parser)]
#[command(name = "quarry")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Output format
    #[arg(short, long, value_enum, global = true)]
    pub format: Option<CliFormat>,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Configuration file path
    #[arg(short, long, global = true, env = "QUARRY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Batch API base URL, overriding the config file
    #[arg(long, global = true, env = "QUARRY_ENDPOINT")]
    pub endpoint: Option<String>,

    /// Object store root, overriding the config file
    #[arg(long, global = true, env = "QUARRY_STORE")]
    pub store: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Output format options.
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum CliFormat {
    /// Table format (default)
    Table,
    /// JSON format
    Json,
    /// Quiet format (ids only)
    Quiet,
}

/// CLI commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Show how a document would be chunked
    Chunk(ChunkArgs),

    /// Build and submit the requests for a project's documents
    Submit(SubmitArgs),

    /// Run one polling sweep
    Sweep,

    /// Poll periodically until Ctrl+C
    Watch(WatchArgs),

    /// Decode correlation ids
    Decode(DecodeArgs),
}

/// Arguments for the chunk command.
#[derive(Debug, Parser)]
pub struct ChunkArgs {
    /// Document to chunk
    pub file: PathBuf,

    /// Project the document belongs to
    #[arg(short, long, default_value = "local")]
    pub project: String,

    /// Persist the chunks to the object store
    #[arg(long)]
    pub save: bool,
}

/// Arguments for the submit command.
#[derive(Debug, Parser)]
pub struct SubmitArgs {
    /// Project id
    pub project: String,

    /// Directory of extracted `.txt` / `.md` documents
    pub dir: PathBuf,

    /// Plan only, submit nothing
    #[arg(long)]
    pub dry_run: bool,
}

/// Arguments for the watch command.
#[derive(Debug, Parser)]
pub struct WatchArgs {
    /// Seconds between sweeps, overriding the config file
    #[arg(short, long)]
    pub interval: Option<u64>,

    /// Stop after this many sweeps
    #[arg(long)]
    pub cycles: Option<usize>,
}

/// Arguments for the decode command.
#[derive(Debug, Parser)]
pub struct DecodeArgs {
    /// Correlation ids
    #[arg(required = true)]
    pub ids: Vec<String>,
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
