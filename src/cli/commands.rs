//! CLI commands and argument parsing

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Conduit Connector Development Kit CLI
#[derive(Parser, Debug)]
#[command(name = "conduit-cdk")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Built-in source to run (see `list`)
    #[arg(short = 'S', long, global = true)]
    pub source: Option<String>,

    /// Parameter file (JSON or YAML mapping)
    #[arg(short, long, global = true)]
    pub params: Option<PathBuf>,

    /// Parameter override, repeatable
    #[arg(long = "set", value_name = "KEY=VALUE", global = true)]
    pub set: Vec<String>,

    /// State file (JSON); holds the watermark between runs
    #[arg(short, long, global = true)]
    pub state: Option<PathBuf>,

    /// Serve HTTP responses from recorded fixtures in this directory
    #[arg(long, global = true)]
    pub replay: Option<PathBuf>,

    /// Output format
    #[arg(short, long, global = true, default_value = "json")]
    pub format: OutputFormat,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Import the selected nodes into JSON-lines files
    Run {
        /// Run mode
        #[arg(short, long, default_value = "incremental")]
        mode: ModeArg,

        /// First day to import, overriding the configured window
        #[arg(long)]
        start_date: Option<NaiveDate>,

        /// Last day to import
        #[arg(long)]
        end_date: Option<NaiveDate>,

        /// Run configuration file (`{"type": ..., "startDate": ..., "endDate": ...}`)
        #[arg(long, conflicts_with_all = ["start_date", "end_date"])]
        run_config: Option<PathBuf>,

        /// Directory for `<destination>.jsonl` files
        #[arg(short, long, default_value = "output")]
        output: PathBuf,
    },

    /// Validate parameters and the node selection without fetching
    Validate,

    /// Show the source's parameters and node schemas
    Spec,

    /// List built-in sources
    List,
}

/// Run mode as accepted on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ModeArg {
    /// Resume from the watermark
    Incremental,
    /// Re-import an explicit range, leaving the watermark untouched
    Backfill,
}

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output (one message per line)
    Json,
    /// Human-readable output
    Pretty,
}
