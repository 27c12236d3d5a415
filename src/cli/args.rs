//! CLI argument definitions using clap
//!
//! Commands:
//! - chunkql query --query <path> [--config <path>]
//! - chunkql inspect --input <path> [--config <path>]

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// chunkql - chunk-streaming queries over delimited and JSON files
#[derive(Parser, Debug)]
#[command(name = "chunkql")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a query file and print result records as JSON lines
    Query {
        /// Path to the JSON query file
        #[arg(long)]
        query: PathBuf,

        #[command(flatten)]
        overrides: ConfigArgs,
    },

    /// Print headers, row count and inferred column types of an input file
    Inspect {
        /// Path to the input file
        #[arg(long)]
        input: PathBuf,

        #[command(flatten)]
        overrides: ConfigArgs,
    },
}

/// Config file location plus per-invocation overrides
#[derive(Args, Debug, Clone, Default)]
pub struct ConfigArgs {
    /// Path to configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Records per chunk
    #[arg(long)]
    pub chunk_size: Option<usize>,

    /// Field delimiter for delimited input
    #[arg(long)]
    pub delimiter: Option<char>,

    /// Delimited input has no header row
    #[arg(long)]
    pub no_header: bool,

    /// Parent directory for sort spill files
    #[arg(long)]
    pub spill_dir: Option<PathBuf>,

    /// Minimum log severity (trace, info, warn, error, fatal)
    #[arg(long)]
    pub log_level: Option<String>,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
