//! CLI module for chunkql
//!
//! Provides command-line interface for:
//! - query: run a JSON query file, print JSON-lines results
//! - inspect: report headers, row count and column types of an input

mod args;
mod commands;
mod errors;
mod io;
mod query;

pub use args::{Cli, Command, ConfigArgs};
pub use commands::{inspect, load_config, query, run, run_command};
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::{write_records, write_report};
pub use query::{AggregateSpec, OperationSpec, PredicateSpec, QueryFile, SortKeySpec};
