//! CLI command implementations
//!
//! Each command loads the engine config (file plus flag overrides), sets the
//! process log level, then does one unit of work and exits.

use std::io;
use std::path::Path;

use serde_json::json;

use crate::config::EngineConfig;
use crate::observability::Logger;
use crate::source::{FileSource, SourceOpener};

use super::args::{Command, ConfigArgs};
use super::errors::{CliError, CliResult};
use super::io::{write_records, write_report};
use super::query::QueryFile;

/// Parse arguments and run the selected command
pub fn run() -> CliResult<()> {
    let cli = super::args::Cli::parse_args();
    run_command(cli.command)
}

/// Run the appropriate command based on CLI args
pub fn run_command(cmd: Command) -> CliResult<()> {
    match cmd {
        Command::Query { query, overrides } => self::query(&query, &overrides),
        Command::Inspect { input, overrides } => inspect(&input, &overrides),
    }
}

/// Builds the effective config: file values first, then flag overrides
pub fn load_config(args: &ConfigArgs) -> CliResult<EngineConfig> {
    let mut config = match &args.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };

    if let Some(n) = args.chunk_size {
        config.chunk_size = n;
    }
    if let Some(c) = args.delimiter {
        config.delimiter = c;
    }
    if args.no_header {
        config.has_header = false;
    }
    if let Some(dir) = &args.spill_dir {
        config.spill_dir = Some(dir.clone());
    }
    if let Some(level) = &args.log_level {
        config.log_level = level.clone();
    }

    config.validate()?;
    Logger::set_min_severity(config.severity()?);
    Ok(config)
}

/// Runs a query file and prints the result records as JSON lines
pub fn query(query_path: &Path, args: &ConfigArgs) -> CliResult<()> {
    let config = load_config(args)?;
    let query = QueryFile::load(query_path)?;

    let build = match &query.join_input {
        Some(path) => Some(FileSource::new(path, config.input_format(path)).load()?),
        None if query.needs_join_input() => {
            return Err(CliError::invalid_query(
                "query contains a join but no join_input",
            ))
        }
        None => None,
    };

    let ops = query.to_operations(build.as_ref())?;
    let source = FileSource::new(&query.input, config.input_format(&query.input));
    let result = config.pipeline(ops).execute(&source)?;

    let stdout = io::stdout();
    write_records(stdout.lock(), result.iter())?;
    Ok(())
}

/// Prints headers, row count and inferred column types of one input file
pub fn inspect(input: &Path, args: &ConfigArgs) -> CliResult<()> {
    let config = load_config(args)?;
    let table = FileSource::new(input, config.input_format(input)).load()?;

    let column_types: serde_json::Map<String, serde_json::Value> = table
        .column_types()
        .into_iter()
        .map(|(name, ty)| (name, json!(ty.as_str())))
        .collect();

    write_report(&json!({
        "name": table.name(),
        "headers": table.headers(),
        "row_count": table.row_count(),
        "column_types": column_types,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::Severity;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_overrides_win_over_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("chunkql.json");
        fs::write(&path, r#"{"chunk_size": 100, "delimiter": ";"}"#).unwrap();

        let args = ConfigArgs {
            config: Some(path),
            chunk_size: Some(7),
            no_header: true,
            log_level: Some("error".into()),
            ..ConfigArgs::default()
        };
        let config = load_config(&args).unwrap();
        assert_eq!(config.chunk_size, 7);
        assert_eq!(config.delimiter, ';');
        assert!(!config.has_header);
        assert_eq!(config.severity().unwrap(), Severity::Error);
    }

    #[test]
    fn test_invalid_override_rejected() {
        let args = ConfigArgs {
            chunk_size: Some(0),
            ..ConfigArgs::default()
        };
        let err = load_config(&args).unwrap_err();
        assert_eq!(err.code(), super::super::errors::CliErrorCode::ConfigError);
    }

    #[test]
    fn test_query_missing_join_input() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.csv"), "id\n1\n").unwrap();
        let q = dir.path().join("q.json");
        fs::write(
            &q,
            r#"{"input": "a.csv", "operations": [{"type": "join", "left_on": "id", "right_on": "id"}]}"#,
        )
        .unwrap();
        let err = query(&q, &ConfigArgs::default()).unwrap_err();
        assert_eq!(err.code(), super::super::errors::CliErrorCode::InvalidQuery);
    }
}
