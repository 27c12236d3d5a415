//! Engine configuration
//!
//! Loaded from a JSON file. Every field is optional and falls back to its
//! default; the loaded config is validated before use.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::codec::DelimitedTokenizer;
use crate::errors::{EngineError, EngineResult};
use crate::observability::Severity;
use crate::pipeline::{Operation, QueryPipeline, DEFAULT_CHUNK_SIZE};
use crate::source::InputFormat;

/// Engine configuration file structure
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// Records per chunk (default 10 000)
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Delimited-input field separator
    #[serde(default = "default_delimiter")]
    pub delimiter: char,

    #[serde(default = "default_quote_char")]
    pub quote_char: char,

    #[serde(default = "default_escape_char")]
    pub escape_char: char,

    /// Whether delimited input starts with a header row
    #[serde(default = "default_has_header")]
    pub has_header: bool,

    /// Parent directory for sort spill directories (OS temp dir if unset)
    #[serde(default)]
    pub spill_dir: Option<PathBuf>,

    /// Minimum log severity: trace, info, warn, error or fatal
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}
fn default_delimiter() -> char {
    ','
}
fn default_quote_char() -> char {
    '"'
}
fn default_escape_char() -> char {
    '\\'
}
fn default_has_header() -> bool {
    true
}
fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            delimiter: default_delimiter(),
            quote_char: default_quote_char(),
            escape_char: default_escape_char(),
            has_header: default_has_header(),
            spill_dir: None,
            log_level: default_log_level(),
        }
    }
}

impl EngineConfig {
    /// Loads and validates a configuration file
    pub fn load(path: &Path) -> EngineResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            EngineError::config(format!("failed to read config {}: {}", path.display(), e))
        })?;
        Self::from_json(&content)
    }

    /// Parses and validates configuration text
    pub fn from_json(content: &str) -> EngineResult<Self> {
        let config: EngineConfig = serde_json::from_str(content)
            .map_err(|e| EngineError::config(format!("invalid config JSON: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> EngineResult<()> {
        if self.chunk_size == 0 {
            return Err(EngineError::config("chunk_size must be > 0"));
        }

        let specials = [self.delimiter, self.quote_char, self.escape_char];
        for (i, c) in specials.iter().enumerate() {
            if *c == '\n' || *c == '\r' {
                return Err(EngineError::config(
                    "delimiter, quote_char and escape_char must not be line breaks",
                ));
            }
            if specials[i + 1..].contains(c) {
                return Err(EngineError::config(format!(
                    "delimiter, quote_char and escape_char must be distinct (got '{}' twice)",
                    c
                )));
            }
        }

        self.severity()?;
        Ok(())
    }

    /// Parsed `log_level`
    pub fn severity(&self) -> EngineResult<Severity> {
        self.log_level.parse::<Severity>().map_err(EngineError::config)
    }

    pub fn tokenizer(&self) -> DelimitedTokenizer {
        DelimitedTokenizer::new(self.delimiter, self.quote_char, self.escape_char)
    }

    /// Input format for `path`: JSON for `.json` files, delimited otherwise
    pub fn input_format(&self, path: &Path) -> InputFormat {
        InputFormat::detect(
            path,
            InputFormat::Delimited {
                tokenizer: self.tokenizer(),
                has_header: self.has_header,
            },
        )
    }

    /// Builds a pipeline over `ops` with this config's chunk size and spill
    /// location
    pub fn pipeline(&self, ops: Vec<Operation>) -> QueryPipeline {
        let pipeline = QueryPipeline::new(ops).with_chunk_size(self.chunk_size);
        match &self.spill_dir {
            Some(dir) => pipeline.with_spill_base(dir.clone()),
            None => pipeline,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorCode;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults_from_empty_object() {
        let config = EngineConfig::from_json("{}").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.chunk_size, 10_000);
        assert_eq!(config.severity().unwrap(), Severity::Warn);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"chunk_size": 500, "delimiter": ";", "has_header": false, "log_level": "info"}}"#
        )
        .unwrap();

        let config = EngineConfig::load(file.path()).unwrap();
        assert_eq!(config.chunk_size, 500);
        assert_eq!(config.tokenizer().delimiter(), ';');
        assert!(!config.has_header);
        assert_eq!(config.severity().unwrap(), Severity::Info);
    }

    #[test]
    fn test_zero_chunk_size_rejected() {
        let err = EngineConfig::from_json(r#"{"chunk_size": 0}"#).unwrap_err();
        assert_eq!(err.code(), ErrorCode::Config);
    }

    #[test]
    fn test_clashing_characters_rejected() {
        assert!(EngineConfig::from_json(r#"{"quote_char": ","}"#).is_err());
        assert!(EngineConfig::from_json(r#"{"delimiter": "\n"}"#).is_err());
    }

    #[test]
    fn test_unknown_log_level_rejected() {
        assert!(EngineConfig::from_json(r#"{"log_level": "loud"}"#).is_err());
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let err = EngineConfig::load(Path::new("/nonexistent/chunkql.json")).unwrap_err();
        assert_eq!(err.code(), ErrorCode::Config);
    }

    #[test]
    fn test_input_format_detection() {
        let config = EngineConfig::default();
        assert!(matches!(
            config.input_format(Path::new("people.json")),
            InputFormat::Json
        ));
        assert!(matches!(
            config.input_format(Path::new("people.csv")),
            InputFormat::Delimited { has_header: true, .. }
        ));
    }
}
