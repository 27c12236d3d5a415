//! Re-openable inputs
//!
//! A `SourceOpener` can produce a fresh row source from the beginning any
//! number of times. Files and in-memory tables both qualify; the join build
//! side and the tests rely on this to read a source more than once.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use super::reader::ChunkReader;
use super::rows::{DelimitedRows, JsonRows, RowSource, TableRows};
use crate::codec::DelimitedTokenizer;
use crate::errors::{EngineError, EngineResult};
use crate::record::Table;

/// Produces fresh row sources over the same underlying data
pub trait SourceOpener {
    /// Display name used in logs and as the table name when loaded
    fn name(&self) -> &str;

    /// Opens the input from the beginning
    fn open(&self) -> EngineResult<Box<dyn RowSource + '_>>;

    /// Opens the input as a chunk stream
    fn chunks(&self, chunk_size: usize) -> EngineResult<ChunkReader<Box<dyn RowSource + '_>>> {
        ChunkReader::new(self.open()?, chunk_size)
    }

    /// Reads the whole input into a table
    fn load(&self) -> EngineResult<Table> {
        let mut rows = self.open()?;
        let headers = rows.headers().to_vec();
        let mut records = Vec::new();
        while let Some(rec) = rows.next_record()? {
            records.push(rec);
        }
        Table::new(self.name(), headers, records)
    }
}

impl SourceOpener for Table {
    fn name(&self) -> &str {
        Table::name(self)
    }

    fn open(&self) -> EngineResult<Box<dyn RowSource + '_>> {
        Ok(Box::new(TableRows::new(self)))
    }

    fn load(&self) -> EngineResult<Table> {
        Ok(self.clone())
    }
}

/// How a file is decoded into records
#[derive(Debug, Clone, PartialEq)]
pub enum InputFormat {
    Delimited {
        tokenizer: DelimitedTokenizer,
        has_header: bool,
    },
    Json,
}

impl Default for InputFormat {
    fn default() -> Self {
        InputFormat::Delimited {
            tokenizer: DelimitedTokenizer::default(),
            has_header: true,
        }
    }
}

impl InputFormat {
    /// Picks JSON for `.json` files, delimited text otherwise
    pub fn detect(path: &Path, delimited: InputFormat) -> InputFormat {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => InputFormat::Json,
            _ => delimited,
        }
    }
}

/// A file on disk plus its decoding format
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
    name: String,
    format: InputFormat,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>, format: InputFormat) -> Self {
        let path = path.into();
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("input")
            .to_string();
        Self { path, name, format }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> &InputFormat {
        &self.format
    }
}

impl SourceOpener for FileSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn open(&self) -> EngineResult<Box<dyn RowSource + '_>> {
        let file = File::open(&self.path).map_err(|e| {
            EngineError::resource(format!("Failed to open input {}", self.path.display()), e)
        })?;
        let reader = BufReader::new(file);
        match &self.format {
            InputFormat::Delimited {
                tokenizer,
                has_header,
            } => Ok(Box::new(DelimitedRows::open(
                reader,
                *tokenizer,
                *has_header,
            )?)),
            InputFormat::Json => Ok(Box::new(JsonRows::open(reader)?)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{Record, Value};
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_file_source_reopens_from_start() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("people.csv");
        let mut f = File::create(&path).unwrap();
        writeln!(f, "id,name\n1,a\n2,b\n3,c").unwrap();

        let source = FileSource::new(&path, InputFormat::default());
        assert_eq!(source.name(), "people");
        for _ in 0..2 {
            let total: usize = source
                .chunks(2)
                .unwrap()
                .map(|c| c.unwrap().rows_in_chunk())
                .sum();
            assert_eq!(total, 3);
        }
    }

    #[test]
    fn test_detect_json() {
        let fmt = InputFormat::detect(Path::new("x/data.JSON"), InputFormat::default());
        assert_eq!(fmt, InputFormat::Json);
        let fmt = InputFormat::detect(Path::new("x/data.tsv"), InputFormat::default());
        assert!(matches!(fmt, InputFormat::Delimited { .. }));
    }

    #[test]
    fn test_table_load_roundtrip() {
        let table = Table::new(
            "t",
            vec!["a".to_string()],
            vec![Record::new().with("a", 1)],
        )
        .unwrap();
        let loaded = SourceOpener::load(&table).unwrap();
        assert_eq!(loaded.value(0, "a"), Some(&Value::Number(1.0)));
    }

    #[test]
    fn test_missing_file_is_resource_error() {
        let source = FileSource::new("/nonexistent/chunkql/input.csv", InputFormat::default());
        let err = source.open().err().unwrap();
        assert_eq!(err.code(), crate::errors::ErrorCode::Resource);
    }
}
