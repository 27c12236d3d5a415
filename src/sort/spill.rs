//! Spill storage for sorted runs
//!
//! Each sort invocation owns one uniquely named directory. A run is one file
//! of newline-separated records; every line is
//!
//! ```text
//! <crc32 hex>\t<compact JSON object>
//! ```
//!
//! The checksum covers the JSON text and is verified on read.
//!
//! The directory is removed when the `SpillDir` is dropped, so every exit
//! path (completion, error, early stop) releases spill storage.

use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use uuid::Uuid;

use crate::codec::{decode_record, encode_record};
use crate::errors::{EngineError, EngineResult};
use crate::observability::{log_event_with_fields, Event, Logger, Severity};
use crate::record::Record;

/// Per-invocation spill directory
#[derive(Debug)]
pub struct SpillDir {
    dir: Option<TempDir>,
    path: PathBuf,
}

impl SpillDir {
    /// Creates `chunkql-sort-<uuid>-*` under `base`, or under the OS temp
    /// directory when `base` is `None`
    pub fn create(base: Option<&Path>) -> EngineResult<Self> {
        let prefix = format!("chunkql-sort-{}-", Uuid::new_v4());
        let mut builder = tempfile::Builder::new();
        builder.prefix(&prefix);
        let dir = match base {
            Some(base) => {
                fs::create_dir_all(base).map_err(|e| {
                    EngineError::resource(
                        format!("Failed to create spill base {}", base.display()),
                        e,
                    )
                })?;
                builder.tempdir_in(base)
            }
            None => builder.tempdir(),
        }
        .map_err(|e| EngineError::resource("Failed to create spill directory", e))?;

        let path = dir.path().to_path_buf();
        Ok(Self {
            dir: Some(dir),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of the run with the given index
    pub fn run_path(&self, index: usize) -> PathBuf {
        self.path.join(format!("run-{:06}.jsonl", index))
    }
}

impl Drop for SpillDir {
    fn drop(&mut self) {
        let Some(dir) = self.dir.take() else {
            return;
        };
        let path = self.path.display().to_string();
        match dir.close() {
            Ok(()) => log_event_with_fields(Event::SpillCleanup, &[("dir", path.as_str())]),
            Err(e) => {
                let reason = e.to_string();
                Logger::log(
                    Severity::Warn,
                    Event::SpillFailed.as_str(),
                    &[("dir", path.as_str()), ("reason", reason.as_str())],
                );
            }
        }
    }
}

/// Deletes one run file. Failure is logged, not returned: the directory
/// sweep on drop retries it.
pub fn remove_run(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        let path = path.display().to_string();
        let reason = e.to_string();
        Logger::log(
            Severity::Warn,
            Event::SpillFailed.as_str(),
            &[("path", path.as_str()), ("reason", reason.as_str())],
        );
    }
}

fn spill_error(action: &str, path: &Path, e: std::io::Error) -> EngineError {
    let err = EngineError::resource(format!("Failed to {} run {}", action, path.display()), e);
    log_event_with_fields(Event::SpillFailed, &[("reason", err.message())]);
    err
}

/// Writes one sorted run
pub struct RunWriter {
    out: BufWriter<File>,
    path: PathBuf,
    records: usize,
    line: String,
}

impl RunWriter {
    pub fn create(path: PathBuf) -> EngineResult<Self> {
        let file = File::create(&path).map_err(|e| spill_error("create", &path, e))?;
        Ok(Self {
            out: BufWriter::new(file),
            path,
            records: 0,
            line: String::new(),
        })
    }

    pub fn write(&mut self, record: &Record) -> EngineResult<()> {
        let json = encode_record(record);
        self.line.clear();
        self.line
            .push_str(&format!("{:08x}\t", crc32fast::hash(json.as_bytes())));
        self.line.push_str(&json);
        self.line.push('\n');
        self.out
            .write_all(self.line.as_bytes())
            .map_err(|e| spill_error("write", &self.path, e))?;
        self.records += 1;
        Ok(())
    }

    /// Flushes and closes the run, returning its record count
    pub fn finish(mut self) -> EngineResult<usize> {
        self.out
            .flush()
            .map_err(|e| spill_error("flush", &self.path, e))?;
        Ok(self.records)
    }
}

/// Reads one run sequentially
pub struct RunReader {
    input: BufReader<File>,
    path: PathBuf,
    line_no: usize,
    buf: String,
}

impl RunReader {
    pub fn open(path: PathBuf) -> EngineResult<Self> {
        let file = File::open(&path).map_err(|e| spill_error("open", &path, e))?;
        Ok(Self {
            input: BufReader::new(file),
            path,
            line_no: 0,
            buf: String::new(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the next record, `Ok(None)` when the run is exhausted
    pub fn next_record(&mut self) -> EngineResult<Option<Record>> {
        self.buf.clear();
        let n = self
            .input
            .read_line(&mut self.buf)
            .map_err(|e| spill_error("read", &self.path, e))?;
        if n == 0 {
            return Ok(None);
        }
        self.line_no += 1;

        let line = self.buf.trim_end_matches('\n');
        let corrupt = |reason: &str| {
            EngineError::resource_corrupt(format!(
                "Corrupt run {} at line {}: {}",
                self.path.display(),
                self.line_no,
                reason
            ))
        };

        let (crc_hex, json) = line
            .split_once('\t')
            .ok_or_else(|| corrupt("missing checksum"))?;
        let expected =
            u32::from_str_radix(crc_hex, 16).map_err(|_| corrupt("unreadable checksum"))?;
        if crc32fast::hash(json.as_bytes()) != expected {
            return Err(corrupt("checksum mismatch"));
        }
        let record = decode_record(json).map_err(|e| corrupt(&e.to_string()))?;
        Ok(Some(record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorCode;
    use crate::record::Value;

    #[test]
    fn test_run_roundtrip_preserves_order() {
        let spill = SpillDir::create(None).unwrap();
        let path = spill.run_path(0);
        let mut writer = RunWriter::create(path.clone()).unwrap();
        for i in 0..3 {
            writer
                .write(&Record::new().with("k", i).with("s", "tab\there"))
                .unwrap();
        }
        assert_eq!(writer.finish().unwrap(), 3);

        let mut reader = RunReader::open(path).unwrap();
        let mut seen = Vec::new();
        while let Some(r) = reader.next_record().unwrap() {
            seen.push(r);
        }
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[2].get("k"), Some(&Value::Number(2.0)));
        assert_eq!(seen[0].get("s"), Some(&Value::text("tab\there")));
    }

    #[test]
    fn test_checksum_mismatch_is_resource_error() {
        let spill = SpillDir::create(None).unwrap();
        let path = spill.run_path(0);
        fs::write(&path, "00000000\t{\"k\":1}\n").unwrap();

        let mut reader = RunReader::open(path).unwrap();
        let err = reader.next_record().unwrap_err();
        assert_eq!(err.code(), ErrorCode::Resource);
        assert!(err.message().contains("checksum"));
    }

    #[test]
    fn test_directory_removed_on_drop() {
        let base = tempfile::TempDir::new().unwrap();
        let spill = SpillDir::create(Some(base.path())).unwrap();
        let path = spill.path().to_path_buf();
        fs::write(spill.run_path(0), "x").unwrap();
        assert!(path.exists());
        drop(spill);
        assert!(!path.exists());
    }

    #[test]
    fn test_unique_per_invocation() {
        let a = SpillDir::create(None).unwrap();
        let b = SpillDir::create(None).unwrap();
        assert_ne!(a.path(), b.path());
    }
}
