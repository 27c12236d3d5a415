//! Chunk reader
//!
//! Pulls records from a `RowSource` and groups them into chunks of at most
//! `chunk_size` records. One record is read ahead so the final chunk can be
//! flagged `is_last` without a trailing empty chunk.

use std::io::BufRead;
use std::sync::Arc;

use super::chunk::Chunk;
use super::rows::{DelimitedRows, RowSource};
use crate::codec::DelimitedTokenizer;
use crate::errors::{EngineError, EngineResult, ErrorCode};
use crate::observability::{log_event_with_fields, Event};
use crate::record::Record;

/// Lazily yields chunks from a row source
///
/// Invariants:
/// - every chunk except the last holds exactly `chunk_size` records
/// - at least one chunk is produced, even for empty input
/// - the first error ends the iteration; no partial chunk follows it
pub struct ChunkReader<S: RowSource> {
    source: S,
    headers: Arc<[String]>,
    chunk_size: usize,
    next_index: usize,
    total_rows: usize,
    lookahead: Option<Record>,
    done: bool,
}

impl<R: BufRead> ChunkReader<DelimitedRows<R>> {
    /// Opens a comma-delimited stream with default quoting
    pub fn open(stream: R, chunk_size: usize, has_header: bool) -> EngineResult<Self> {
        Self::open_delimited(stream, chunk_size, has_header, DelimitedTokenizer::default())
    }

    pub fn open_delimited(
        stream: R,
        chunk_size: usize,
        has_header: bool,
        tokenizer: DelimitedTokenizer,
    ) -> EngineResult<Self> {
        let rows = DelimitedRows::open(stream, tokenizer, has_header).map_err(log_malformed)?;
        Self::new(rows, chunk_size)
    }
}

impl<S: RowSource> ChunkReader<S> {
    /// Wraps a row source. `chunk_size` must be positive.
    pub fn new(source: S, chunk_size: usize) -> EngineResult<Self> {
        if chunk_size == 0 {
            return Err(EngineError::invalid_operation("chunk_size must be positive"));
        }
        let headers: Arc<[String]> = source.headers().to_vec().into();
        Ok(Self {
            source,
            headers,
            chunk_size,
            next_index: 0,
            total_rows: 0,
            lookahead: None,
            done: false,
        })
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Number of chunks emitted so far
    pub fn chunks_read(&self) -> usize {
        self.next_index
    }

    /// Number of records emitted so far
    pub fn rows_read(&self) -> usize {
        self.total_rows
    }

    fn pull(&mut self) -> EngineResult<Option<Record>> {
        self.source.next_record().map_err(log_malformed)
    }

    fn fill(&mut self) -> EngineResult<Chunk> {
        let mut records = Vec::with_capacity(self.chunk_size);
        if let Some(rec) = self.lookahead.take() {
            records.push(rec);
        }
        while records.len() < self.chunk_size {
            match self.pull()? {
                Some(rec) => records.push(rec),
                None => break,
            }
        }
        if records.len() == self.chunk_size {
            self.lookahead = self.pull()?;
        }

        let is_last = self.lookahead.is_none();
        self.total_rows += records.len();
        let chunk = Chunk::new(
            Arc::clone(&self.headers),
            records,
            self.next_index,
            self.total_rows,
            is_last,
        );
        self.next_index += 1;

        let (index, rows, total) = (
            chunk.index().to_string(),
            chunk.rows_in_chunk().to_string(),
            self.total_rows.to_string(),
        );
        log_event_with_fields(
            Event::ChunkRead,
            &[("chunk", index.as_str()), ("rows", rows.as_str()), ("total_rows", total.as_str())],
        );
        Ok(chunk)
    }
}

fn log_malformed(err: EngineError) -> EngineError {
    if err.code() == ErrorCode::MalformedInput {
        log_event_with_fields(Event::MalformedInput, &[("reason", err.message())]);
    }
    err
}

impl<S: RowSource> Iterator for ChunkReader<S> {
    type Item = EngineResult<Chunk>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.fill() {
            Ok(chunk) => {
                self.done = chunk.is_last();
                Some(Ok(chunk))
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Value;
    use std::io::Cursor;

    fn csv(rows: usize) -> String {
        let mut s = String::from("id,name\n");
        for i in 0..rows {
            s.push_str(&format!("{},n{}\n", i, i));
        }
        s
    }

    #[test]
    fn test_exact_multiple_has_no_trailing_empty_chunk() {
        let reader = ChunkReader::open(Cursor::new(csv(4)), 2, true).unwrap();
        let chunks: Vec<Chunk> = reader.map(|c| c.unwrap()).collect();
        assert_eq!(chunks.len(), 2);
        assert!(!chunks[0].is_last());
        assert!(chunks[1].is_last());
        assert_eq!(chunks[1].total_rows_so_far(), 4);
    }

    #[test]
    fn test_remainder_chunk() {
        let reader = ChunkReader::open(Cursor::new(csv(5)), 2, true).unwrap();
        let sizes: Vec<usize> = reader.map(|c| c.unwrap().rows_in_chunk()).collect();
        assert_eq!(sizes, vec![2, 2, 1]);
    }

    #[test]
    fn test_chunk_accounting() {
        let mut reader = ChunkReader::open(Cursor::new(csv(7)), 3, true).unwrap();
        let mut sum = 0;
        for (i, chunk) in reader.by_ref().enumerate() {
            let chunk = chunk.unwrap();
            assert_eq!(chunk.index(), i);
            sum += chunk.rows_in_chunk();
            assert_eq!(chunk.total_rows_so_far(), sum);
        }
        assert_eq!(sum, 7);
        assert_eq!(reader.rows_read(), 7);
        assert_eq!(reader.chunks_read(), 3);
    }

    #[test]
    fn test_header_only_input_yields_one_empty_chunk() {
        let reader = ChunkReader::open(Cursor::new("id,name\n"), 10, true).unwrap();
        assert_eq!(reader.headers(), &["id".to_string(), "name".to_string()]);
        let chunks: Vec<Chunk> = reader.map(|c| c.unwrap()).collect();
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].is_last());
        assert_eq!(chunks[0].rows_in_chunk(), 0);
    }

    #[test]
    fn test_values_are_text() {
        let mut reader = ChunkReader::open(Cursor::new(csv(1)), 10, true).unwrap();
        let chunk = reader.next().unwrap().unwrap();
        assert_eq!(chunk.records()[0].get("id"), Some(&Value::text("0")));
    }

    #[test]
    fn test_malformed_record_ends_iteration() {
        let input = "a,b\n1,2\n3,\"broken\n4,5\n";
        let mut reader = ChunkReader::open(Cursor::new(input), 10, true).unwrap();
        let err = reader.next().unwrap().unwrap_err();
        assert_eq!(err.code(), ErrorCode::MalformedInput);
        assert!(reader.next().is_none());
    }

    #[test]
    fn test_zero_chunk_size_rejected() {
        let err = ChunkReader::open(Cursor::new(csv(1)), 0, true).err().unwrap();
        assert_eq!(err.code(), ErrorCode::InvalidOperation);
    }
}
