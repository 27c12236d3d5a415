//! Chunk batch descriptor

use std::sync::Arc;

use crate::record::Record;

/// A batch of records plus positional metadata.
///
/// `total_rows_so_far` is non-decreasing across chunks of one source and
/// equals the sum of `rows_in_chunk()` over every chunk emitted so far.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    headers: Arc<[String]>,
    records: Vec<Record>,
    index: usize,
    total_rows_so_far: usize,
    is_last: bool,
}

impl Chunk {
    pub fn new(
        headers: Arc<[String]>,
        records: Vec<Record>,
        index: usize,
        total_rows_so_far: usize,
        is_last: bool,
    ) -> Self {
        Self {
            headers,
            records,
            index,
            total_rows_so_far,
            is_last,
        }
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Zero-based sequence index
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn rows_in_chunk(&self) -> usize {
        self.records.len()
    }

    pub fn total_rows_so_far(&self) -> usize {
        self.total_rows_so_far
    }

    pub fn is_last(&self) -> bool {
        self.is_last
    }

    pub fn into_records(self) -> Vec<Record> {
        self.records
    }
}
