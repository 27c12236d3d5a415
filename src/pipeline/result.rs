//! Result of pipeline execution

use super::operation::ExecutionMode;
use crate::errors::EngineResult;
use crate::record::{Record, Table};
use crate::sort::SortStats;

/// Final records plus execution counters
#[derive(Debug, Clone)]
pub struct QueryResult {
    /// Output column names
    pub headers: Vec<String>,
    /// Records in result order
    pub records: Vec<Record>,
    /// Mode the pipeline ran in
    pub mode: ExecutionMode,
    /// Chunks pulled from the source
    pub chunks_read: usize,
    /// Source records pulled
    pub rows_scanned: usize,
    /// Whether a LIMIT cut the result short
    pub limit_applied: bool,
    /// Counters of the last external sort, if one ran
    pub sort_stats: Option<SortStats>,
}

impl QueryResult {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Record> {
        self.records.iter()
    }

    /// Converts the result into a named table.
    ///
    /// Fails if the output headers repeat a column name.
    pub fn into_table(self, name: impl Into<String>) -> EngineResult<Table> {
        Table::new(name, self.headers, self.records)
    }
}
