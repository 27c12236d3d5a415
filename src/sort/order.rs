//! Sort keys and the record comparator
//!
//! One `SortOrder` instance is shared by the local run sort and the k-way
//! merge so both phases agree on every comparison.

use std::cmp::Ordering;

use crate::errors::{EngineError, EngineResult};
use crate::record::{compare_values, Record};

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

/// One ORDER BY column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub column: String,
    pub direction: SortDirection,
}

impl SortKey {
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: SortDirection::Desc,
        }
    }
}

/// Lexicographic ordering over one or more sort keys
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortOrder {
    keys: Vec<SortKey>,
}

impl SortOrder {
    pub fn new(keys: Vec<SortKey>) -> EngineResult<Self> {
        if keys.is_empty() {
            return Err(EngineError::invalid_operation(
                "ORDER BY requires at least one sort key",
            ));
        }
        Ok(Self { keys })
    }

    pub fn single(key: SortKey) -> Self {
        Self { keys: vec![key] }
    }

    pub fn keys(&self) -> &[SortKey] {
        &self.keys
    }

    /// Fails with UnknownColumn if a key column is not in `headers`
    pub fn validate(&self, headers: &[String]) -> EngineResult<()> {
        for key in &self.keys {
            if !headers.contains(&key.column) {
                return Err(EngineError::unknown_column(key.column.as_str(), headers));
            }
        }
        Ok(())
    }

    /// Compares two records. A missing key sorts lowest.
    pub fn compare(&self, a: &Record, b: &Record) -> Ordering {
        for key in &self.keys {
            let ord = compare_values(a.get(&key.column), b.get(&key.column));
            let ord = match key.direction {
                SortDirection::Asc => ord,
                SortDirection::Desc => ord.reverse(),
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }

    /// Stable in-memory sort
    pub fn sort(&self, records: &mut [Record]) {
        records.sort_by(|a, b| self.compare(a, b));
    }
}
