//! In-memory table container
//!
//! Tables are immutable value snapshots: every operation produces a new
//! table or record sequence instead of mutating one in place.

use std::collections::HashSet;
use std::fmt;

use crate::errors::{EngineError, EngineResult};

use super::record::Record;
use super::value::Value;

/// Rows sampled per column for type inference
const TYPE_SAMPLE_ROWS: usize = 100;
/// Non-empty values sampled per column for type inference
const TYPE_SAMPLE_VALUES: usize = 10;

/// Inferred column type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    Null,
    Boolean,
    Integer,
    Float,
    String,
}

impl ColumnType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnType::Null => "null",
            ColumnType::Boolean => "boolean",
            ColumnType::Integer => "integer",
            ColumnType::Float => "float",
            ColumnType::String => "string",
        }
    }

    /// Infers the type of a single value
    pub fn infer(value: &Value) -> ColumnType {
        match value {
            Value::Null => ColumnType::Null,
            Value::Number(n) if n.fract() == 0.0 => ColumnType::Integer,
            Value::Number(_) => ColumnType::Float,
            Value::Text(s) => Self::infer_text(s),
        }
    }

    fn infer_text(raw: &str) -> ColumnType {
        let s = raw.trim();
        let lower = s.to_ascii_lowercase();
        if matches!(lower.as_str(), "" | "null" | "na" | "n/a" | "none") {
            return ColumnType::Null;
        }
        if matches!(
            lower.as_str(),
            "true" | "false" | "t" | "f" | "yes" | "no" | "y" | "n"
        ) {
            return ColumnType::Boolean;
        }
        if s.parse::<i64>().is_ok() {
            return ColumnType::Integer;
        }
        if (s.contains('.') || lower.contains('e')) && s.parse::<f64>().is_ok() {
            return ColumnType::Float;
        }
        ColumnType::String
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Headers plus a sequence of records conforming to them
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    name: String,
    headers: Vec<String>,
    rows: Vec<Record>,
}

/// First header name that appears more than once, if any
pub fn duplicate_header(headers: &[String]) -> Option<&str> {
    let mut seen = HashSet::with_capacity(headers.len());
    headers
        .iter()
        .map(String::as_str)
        .find(|h| !seen.insert(*h))
}

impl Table {
    /// Creates a table, validating header uniqueness and record width.
    pub fn new(
        name: impl Into<String>,
        headers: Vec<String>,
        rows: Vec<Record>,
    ) -> EngineResult<Self> {
        if let Some(h) = duplicate_header(&headers) {
            return Err(EngineError::invalid_operation(format!(
                "Duplicate column '{}' in table headers",
                h
            )));
        }

        for (i, row) in rows.iter().enumerate() {
            if row.len() > headers.len() {
                return Err(EngineError::invalid_operation(format!(
                    "Row {} has {} fields but table has {} columns",
                    i,
                    row.len(),
                    headers.len()
                )));
            }
        }

        Ok(Self {
            name: name.into(),
            headers,
            rows,
        })
    }

    /// Creates an empty table with the given headers
    pub fn empty(name: impl Into<String>, headers: Vec<String>) -> EngineResult<Self> {
        Self::new(name, headers, Vec::new())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Record] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Returns the position of a column
    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == column)
    }

    /// Fails with `UnknownColumnError` if the column is absent
    pub fn require_column(&self, column: &str) -> EngineResult<usize> {
        self.column_index(column)
            .ok_or_else(|| EngineError::unknown_column(column, &self.headers))
    }

    /// Reads a cell; missing trailing fields read as null
    pub fn value(&self, row: usize, column: &str) -> Option<&Value> {
        let record = self.rows.get(row)?;
        if self.column_index(column).is_none() {
            return None;
        }
        Some(record.get(column).unwrap_or(&Value::Null))
    }

    /// Infers a type for every column from a bounded sample.
    ///
    /// Picks the most common non-null type among the first non-empty values;
    /// ties resolve in favor of the type seen first. Columns with no sample
    /// are `string`.
    pub fn column_types(&self) -> Vec<(String, ColumnType)> {
        self.headers
            .iter()
            .map(|h| {
                let mut counts: Vec<(ColumnType, usize)> = Vec::new();
                let samples = self
                    .rows
                    .iter()
                    .take(TYPE_SAMPLE_ROWS)
                    .filter_map(|r| r.get(h))
                    .filter(|v| !v.is_null() && !matches!(v, Value::Text(s) if s.is_empty()))
                    .take(TYPE_SAMPLE_VALUES);

                for value in samples {
                    let ty = ColumnType::infer(value);
                    if ty == ColumnType::Null {
                        continue;
                    }
                    match counts.iter_mut().find(|(t, _)| *t == ty) {
                        Some((_, n)) => *n += 1,
                        None => counts.push((ty, 1)),
                    }
                }

                let mut best: Option<(ColumnType, usize)> = None;
                for (ty, n) in counts {
                    if best.map_or(true, |(_, b)| n > b) {
                        best = Some((ty, n));
                    }
                }
                (h.clone(), best.map_or(ColumnType::String, |(t, _)| t))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn h(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_duplicate_headers_rejected() {
        let result = Table::new("t", h(&["a", "a"]), Vec::new());
        assert!(result.is_err());
    }

    #[test]
    fn test_wide_row_rejected() {
        let row = Record::new().with("a", 1).with("b", 2);
        let result = Table::new("t", h(&["a"]), vec![row]);
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_trailing_field_reads_null() {
        let row = Record::new().with("a", 1);
        let table = Table::new("t", h(&["a", "b"]), vec![row]).unwrap();
        assert_eq!(table.value(0, "b"), Some(&Value::Null));
        assert_eq!(table.value(0, "zzz"), None);
    }

    #[test]
    fn test_require_column() {
        let table = Table::empty("t", h(&["id"])).unwrap();
        assert_eq!(table.require_column("id").unwrap(), 0);
        let err = table.require_column("name").unwrap_err();
        assert_eq!(err.column(), Some("name"));
    }

    #[test]
    fn test_column_types() {
        let rows = vec![
            Record::from_row(&h(&["id", "price", "name", "flag"]), vec![
                Value::text("1"),
                Value::text("2.5"),
                Value::text("apple"),
                Value::text("true"),
            ]),
            Record::from_row(&h(&["id", "price", "name", "flag"]), vec![
                Value::text("2"),
                Value::text("3.0"),
                Value::text("pear"),
                Value::text("no"),
            ]),
        ];
        let table = Table::new("t", h(&["id", "price", "name", "flag"]), rows).unwrap();
        let types = table.column_types();
        assert_eq!(types[0].1, ColumnType::Integer);
        assert_eq!(types[1].1, ColumnType::Float);
        assert_eq!(types[2].1, ColumnType::String);
        assert_eq!(types[3].1, ColumnType::Boolean);
    }
}
