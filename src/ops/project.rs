//! Column projection

use crate::errors::{EngineError, EngineResult};
use crate::record::{Record, Value};

/// Selects and reorders columns
pub struct Projection;

impl Projection {
    /// Checks every requested column exists in `headers`
    pub fn validate(headers: &[String], columns: &[String]) -> EngineResult<()> {
        for col in columns {
            if !headers.contains(col) {
                return Err(EngineError::unknown_column(col.as_str(), headers));
            }
        }
        Ok(())
    }

    /// Projects one record. Absent fields become null.
    pub fn record(record: &Record, columns: &[String]) -> Record {
        columns
            .iter()
            .map(|c| (c.clone(), record.get(c).cloned().unwrap_or(Value::Null)))
            .collect()
    }

    /// Returns records holding only `columns`, in that order.
    ///
    /// The same column may be requested more than once; each occurrence is
    /// an independent output field.
    pub fn apply(
        records: &[Record],
        headers: &[String],
        columns: &[String],
    ) -> EngineResult<Vec<Record>> {
        Self::validate(headers, columns)?;
        Ok(records.iter().map(|r| Self::record(r, columns)).collect())
    }
}
