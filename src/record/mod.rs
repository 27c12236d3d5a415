//! Record model shared by every component
//!
//! - `Value`: string, number, or null
//! - `Record`: ordered named fields with explicit absent-vs-null lookup
//! - `Table`: headers plus conforming records, immutable once built

mod record;
mod table;
mod value;

pub use record::Record;
pub use table::{duplicate_header, ColumnType, Table};
pub use value::{compare_values, format_number, Value};
