//! chunkql - a chunk-streaming tabular query engine
//!
//! Reads delimited or JSON input as a stream of fixed-size chunks and runs
//! filter, projection, hash join, group-by/aggregate, ORDER BY and LIMIT
//! over it. ORDER BY goes through an external merge sort that spills sorted
//! runs to a temporary directory, so sort memory is bounded by the number
//! of runs rather than the input size.

pub mod cli;
pub mod codec;
pub mod config;
pub mod errors;
pub mod join;
pub mod observability;
pub mod ops;
pub mod pipeline;
pub mod record;
pub mod sort;
pub mod source;

pub use config::EngineConfig;
pub use errors::{EngineError, EngineResult, ErrorCode};
pub use pipeline::{ExecutionMode, Operation, QueryPipeline, QueryResult};
pub use record::{Record, Table, Value};
pub use source::{FileSource, InputFormat, SourceOpener};
