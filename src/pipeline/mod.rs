//! Query pipeline
//!
//! An ordered list of `Operation`s run over one source. The coordinator
//! picks streaming or materialized execution and drives the chunk source,
//! operators, join engine and external sort accordingly.

mod coordinator;
mod operation;
mod result;

pub use coordinator::{QueryPipeline, DEFAULT_CHUNK_SIZE};
pub use operation::{ExecutionMode, Operation};
pub use result::QueryResult;
