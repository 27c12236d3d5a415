//! Chunk source subsystem
//!
//! Turns an input stream into a lazy, finite sequence of fixed-size chunks.
//!
//! - `RowSource`: record-at-a-time decoding (delimited text, JSON, tables)
//! - `ChunkReader`: groups records into `Chunk`s with `is_last` lookahead
//! - `SourceOpener`: re-openable inputs (files and in-memory tables)

mod chunk;
mod input;
mod reader;
mod rows;

pub use chunk::Chunk;
pub use input::{FileSource, InputFormat, SourceOpener};
pub use reader::ChunkReader;
pub use rows::{default_headers, DelimitedRows, JsonRows, RowSource, TableRows};
