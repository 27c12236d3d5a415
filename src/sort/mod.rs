//! External merge sort
//!
//! Sorts input larger than memory: each chunk is filtered and sorted in
//! memory, spilled as a run, and the runs are merged through a min-heap
//! holding one record per run.
//!
//! # Invariants
//!
//! - The local sort and the merge use the same `SortOrder`
//! - The merge holds at most one in-flight record per run
//! - Spill storage is unique per invocation and removed on every exit path

mod merge;
mod order;
mod sorter;
mod spill;

pub use merge::{MergedRuns, SortStats};
pub use order::{SortDirection, SortKey, SortOrder};
pub use sorter::ExternalSorter;
pub use spill::{remove_run, RunReader, RunWriter, SpillDir};
