//! Operator set
//!
//! Pure transformations applicable to one chunk or to a whole record set:
//!
//! - `Predicate` / `filter`: row selection
//! - `Projection`: column selection and reordering
//! - `GroupBy` + `Aggregation`: materialized grouping
//! - `GroupAccumulator`: the same grouping, updated chunk by chunk

mod aggregate;
mod predicate;
mod project;

pub use aggregate::{
    output_headers, AggFunc, Aggregate, Aggregation, Group, GroupAccumulator, GroupBy, GroupKey,
    Groups,
};
pub use predicate::{filter, CompareOp, Predicate};
pub use project::Projection;
