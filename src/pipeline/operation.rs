//! Query operations and execution mode selection

use std::fmt;

use crate::join::JoinSpec;
use crate::ops::{Aggregate, Predicate};
use crate::record::Table;
use crate::sort::SortOrder;

/// One step of a query pipeline, applied in list order
#[derive(Debug, Clone)]
pub enum Operation {
    /// Keep records matching the predicate
    Filter(Predicate),
    /// Project to these columns, in this order
    Select(Vec<String>),
    /// Join the current records (probe side) against a build table
    Join { build: Table, spec: JoinSpec },
    /// Group by key columns and reduce each group
    GroupBy {
        columns: Vec<String>,
        aggregates: Vec<Aggregate>,
    },
    /// Filter grouped output; requires an earlier GroupBy
    Having(Predicate),
    OrderBy(SortOrder),
    Limit(usize),
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Filter(_) => "FILTER",
            Operation::Select(_) => "SELECT",
            Operation::Join { .. } => "JOIN",
            Operation::GroupBy { .. } => "GROUP_BY",
            Operation::Having(_) => "HAVING",
            Operation::OrderBy(_) => "ORDER_BY",
            Operation::Limit(_) => "LIMIT",
        }
    }

    /// True for operations that need the whole input at once
    pub fn needs_materialization(&self) -> bool {
        matches!(self, Operation::Join { .. } | Operation::OrderBy(_))
    }

    /// Human-readable one-line description
    pub fn describe(&self) -> String {
        match self {
            Operation::Filter(p) => format!("FILTER on {}", p.columns().join(", ")),
            Operation::Select(cols) => format!("SELECT {}", cols.join(", ")),
            Operation::Join { build, spec } => format!(
                "{} JOIN {} ON {} = {}",
                spec.join_type,
                build.name(),
                spec.probe_key,
                spec.build_key
            ),
            Operation::GroupBy {
                columns,
                aggregates,
            } => {
                let aggs: Vec<String> = aggregates.iter().map(Aggregate::output_name).collect();
                if aggs.is_empty() {
                    format!("GROUP BY {}", columns.join(", "))
                } else {
                    format!("GROUP BY {} AGG {}", columns.join(", "), aggs.join(", "))
                }
            }
            Operation::Having(p) => format!("HAVING on {}", p.columns().join(", ")),
            Operation::OrderBy(order) => {
                let keys: Vec<String> = order
                    .keys()
                    .iter()
                    .map(|k| format!("{} {}", k.column, k.direction.as_str()))
                    .collect();
                format!("ORDER BY {}", keys.join(", "))
            }
            Operation::Limit(n) => format!("LIMIT {}", n),
        }
    }
}

/// How a pipeline runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    /// Chunk by chunk; only grouped state and the result are retained
    Streaming,
    /// Needs global visibility of the input (JOIN or ORDER BY present)
    Materialized,
}

impl ExecutionMode {
    pub fn choose(ops: &[Operation]) -> ExecutionMode {
        if ops.iter().any(Operation::needs_materialization) {
            ExecutionMode::Materialized
        } else {
            ExecutionMode::Streaming
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionMode::Streaming => "streaming",
            ExecutionMode::Materialized => "materialized",
        }
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
