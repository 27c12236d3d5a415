//! Query file format
//!
//! ```json
//! {
//!   "input": "sales.csv",
//!   "join_input": "regions.csv",
//!   "operations": [
//!     {"type": "filter", "predicate": {"column": "amount", "operator": ">", "value": 10}},
//!     {"type": "join", "left_on": "region_id", "right_on": "id", "how": "left"},
//!     {"type": "group_by", "columns": ["region"],
//!      "aggregates": [{"column": "amount", "functions": ["sum", "avg"]}]},
//!     {"type": "having", "predicate": {"column": "amount_sum", "operator": ">=", "value": 100}},
//!     {"type": "order_by", "keys": [{"column": "amount_sum", "direction": "desc"}]},
//!     {"type": "limit", "count": 10}
//!   ]
//! }
//! ```
//!
//! Predicates nest with `{"and": [..]}`, `{"or": [..]}` and `{"not": {..}}`.
//! Relative input paths resolve against the query file's directory.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use super::errors::{CliError, CliResult};
use crate::join::{JoinSpec, JoinType};
use crate::ops::{Aggregate, CompareOp, Predicate};
use crate::pipeline::Operation;
use crate::record::{Table, Value};
use crate::sort::{SortKey, SortOrder};

/// A parsed query file
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QueryFile {
    pub input: PathBuf,
    #[serde(default)]
    pub join_input: Option<PathBuf>,
    pub operations: Vec<OperationSpec>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OperationSpec {
    Filter {
        predicate: PredicateSpec,
    },
    Select {
        columns: Vec<String>,
    },
    Join {
        left_on: String,
        right_on: String,
        #[serde(default = "default_join_type")]
        how: String,
    },
    GroupBy {
        columns: Vec<String>,
        #[serde(default)]
        aggregates: Vec<AggregateSpec>,
    },
    Having {
        predicate: PredicateSpec,
    },
    OrderBy {
        keys: Vec<SortKeySpec>,
    },
    Limit {
        count: usize,
    },
}

fn default_join_type() -> String {
    "inner".to_string()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum PredicateSpec {
    And {
        and: Vec<PredicateSpec>,
    },
    Or {
        or: Vec<PredicateSpec>,
    },
    Not {
        not: Box<PredicateSpec>,
    },
    Compare {
        column: String,
        operator: String,
        value: serde_json::Value,
    },
}

#[derive(Debug, Clone, Deserialize)]
pub struct AggregateSpec {
    pub column: String,
    pub functions: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SortKeySpec {
    pub column: String,
    #[serde(default)]
    pub direction: Option<String>,
}

impl QueryFile {
    /// Reads a query file, resolving relative input paths against its
    /// directory
    pub fn load(path: &Path) -> CliResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            CliError::io_error(format!("failed to read query {}: {}", path.display(), e))
        })?;
        let mut query: QueryFile = serde_json::from_str(&content)?;

        if let Some(dir) = path.parent() {
            query.input = resolve(dir, &query.input);
            query.join_input = query.join_input.map(|p| resolve(dir, &p));
        }
        Ok(query)
    }

    /// True if any operation is a join
    pub fn needs_join_input(&self) -> bool {
        self.operations
            .iter()
            .any(|op| matches!(op, OperationSpec::Join { .. }))
    }

    /// Converts the operation list. `build` is the loaded join input, and
    /// must be present when the query contains a join.
    pub fn to_operations(&self, build: Option<&Table>) -> CliResult<Vec<Operation>> {
        self.operations
            .iter()
            .map(|spec| spec.to_operation(build))
            .collect()
    }
}

fn resolve(dir: &Path, path: &Path) -> PathBuf {
    if path.is_relative() {
        dir.join(path)
    } else {
        path.to_path_buf()
    }
}

impl OperationSpec {
    pub fn to_operation(&self, build: Option<&Table>) -> CliResult<Operation> {
        let op = match self {
            OperationSpec::Filter { predicate } => Operation::Filter(predicate.to_predicate()?),
            OperationSpec::Select { columns } => {
                if columns.is_empty() {
                    return Err(CliError::invalid_query("select needs at least one column"));
                }
                Operation::Select(columns.clone())
            }
            OperationSpec::Join {
                left_on,
                right_on,
                how,
            } => {
                let join_type = JoinType::parse(how).ok_or_else(|| {
                    CliError::invalid_query(format!("unknown join type '{}'", how))
                })?;
                let build = build.ok_or_else(|| {
                    CliError::invalid_query("join operation requires join_input")
                })?;
                Operation::Join {
                    build: build.clone(),
                    spec: JoinSpec::new(left_on.as_str(), right_on.as_str(), join_type),
                }
            }
            OperationSpec::GroupBy {
                columns,
                aggregates,
            } => {
                if columns.is_empty() {
                    return Err(CliError::invalid_query("group_by needs at least one column"));
                }
                let mut aggs = Vec::new();
                for spec in aggregates {
                    aggs.extend(Aggregate::expand(&spec.column, &spec.functions)?);
                }
                Operation::GroupBy {
                    columns: columns.clone(),
                    aggregates: aggs,
                }
            }
            OperationSpec::Having { predicate } => Operation::Having(predicate.to_predicate()?),
            OperationSpec::OrderBy { keys } => {
                let keys = keys
                    .iter()
                    .map(SortKeySpec::to_sort_key)
                    .collect::<CliResult<Vec<_>>>()?;
                Operation::OrderBy(SortOrder::new(keys)?)
            }
            OperationSpec::Limit { count } => Operation::Limit(*count),
        };
        Ok(op)
    }
}

impl PredicateSpec {
    pub fn to_predicate(&self) -> CliResult<Predicate> {
        match self {
            PredicateSpec::And { and } => Ok(Predicate::And(Self::all(and)?)),
            PredicateSpec::Or { or } => Ok(Predicate::Or(Self::all(or)?)),
            PredicateSpec::Not { not } => Ok(not.to_predicate()?.not()),
            PredicateSpec::Compare {
                column,
                operator,
                value,
            } => {
                let op = CompareOp::parse(operator).ok_or_else(|| {
                    CliError::invalid_query(format!("unknown operator '{}'", operator))
                })?;
                Ok(Predicate::compare(column.as_str(), op, literal(value)))
            }
        }
    }

    fn all(specs: &[PredicateSpec]) -> CliResult<Vec<Predicate>> {
        if specs.is_empty() {
            return Err(CliError::invalid_query("empty and/or predicate list"));
        }
        specs.iter().map(PredicateSpec::to_predicate).collect()
    }
}

impl SortKeySpec {
    fn to_sort_key(&self) -> CliResult<SortKey> {
        match self.direction.as_deref().map(str::to_ascii_lowercase).as_deref() {
            None | Some("asc") | Some("ascending") => Ok(SortKey::asc(self.column.as_str())),
            Some("desc") | Some("descending") => Ok(SortKey::desc(self.column.as_str())),
            Some(other) => Err(CliError::invalid_query(format!(
                "unknown sort direction '{}'",
                other
            ))),
        }
    }
}

/// Query literals use the same mapping as JSON input values
fn literal(value: &serde_json::Value) -> Value {
    match value {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::text(b.to_string()),
        serde_json::Value::Number(n) => match n.as_f64() {
            Some(f) => Value::Number(f),
            None => Value::text(n.to_string()),
        },
        serde_json::Value::String(s) => Value::text(s.as_str()),
        other => Value::text(other.to_string()),
    }
}
