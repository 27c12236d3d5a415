//! Group-by and aggregation
//!
//! Both the materialized path (`GroupBy::apply` then
//! `Aggregation::apply_to_groups`) and the streaming `GroupAccumulator` feed
//! the same per-group state, so they produce identical output for the same
//! input order.
//!
//! Numeric functions skip values that do not coerce to a number. A group
//! with no coercible values omits that function's output field entirely.

use std::collections::HashMap;

use crate::errors::{EngineError, EngineResult};
use crate::observability::coercion_skipped;
use crate::record::{Record, Value};

/// Aggregate function
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggFunc {
    Sum,
    Avg,
    Count,
    Min,
    Max,
    Median,
}

impl AggFunc {
    /// Parses a function name. `average` and `mean` are aliases of `avg`.
    pub fn parse(name: &str) -> Option<AggFunc> {
        match name.trim().to_ascii_lowercase().as_str() {
            "sum" => Some(AggFunc::Sum),
            "avg" | "average" | "mean" => Some(AggFunc::Avg),
            "count" => Some(AggFunc::Count),
            "min" => Some(AggFunc::Min),
            "max" => Some(AggFunc::Max),
            "median" => Some(AggFunc::Median),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AggFunc::Sum => "sum",
            AggFunc::Avg => "avg",
            AggFunc::Count => "count",
            AggFunc::Min => "min",
            AggFunc::Max => "max",
            AggFunc::Median => "median",
        }
    }
}

/// One requested aggregate: a function over a column
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregate {
    column: String,
    func: AggFunc,
    /// Function name as requested; forms the output field suffix
    label: String,
}

impl Aggregate {
    pub fn new(column: impl Into<String>, func: AggFunc) -> Self {
        Self {
            column: column.into(),
            func,
            label: func.as_str().to_string(),
        }
    }

    /// Builds an aggregate from a function name, keeping the name as given
    pub fn parse(column: impl Into<String>, func: &str) -> EngineResult<Self> {
        let parsed = AggFunc::parse(func).ok_or_else(|| {
            EngineError::invalid_operation(format!("Unknown aggregate function '{}'", func))
        })?;
        Ok(Self {
            column: column.into(),
            func: parsed,
            label: func.trim().to_ascii_lowercase(),
        })
    }

    /// Expands one column's function list
    pub fn expand<S: AsRef<str>>(column: &str, funcs: &[S]) -> EngineResult<Vec<Self>> {
        funcs.iter().map(|f| Self::parse(column, f.as_ref())).collect()
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    pub fn func(&self) -> AggFunc {
        self.func
    }

    /// `{column}_{function}`
    pub fn output_name(&self) -> String {
        format!("{}_{}", self.column, self.label)
    }
}

/// Composite group key: the stringified raw values of the grouping columns.
///
/// Null and absent values are `None`, distinct from the empty string.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GroupKey(Vec<Option<String>>);

impl GroupKey {
    pub fn of(record: &Record, columns: &[String]) -> Self {
        GroupKey(
            columns
                .iter()
                .map(|c| match record.get(c) {
                    None | Some(Value::Null) => None,
                    Some(v) => Some(v.render()),
                })
                .collect(),
        )
    }
}

/// A group: its key values and members in input order
#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    key_values: Vec<Value>,
    members: Vec<Record>,
}

impl Group {
    pub fn key_values(&self) -> &[Value] {
        &self.key_values
    }

    pub fn members(&self) -> &[Record] {
        &self.members
    }
}

/// Grouped records, groups in first-seen order
#[derive(Debug, Clone)]
pub struct Groups {
    columns: Vec<String>,
    groups: Vec<Group>,
}

impl Groups {
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Group> {
        self.groups.iter()
    }
}

fn key_values(record: &Record, columns: &[String]) -> Vec<Value> {
    columns
        .iter()
        .map(|c| record.get(c).cloned().unwrap_or(Value::Null))
        .collect()
}

fn require_columns<'a>(
    headers: &[String],
    columns: impl IntoIterator<Item = &'a str>,
) -> EngineResult<()> {
    for col in columns {
        if !headers.iter().any(|h| h == col) {
            return Err(EngineError::unknown_column(col, headers));
        }
    }
    Ok(())
}

/// Partitions records by composite key
pub struct GroupBy;

impl GroupBy {
    pub fn apply(records: Vec<Record>, headers: &[String], columns: &[String]) -> EngineResult<Groups> {
        require_columns(headers, columns.iter().map(String::as_str))?;

        let mut index: HashMap<GroupKey, usize> = HashMap::new();
        let mut groups: Vec<Group> = Vec::new();
        for record in records {
            let key = GroupKey::of(&record, columns);
            let slot = *index.entry(key).or_insert_with(|| {
                groups.push(Group {
                    key_values: key_values(&record, columns),
                    members: Vec::new(),
                });
                groups.len() - 1
            });
            groups[slot].members.push(record);
        }

        Ok(Groups {
            columns: columns.to_vec(),
            groups,
        })
    }
}

/// Reduces groups to one record each
pub struct Aggregation;

impl Aggregation {
    pub fn apply_to_groups(
        groups: &Groups,
        headers: &[String],
        aggregates: &[Aggregate],
    ) -> EngineResult<Vec<Record>> {
        require_columns(headers, aggregates.iter().map(Aggregate::column))?;

        Ok(groups
            .iter()
            .map(|group| {
                let mut state = GroupState::new(group.key_values.clone(), aggregates);
                for member in &group.members {
                    state.update(member, aggregates);
                }
                state.finish(&groups.columns, aggregates)
            })
            .collect())
    }
}

/// Output headers of a group-by: key columns then one field per aggregate,
/// or a single `count` field when no aggregates were requested
pub fn output_headers(columns: &[String], aggregates: &[Aggregate]) -> Vec<String> {
    let mut out = columns.to_vec();
    if aggregates.is_empty() {
        out.push("count".to_string());
    } else {
        out.extend(aggregates.iter().map(Aggregate::output_name));
    }
    out
}

#[derive(Debug, Clone)]
enum AggState {
    Sum { total: f64, seen: usize },
    Avg { total: f64, seen: usize },
    Count(usize),
    Min(Option<f64>),
    Max(Option<f64>),
    Median(Vec<f64>),
}

impl AggState {
    fn new(func: AggFunc) -> Self {
        match func {
            AggFunc::Sum => AggState::Sum { total: 0.0, seen: 0 },
            AggFunc::Avg => AggState::Avg { total: 0.0, seen: 0 },
            AggFunc::Count => AggState::Count(0),
            AggFunc::Min => AggState::Min(None),
            AggFunc::Max => AggState::Max(None),
            AggFunc::Median => AggState::Median(Vec::new()),
        }
    }

    fn update(&mut self, value: Option<&Value>, column: &str) {
        if let AggState::Count(n) = self {
            *n += 1;
            return;
        }

        let n = match value.and_then(Value::as_number) {
            Some(n) => n,
            None => {
                if value.is_some_and(|v| !v.is_null()) {
                    coercion_skipped("aggregate", column);
                }
                return;
            }
        };

        match self {
            AggState::Sum { total, seen } | AggState::Avg { total, seen } => {
                *total += n;
                *seen += 1;
            }
            AggState::Min(cur) => *cur = Some(cur.map_or(n, |c| c.min(n))),
            AggState::Max(cur) => *cur = Some(cur.map_or(n, |c| c.max(n))),
            AggState::Median(values) => values.push(n),
            AggState::Count(_) => {}
        }
    }

    fn finish(&self) -> Option<Value> {
        match self {
            AggState::Sum { total, seen } => (*seen > 0).then_some(Value::Number(*total)),
            AggState::Avg { total, seen } => {
                (*seen > 0).then(|| Value::Number(*total / *seen as f64))
            }
            AggState::Count(n) => Some(Value::Number(*n as f64)),
            AggState::Min(v) | AggState::Max(v) => v.map(Value::Number),
            AggState::Median(values) => median(values).map(Value::Number),
        }
    }
}

fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

#[derive(Debug, Clone)]
struct GroupState {
    key_values: Vec<Value>,
    members: usize,
    states: Vec<AggState>,
}

impl GroupState {
    fn new(key_values: Vec<Value>, aggregates: &[Aggregate]) -> Self {
        Self {
            key_values,
            members: 0,
            states: aggregates.iter().map(|a| AggState::new(a.func)).collect(),
        }
    }

    fn update(&mut self, record: &Record, aggregates: &[Aggregate]) {
        self.members += 1;
        for (state, agg) in self.states.iter_mut().zip(aggregates) {
            state.update(record.get(&agg.column), &agg.column);
        }
    }

    fn finish(&self, columns: &[String], aggregates: &[Aggregate]) -> Record {
        let mut out = Record::with_capacity(columns.len() + aggregates.len().max(1));
        for (col, value) in columns.iter().zip(&self.key_values) {
            out.push(col.clone(), value.clone());
        }
        if aggregates.is_empty() {
            out.push("count", Value::Number(self.members as f64));
        }
        for (state, agg) in self.states.iter().zip(aggregates) {
            if let Some(value) = state.finish() {
                out.push(agg.output_name(), value);
            }
        }
        out
    }
}

/// Running per-key accumulator for streaming group-by.
///
/// Holds one state per distinct key rather than the member records.
#[derive(Debug, Clone)]
pub struct GroupAccumulator {
    columns: Vec<String>,
    aggregates: Vec<Aggregate>,
    index: HashMap<GroupKey, usize>,
    groups: Vec<GroupState>,
}

impl GroupAccumulator {
    pub fn new(
        headers: &[String],
        columns: Vec<String>,
        aggregates: Vec<Aggregate>,
    ) -> EngineResult<Self> {
        require_columns(headers, columns.iter().map(String::as_str))?;
        require_columns(headers, aggregates.iter().map(Aggregate::column))?;
        Ok(Self {
            columns,
            aggregates,
            index: HashMap::new(),
            groups: Vec::new(),
        })
    }

    pub fn push(&mut self, record: &Record) {
        let key = GroupKey::of(record, &self.columns);
        let slot = match self.index.get(&key) {
            Some(&slot) => slot,
            None => {
                self.groups.push(GroupState::new(
                    key_values(record, &self.columns),
                    &self.aggregates,
                ));
                let slot = self.groups.len() - 1;
                self.index.insert(key, slot);
                slot
            }
        };
        self.groups[slot].update(record, &self.aggregates);
    }

    pub fn extend<'a>(&mut self, records: impl IntoIterator<Item = &'a Record>) {
        for record in records {
            self.push(record);
        }
    }

    /// Distinct keys seen so far
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    pub fn output_headers(&self) -> Vec<String> {
        output_headers(&self.columns, &self.aggregates)
    }

    /// Flushes one record per group in first-seen order
    pub fn finish(self) -> Vec<Record> {
        self.groups
            .iter()
            .map(|g| g.finish(&self.columns, &self.aggregates))
            .collect()
    }
}
