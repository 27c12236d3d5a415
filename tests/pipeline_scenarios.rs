//! End-to-end pipeline scenarios
//!
//! Covers:
//! - sort over single-record chunks
//! - inner join
//! - group + aggregate, streaming and materialized
//! - LIMIT short-circuit in streaming mode
//! - chunk accounting and projection idempotence

use std::cell::Cell;

use chunkql::errors::{EngineResult, ErrorCode};
use chunkql::join::{JoinSpec, JoinType};
use chunkql::ops::{Aggregate, Predicate};
use chunkql::pipeline::{ExecutionMode, Operation, QueryPipeline};
use chunkql::record::{Record, Table, Value};
use chunkql::sort::{SortKey, SortOrder};
use chunkql::source::{RowSource, SourceOpener};

// =============================================================================
// Test Utilities
// =============================================================================

fn table(name: &str, headers: &[&str], rows: Vec<Record>) -> Table {
    Table::new(
        name,
        headers.iter().map(|h| h.to_string()).collect(),
        rows,
    )
    .unwrap()
}

/// A generated source that counts how many records were pulled from it
struct CountingSource {
    rows: usize,
    headers: Vec<String>,
    pulled: Cell<usize>,
}

impl CountingSource {
    fn new(rows: usize) -> Self {
        Self {
            rows,
            headers: vec!["n".to_string()],
            pulled: Cell::new(0),
        }
    }
}

struct CountingRows<'a> {
    owner: &'a CountingSource,
    next: usize,
}

impl RowSource for CountingRows<'_> {
    fn headers(&self) -> &[String] {
        &self.owner.headers
    }

    fn next_record(&mut self) -> EngineResult<Option<Record>> {
        if self.next == self.owner.rows {
            return Ok(None);
        }
        self.owner.pulled.set(self.owner.pulled.get() + 1);
        let record = Record::new().with("n", self.next as i64);
        self.next += 1;
        Ok(Some(record))
    }
}

impl SourceOpener for CountingSource {
    fn name(&self) -> &str {
        "counting"
    }

    fn open(&self) -> EngineResult<Box<dyn RowSource + '_>> {
        Ok(Box::new(CountingRows {
            owner: self,
            next: 0,
        }))
    }
}

// =============================================================================
// Scenarios
// =============================================================================

#[test]
fn test_sort_single_record_chunks() {
    let input = table(
        "t",
        &["k"],
        vec![
            Record::new().with("k", 3),
            Record::new().with("k", 1),
            Record::new().with("k", 2),
        ],
    );
    let result = QueryPipeline::new(vec![Operation::OrderBy(SortOrder::single(
        SortKey::asc("k"),
    ))])
    .with_chunk_size(1)
    .execute(&input)
    .unwrap();

    assert_eq!(result.mode, ExecutionMode::Materialized);
    assert_eq!(result.chunks_read, 3);
    assert_eq!(result.sort_stats.unwrap().runs_created, 3);
    assert_eq!(
        result.records,
        vec![
            Record::new().with("k", 1),
            Record::new().with("k", 2),
            Record::new().with("k", 3),
        ]
    );
}

#[test]
fn test_inner_join() {
    let left = table(
        "left",
        &["id", "v"],
        vec![
            Record::new().with("id", 1).with("v", "a"),
            Record::new().with("id", 2).with("v", "b"),
        ],
    );
    let right = table(
        "right",
        &["id", "w"],
        vec![
            Record::new().with("id", 1).with("w", "x"),
            Record::new().with("id", 3).with("w", "y"),
        ],
    );

    let result = QueryPipeline::new(vec![Operation::Join {
        build: right,
        spec: JoinSpec::inner("id", "id"),
    }])
    .execute(&left)
    .unwrap();

    assert_eq!(result.headers, vec!["id", "v", "w"]);
    assert_eq!(
        result.records,
        vec![Record::new().with("id", 1).with("v", "a").with("w", "x")]
    );
}

fn sales() -> Table {
    table(
        "sales",
        &["cat", "amt"],
        vec![
            Record::new().with("cat", "A").with("amt", 10),
            Record::new().with("cat", "A").with("amt", 20),
            Record::new().with("cat", "B").with("amt", 5),
        ],
    )
}

fn expected_groups() -> Vec<Record> {
    vec![
        Record::new()
            .with("cat", "A")
            .with("amt_sum", 30)
            .with("amt_count", 2),
        Record::new()
            .with("cat", "B")
            .with("amt_sum", 5)
            .with("amt_count", 1),
    ]
}

#[test]
fn test_group_and_aggregate_streaming() {
    let result = QueryPipeline::new(vec![Operation::GroupBy {
        columns: vec!["cat".into()],
        aggregates: Aggregate::expand("amt", &["sum", "count"]).unwrap(),
    }])
    .with_chunk_size(1)
    .execute(&sales())
    .unwrap();

    assert_eq!(result.mode, ExecutionMode::Streaming);
    assert_eq!(result.headers, vec!["cat", "amt_sum", "amt_count"]);
    assert_eq!(result.records, expected_groups());
}

#[test]
fn test_group_after_sort_matches_streaming() {
    // ORDER BY forces materialized mode; grouping the sorted input must give
    // the same groups (A sorts before B either way)
    let result = QueryPipeline::new(vec![
        Operation::OrderBy(SortOrder::single(SortKey::asc("cat"))),
        Operation::GroupBy {
            columns: vec!["cat".into()],
            aggregates: Aggregate::expand("amt", &["sum", "count"]).unwrap(),
        },
    ])
    .with_chunk_size(2)
    .execute(&sales())
    .unwrap();

    assert_eq!(result.mode, ExecutionMode::Materialized);
    assert_eq!(result.records, expected_groups());
}

#[test]
fn test_limit_short_circuit() {
    let source = CountingSource::new(10_000);
    let result = QueryPipeline::new(vec![Operation::Limit(5)])
        .with_chunk_size(1_000)
        .execute(&source)
        .unwrap();

    assert_eq!(result.len(), 5);
    assert_eq!(result.chunks_read, 1);
    assert!(result.limit_applied);
    // One chunk plus at most one record of lookahead
    assert!(source.pulled.get() <= 1_001, "pulled {}", source.pulled.get());

    let first: Vec<f64> = result
        .iter()
        .filter_map(|r| r.get("n").and_then(Value::as_number))
        .collect();
    assert_eq!(first, vec![0.0, 1.0, 2.0, 3.0, 4.0]);
}

#[test]
fn test_filtered_limit_reads_until_satisfied() {
    let source = CountingSource::new(10_000);
    let result = QueryPipeline::new(vec![
        Operation::Filter(Predicate::gte("n", 2_500)),
        Operation::Limit(3),
    ])
    .with_chunk_size(1_000)
    .execute(&source)
    .unwrap();

    assert_eq!(result.len(), 3);
    assert_eq!(result.chunks_read, 3);
    assert!(source.pulled.get() < 10_000);
}

#[test]
fn test_chunk_accounting() {
    let source = CountingSource::new(2_345);
    let result = QueryPipeline::new(Vec::new())
        .with_chunk_size(1_000)
        .execute(&source)
        .unwrap();

    assert_eq!(result.chunks_read, 3);
    assert_eq!(result.rows_scanned, 2_345);
    assert_eq!(result.len(), 2_345);
    assert!(!result.limit_applied);
}

#[test]
fn test_empty_source_yields_one_empty_chunk() {
    let source = CountingSource::new(0);
    let result = QueryPipeline::new(Vec::new()).execute(&source).unwrap();
    assert_eq!(result.chunks_read, 1);
    assert!(result.is_empty());
    assert_eq!(result.headers, vec!["n"]);
}

#[test]
fn test_projection_is_idempotent() {
    let input = sales();
    let once = QueryPipeline::new(vec![Operation::Select(vec!["amt".into()])])
        .execute(&input)
        .unwrap();
    let twice = QueryPipeline::new(vec![
        Operation::Select(vec!["amt".into()]),
        Operation::Select(vec!["amt".into()]),
    ])
    .execute(&input)
    .unwrap();
    assert_eq!(once.records, twice.records);
    assert_eq!(once.headers, twice.headers);
}

#[test]
fn test_having_filters_grouped_output() {
    let result = QueryPipeline::new(vec![
        Operation::GroupBy {
            columns: vec!["cat".into()],
            aggregates: Aggregate::expand("amt", &["sum"]).unwrap(),
        },
        Operation::Having(Predicate::gt("amt_sum", 10)),
    ])
    .execute(&sales())
    .unwrap();
    assert_eq!(
        result.records,
        vec![Record::new().with("cat", "A").with("amt_sum", 30)]
    );
}

#[test]
fn test_left_join_then_limit() {
    let left = sales();
    let right = table(
        "names",
        &["cat", "label"],
        vec![Record::new().with("cat", "B").with("label", "bravo")],
    );
    let result = QueryPipeline::new(vec![
        Operation::Join {
            build: right,
            spec: JoinSpec::new("cat", "cat", JoinType::Left),
        },
        Operation::Limit(2),
    ])
    .execute(&left)
    .unwrap();

    assert_eq!(result.headers, vec!["cat", "amt", "label"]);
    assert_eq!(result.len(), 2);
    assert!(result.iter().all(|r| r.get("label") == Some(&Value::Null)));
}

#[test]
fn test_unknown_column_aborts_without_partial_result() {
    let err = QueryPipeline::new(vec![
        Operation::Select(vec!["cat".into()]),
        Operation::OrderBy(SortOrder::single(SortKey::asc("amt"))),
    ])
    .execute(&sales())
    .unwrap_err();
    assert_eq!(err.code(), ErrorCode::UnknownColumn);
    assert_eq!(err.column(), Some("amt"));
}
