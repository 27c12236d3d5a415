//! Query pipeline coordinator
//!
//! Execution flow:
//! 1. Validate the operation list
//! 2. Choose the mode: materialized if any JOIN or ORDER BY, else streaming
//! 3. Streaming: filter/project/limit each chunk as it arrives, feed a
//!    running group accumulator if grouping, stop pulling once every
//!    needed record has been seen
//! 4. Materialized: an ORDER BY reached through filters and projections
//!    sorts straight from the chunk stream; anything else loads the whole
//!    input first and applies operations in order
//!
//! The first failure aborts the run. No partial result is returned, and
//! spill storage and join state are released on the way out.

use std::path::PathBuf;

use super::operation::{ExecutionMode, Operation};
use super::result::QueryResult;
use crate::errors::{EngineError, EngineResult};
use crate::join::JoinEngine;
use crate::observability::{log_event_with_fields, Event, ObservationScope, Severity};
use crate::ops::{output_headers, Aggregation, GroupAccumulator, GroupBy, Predicate, Projection};
use crate::record::Record;
use crate::sort::{ExternalSorter, MergedRuns, SortOrder, SortStats};
use crate::source::SourceOpener;

/// Default records per chunk
pub const DEFAULT_CHUNK_SIZE: usize = 10_000;

/// Headers plus records flowing between operations
#[derive(Debug, Default)]
struct Relation {
    headers: Vec<String>,
    records: Vec<Record>,
}

#[derive(Debug, Default)]
struct Counters {
    chunks_read: usize,
    rows_scanned: usize,
    limit_applied: bool,
    sort_stats: Option<SortStats>,
}

enum Step<'a> {
    Filter(&'a Predicate),
    Select(&'a [String]),
    Limit(usize),
}

/// The per-chunk prefix of a pipeline: filters, projections and limits
/// applied to each chunk independently
struct ChunkStage<'a> {
    steps: Vec<Step<'a>>,
    headers: Vec<String>,
    truncated: bool,
}

impl<'a> ChunkStage<'a> {
    /// Plans `ops` (which must all be chunk-local) over `input` headers,
    /// validating projections up front
    fn plan(ops: &'a [Operation], input: &[String]) -> EngineResult<Self> {
        let mut headers = input.to_vec();
        let mut steps = Vec::with_capacity(ops.len());
        for op in ops {
            match op {
                Operation::Filter(p) => steps.push(Step::Filter(p)),
                Operation::Select(cols) => {
                    Projection::validate(&headers, cols)?;
                    headers = cols.clone();
                    steps.push(Step::Select(cols));
                }
                Operation::Limit(n) => steps.push(Step::Limit(*n)),
                other => {
                    return Err(EngineError::invalid_operation(format!(
                        "{} cannot run per chunk",
                        other.name()
                    )))
                }
            }
        }
        Ok(Self {
            steps,
            headers,
            truncated: false,
        })
    }

    fn apply(&mut self, mut records: Vec<Record>) -> Vec<Record> {
        for step in &mut self.steps {
            match step {
                Step::Filter(p) => records.retain(|r| p.matches(r)),
                Step::Select(cols) => {
                    let cols: &[String] = cols;
                    records = records
                        .iter()
                        .map(|r| Projection::record(r, cols))
                        .collect();
                }
                Step::Limit(remaining) => {
                    if records.len() > *remaining {
                        records.truncate(*remaining);
                        self.truncated = true;
                    }
                    *remaining -= records.len();
                }
            }
        }
        records
    }

    /// True once some limit can pass no further records
    fn exhausted(&self) -> bool {
        self.steps.iter().any(|s| matches!(s, Step::Limit(0)))
    }
}

fn is_chunk_local(op: &Operation) -> bool {
    matches!(op, Operation::Filter(_) | Operation::Select(_))
}

/// Coordinates one operation list over a source
#[derive(Debug, Clone)]
pub struct QueryPipeline {
    ops: Vec<Operation>,
    chunk_size: usize,
    spill_base: Option<PathBuf>,
}

impl QueryPipeline {
    pub fn new(ops: Vec<Operation>) -> Self {
        Self {
            ops,
            chunk_size: DEFAULT_CHUNK_SIZE,
            spill_base: None,
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Spill directories for ORDER BY are created under `base`
    pub fn with_spill_base(mut self, base: impl Into<PathBuf>) -> Self {
        self.spill_base = Some(base.into());
        self
    }

    pub fn operations(&self) -> &[Operation] {
        &self.ops
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn mode(&self) -> ExecutionMode {
        ExecutionMode::choose(&self.ops)
    }

    /// Structural checks that need no data
    pub fn validate(&self) -> EngineResult<()> {
        if self.chunk_size == 0 {
            return Err(EngineError::invalid_operation("chunk_size must be positive"));
        }
        let mut grouped = false;
        for op in &self.ops {
            match op {
                Operation::GroupBy { .. } => grouped = true,
                Operation::Having(_) if !grouped => {
                    return Err(EngineError::invalid_operation(
                        "HAVING requires an earlier GROUP BY",
                    ))
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Runs the pipeline to completion
    pub fn execute<S: SourceOpener + ?Sized>(&self, source: &S) -> EngineResult<QueryResult> {
        self.validate()?;
        let mode = self.mode();
        let scope = ObservationScope::with_fields(
            "PIPELINE",
            vec![("mode", mode.to_string()), ("source", source.name().to_string())],
        );
        log_event_with_fields(
            Event::PipelineStart,
            &[
                ("mode", mode.as_str()),
                ("ops", self.ops.len().to_string().as_str()),
            ],
        );

        let mut counters = Counters::default();
        let outcome = match mode {
            ExecutionMode::Streaming => self.run_streaming(source, &mut counters),
            ExecutionMode::Materialized => self.run_materialized(source, &mut counters),
        };

        match outcome {
            Ok(relation) => {
                let rows = relation.records.len().to_string();
                log_event_with_fields(
                    Event::PipelineComplete,
                    &[("mode", mode.as_str()), ("rows", rows.as_str())],
                );
                scope.complete_with_fields(&[("rows", rows.as_str())]);
                Ok(QueryResult {
                    headers: relation.headers,
                    records: relation.records,
                    mode,
                    chunks_read: counters.chunks_read,
                    rows_scanned: counters.rows_scanned,
                    limit_applied: counters.limit_applied,
                    sort_stats: counters.sort_stats,
                })
            }
            Err(e) => {
                log_event_with_fields(
                    Event::PipelineAborted,
                    &[("code", e.code().code()), ("reason", e.message())],
                );
                scope.fail(Severity::Error, e.message());
                Err(e)
            }
        }
    }

    fn run_streaming<S: SourceOpener + ?Sized>(
        &self,
        source: &S,
        counters: &mut Counters,
    ) -> EngineResult<Relation> {
        let split = self
            .ops
            .iter()
            .position(|op| matches!(op, Operation::GroupBy { .. }))
            .unwrap_or(self.ops.len());
        let (prefix, rest) = self.ops.split_at(split);

        let mut reader = source.chunks(self.chunk_size)?;
        let mut stage = ChunkStage::plan(prefix, reader.headers())?;
        let mut grouping = match rest.first() {
            Some(Operation::GroupBy {
                columns,
                aggregates,
            }) => Some(GroupAccumulator::new(
                &stage.headers,
                columns.clone(),
                aggregates.clone(),
            )?),
            _ => None,
        };

        let mut out = Vec::new();
        while !stage.exhausted() {
            let Some(chunk) = reader.next() else {
                break;
            };
            let chunk = chunk?;
            counters.chunks_read += 1;
            counters.rows_scanned += chunk.rows_in_chunk();
            let is_last = chunk.is_last();

            let records = stage.apply(chunk.into_records());
            match grouping.as_mut() {
                Some(acc) => acc.extend(&records),
                None => out.extend(records),
            }

            if stage.exhausted() && !is_last {
                counters.limit_applied = true;
                log_event_with_fields(
                    Event::LimitReached,
                    &[("chunks_read", counters.chunks_read.to_string().as_str())],
                );
            }
        }
        drop(reader);
        counters.limit_applied |= stage.truncated;

        let (mut relation, rest) = match grouping {
            Some(acc) => (
                Relation {
                    headers: acc.output_headers(),
                    records: acc.finish(),
                },
                &rest[1..],
            ),
            None => (
                Relation {
                    headers: stage.headers,
                    records: out,
                },
                rest,
            ),
        };

        for op in rest {
            relation = self.apply(op, relation, counters)?;
        }
        Ok(relation)
    }

    fn run_materialized<S: SourceOpener + ?Sized>(
        &self,
        source: &S,
        counters: &mut Counters,
    ) -> EngineResult<Relation> {
        let first = self
            .ops
            .iter()
            .position(Operation::needs_materialization)
            .unwrap_or(0);
        let prefix = &self.ops[..first];

        let (mut relation, next) = match self.ops.get(first) {
            Some(Operation::OrderBy(order)) if prefix.iter().all(is_chunk_local) => {
                let limit = match self.ops.get(first + 1) {
                    Some(Operation::Limit(n)) => Some(*n),
                    _ => None,
                };
                let relation = self.sort_source(source, prefix, order, limit, counters)?;
                (relation, first + 1 + usize::from(limit.is_some()))
            }
            _ => (self.load(source, counters)?, 0),
        };

        for op in &self.ops[next..] {
            relation = self.apply(op, relation, counters)?;
        }
        Ok(relation)
    }

    fn sorter(&self, order: &SortOrder) -> ExternalSorter {
        let sorter = ExternalSorter::new(order.clone());
        match &self.spill_base {
            Some(base) => sorter.with_spill_base(base.clone()),
            None => sorter,
        }
    }

    /// Feeds the chunk stream through `prefix` into the external sort, then
    /// pulls at most `limit` records from the merge
    fn sort_source<S: SourceOpener + ?Sized>(
        &self,
        source: &S,
        prefix: &[Operation],
        order: &SortOrder,
        limit: Option<usize>,
        counters: &mut Counters,
    ) -> EngineResult<Relation> {
        let mut reader = source.chunks(self.chunk_size)?;
        let mut stage = ChunkStage::plan(prefix, reader.headers())?;
        order.validate(&stage.headers)?;

        let sorter = self.sorter(order);
        let batches = reader.by_ref().map(|chunk| -> EngineResult<Vec<Record>> {
            let chunk = chunk?;
            counters.chunks_read += 1;
            counters.rows_scanned += chunk.rows_in_chunk();
            Ok(stage.apply(chunk.into_records()))
        });
        let merged = sorter.sort_batches(batches)?;

        let take = limit.unwrap_or(usize::MAX);
        let records = drain_merge(merged, take, counters)?;
        Ok(Relation {
            headers: stage.headers,
            records,
        })
    }

    /// Reads the whole source into memory
    fn load<S: SourceOpener + ?Sized>(
        &self,
        source: &S,
        counters: &mut Counters,
    ) -> EngineResult<Relation> {
        let mut reader = source.chunks(self.chunk_size)?;
        let headers = reader.headers().to_vec();
        let mut records = Vec::new();
        for chunk in reader.by_ref() {
            let chunk = chunk?;
            counters.chunks_read += 1;
            counters.rows_scanned += chunk.rows_in_chunk();
            records.extend(chunk.into_records());
        }
        Ok(Relation { headers, records })
    }

    /// Applies one operation to a fully materialized relation
    fn apply(
        &self,
        op: &Operation,
        mut relation: Relation,
        counters: &mut Counters,
    ) -> EngineResult<Relation> {
        match op {
            Operation::Filter(p) | Operation::Having(p) => {
                relation.records.retain(|r| p.matches(r));
                Ok(relation)
            }
            Operation::Select(cols) => {
                let records = Projection::apply(&relation.records, &relation.headers, cols)?;
                Ok(Relation {
                    headers: cols.clone(),
                    records,
                })
            }
            Operation::Join { build, spec } => {
                let mut engine = JoinEngine::new(spec.clone());
                engine.build(build, &relation.headers)?;
                let mut records = Vec::with_capacity(relation.records.len());
                for batch in relation.records.chunks(self.chunk_size) {
                    records.extend(engine.probe(batch)?);
                }
                records.extend(engine.finish()?);
                Ok(Relation {
                    headers: engine.headers().to_vec(),
                    records,
                })
            }
            Operation::GroupBy {
                columns,
                aggregates,
            } => {
                let groups = GroupBy::apply(relation.records, &relation.headers, columns)?;
                let records = Aggregation::apply_to_groups(&groups, &relation.headers, aggregates)?;
                Ok(Relation {
                    headers: output_headers(columns, aggregates),
                    records,
                })
            }
            Operation::OrderBy(order) => {
                order.validate(&relation.headers)?;
                let mut rows = relation.records.into_iter();
                let mut batches = Vec::new();
                loop {
                    let batch: Vec<Record> = rows.by_ref().take(self.chunk_size).collect();
                    if batch.is_empty() {
                        break;
                    }
                    batches.push(Ok(batch));
                }
                let merged = self.sorter(order).sort_batches(batches)?;
                let records = drain_merge(merged, usize::MAX, counters)?;
                Ok(Relation {
                    headers: relation.headers,
                    records,
                })
            }
            Operation::Limit(n) => {
                if relation.records.len() > *n {
                    relation.records.truncate(*n);
                    counters.limit_applied = true;
                }
                Ok(relation)
            }
        }
    }
}

/// Pulls up to `take` records from a merge. The merge is dropped on return,
/// which releases any runs it did not reach.
fn drain_merge(
    mut merged: MergedRuns,
    take: usize,
    counters: &mut Counters,
) -> EngineResult<Vec<Record>> {
    let mut records = Vec::new();
    while records.len() < take {
        match merged.next() {
            Some(record) => records.push(record?),
            None => break,
        }
    }
    if merged.in_flight() > 0 {
        counters.limit_applied = true;
    }
    counters.sort_stats = Some(merged.stats());
    Ok(records)
}
