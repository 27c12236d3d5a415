//! External merge sort driver
//!
//! Phases:
//! 1. Each incoming batch is filtered (predicate pushdown) and stably sorted
//!    in memory
//! 2. Every non-empty sorted batch is spilled as one run
//! 3. The runs are merged lazily through `MergedRuns`
//!
//! A single batch still takes the spill and merge path.

use std::path::PathBuf;
use std::sync::Arc;

use super::merge::{MergedRuns, SortStats};
use super::order::SortOrder;
use super::spill::{RunWriter, SpillDir};
use crate::errors::EngineResult;
use crate::observability::{log_event_with_fields, Event, ObservationScope, Severity};
use crate::ops::Predicate;
use crate::record::Record;
use crate::source::Chunk;

/// Sorts a chunk stream of any size with bounded merge memory
#[derive(Debug, Clone)]
pub struct ExternalSorter {
    order: Arc<SortOrder>,
    filter: Option<Predicate>,
    spill_base: Option<PathBuf>,
}

impl ExternalSorter {
    pub fn new(order: SortOrder) -> Self {
        Self {
            order: Arc::new(order),
            filter: None,
            spill_base: None,
        }
    }

    /// Applies `predicate` to every batch before it is sorted and spilled
    pub fn with_filter(mut self, predicate: Predicate) -> Self {
        self.filter = Some(predicate);
        self
    }

    /// Creates spill directories under `base` instead of the OS temp dir
    pub fn with_spill_base(mut self, base: impl Into<PathBuf>) -> Self {
        self.spill_base = Some(base.into());
        self
    }

    pub fn order(&self) -> &SortOrder {
        &self.order
    }

    /// Sorts a chunk stream. Sort columns are checked against the first
    /// chunk's headers.
    pub fn sort_chunks<I>(&self, chunks: I) -> EngineResult<MergedRuns>
    where
        I: IntoIterator<Item = EngineResult<Chunk>>,
    {
        let mut validated = false;
        let batches = chunks.into_iter().map(|chunk| -> EngineResult<Vec<Record>> {
            let chunk = chunk?;
            if !validated {
                self.order.validate(chunk.headers())?;
                validated = true;
            }
            Ok(chunk.into_records())
        });
        self.sort_batches(batches)
    }

    /// Sorts a stream of record batches. Each non-empty batch becomes one run.
    pub fn sort_batches<I>(&self, batches: I) -> EngineResult<MergedRuns>
    where
        I: IntoIterator<Item = EngineResult<Vec<Record>>>,
    {
        let scope = ObservationScope::new("SORT");
        let mut stats = SortStats::default();
        let mut spill: Option<SpillDir> = None;

        for batch in batches {
            let mut batch = match batch {
                Ok(batch) => batch,
                Err(e) => {
                    scope.fail(Severity::Error, e.message());
                    return Err(e);
                }
            };
            if let Some(predicate) = &self.filter {
                batch.retain(|r| predicate.matches(r));
            }
            if batch.is_empty() {
                continue;
            }
            self.order.sort(&mut batch);

            if spill.is_none() {
                spill = Some(SpillDir::create(self.spill_base.as_deref())?);
            }
            if let Some(dir) = &spill {
                self.spill_run(dir, stats.runs_created, &batch)?;
            }
            stats.runs_created += 1;
            stats.records_spilled += batch.len();
        }

        let runs = stats.runs_created.to_string();
        let records = stats.records_spilled.to_string();
        scope.complete_with_fields(&[("records", records.as_str()), ("runs", runs.as_str())]);

        match spill {
            Some(dir) => MergedRuns::open(Arc::clone(&self.order), dir, stats.runs_created, stats),
            None => Ok(MergedRuns::empty(Arc::clone(&self.order), stats)),
        }
    }

    fn spill_run(&self, dir: &SpillDir, index: usize, batch: &[Record]) -> EngineResult<()> {
        let mut writer = RunWriter::create(dir.run_path(index))?;
        for record in batch {
            writer.write(record)?;
        }
        let written = writer.finish()?;
        log_event_with_fields(
            Event::RunSpilled,
            &[
                ("records", written.to_string().as_str()),
                ("run", index.to_string().as_str()),
            ],
        );
        Ok(())
    }

    /// Reference sort: filter and stable-sort everything in memory with the
    /// same comparator
    pub fn sort_in_memory(&self, mut records: Vec<Record>) -> Vec<Record> {
        if let Some(predicate) = &self.filter {
            records.retain(|r| predicate.matches(r));
        }
        self.order.sort(&mut records);
        records
    }
}
