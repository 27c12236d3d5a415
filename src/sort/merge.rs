//! k-way merge over spilled runs
//!
//! The heap holds at most one head record per live run, ordered by
//! (sort key, run index). Popping the minimum yields the next output record;
//! the same run is then advanced and its new head pushed back. A run that
//! runs dry has its file deleted immediately.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::sync::Arc;

use super::order::SortOrder;
use super::spill::{remove_run, RunReader, SpillDir};
use crate::errors::EngineResult;
use crate::observability::{log_event_with_fields, Event, ObservationScope, Severity};
use crate::record::Record;

/// Counters for one sort invocation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SortStats {
    /// Runs written to spill storage
    pub runs_created: usize,
    /// Records written across all runs
    pub records_spilled: usize,
    /// Largest number of records resident in the merge heap at once
    pub peak_in_flight: usize,
    /// Records emitted by the merge so far
    pub records_merged: usize,
}

struct Head {
    record: Record,
    run: usize,
    order: Arc<SortOrder>,
}

impl PartialEq for Head {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Head {}

impl PartialOrd for Head {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Head {
    fn cmp(&self, other: &Self) -> Ordering {
        // Earlier runs win ties, keeping the merge stable
        self.order
            .compare(&self.record, &other.record)
            .then_with(|| self.run.cmp(&other.run))
    }
}

/// Lazily merged output of all runs.
///
/// Dropping it before exhaustion releases every remaining run and the spill
/// directory.
pub struct MergedRuns {
    order: Arc<SortOrder>,
    readers: Vec<Option<RunReader>>,
    heap: BinaryHeap<Reverse<Head>>,
    stats: SortStats,
    failed: bool,
    scope: Option<ObservationScope>,
    // Declared last so run readers close before the directory is removed
    spill: Option<SpillDir>,
}

impl MergedRuns {
    /// Merge with no runs: yields nothing
    pub fn empty(order: Arc<SortOrder>, stats: SortStats) -> Self {
        Self {
            order,
            readers: Vec::new(),
            heap: BinaryHeap::new(),
            stats,
            failed: false,
            scope: None,
            spill: None,
        }
    }

    /// Opens every run and primes the heap with each run's first record
    pub fn open(
        order: Arc<SortOrder>,
        spill: SpillDir,
        runs: usize,
        stats: SortStats,
    ) -> EngineResult<Self> {
        log_event_with_fields(Event::MergeStart, &[("runs", runs.to_string().as_str())]);

        let mut merged = Self {
            order,
            readers: Vec::with_capacity(runs),
            heap: BinaryHeap::with_capacity(runs),
            stats,
            failed: false,
            scope: Some(ObservationScope::with_fields(
                "MERGE",
                vec![("runs", runs.to_string())],
            )),
            spill: None,
        };
        for i in 0..runs {
            merged.readers.push(Some(RunReader::open(spill.run_path(i))?));
        }
        merged.spill = Some(spill);
        for i in 0..runs {
            merged.advance(i)?;
        }
        Ok(merged)
    }

    pub fn stats(&self) -> SortStats {
        self.stats
    }

    /// Records currently held in the heap
    pub fn in_flight(&self) -> usize {
        self.heap.len()
    }

    /// Pulls the next record of `run` into the heap, releasing the run if
    /// it is exhausted
    fn advance(&mut self, run: usize) -> EngineResult<()> {
        let Some(reader) = self.readers.get_mut(run).and_then(Option::as_mut) else {
            return Ok(());
        };
        match reader.next_record()? {
            Some(record) => {
                self.heap.push(Reverse(Head {
                    record,
                    run,
                    order: Arc::clone(&self.order),
                }));
                self.stats.peak_in_flight = self.stats.peak_in_flight.max(self.heap.len());
            }
            None => {
                if let Some(reader) = self.readers[run].take() {
                    let path = reader.path().to_path_buf();
                    drop(reader);
                    remove_run(&path);
                    log_event_with_fields(
                        Event::RunExhausted,
                        &[("run", run.to_string().as_str())],
                    );
                }
            }
        }
        Ok(())
    }

    fn finish(&mut self) {
        if let Some(scope) = self.scope.take() {
            let merged = self.stats.records_merged.to_string();
            scope.complete_with_fields(&[("records", merged.as_str())]);
        }
        self.spill = None;
    }
}

impl Iterator for MergedRuns {
    type Item = EngineResult<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let Some(Reverse(head)) = self.heap.pop() else {
            self.finish();
            return None;
        };
        if let Err(e) = self.advance(head.run) {
            self.failed = true;
            if let Some(scope) = self.scope.take() {
                scope.fail(Severity::Fatal, e.message());
            }
            self.heap.clear();
            self.readers.clear();
            self.spill = None;
            return Some(Err(e));
        }
        self.stats.records_merged += 1;
        Some(Ok(head.record))
    }
}
