//! Observable engine events
//!
//! Events are explicit and typed. Each maps to a stable upper-case name
//! used as the `event` key of a log line.

use std::fmt;

use super::logger::Severity;

/// Observable events in a query run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Pipeline lifecycle
    /// Pipeline accepted and execution mode chosen
    PipelineStart,
    /// Pipeline produced its final result
    PipelineComplete,
    /// Pipeline aborted on the first operator failure
    PipelineAborted,
    /// Streaming loop stopped early because LIMIT was reached
    LimitReached,

    // Chunk source
    /// A chunk was produced by a reader
    ChunkRead,
    /// A record could not be tokenized (FATAL)
    MalformedInput,

    // External merge sort
    /// A sorted run was written to spill storage
    RunSpilled,
    /// k-way merge started over all runs
    MergeStart,
    /// A run was fully consumed and its storage released
    RunExhausted,
    /// Spill directory removed
    SpillCleanup,
    /// Spill storage failed (FATAL)
    SpillFailed,

    // Join
    /// Join index built over the build side
    JoinBuild,
    /// Join probe phase finished
    JoinComplete,

    // Operators
    /// A value did not coerce and was skipped or compared as text
    CoercionSkipped,
}

impl Event {
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::PipelineStart => "PIPELINE_START",
            Event::PipelineComplete => "PIPELINE_COMPLETE",
            Event::PipelineAborted => "PIPELINE_ABORTED",
            Event::LimitReached => "LIMIT_REACHED",
            Event::ChunkRead => "CHUNK_READ",
            Event::MalformedInput => "MALFORMED_INPUT",
            Event::RunSpilled => "RUN_SPILLED",
            Event::MergeStart => "MERGE_START",
            Event::RunExhausted => "RUN_EXHAUSTED",
            Event::SpillCleanup => "SPILL_CLEANUP",
            Event::SpillFailed => "SPILL_FAILED",
            Event::JoinBuild => "JOIN_BUILD",
            Event::JoinComplete => "JOIN_COMPLETE",
            Event::CoercionSkipped => "COERCION_SKIPPED",
        }
    }

    /// Severity the event is logged at
    pub fn severity(&self) -> Severity {
        match self {
            Event::MalformedInput | Event::SpillFailed => Severity::Fatal,
            Event::PipelineAborted => Severity::Error,
            Event::ChunkRead | Event::RunExhausted | Event::CoercionSkipped => Severity::Trace,
            _ => Severity::Info,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
