//! Hash join engine
//!
//! State machine: Build -> Probe -> Done.
//!
//! - Build indexes the designated build table once
//! - Probe streams probe batches against the index, any number of times
//! - Finish emits unmatched build rows (RIGHT/OUTER) and drops the index
//!
//! Merged rows: the probe record laid out in result-header order, then every
//! build column written over it. Build-side values win on name collisions;
//! a colliding column keeps its probe-side position.

use std::fmt;

use super::index::{JoinIndex, JoinKey};
use crate::errors::{EngineError, EngineResult};
use crate::observability::{log_event_with_fields, Event};
use crate::record::{Record, Table, Value};

/// Join type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    Inner,
    Left,
    Right,
    Outer,
}

impl JoinType {
    pub fn parse(s: &str) -> Option<JoinType> {
        match s.trim().to_ascii_lowercase().as_str() {
            "inner" => Some(JoinType::Inner),
            "left" => Some(JoinType::Left),
            "right" => Some(JoinType::Right),
            "outer" | "full" => Some(JoinType::Outer),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JoinType::Inner => "INNER",
            JoinType::Left => "LEFT",
            JoinType::Right => "RIGHT",
            JoinType::Outer => "OUTER",
        }
    }

    fn keeps_unmatched_probe(&self) -> bool {
        matches!(self, JoinType::Left | JoinType::Outer)
    }

    fn keeps_unmatched_build(&self) -> bool {
        matches!(self, JoinType::Right | JoinType::Outer)
    }
}

impl fmt::Display for JoinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which columns to join on and how
#[derive(Debug, Clone, PartialEq)]
pub struct JoinSpec {
    pub probe_key: String,
    pub build_key: String,
    pub join_type: JoinType,
}

impl JoinSpec {
    pub fn new(
        probe_key: impl Into<String>,
        build_key: impl Into<String>,
        join_type: JoinType,
    ) -> Self {
        Self {
            probe_key: probe_key.into(),
            build_key: build_key.into(),
            join_type,
        }
    }

    pub fn inner(probe_key: impl Into<String>, build_key: impl Into<String>) -> Self {
        Self::new(probe_key, build_key, JoinType::Inner)
    }
}

/// Engine lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinState {
    Build,
    Probe,
    Done,
}

/// One join invocation
#[derive(Debug)]
pub struct JoinEngine {
    spec: JoinSpec,
    state: JoinState,
    index: JoinIndex,
    build_headers: Vec<String>,
    headers: Vec<String>,
    matched: Vec<bool>,
    emitted: usize,
}

impl JoinEngine {
    pub fn new(spec: JoinSpec) -> Self {
        Self {
            spec,
            state: JoinState::Build,
            index: JoinIndex::default(),
            build_headers: Vec::new(),
            headers: Vec::new(),
            matched: Vec::new(),
            emitted: 0,
        }
    }

    pub fn state(&self) -> JoinState {
        self.state
    }

    pub fn spec(&self) -> &JoinSpec {
        &self.spec
    }

    /// Result headers: probe headers, then build-only headers
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Indexes the build table and fixes the result headers.
    ///
    /// Fails with UnknownColumn if either key column is missing.
    pub fn build(&mut self, build: &Table, probe_headers: &[String]) -> EngineResult<()> {
        if self.state != JoinState::Build {
            return Err(EngineError::invalid_operation(format!(
                "Join already built (state {:?})",
                self.state
            )));
        }
        if !probe_headers.contains(&self.spec.probe_key) {
            return Err(EngineError::unknown_column(
                self.spec.probe_key.as_str(),
                probe_headers,
            ));
        }
        build.require_column(&self.spec.build_key)?;

        let mut headers = probe_headers.to_vec();
        for h in build.headers() {
            if !headers.contains(h) {
                headers.push(h.clone());
            }
        }

        self.index = JoinIndex::build(build.rows().to_vec(), &self.spec.build_key);
        self.matched = vec![false; self.index.len()];
        self.build_headers = build.headers().to_vec();
        self.headers = headers;
        self.state = JoinState::Probe;

        log_event_with_fields(
            Event::JoinBuild,
            &[
                ("build_rows", self.index.len().to_string().as_str()),
                ("distinct_keys", self.index.distinct_keys().to_string().as_str()),
                ("join_type", self.spec.join_type.as_str()),
            ],
        );
        Ok(())
    }

    fn merge(&self, probe: &Record, build: &Record) -> Record {
        let mut out = probe.conform(&self.headers);
        for h in &self.build_headers {
            out.set(h, build.get(h).cloned().unwrap_or(Value::Null));
        }
        out
    }

    /// Streams one probe batch through the index, preserving probe order
    pub fn probe(&mut self, batch: &[Record]) -> EngineResult<Vec<Record>> {
        if self.state != JoinState::Probe {
            return Err(EngineError::invalid_operation(format!(
                "Cannot probe a join in state {:?}",
                self.state
            )));
        }

        let mut out = Vec::with_capacity(batch.len());
        for probe in batch {
            let key = JoinKey::of(probe.get(&self.spec.probe_key));
            let hits = self.index.lookup(&key);
            if hits.is_empty() {
                if self.spec.join_type.keeps_unmatched_probe() {
                    out.push(probe.conform(&self.headers));
                }
                continue;
            }
            for &pos in hits {
                if let Some(build) = self.index.row(pos) {
                    out.push(self.merge(probe, build));
                }
            }
            for &pos in hits {
                self.matched[pos] = true;
            }
        }
        self.emitted += out.len();
        Ok(out)
    }

    /// Ends the probe phase, emitting unmatched build rows for RIGHT/OUTER
    /// joins in build encounter order. The index is released.
    pub fn finish(&mut self) -> EngineResult<Vec<Record>> {
        if self.state != JoinState::Probe {
            return Err(EngineError::invalid_operation(format!(
                "Cannot finish a join in state {:?}",
                self.state
            )));
        }

        let mut out = Vec::new();
        if self.spec.join_type.keeps_unmatched_build() {
            for (row, matched) in self.index.rows().iter().zip(&self.matched) {
                if !matched {
                    out.push(row.conform(&self.headers));
                }
            }
        }
        self.emitted += out.len();

        self.index = JoinIndex::default();
        self.matched = Vec::new();
        self.state = JoinState::Done;

        log_event_with_fields(
            Event::JoinComplete,
            &[
                ("join_type", self.spec.join_type.as_str()),
                ("rows", self.emitted.to_string().as_str()),
            ],
        );
        Ok(out)
    }
}

/// Joins two whole tables. The result is named after the probe table.
pub fn join(probe: &Table, build: &Table, spec: &JoinSpec) -> EngineResult<Table> {
    let mut engine = JoinEngine::new(spec.clone());
    engine.build(build, probe.headers())?;
    let mut rows = engine.probe(probe.rows())?;
    rows.extend(engine.finish()?);
    Table::new(probe.name(), engine.headers().to_vec(), rows)
}
