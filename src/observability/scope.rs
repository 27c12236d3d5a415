//! ObservationScope for automatic begin/complete logging
//!
//! - Logs `{name}_BEGIN` on creation
//! - Logs `{name}_COMPLETE` (with `elapsed_ms`) when completed
//! - Logs `{name}_FAILED` when failed
//! - Logs `{name}_INCOMPLETE` on drop if neither happened, which is how an
//!   early-terminated merge or an aborted pipeline shows up in the log

use std::time::Instant;

use super::logger::{Logger, Severity};

/// A scope that logs its own lifecycle
pub struct ObservationScope {
    name: &'static str,
    finished: bool,
    fields: Vec<(&'static str, String)>,
    started: Instant,
}

impl ObservationScope {
    /// Opens a scope and logs `{name}_BEGIN`
    pub fn new(name: &'static str) -> Self {
        Self::with_fields(name, Vec::new())
    }

    /// Opens a scope whose fields are repeated on every lifecycle line
    pub fn with_fields(name: &'static str, fields: Vec<(&'static str, String)>) -> Self {
        let scope = Self {
            name,
            finished: false,
            fields,
            started: Instant::now(),
        };
        scope.emit(Severity::Info, "BEGIN", &[]);
        scope
    }

    fn emit(&self, severity: Severity, suffix: &str, extra: &[(&str, &str)]) {
        if !Logger::enabled(severity) {
            return;
        }
        let event = format!("{}_{}", self.name, suffix);
        let mut all: Vec<(&str, &str)> = self.fields.iter().map(|(k, v)| (*k, v.as_str())).collect();
        all.extend(extra.iter().copied());
        Logger::log(severity, &event, &all);
    }

    fn elapsed_ms(&self) -> String {
        self.started.elapsed().as_millis().to_string()
    }

    /// Marks the scope complete and logs `{name}_COMPLETE`
    pub fn complete(self) {
        self.complete_with_fields(&[]);
    }

    /// Marks the scope complete with additional fields
    pub fn complete_with_fields(mut self, extra: &[(&str, &str)]) {
        self.finished = true;
        let elapsed = self.elapsed_ms();
        let mut fields = vec![("elapsed_ms", elapsed.as_str())];
        fields.extend(extra.iter().copied());
        self.emit(Severity::Info, "COMPLETE", &fields);
    }

    /// Marks the scope failed and logs `{name}_FAILED` at `severity`
    pub fn fail(mut self, severity: Severity, reason: &str) {
        self.finished = true;
        self.emit(severity, "FAILED", &[("reason", reason)]);
    }

    /// Returns true once completed or failed
    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

impl Drop for ObservationScope {
    fn drop(&mut self) {
        if !self.finished {
            let elapsed = self.elapsed_ms();
            self.emit(
                Severity::Warn,
                "INCOMPLETE",
                &[("elapsed_ms", elapsed.as_str()), ("reason", "scope dropped before completion")],
            );
        }
    }
}
