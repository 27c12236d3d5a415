//! Observability subsystem
//!
//! - Structured logging (JSON lines on stderr)
//! - Typed lifecycle events
//! - Scope-based begin/complete tracing
//!
//! # Principles
//!
//! 1. Observability is read-only: it never changes a query result
//! 2. No background threads
//! 3. Logging failures are swallowed
//!
//! # Usage
//!
//! ```ignore
//! use chunkql::observability::{log_event_with_fields, Event, ObservationScope};
//!
//! log_event_with_fields(Event::RunSpilled, &[("run", "0"), ("records", "1000")]);
//!
//! let scope = ObservationScope::new("SORT");
//! // ... do work ...
//! scope.complete();
//! ```

mod events;
mod logger;
mod scope;

pub use events::Event;
pub use logger::{Logger, Severity};
pub use scope::ObservationScope;

/// Log a lifecycle event with fields
pub fn log_event_with_fields(event: Event, fields: &[(&str, &str)]) {
    Logger::log(event.severity(), event.as_str(), fields);
}

/// Signals a silent type-coercion fallback.
///
/// Never an error; emitted at TRACE so it costs nothing unless enabled.
pub fn coercion_skipped(operator: &str, column: &str) {
    if Logger::enabled(Event::CoercionSkipped.severity()) {
        log_event_with_fields(
            Event::CoercionSkipped,
            &[("column", column), ("operator", operator)],
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_event_with_fields() {
        log_event_with_fields(Event::RunSpilled, &[("run", "0")]);
        coercion_skipped("sum", "amount");
    }
}
