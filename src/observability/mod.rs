//! Observability subsystem
//!
//! - Structured logging (JSON lines on stderr)
//! - Counters
//! - Lifecycle event tracing
//!
//! Observability is read-only: nothing here influences evaluation.
//!
//! ```ignore
//! use tidequery::observability::{log_event_with_fields, Event, MetricsRegistry};
//!
//! log_event_with_fields(Event::QueryExecuted, &[("items", "42")]);
//!
//! let metrics = MetricsRegistry::new();
//! metrics.increment_queries_executed();
//! ```

mod events;
mod logger;
mod metrics;
mod scope;

pub use events::Event;
pub use logger::{Logger, LoggerGuard, Severity};
pub use metrics::{MetricsRegistry, MetricsSnapshot};
pub use scope::{ObservationScope, Timer};

/// Severity an event is logged at when no explicit one is given
fn default_severity(event: Event) -> Severity {
    match event {
        Event::QueryRejected => Severity::Error,
        e if e.is_detail() => Severity::Trace,
        _ => Severity::Info,
    }
}

/// Log a lifecycle event
pub fn log_event(event: Event) {
    Logger::log(default_severity(event), event.as_str(), &[]);
}

/// Log a lifecycle event with fields
pub fn log_event_with_fields(event: Event, fields: &[(&str, &str)]) {
    Logger::log(default_severity(event), event.as_str(), fields);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_severity() {
        assert_eq!(default_severity(Event::QueryRejected), Severity::Error);
        assert_eq!(default_severity(Event::ShuffleBegin), Severity::Trace);
        assert_eq!(default_severity(Event::SessionReady), Severity::Info);
    }

    #[test]
    fn test_log_event() {
        log_event(Event::SessionStart);
        log_event_with_fields(Event::ConfigLoaded, &[("default_partitions", "4")]);
    }
}
