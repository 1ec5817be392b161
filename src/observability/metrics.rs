//! Metrics registry
//!
//! - Counters only
//! - Monotonic increase
//! - Reset only when the session is created
//! - Thread-safe; partitions increment concurrently

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Metrics registry containing all engine counters
///
/// All counters use Relaxed atomics; totals are exact once the work that
/// produced them has joined.
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    /// Successful query count
    queries_executed: AtomicU64,
    /// Rejected query count
    queries_rejected: AtomicU64,
    /// Iterator open and reset calls
    iterators_opened: AtomicU64,
    /// Function bodies opened by invocations
    function_bodies_opened: AtomicU64,
    /// Function bodies closed by invocations
    function_bodies_closed: AtomicU64,
    /// Distributed collections pulled into local sequences
    materializations: AtomicU64,
    /// Items pulled across the distributed/local boundary
    items_materialized: AtomicU64,
    /// Shuffles performed for grouping
    shuffles: AtomicU64,
    /// Records read from external sources
    records_ingested: AtomicU64,
}

impl MetricsRegistry {
    /// Create a new metrics registry with all counters at zero
    pub fn new() -> Self {
        Self::default()
    }

    // Query metrics

    /// Increment queries executed
    pub fn increment_queries_executed(&self) {
        self.queries_executed.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment queries rejected
    pub fn increment_queries_rejected(&self) {
        self.queries_rejected.fetch_add(1, Ordering::Relaxed);
    }

    // Iterator metrics

    /// Increment iterators opened
    pub fn increment_iterators_opened(&self) {
        self.iterators_opened.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment function bodies opened
    pub fn increment_function_bodies_opened(&self) {
        self.function_bodies_opened.fetch_add(1, Ordering::Relaxed);
    }

    /// Increment function bodies closed
    pub fn increment_function_bodies_closed(&self) {
        self.function_bodies_closed.fetch_add(1, Ordering::Relaxed);
    }

    /// Get function bodies closed
    pub fn function_bodies_closed(&self) -> u64 {
        self.function_bodies_closed.load(Ordering::Relaxed)
    }

    // Distributed boundary metrics

    /// Record one materialization of `items` items
    pub fn record_materialization(&self, items: u64) {
        self.materializations.fetch_add(1, Ordering::Relaxed);
        self.items_materialized.fetch_add(items, Ordering::Relaxed);
    }

    /// Increment shuffles
    pub fn increment_shuffles(&self) {
        self.shuffles.fetch_add(1, Ordering::Relaxed);
    }

    /// Add records ingested from a source
    pub fn add_records_ingested(&self, records: u64) {
        self.records_ingested.fetch_add(records, Ordering::Relaxed);
    }

    /// Get current snapshot of all metrics as JSON
    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.snapshot()).unwrap_or_else(|_| "{}".to_string())
    }

    /// Get all metrics as a snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            queries_executed: self.queries_executed.load(Ordering::Relaxed),
            queries_rejected: self.queries_rejected.load(Ordering::Relaxed),
            iterators_opened: self.iterators_opened.load(Ordering::Relaxed),
            function_bodies_opened: self.function_bodies_opened.load(Ordering::Relaxed),
            function_bodies_closed: self.function_bodies_closed.load(Ordering::Relaxed),
            materializations: self.materializations.load(Ordering::Relaxed),
            items_materialized: self.items_materialized.load(Ordering::Relaxed),
            shuffles: self.shuffles.load(Ordering::Relaxed),
            records_ingested: self.records_ingested.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time snapshot of all metrics
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub queries_executed: u64,
    pub queries_rejected: u64,
    pub iterators_opened: u64,
    pub function_bodies_opened: u64,
    pub function_bodies_closed: u64,
    pub materializations: u64,
    pub items_materialized: u64,
    pub shuffles: u64,
    pub records_ingested: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_registry_has_zero_values() {
        let registry = MetricsRegistry::new();
        let snapshot = registry.snapshot();

        assert_eq!(snapshot.queries_executed, 0);
        assert_eq!(snapshot.function_bodies_closed, 0);
        assert_eq!(snapshot.shuffles, 0);
    }

    #[test]
    fn test_increment_counters() {
        let registry = MetricsRegistry::new();

        registry.increment_queries_executed();
        registry.increment_queries_rejected();
        registry.increment_iterators_opened();
        registry.increment_iterators_opened();
        registry.increment_function_bodies_opened();
        registry.increment_function_bodies_closed();
        registry.record_materialization(40);
        registry.record_materialization(2);
        registry.increment_shuffles();
        registry.add_records_ingested(7);

        let snapshot = registry.snapshot();
        assert_eq!(snapshot.queries_executed, 1);
        assert_eq!(snapshot.queries_rejected, 1);
        assert_eq!(snapshot.iterators_opened, 2);
        assert_eq!(snapshot.function_bodies_opened, 1);
        assert_eq!(snapshot.function_bodies_closed, 1);
        assert_eq!(snapshot.materializations, 2);
        assert_eq!(snapshot.items_materialized, 42);
        assert_eq!(snapshot.shuffles, 1);
        assert_eq!(snapshot.records_ingested, 7);
    }

    #[test]
    fn test_to_json() {
        let registry = MetricsRegistry::new();
        registry.add_records_ingested(1234);
        registry.increment_queries_executed();

        let json = registry.to_json();

        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["records_ingested"], 1234);
        assert_eq!(parsed["queries_executed"], 1);
    }

    #[test]
    fn test_thread_safety() {
        use std::sync::Arc;
        use std::thread;

        let registry = Arc::new(MetricsRegistry::new());
        let mut handles = vec![];

        for _ in 0..10 {
            let reg = Arc::clone(&registry);
            handles.push(thread::spawn(move || {
                for _ in 0..100 {
                    reg.increment_iterators_opened();
                    reg.increment_function_bodies_closed();
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        let snapshot = registry.snapshot();
        assert_eq!(snapshot.iterators_opened, 1000);
        assert_eq!(snapshot.function_bodies_closed, 1000);
    }
}
