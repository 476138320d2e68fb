/// Per-query metrics sink
///
/// Phase timings accumulate into thread-safe counters shared across workers
/// through the execution context; a `summary()` snapshot travels with the
/// query result.
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

#[derive(Debug, Default)]
pub struct QueryMetrics {
    selection_nanos: AtomicU64,
    build_nanos: AtomicU64,
    probe_nanos: AtomicU64,
    materialize_nanos: AtomicU64,
    checksum_nanos: AtomicU64,
    rows_materialized: AtomicU64,
}

impl QueryMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_selection(&self, elapsed: Duration) {
        self.selection_nanos
            .fetch_add(elapsed.as_nanos() as u64, Ordering::Relaxed);
    }

    pub fn record_build(&self, elapsed: Duration) {
        self.build_nanos
            .fetch_add(elapsed.as_nanos() as u64, Ordering::Relaxed);
    }

    pub fn record_probe(&self, elapsed: Duration) {
        self.probe_nanos
            .fetch_add(elapsed.as_nanos() as u64, Ordering::Relaxed);
    }

    pub fn record_materialize(&self, elapsed: Duration) {
        self.materialize_nanos
            .fetch_add(elapsed.as_nanos() as u64, Ordering::Relaxed);
    }

    pub fn record_checksum(&self, elapsed: Duration) {
        self.checksum_nanos
            .fetch_add(elapsed.as_nanos() as u64, Ordering::Relaxed);
    }

    pub fn add_rows_materialized(&self, rows: u64) {
        self.rows_materialized.fetch_add(rows, Ordering::Relaxed);
    }

    /// Snapshot the counters
    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            selection_nanos: self.selection_nanos.load(Ordering::Relaxed),
            build_nanos: self.build_nanos.load(Ordering::Relaxed),
            probe_nanos: self.probe_nanos.load(Ordering::Relaxed),
            materialize_nanos: self.materialize_nanos.load(Ordering::Relaxed),
            checksum_nanos: self.checksum_nanos.load(Ordering::Relaxed),
            rows_materialized: self.rows_materialized.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time view of a query's metrics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSummary {
    pub selection_nanos: u64,
    pub build_nanos: u64,
    pub probe_nanos: u64,
    pub materialize_nanos: u64,
    pub checksum_nanos: u64,
    pub rows_materialized: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulates_phase_timings() {
        let metrics = QueryMetrics::new();
        metrics.record_build(Duration::from_nanos(100));
        metrics.record_build(Duration::from_nanos(50));
        metrics.add_rows_materialized(7);

        let summary = metrics.summary();
        assert_eq!(summary.build_nanos, 150);
        assert_eq!(summary.rows_materialized, 7);
        assert_eq!(summary.probe_nanos, 0);
    }
}
