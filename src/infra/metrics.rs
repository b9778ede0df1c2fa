//! Lock-free metrics collection and periodic reporting
//!
//! Uses atomics for hot-path operations to avoid mutex contention.
//! All counter updates are lock-free; reporting is the only operation
//! that needs synchronization (via atomic swap).
//!
//! NOTE: All atomics use Relaxed ordering intentionally—these are statistical
//! counters only. Do NOT use these atomics for coordination or logic decisions.

use crate::domain::types::{Decision, RejectReason};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::info;

/// Update an atomic max value using compare-and-swap loop
#[inline]
fn update_atomic_max(atomic_max: &AtomicU64, new_value: u64) {
    let mut current_max = atomic_max.load(Ordering::Relaxed);
    while new_value > current_max {
        match atomic_max.compare_exchange_weak(
            current_max,
            new_value,
            Ordering::Relaxed,
            Ordering::Relaxed,
        ) {
            Ok(_) => break,
            Err(actual) => current_max = actual,
        }
    }
}

/// Lock-free metrics collector
///
/// Recording operations are lock-free using atomics. The `report()` method
/// atomically swaps the rate counters to get a consistent interval snapshot;
/// `snapshot()` reads the monotonic counters without resetting anything.
pub struct Metrics {
    /// Total detections ever evaluated (monotonic)
    detections_total: AtomicU64,
    /// Detections since last report (reset on report)
    detections_since_report: AtomicU64,
    /// Sum of evaluate latencies in microseconds (reset on report)
    eval_latency_sum_us: AtomicU64,
    /// Max evaluate latency in microseconds (reset on report)
    eval_latency_max_us: AtomicU64,
    /// Sightings admitted (monotonic)
    accepted_total: AtomicU64,
    /// Detections rejected by the shape check (monotonic)
    rejected_shape_total: AtomicU64,
    /// Detections rejected as duplicates inside the window (monotonic)
    rejected_duplicate_total: AtomicU64,
    /// Window entries removed by expiry (monotonic)
    expired_total: AtomicU64,
    /// Collector reports delivered with a success status (monotonic)
    reports_sent_total: AtomicU64,
    /// Collector reports that failed (transport error or non-2xx) (monotonic)
    reports_failed_total: AtomicU64,
    /// Ingest lines received before try_send (monotonic)
    ingest_received_total: AtomicU64,
    /// Ingest events dropped due to channel full (monotonic)
    ingest_dropped_total: AtomicU64,
    /// Location label updates applied (monotonic)
    location_updates_total: AtomicU64,
    /// Current number of values inside their suppression window (gauge)
    window_pending: AtomicU64,
    /// Timestamp of the last report, for rate computation
    last_report: Mutex<Instant>,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            detections_total: AtomicU64::new(0),
            detections_since_report: AtomicU64::new(0),
            eval_latency_sum_us: AtomicU64::new(0),
            eval_latency_max_us: AtomicU64::new(0),
            accepted_total: AtomicU64::new(0),
            rejected_shape_total: AtomicU64::new(0),
            rejected_duplicate_total: AtomicU64::new(0),
            expired_total: AtomicU64::new(0),
            reports_sent_total: AtomicU64::new(0),
            reports_failed_total: AtomicU64::new(0),
            ingest_received_total: AtomicU64::new(0),
            ingest_dropped_total: AtomicU64::new(0),
            location_updates_total: AtomicU64::new(0),
            window_pending: AtomicU64::new(0),
            last_report: Mutex::new(Instant::now()),
        }
    }

    /// Record one evaluated detection and its processing latency
    #[inline]
    pub fn record_detection(&self, latency_us: u64) {
        self.detections_total.fetch_add(1, Ordering::Relaxed);
        self.detections_since_report.fetch_add(1, Ordering::Relaxed);
        self.eval_latency_sum_us.fetch_add(latency_us, Ordering::Relaxed);
        update_atomic_max(&self.eval_latency_max_us, latency_us);
    }

    /// Record the filter decision for an evaluated detection
    #[inline]
    pub fn record_decision(&self, decision: Decision) {
        match decision {
            Decision::Accept => {
                self.accepted_total.fetch_add(1, Ordering::Relaxed);
            }
            Decision::Reject(RejectReason::Shape) => {
                self.rejected_shape_total.fetch_add(1, Ordering::Relaxed);
            }
            Decision::Reject(RejectReason::Duplicate) => {
                self.rejected_duplicate_total.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    #[inline]
    pub fn record_expiry(&self) {
        self.expired_total.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_report_sent(&self) {
        self.reports_sent_total.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_report_failed(&self) {
        self.reports_failed_total.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_ingest_received(&self) {
        self.ingest_received_total.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_ingest_dropped(&self) {
        self.ingest_dropped_total.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_location_update(&self) {
        self.location_updates_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Update the window-pending gauge after an admission or expiry
    #[inline]
    pub fn set_window_pending(&self, pending: usize) {
        self.window_pending.store(pending as u64, Ordering::Relaxed);
    }

    /// Read the monotonic counters and gauges without resetting anything.
    /// Used by the Prometheus endpoint, which must never perturb the
    /// interval reporter.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            detections_total: self.detections_total.load(Ordering::Relaxed),
            accepted_total: self.accepted_total.load(Ordering::Relaxed),
            rejected_shape_total: self.rejected_shape_total.load(Ordering::Relaxed),
            rejected_duplicate_total: self.rejected_duplicate_total.load(Ordering::Relaxed),
            expired_total: self.expired_total.load(Ordering::Relaxed),
            reports_sent_total: self.reports_sent_total.load(Ordering::Relaxed),
            reports_failed_total: self.reports_failed_total.load(Ordering::Relaxed),
            ingest_received_total: self.ingest_received_total.load(Ordering::Relaxed),
            ingest_dropped_total: self.ingest_dropped_total.load(Ordering::Relaxed),
            location_updates_total: self.location_updates_total.load(Ordering::Relaxed),
            window_pending: self.window_pending.load(Ordering::Relaxed),
        }
    }

    /// Produce an interval summary, resetting the rate counters
    pub fn report(&self) -> MetricsSummary {
        let now = Instant::now();
        let elapsed_secs = {
            let mut last = self.last_report.lock();
            let elapsed = now.duration_since(*last).as_secs_f64();
            *last = now;
            elapsed
        };

        let interval_detections = self.detections_since_report.swap(0, Ordering::Relaxed);
        let latency_sum = self.eval_latency_sum_us.swap(0, Ordering::Relaxed);
        let latency_max = self.eval_latency_max_us.swap(0, Ordering::Relaxed);

        let detections_per_sec = if elapsed_secs > 0.0 {
            interval_detections as f64 / elapsed_secs
        } else {
            0.0
        };
        let avg_latency_us =
            if interval_detections > 0 { latency_sum / interval_detections } else { 0 };

        MetricsSummary {
            snapshot: self.snapshot(),
            detections_per_sec,
            avg_eval_latency_us: avg_latency_us,
            max_eval_latency_us: latency_max,
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time view of the monotonic counters
#[derive(Debug, Clone, Copy)]
pub struct MetricsSnapshot {
    pub detections_total: u64,
    pub accepted_total: u64,
    pub rejected_shape_total: u64,
    pub rejected_duplicate_total: u64,
    pub expired_total: u64,
    pub reports_sent_total: u64,
    pub reports_failed_total: u64,
    pub ingest_received_total: u64,
    pub ingest_dropped_total: u64,
    pub location_updates_total: u64,
    pub window_pending: u64,
}

impl MetricsSnapshot {
    /// Fraction of ingest events dropped due to channel backpressure
    pub fn ingest_drop_ratio(&self) -> f64 {
        if self.ingest_received_total == 0 {
            0.0
        } else {
            self.ingest_dropped_total as f64 / self.ingest_received_total as f64
        }
    }
}

/// Interval summary produced by `Metrics::report`
#[derive(Debug, Clone)]
pub struct MetricsSummary {
    pub snapshot: MetricsSnapshot,
    pub detections_per_sec: f64,
    pub avg_eval_latency_us: u64,
    pub max_eval_latency_us: u64,
}

impl MetricsSummary {
    /// Log the summary as a structured event
    pub fn log(&self) {
        info!(
            detections_total = self.snapshot.detections_total,
            detections_per_sec = %format!("{:.1}", self.detections_per_sec),
            accepted = self.snapshot.accepted_total,
            rejected_shape = self.snapshot.rejected_shape_total,
            rejected_duplicate = self.snapshot.rejected_duplicate_total,
            expired = self.snapshot.expired_total,
            window_pending = self.snapshot.window_pending,
            reports_sent = self.snapshot.reports_sent_total,
            reports_failed = self.snapshot.reports_failed_total,
            ingest_dropped = self.snapshot.ingest_dropped_total,
            avg_eval_latency_us = self.avg_eval_latency_us,
            max_eval_latency_us = self.max_eval_latency_us,
            "metrics_report"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detection_counters() {
        let metrics = Metrics::new();
        metrics.record_detection(100);
        metrics.record_detection(300);

        let snap = metrics.snapshot();
        assert_eq!(snap.detections_total, 2);

        let summary = metrics.report();
        assert_eq!(summary.avg_eval_latency_us, 200);
        assert_eq!(summary.max_eval_latency_us, 300);

        // Rate counters reset on report, monotonic counters do not
        let summary = metrics.report();
        assert_eq!(summary.avg_eval_latency_us, 0);
        assert_eq!(summary.max_eval_latency_us, 0);
        assert_eq!(summary.snapshot.detections_total, 2);
    }

    #[test]
    fn test_decision_counters() {
        let metrics = Metrics::new();
        metrics.record_decision(Decision::Accept);
        metrics.record_decision(Decision::Reject(RejectReason::Shape));
        metrics.record_decision(Decision::Reject(RejectReason::Duplicate));
        metrics.record_decision(Decision::Reject(RejectReason::Duplicate));

        let snap = metrics.snapshot();
        assert_eq!(snap.accepted_total, 1);
        assert_eq!(snap.rejected_shape_total, 1);
        assert_eq!(snap.rejected_duplicate_total, 2);
    }

    #[test]
    fn test_snapshot_does_not_reset() {
        let metrics = Metrics::new();
        metrics.record_report_sent();
        metrics.record_report_failed();
        metrics.set_window_pending(3);

        let first = metrics.snapshot();
        let second = metrics.snapshot();
        assert_eq!(first.reports_sent_total, second.reports_sent_total);
        assert_eq!(second.reports_failed_total, 1);
        assert_eq!(second.window_pending, 3);
    }

    #[test]
    fn test_ingest_drop_ratio() {
        let metrics = Metrics::new();
        assert_eq!(metrics.snapshot().ingest_drop_ratio(), 0.0);

        for _ in 0..4 {
            metrics.record_ingest_received();
        }
        metrics.record_ingest_dropped();
        assert_eq!(metrics.snapshot().ingest_drop_ratio(), 0.25);
    }
}
