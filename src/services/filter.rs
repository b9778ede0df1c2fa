//! Sighting deduplication
//!
//! Decides, for each recognized text, whether it is eligible (length in the
//! accepted set) and novel (not currently inside its suppression window).
//! Admitted values are held in the window map and removed by a one-shot
//! expiry task scheduled at admission time.

use crate::domain::types::{Decision, RejectReason};
use crate::infra::metrics::Metrics;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Windowed "recently reported" set with shape and novelty checks
pub struct SightingFilter {
    /// Suppression window per admitted value
    window: Duration,
    /// Text lengths eligible for admission
    accepted_lengths: Vec<usize>,
    /// Values inside their window, keyed by exact string value.
    /// Shared with the expiry tasks; guarded for insert, membership
    /// check, and removal.
    seen: Arc<Mutex<FxHashMap<String, Instant>>>,
    metrics: Option<Arc<Metrics>>,
}

impl SightingFilter {
    pub fn new(window: Duration, accepted_lengths: Vec<usize>) -> Self {
        Self { window, accepted_lengths, seen: Arc::new(Mutex::new(FxHashMap::default())), metrics: None }
    }

    pub fn with_metrics(
        window: Duration,
        accepted_lengths: Vec<usize>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self { metrics: Some(metrics), ..Self::new(window, accepted_lengths) }
    }

    /// Evaluate one recognized text: shape check, novelty check, admission.
    ///
    /// On admission the value is inserted into the window map and a one-shot
    /// expiry task is spawned. Expiry tasks are keyed by the value, never
    /// canceled or coalesced, and remove the value unconditionally at their
    /// original deadline: a duplicate arriving inside the window is rejected
    /// and does NOT extend the window.
    ///
    /// Must be called from within a tokio runtime.
    pub fn evaluate(&self, text: &str) -> Decision {
        if !self.accepted_lengths.contains(&text.len()) {
            debug!(text = %text, len = text.len(), "sighting_rejected_shape");
            return Decision::Reject(RejectReason::Shape);
        }

        let expires_at = Instant::now() + self.window;
        {
            let mut seen = self.seen.lock();
            if seen.contains_key(text) {
                debug!(code = %text, "sighting_suppressed");
                return Decision::Reject(RejectReason::Duplicate);
            }
            seen.insert(text.to_string(), expires_at);
            if let Some(ref metrics) = self.metrics {
                metrics.set_window_pending(seen.len());
            }
        }

        info!(code = %text, window_secs = self.window.as_secs(), "sighting_admitted");
        self.schedule_expiry(text.to_string());
        Decision::Accept
    }

    /// Spawn the one-shot removal task for an admitted value
    fn schedule_expiry(&self, value: String) {
        let seen = self.seen.clone();
        let window = self.window;
        let metrics = self.metrics.clone();

        tokio::spawn(async move {
            tokio::time::sleep(window).await;

            let pending = {
                let mut seen = seen.lock();
                seen.remove(&value);
                seen.len()
            };

            debug!(code = %value, "sighting_window_expired");
            if let Some(ref metrics) = metrics {
                metrics.record_expiry();
                metrics.set_window_pending(pending);
            }
        });
    }

    /// Number of values currently inside their window
    pub fn pending_count(&self) -> usize {
        self.seen.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_filter() -> SightingFilter {
        SightingFilter::new(Duration::from_secs(60), vec![3, 6])
    }

    #[tokio::test]
    async fn test_shape_check() {
        let filter = default_filter();

        assert_eq!(filter.evaluate("ABC"), Decision::Accept);
        assert_eq!(filter.evaluate("ABC123"), Decision::Accept);

        for text in ["", "A", "AB", "ABCD", "ABCDE", "ABCDEFG"] {
            assert_eq!(
                filter.evaluate(text),
                Decision::Reject(RejectReason::Shape),
                "length {} should be rejected",
                text.len()
            );
        }
    }

    #[tokio::test]
    async fn test_shape_check_ignores_novelty() {
        let filter = default_filter();

        // Repeated ineligible text is rejected by shape every time, and
        // never enters the window map
        assert_eq!(filter.evaluate("ABCD"), Decision::Reject(RejectReason::Shape));
        assert_eq!(filter.evaluate("ABCD"), Decision::Reject(RejectReason::Shape));
        assert_eq!(filter.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_duplicate_suppressed_within_window() {
        let filter = default_filter();

        assert_eq!(filter.evaluate("ABC"), Decision::Accept);
        assert_eq!(filter.evaluate("ABC"), Decision::Reject(RejectReason::Duplicate));
        assert_eq!(filter.pending_count(), 1);
    }

    #[tokio::test]
    async fn test_distinct_values_independent() {
        let filter = default_filter();

        assert_eq!(filter.evaluate("ABC"), Decision::Accept);
        assert_eq!(filter.evaluate("XYZ"), Decision::Accept);
        assert_eq!(filter.evaluate("ABC123"), Decision::Accept);
        assert_eq!(filter.pending_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expiry_reopens_window() {
        let filter = default_filter();

        assert_eq!(filter.evaluate("ABC"), Decision::Accept);
        assert_eq!(filter.pending_count(), 1);

        tokio::time::advance(Duration::from_secs(61)).await;
        tokio::task::yield_now().await;

        assert_eq!(filter.pending_count(), 0);
        assert_eq!(filter.evaluate("ABC"), Decision::Accept);
    }

    #[tokio::test(start_paused = true)]
    async fn test_duplicate_does_not_extend_window() {
        let filter = default_filter();

        assert_eq!(filter.evaluate("ABC"), Decision::Accept);

        // A duplicate at t=30s is rejected and schedules nothing; the
        // original timer still fires at t=60s
        tokio::time::advance(Duration::from_secs(30)).await;
        assert_eq!(filter.evaluate("ABC"), Decision::Reject(RejectReason::Duplicate));

        tokio::time::advance(Duration::from_secs(31)).await;
        tokio::task::yield_now().await;

        assert_eq!(filter.pending_count(), 0);
        assert_eq!(filter.evaluate("ABC"), Decision::Accept);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expiry_only_removes_its_value() {
        let filter = default_filter();

        assert_eq!(filter.evaluate("ABC"), Decision::Accept);
        tokio::time::advance(Duration::from_secs(30)).await;
        assert_eq!(filter.evaluate("XYZ"), Decision::Accept);

        // ABC expires at t=60, XYZ not until t=90
        tokio::time::advance(Duration::from_secs(31)).await;
        tokio::task::yield_now().await;

        assert_eq!(filter.pending_count(), 1);
        assert_eq!(filter.evaluate("ABC"), Decision::Accept);
        assert_eq!(filter.evaluate("XYZ"), Decision::Reject(RejectReason::Duplicate));
    }

    #[tokio::test]
    async fn test_configurable_lengths() {
        let filter = SightingFilter::new(Duration::from_secs(60), vec![4]);

        assert_eq!(filter.evaluate("ABCD"), Decision::Accept);
        assert_eq!(filter.evaluate("ABC"), Decision::Reject(RejectReason::Shape));
        assert_eq!(filter.evaluate("ABC123"), Decision::Reject(RejectReason::Shape));
    }

    #[tokio::test(start_paused = true)]
    async fn test_expiry_metrics() {
        let metrics = Arc::new(Metrics::new());
        let filter =
            SightingFilter::with_metrics(Duration::from_secs(60), vec![3, 6], metrics.clone());

        filter.evaluate("ABC");
        assert_eq!(metrics.snapshot().window_pending, 1);

        tokio::time::advance(Duration::from_secs(61)).await;
        tokio::task::yield_now().await;

        let snap = metrics.snapshot();
        assert_eq!(snap.expired_total, 1);
        assert_eq!(snap.window_pending, 0);
    }
}
