//! Sighting pipeline - single event-stream orchestration
//!
//! The Pipeline is the central event processor: it consumes ingest events
//! in order, evaluates each detection against the sighting filter, and
//! hands accepted codes to the notifier. One event is processed to
//! completion before the next; only expiry tasks and collector sends run
//! concurrently with it.

use crate::domain::types::{Detection, PipelineEvent};
use crate::infra::config::Config;
use crate::infra::metrics::Metrics;
use crate::services::filter::SightingFilter;
use crate::services::location::LocationHolder;
use crate::services::notifier::Notifier;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch};
use tracing::info;

pub struct Pipeline {
    /// Windowed deduplication of recognized codes
    filter: SightingFilter,
    /// Fan-out reporting for admitted sightings
    notifier: Arc<Notifier>,
    /// Location label, shared with the admin server
    location: Arc<LocationHolder>,
    metrics: Arc<Metrics>,
}

impl Pipeline {
    pub fn new(
        config: &Config,
        notifier: Arc<Notifier>,
        location: Arc<LocationHolder>,
        metrics: Arc<Metrics>,
    ) -> Self {
        let filter = SightingFilter::with_metrics(
            Duration::from_secs(config.window_secs()),
            config.accepted_lengths().to_vec(),
            metrics.clone(),
        );
        Self { filter, notifier, location, metrics }
    }

    /// Consume events until the channel closes or shutdown is signaled
    pub async fn run(
        &mut self,
        mut event_rx: mpsc::Receiver<PipelineEvent>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        loop {
            tokio::select! {
                event = event_rx.recv() => {
                    match event {
                        Some(e) => self.process_event(e),
                        None => break, // Channel closed
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("pipeline_shutdown");
                        break;
                    }
                }
            }
        }
    }

    /// Process a single event to completion
    pub fn process_event(&mut self, event: PipelineEvent) {
        match event {
            PipelineEvent::Detection(detection) => self.handle_detection(detection),
            PipelineEvent::LocationUpdate(label) => self.handle_location_update(label),
        }
    }

    fn handle_detection(&mut self, detection: Detection) {
        let process_start = Instant::now();

        let decision = self.filter.evaluate(&detection.text);
        self.metrics.record_decision(decision);

        if decision.is_accept() {
            // Fire-and-forget: dispatch spawns the sends and returns
            self.notifier.dispatch(&detection.text);
        }

        let latency_us = process_start.elapsed().as_micros() as u64;
        self.metrics.record_detection(latency_us);
    }

    fn handle_location_update(&mut self, label: String) {
        info!(label = %label, "location_updated");
        self.location.set(label);
        self.metrics.record_location_update();
    }

    /// Number of codes currently inside their suppression window
    #[allow(dead_code)]
    pub fn pending_sightings(&self) -> usize {
        self.filter.pending_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_pipeline(metrics: Arc<Metrics>) -> Pipeline {
        // No collector endpoints: decision flow only
        let config = Config::default().with_collector_urls(vec![]);
        let location = Arc::new(LocationHolder::new(config.location_default()));
        let notifier = Arc::new(Notifier::new(&config, location.clone(), metrics.clone()));
        Pipeline::new(&config, notifier, location, metrics)
    }

    #[tokio::test]
    async fn test_detection_accept_then_duplicate() {
        let metrics = Arc::new(Metrics::new());
        let mut pipeline = test_pipeline(metrics.clone());

        pipeline.process_event(PipelineEvent::Detection(Detection::new("ABC")));
        pipeline.process_event(PipelineEvent::Detection(Detection::new("ABC")));

        let snap = metrics.snapshot();
        assert_eq!(snap.detections_total, 2);
        assert_eq!(snap.accepted_total, 1);
        assert_eq!(snap.rejected_duplicate_total, 1);
        assert_eq!(pipeline.pending_sightings(), 1);
    }

    #[tokio::test]
    async fn test_detection_rejected_shape_not_admitted() {
        let metrics = Arc::new(Metrics::new());
        let mut pipeline = test_pipeline(metrics.clone());

        pipeline.process_event(PipelineEvent::Detection(Detection::new("ABCD")));

        let snap = metrics.snapshot();
        assert_eq!(snap.rejected_shape_total, 1);
        assert_eq!(snap.accepted_total, 0);
        assert_eq!(pipeline.pending_sightings(), 0);
    }

    #[tokio::test]
    async fn test_location_update_applied() {
        let metrics = Arc::new(Metrics::new());
        let mut pipeline = test_pipeline(metrics.clone());

        assert_eq!(pipeline.location.get(), "0");
        pipeline.process_event(PipelineEvent::LocationUpdate("LOT-7".to_string()));

        assert_eq!(pipeline.location.get(), "LOT-7");
        assert_eq!(metrics.snapshot().location_updates_total, 1);
    }

    #[tokio::test]
    async fn test_run_exits_on_channel_close() {
        let metrics = Arc::new(Metrics::new());
        let mut pipeline = test_pipeline(metrics.clone());

        let (event_tx, event_rx) = mpsc::channel(16);
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);

        event_tx.send(PipelineEvent::Detection(Detection::new("ABC"))).await.unwrap();
        drop(event_tx);

        pipeline.run(event_rx, shutdown_rx).await;
        assert_eq!(metrics.snapshot().accepted_total, 1);
    }

    #[tokio::test]
    async fn test_run_exits_on_shutdown() {
        let metrics = Arc::new(Metrics::new());
        let mut pipeline = test_pipeline(metrics);

        let (_event_tx, event_rx) = mpsc::channel::<PipelineEvent>(16);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        shutdown_tx.send(true).unwrap();
        pipeline.run(event_rx, shutdown_rx).await;
    }
}
