//! Fan-out reporting to collector endpoints
//!
//! For each accepted sighting: snapshot the location once, serialize the
//! payload once, and post the identical bytes to every configured collector
//! from independent tasks. Failures are logged and counted, never retried,
//! and never surfaced to the pipeline.

use crate::domain::types::SightingReport;
use crate::infra::config::Config;
use crate::infra::metrics::Metrics;
use crate::services::location::LocationHolder;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};

/// Log a transport-level send failure (cold path)
#[cold]
fn log_send_failed(url: &str, code: &str, e: &reqwest::Error) {
    warn!(url = %url, code = %code, error = %e, "report_send_failed");
}

pub struct Notifier {
    /// Collector endpoints; fixed at construction
    endpoints: Vec<String>,
    /// Client built once for connection reuse across dispatches
    client: Option<reqwest::Client>,
    location: Arc<LocationHolder>,
    metrics: Arc<Metrics>,
}

impl Notifier {
    pub fn new(config: &Config, location: Arc<LocationHolder>, metrics: Arc<Metrics>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.collector_timeout_ms()))
            .http1_only()
            .build()
            .ok();

        Self { endpoints: config.collector_urls().to_vec(), client, location, metrics }
    }

    pub fn endpoint_count(&self) -> usize {
        self.endpoints.len()
    }

    /// Report one accepted sighting to every configured collector.
    ///
    /// The location is read once and the payload serialized once, so all
    /// endpoints receive identical bytes for this sighting even if the
    /// label changes mid-fan-out. Each send runs on its own task; this
    /// method never blocks on network I/O and never fails the caller.
    pub fn dispatch(&self, code: &str) {
        let Some(ref client) = self.client else {
            error!(code = %code, "collector_client_not_initialized");
            return;
        };

        let report = SightingReport {
            license: code.to_string(),
            location: self.location.get(),
        };

        let body = match serde_json::to_vec(&report) {
            Ok(body) => body,
            Err(e) => {
                error!(code = %report.license, error = %e, "report_encode_failed");
                return;
            }
        };

        for url in &self.endpoints {
            let client = client.clone();
            let url = url.clone();
            let code = report.license.clone();
            let body = body.clone();
            let metrics = self.metrics.clone();

            tokio::spawn(async move {
                send_report(client, url, code, body, metrics).await;
            });
        }
    }
}

/// Post one report to one collector; log-only outcome handling
async fn send_report(
    client: reqwest::Client,
    url: String,
    code: String,
    body: Vec<u8>,
    metrics: Arc<Metrics>,
) {
    let start = Instant::now();

    let result = client
        .post(&url)
        .header(reqwest::header::CONTENT_TYPE, "application/json")
        .body(body)
        .send()
        .await;

    match result {
        Ok(response) if response.status().is_success() => {
            let status = response.status().as_u16();
            let latency_us = start.elapsed().as_micros() as u64;
            let response_body = response.text().await.unwrap_or_default();
            metrics.record_report_sent();
            debug!(
                url = %url,
                code = %code,
                status = %status,
                latency_us = %latency_us,
                response = %response_body,
                "report_delivered"
            );
        }
        Ok(response) => {
            metrics.record_report_failed();
            warn!(
                url = %url,
                code = %code,
                status = %response.status().as_u16(),
                "report_rejected"
            );
        }
        Err(e) => {
            metrics.record_report_failed();
            log_send_failed(&url, &code, &e);
        }
    }
}
