//! Admin HTTP endpoint
//!
//! Exposes service metrics in Prometheus text format at /metrics, a /health
//! probe, and POST /location for updating the reported location label (the
//! headless stand-in for the UI action that supplies it).
//! Uses hyper for the HTTP server.

use crate::infra::metrics::Metrics;
use crate::services::location::LocationHolder;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::fmt::Write;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info};

/// Prometheus metric type
enum MetricType {
    Counter,
    Gauge,
}

impl MetricType {
    fn as_str(&self) -> &'static str {
        match self {
            MetricType::Counter => "counter",
            MetricType::Gauge => "gauge",
        }
    }
}

/// Write a simple metric (counter or gauge) with site label
fn write_metric(
    output: &mut String,
    name: &str,
    help: &str,
    typ: MetricType,
    site: &str,
    val: u64,
) {
    let _ = writeln!(output, "# HELP {name} {help}");
    let _ = writeln!(output, "# TYPE {name} {}", typ.as_str());
    let _ = writeln!(output, "{name}{{site=\"{site}\"}} {val}");
}

/// Write a gauge metric with f64 value
fn write_gauge_f64(output: &mut String, name: &str, help: &str, site: &str, val: f64) {
    let _ = writeln!(output, "# HELP {name} {help}");
    let _ = writeln!(output, "# TYPE {name} gauge");
    let _ = writeln!(output, "{name}{{site=\"{site}\"}} {val:.6}");
}

/// Format metrics in Prometheus text exposition format
fn format_prometheus_metrics(metrics: &Metrics, site: &str) -> String {
    let snap = metrics.snapshot();
    let mut output = String::with_capacity(2048);

    write_metric(
        &mut output,
        "platerelay_detections_total",
        "Total detections evaluated",
        MetricType::Counter,
        site,
        snap.detections_total,
    );
    write_metric(
        &mut output,
        "platerelay_sightings_admitted_total",
        "Detections admitted as novel sightings",
        MetricType::Counter,
        site,
        snap.accepted_total,
    );
    write_metric(
        &mut output,
        "platerelay_rejected_shape_total",
        "Detections rejected by the shape check",
        MetricType::Counter,
        site,
        snap.rejected_shape_total,
    );
    write_metric(
        &mut output,
        "platerelay_rejected_duplicate_total",
        "Detections rejected as duplicates inside the window",
        MetricType::Counter,
        site,
        snap.rejected_duplicate_total,
    );
    write_metric(
        &mut output,
        "platerelay_window_expired_total",
        "Window entries removed by expiry",
        MetricType::Counter,
        site,
        snap.expired_total,
    );
    write_metric(
        &mut output,
        "platerelay_window_pending",
        "Codes currently inside their suppression window",
        MetricType::Gauge,
        site,
        snap.window_pending,
    );
    write_metric(
        &mut output,
        "platerelay_reports_sent_total",
        "Collector reports delivered with success status",
        MetricType::Counter,
        site,
        snap.reports_sent_total,
    );
    write_metric(
        &mut output,
        "platerelay_reports_failed_total",
        "Collector reports failed (transport error or non-2xx)",
        MetricType::Counter,
        site,
        snap.reports_failed_total,
    );
    write_metric(
        &mut output,
        "platerelay_ingest_received_total",
        "Ingest events received (before try_send)",
        MetricType::Counter,
        site,
        snap.ingest_received_total,
    );
    write_metric(
        &mut output,
        "platerelay_ingest_dropped_total",
        "Ingest events dropped due to channel full",
        MetricType::Counter,
        site,
        snap.ingest_dropped_total,
    );
    write_gauge_f64(
        &mut output,
        "platerelay_ingest_drop_ratio",
        "Ingest drop ratio (dropped / received)",
        site,
        snap.ingest_drop_ratio(),
    );
    write_metric(
        &mut output,
        "platerelay_location_updates_total",
        "Location label updates applied",
        MetricType::Counter,
        site,
        snap.location_updates_total,
    );

    output
}

fn text_response(status: StatusCode, body: &'static str) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .body(Full::new(Bytes::from(body)))
        .expect("static response should not fail")
}

/// Handle HTTP requests
async fn handle_request(
    req: Request<hyper::body::Incoming>,
    metrics: Arc<Metrics>,
    site_id: Arc<String>,
    location: Arc<LocationHolder>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    match (req.method(), req.uri().path()) {
        (&Method::GET, "/metrics") => {
            let body = format_prometheus_metrics(&metrics, &site_id);
            Ok(Response::builder()
                .status(StatusCode::OK)
                .header("Content-Type", "text/plain; version=0.0.4; charset=utf-8")
                .body(Full::new(Bytes::from(body)))
                .expect("static response should not fail"))
        }
        (&Method::GET, "/health") => Ok(text_response(StatusCode::OK, "ok")),
        // Location label update - POST /location with the label as the body
        (&Method::POST, "/location") => {
            let body = match req.into_body().collect().await {
                Ok(collected) => collected.to_bytes(),
                Err(e) => {
                    error!(error = %e, "admin_location_body_read_failed");
                    return Ok(text_response(StatusCode::BAD_REQUEST, "bad request"));
                }
            };

            let label = String::from_utf8_lossy(&body).trim().to_string();
            if label.is_empty() {
                return Ok(Response::builder()
                    .status(StatusCode::BAD_REQUEST)
                    .header("Content-Type", "application/json")
                    .header("Access-Control-Allow-Origin", "*")
                    .body(Full::new(Bytes::from(r#"{"ok":false,"error":"empty_label"}"#)))
                    .expect("static response should not fail"));
            }

            info!(label = %label, "location_updated_via_admin");
            location.set(label);
            metrics.record_location_update();

            Ok(Response::builder()
                .status(StatusCode::OK)
                .header("Content-Type", "application/json")
                .header("Access-Control-Allow-Origin", "*")
                .body(Full::new(Bytes::from(r#"{"ok":true}"#)))
                .expect("static response should not fail"))
        }
        // CORS preflight for /location
        (&Method::OPTIONS, "/location") => Ok(Response::builder()
            .status(StatusCode::OK)
            .header("Access-Control-Allow-Origin", "*")
            .header("Access-Control-Allow-Methods", "POST, OPTIONS")
            .header("Access-Control-Allow-Headers", "Content-Type")
            .body(Full::new(Bytes::from("")))
            .expect("static response should not fail")),
        _ => Ok(text_response(StatusCode::NOT_FOUND, "Not Found")),
    }
}

/// Start the admin HTTP server
pub async fn start_admin_server(
    port: u16,
    metrics: Arc<Metrics>,
    site_id: String,
    location: Arc<LocationHolder>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    let site_id = Arc::new(site_id);

    info!(port = %port, site = %site_id, "admin_server_started");

    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, _addr)) => {
                        let io = TokioIo::new(stream);
                        let metrics = metrics.clone();
                        let site_id = site_id.clone();
                        let location = location.clone();

                        tokio::spawn(async move {
                            let service = service_fn(move |req| {
                                let metrics = metrics.clone();
                                let site_id = site_id.clone();
                                let location = location.clone();
                                async move { handle_request(req, metrics, site_id, location).await }
                            });

                            if let Err(e) = http1::Builder::new()
                                .serve_connection(io, service)
                                .await
                            {
                                error!(error = %e, "admin_http_error");
                            }
                        });
                    }
                    Err(e) => {
                        error!(error = %e, "admin_accept_error");
                    }
                }
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    info!("admin_server_shutdown");
                    return Ok(());
                }
            }
        }
    }
}
