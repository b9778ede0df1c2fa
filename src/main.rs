//! plate-relay - sighting deduplication and fan-out reporting service
//!
//! Ingests recognized text snippets from an external OCR engine, suppresses
//! repeats of the same code inside a sliding window, and reports each novel
//! sighting once to every configured collector endpoint, tagged with the
//! current location label.
//!
//! Module structure:
//! - `domain/` - Core types (Detection, Decision, SightingReport)
//! - `io/` - External interfaces (ingest listener, admin HTTP)
//! - `services/` - Business logic (Pipeline, SightingFilter, Notifier)
//! - `infra/` - Infrastructure (Config, Metrics)

use clap::Parser;
use plate_relay::infra::{Config, Metrics};
use plate_relay::io::{start_admin_server, start_ingest_listener, IngestListenerConfig};
use plate_relay::services::{LocationHolder, Notifier, Pipeline};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::info;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::EnvFilter;

/// plate-relay - OCR sighting deduplication and collector fan-out
#[derive(Parser, Debug)]
#[command(name = "plate-relay", version, about)]
struct Args {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = "config/dev.toml")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured logging with configurable level via RUST_LOG env var
    // Default: INFO, use RUST_LOG=debug for per-detection visibility
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(UtcTime::rfc_3339())
        .with_target(false)
        .init();

    info!(git = env!("GIT_HASH"), "plate-relay starting");

    let args = Args::parse();
    let config = Config::load_from_path(&args.config);

    info!(
        config_file = %config.config_file(),
        site = %config.site_id(),
        ingest_port = %config.ingest_port(),
        window_secs = %config.window_secs(),
        accepted_lengths = ?config.accepted_lengths(),
        collectors = ?config.collector_urls(),
        collector_timeout_ms = %config.collector_timeout_ms(),
        admin_port = %config.admin_port(),
        "config_loaded"
    );

    // Create shutdown signal
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Create shared components
    let metrics = Arc::new(Metrics::new());
    let location = Arc::new(LocationHolder::new(config.location_default()));
    let notifier = Arc::new(Notifier::new(&config, location.clone(), metrics.clone()));

    // Create event channel (bounded for backpressure)
    let (event_tx, event_rx) = mpsc::channel(1000);

    // Start admin HTTP server (if port > 0)
    let admin_port = config.admin_port();
    if admin_port > 0 {
        let admin_metrics = metrics.clone();
        let admin_location = location.clone();
        let admin_site = config.site_id().to_string();
        let admin_shutdown = shutdown_rx.clone();
        tokio::spawn(async move {
            if let Err(e) = start_admin_server(
                admin_port,
                admin_metrics,
                admin_site,
                admin_location,
                admin_shutdown,
            )
            .await
            {
                tracing::error!(error = %e, "Admin server error");
            }
        });
    }

    // Start metrics reporter (lock-free reads)
    let metrics_clone = metrics.clone();
    let metrics_interval = config.metrics_interval_secs();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(metrics_interval));
        loop {
            interval.tick().await;
            metrics_clone.report().log();
        }
    });

    // Start ingest listener
    let ingest_config = IngestListenerConfig {
        port: config.ingest_port(),
        enabled: config.ingest_enabled(),
    };
    let ingest_tx = event_tx;
    let ingest_metrics = metrics.clone();
    let ingest_shutdown = shutdown_rx.clone();
    tokio::spawn(async move {
        if let Err(e) =
            start_ingest_listener(ingest_config, ingest_tx, ingest_metrics, ingest_shutdown).await
        {
            tracing::error!(error = %e, "Ingest listener error");
        }
    });

    // Handle shutdown on Ctrl+C
    let shutdown_signal = shutdown_tx;
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("shutdown_signal_received");
        let _ = shutdown_signal.send(true);
    });

    // Run pipeline - consumes events until channel closes or shutdown
    let mut pipeline = Pipeline::new(&config, notifier, location, metrics);
    info!("pipeline_started");
    pipeline.run(event_rx, shutdown_rx).await;

    info!("plate-relay shutdown complete");
    Ok(())
}
