//! Detection TCP listener
//!
//! Stands in for the OCR engine callback: the engine connects and writes
//! one line per recognized text region. Protocol:
//!   DETECT <text>     - recognized text region from one frame
//!   LOCATION <label>  - update the reported location label
//!
//! Events are forwarded with try_send so a slow pipeline never blocks a
//! connection handler; drops are counted in metrics.

use crate::domain::types::{Detection, PipelineEvent};
use crate::infra::metrics::Metrics;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpListener;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

/// Ingest listener configuration
#[derive(Debug, Clone)]
pub struct IngestListenerConfig {
    pub port: u16,
    pub enabled: bool,
}

impl Default for IngestListenerConfig {
    fn default() -> Self {
        Self { port: 7070, enabled: true }
    }
}

/// Parse one ingest line into a pipeline event
fn parse_line(line: &str) -> Option<PipelineEvent> {
    let line = line.trim();

    if let Some(text) = line.strip_prefix("DETECT ") {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        return Some(PipelineEvent::Detection(Detection::new(text)));
    }

    if let Some(label) = line.strip_prefix("LOCATION ") {
        let label = label.trim();
        if label.is_empty() {
            return None;
        }
        return Some(PipelineEvent::LocationUpdate(label.to_string()));
    }

    None
}

/// Start the detection TCP listener
///
/// Accepts connections from the OCR engine and forwards parsed events to
/// the pipeline channel.
pub async fn start_ingest_listener(
    config: IngestListenerConfig,
    event_tx: mpsc::Sender<PipelineEvent>,
    metrics: Arc<Metrics>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    if !config.enabled {
        info!("ingest_listener_disabled");
        return Ok(());
    }

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = TcpListener::bind(&addr).await?;

    info!(port = %config.port, "ingest_listener_started");

    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    info!("ingest_listener_shutdown");
                    return Ok(());
                }
            }
            result = listener.accept() => {
                match result {
                    Ok((socket, addr)) => {
                        let tx = event_tx.clone();
                        let m = metrics.clone();
                        tokio::spawn(async move {
                            handle_ingest_connection(socket, addr, tx, m).await;
                        });
                    }
                    Err(e) => {
                        error!(error = %e, "ingest_accept_failed");
                    }
                }
            }
        }
    }
}

async fn handle_ingest_connection(
    socket: tokio::net::TcpStream,
    addr: SocketAddr,
    event_tx: mpsc::Sender<PipelineEvent>,
    metrics: Arc<Metrics>,
) {
    let peer = addr.to_string();
    debug!(peer = %peer, "ingest_connection_accepted");

    let reader = BufReader::new(socket);
    let mut lines = reader.lines();

    // Rate-limit drop warnings to 1 per second
    let mut last_drop_warn = Instant::now() - Duration::from_secs(2);

    while let Ok(Some(line)) = lines.next_line().await {
        let Some(event) = parse_line(&line) else {
            if !line.trim().is_empty() {
                debug!(peer = %peer, line = %line.trim(), "ingest_unknown_message");
            }
            continue;
        };

        metrics.record_ingest_received();
        match event_tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                metrics.record_ingest_dropped();
                if last_drop_warn.elapsed() > Duration::from_secs(1) {
                    warn!(peer = %peer, "ingest_event_dropped: channel full");
                    last_drop_warn = Instant::now();
                }
            }
            Err(TrySendError::Closed(_)) => {
                warn!(peer = %peer, "ingest_channel_closed");
                break;
            }
        }
    }

    debug!(peer = %peer, "ingest_connection_closed");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_detect_line() {
        let event = parse_line("DETECT ABC123\n").unwrap();
        match event {
            PipelineEvent::Detection(d) => assert_eq!(d.text, "ABC123"),
            _ => panic!("expected detection"),
        }
    }

    #[test]
    fn test_parse_location_line() {
        let event = parse_line("LOCATION LOT-7").unwrap();
        match event {
            PipelineEvent::LocationUpdate(label) => assert_eq!(label, "LOT-7"),
            _ => panic!("expected location update"),
        }
    }

    #[test]
    fn test_parse_rejects_empty_payloads() {
        assert!(parse_line("DETECT ").is_none());
        assert!(parse_line("LOCATION   ").is_none());
        assert!(parse_line("").is_none());
    }

    #[test]
    fn test_parse_rejects_unknown_lines() {
        assert!(parse_line("PING").is_none());
        assert!(parse_line("detect abc").is_none());
    }

    #[tokio::test]
    async fn test_listener_forwards_events() {
        use tokio::io::AsyncWriteExt;

        let (event_tx, mut event_rx) = mpsc::channel(16);
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let metrics = Arc::new(Metrics::new());

        // Bind on an ephemeral port, then point the listener config at it
        let probe = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = probe.local_addr().unwrap().port();
        drop(probe);

        let config = IngestListenerConfig { port, enabled: true };
        let m = metrics.clone();
        tokio::spawn(async move {
            let _ = start_ingest_listener(config, event_tx, m, shutdown_rx).await;
        });

        // Give the listener a moment to bind
        tokio::time::sleep(Duration::from_millis(50)).await;

        let mut stream = tokio::net::TcpStream::connect(("127.0.0.1", port)).await.unwrap();
        stream.write_all(b"DETECT ABC\nLOCATION LOT-7\nJUNK\n").await.unwrap();

        match event_rx.recv().await.unwrap() {
            PipelineEvent::Detection(d) => assert_eq!(d.text, "ABC"),
            _ => panic!("expected detection first"),
        }
        match event_rx.recv().await.unwrap() {
            PipelineEvent::LocationUpdate(label) => assert_eq!(label, "LOT-7"),
            _ => panic!("expected location update second"),
        }

        assert_eq!(metrics.snapshot().ingest_received_total, 2);
    }
}
