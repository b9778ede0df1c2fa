//! IO modules - external system interfaces
//!
//! This module contains all external IO operations:
//! - `ingest` - TCP line listener for OCR detection events
//! - `admin` - HTTP endpoint for metrics, health, and location updates

pub mod admin;
pub mod ingest;

// Re-export commonly used types
pub use admin::start_admin_server;
pub use ingest::{start_ingest_listener, IngestListenerConfig};
