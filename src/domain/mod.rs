//! Domain models - core types for the sighting pipeline
//!
//! This module contains the canonical data types used throughout the system:
//! - `Detection` - one recognized text region from the OCR stream
//! - `PipelineEvent` - events consumed by the pipeline loop
//! - `Decision` - outcome of filter evaluation
//! - `SightingReport` - wire payload sent to collectors

pub mod types;

pub use types::{Decision, Detection, PipelineEvent, RejectReason, SightingReport};
