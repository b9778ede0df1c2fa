//! Shared types for the sighting relay

use serde::Serialize;
use std::time::Instant;

/// One recognized text region delivered by the OCR engine.
///
/// No identity beyond the string value and arrival time; not retained
/// after evaluation.
#[derive(Debug, Clone)]
pub struct Detection {
    pub text: String,
    pub received_at: Instant,
}

impl Detection {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into(), received_at: Instant::now() }
    }
}

/// Event consumed by the pipeline loop
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    /// A recognized text region from the OCR stream
    Detection(Detection),
    /// Location label update from an external actor
    LocationUpdate(String),
}

/// Why a detection was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// Text length outside the accepted set
    Shape,
    /// Value currently inside its suppression window
    Duplicate,
}

/// Outcome of filter evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Accept,
    Reject(RejectReason),
}

impl Decision {
    #[inline]
    pub fn is_accept(&self) -> bool {
        matches!(self, Decision::Accept)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Accept => "accept",
            Decision::Reject(RejectReason::Shape) => "reject_shape",
            Decision::Reject(RejectReason::Duplicate) => "reject_duplicate",
        }
    }
}

/// Wire payload sent to every collector for one accepted sighting.
///
/// Field names are fixed by the collector API: exactly two string fields,
/// `License` and `Location`.
#[derive(Debug, Clone, Serialize)]
pub struct SightingReport {
    #[serde(rename = "License")]
    pub license: String,
    #[serde(rename = "Location")]
    pub location: String,
}
