//! Services - business logic and state management
//!
//! This module contains the core business logic services:
//! - `pipeline` - Single event-stream orchestrator
//! - `filter` - Sighting deduplication (shape + novelty + window expiry)
//! - `notifier` - Fan-out reporting to collector endpoints
//! - `location` - Shared location label

pub mod filter;
pub mod location;
pub mod notifier;
pub mod pipeline;

// Re-export commonly used types
pub use filter::SightingFilter;
pub use location::LocationHolder;
pub use notifier::Notifier;
pub use pipeline::Pipeline;
