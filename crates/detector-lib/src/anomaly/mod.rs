//! Streaming anomaly detection over system telemetry
//!
//! This module provides:
//! - EWMA smoothing per metric
//! - A drift-aware threshold bounded by the trained static threshold
//! - Majority-vote debouncing of raw decisions
//! - The `Detector` tying them to a pre-trained scorer

mod debouncer;
mod detector;
mod smoother;
mod threshold;

#[cfg(test)]
mod tests;

pub use debouncer::Debouncer;
pub use detector::Detector;
pub use smoother::Smoother;
pub use threshold::{percentile, ThresholdAdapter, ThresholdDecision};
