//! Core data models for the telemetry detector

use serde::{Deserialize, Serialize};

/// Number of features consumed by the scorer
pub const FEATURE_COUNT: usize = 4;

/// Canonical feature order shared with the training pipeline
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = ["cpu", "memory", "disk", "battery"];

/// One telemetry reading, nominally one per second
///
/// Upstream samples may carry extra fields (e.g. `gpu`); they are ignored on
/// deserialization rather than rejected.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    pub cpu: f64,
    pub memory: f64,
    pub disk: f64,
    pub battery: f64,
}

impl MetricSample {
    pub fn new(cpu: f64, memory: f64, disk: f64, battery: f64) -> Self {
        Self {
            cpu,
            memory,
            disk,
            battery,
        }
    }

    /// Values in canonical feature order
    pub fn values(&self) -> [f64; FEATURE_COUNT] {
        [self.cpu, self.memory, self.disk, self.battery]
    }

    /// First non-finite field, if any, as `(name, value)`
    pub fn first_non_finite(&self) -> Option<(&'static str, f64)> {
        FEATURE_NAMES
            .iter()
            .zip(self.values())
            .find(|(_, v)| !v.is_finite())
            .map(|(name, v)| (*name, v))
    }
}

/// Smoothed feature vector handed to the scorer
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub cpu: f64,
    pub memory: f64,
    pub disk: f64,
    pub battery: f64,
}

impl FeatureVector {
    pub fn from_array(values: [f64; FEATURE_COUNT]) -> Self {
        Self {
            cpu: values[0],
            memory: values[1],
            disk: values[2],
            battery: values[3],
        }
    }

    pub fn to_array(&self) -> [f64; FEATURE_COUNT] {
        [self.cpu, self.memory, self.disk, self.battery]
    }
}

/// Lifecycle phase of a detector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectorPhase {
    /// No samples processed since construction or reset
    Cold,
    /// Samples processed, adaptive threshold not yet active
    Warming,
    /// Adaptive threshold active
    Steady,
}

impl DetectorPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            DetectorPhase::Cold => "cold",
            DetectorPhase::Warming => "warming",
            DetectorPhase::Steady => "steady",
        }
    }
}

/// Result of processing one sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyEvent {
    /// 1-based position of the sample since construction or reset
    pub sequence: u64,
    pub score: f64,
    pub threshold_used: f64,
    pub raw_anomaly: bool,
    pub final_anomaly: bool,
    pub smoothed: FeatureVector,
    pub phase: DetectorPhase,
}
