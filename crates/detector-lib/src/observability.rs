//! Observability infrastructure for the detector
//!
//! Provides:
//! - Prometheus metrics (processing latency, decisions, current threshold, artifact info)
//! - Structured JSON logging with tracing

use crate::models::{AnomalyEvent, MetricSample};
use prometheus::{
    register_gauge, register_gauge_vec, register_histogram, register_int_counter,
    register_int_gauge, Gauge, GaugeVec, Histogram, IntCounter, IntGauge,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Default histogram buckets for latency measurements (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.00001, 0.00005, 0.0001, 0.00025, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.05,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<DetectorMetricsInner> = OnceLock::new();

/// Inner metrics structure that holds the actual Prometheus metrics
struct DetectorMetricsInner {
    processing_latency_seconds: Histogram,
    samples_processed: IntCounter,
    samples_rejected: IntCounter,
    lines_malformed: IntCounter,
    raw_anomalies: IntCounter,
    final_anomalies: IntCounter,
    last_score: Gauge,
    threshold_used: Gauge,
    history_length: IntGauge,
    artifact_info: GaugeVec,
}

impl DetectorMetricsInner {
    fn new() -> Self {
        Self {
            processing_latency_seconds: register_histogram!(
                "sysguard_processing_latency_seconds",
                "Time spent running one sample through the detector",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register processing_latency_seconds"),

            samples_processed: register_int_counter!(
                "sysguard_samples_processed_total",
                "Samples accepted by the detector"
            )
            .expect("Failed to register samples_processed"),

            samples_rejected: register_int_counter!(
                "sysguard_samples_rejected_total",
                "Samples rejected for non-finite values"
            )
            .expect("Failed to register samples_rejected"),

            lines_malformed: register_int_counter!(
                "sysguard_lines_malformed_total",
                "Input lines that could not be parsed as samples"
            )
            .expect("Failed to register lines_malformed"),

            raw_anomalies: register_int_counter!(
                "sysguard_raw_anomalies_total",
                "Samples scored below the threshold before debouncing"
            )
            .expect("Failed to register raw_anomalies"),

            final_anomalies: register_int_counter!(
                "sysguard_final_anomalies_total",
                "Samples for which the debounced anomaly signal was raised"
            )
            .expect("Failed to register final_anomalies"),

            last_score: register_gauge!(
                "sysguard_last_score",
                "Outlier score of the most recent sample"
            )
            .expect("Failed to register last_score"),

            threshold_used: register_gauge!(
                "sysguard_threshold_used",
                "Decision threshold applied to the most recent sample"
            )
            .expect("Failed to register threshold_used"),

            history_length: register_int_gauge!(
                "sysguard_score_history_length",
                "Number of scores retained for drift tracking"
            )
            .expect("Failed to register history_length"),

            artifact_info: register_gauge_vec!(
                "sysguard_artifact_info",
                "Information about the loaded artifact bundle",
                &["run_id", "trees"]
            )
            .expect("Failed to register artifact_info"),
        }
    }
}

/// Detector metrics for Prometheus exposition
///
/// This is a lightweight handle to the global metrics instance.
/// Multiple clones share the same underlying metrics.
#[derive(Clone)]
pub struct DetectorMetrics {
    _private: (),
}

impl Default for DetectorMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl DetectorMetrics {
    /// Create a new metrics handle (initializes global metrics if needed)
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(DetectorMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &DetectorMetricsInner {
        GLOBAL_METRICS.get().expect("Metrics not initialized")
    }

    /// Record a processed sample and its outcome
    pub fn observe_event(&self, event: &AnomalyEvent, history_length: usize, duration_secs: f64) {
        let inner = self.inner();
        inner.processing_latency_seconds.observe(duration_secs);
        inner.samples_processed.inc();
        if event.raw_anomaly {
            inner.raw_anomalies.inc();
        }
        if event.final_anomaly {
            inner.final_anomalies.inc();
        }
        inner.last_score.set(event.score);
        inner.threshold_used.set(event.threshold_used);
        inner.history_length.set(history_length as i64);
    }

    pub fn inc_samples_rejected(&self) {
        self.inner().samples_rejected.inc();
    }

    pub fn inc_lines_malformed(&self) {
        self.inner().lines_malformed.inc();
    }

    pub fn set_history_length(&self, length: usize) {
        self.inner().history_length.set(length as i64);
    }

    /// Update loaded artifact info
    pub fn set_artifact_info(&self, run_id: &str, trees: usize) {
        let trees = trees.to_string();
        self.inner().artifact_info.reset();
        self.inner()
            .artifact_info
            .with_label_values(&[run_id, trees.as_str()])
            .set(1.0);
    }
}

/// Structured logger for detector events
///
/// Provides consistent JSON-formatted logging for anomalies, rejected
/// samples and lifecycle events.
#[derive(Clone)]
pub struct StructuredLogger {
    node_name: String,
}

impl StructuredLogger {
    pub fn new(node_name: impl Into<String>) -> Self {
        Self {
            node_name: node_name.into(),
        }
    }

    /// Log a raised debounced anomaly signal
    pub fn log_anomaly(&self, sample: &MetricSample, event: &AnomalyEvent) {
        warn!(
            event = "anomaly_detected",
            node = %self.node_name,
            sequence = event.sequence,
            cpu = sample.cpu,
            memory = sample.memory,
            disk = sample.disk,
            battery = sample.battery,
            score = event.score,
            threshold = event.threshold_used,
            phase = event.phase.as_str(),
            "Debounced anomaly detected"
        );
    }

    /// Log the anomaly signal clearing after it was raised
    pub fn log_anomaly_cleared(&self, event: &AnomalyEvent) {
        info!(
            event = "anomaly_cleared",
            node = %self.node_name,
            sequence = event.sequence,
            score = event.score,
            threshold = event.threshold_used,
            "Anomaly signal cleared"
        );
    }

    /// Log a sample rejected before reaching the detector state
    pub fn log_rejected_sample(&self, line_number: u64, reason: &str) {
        warn!(
            event = "sample_rejected",
            node = %self.node_name,
            line = line_number,
            reason = %reason,
            "Rejected input sample"
        );
    }

    /// Log detector startup
    pub fn log_startup(&self, version: &str, run_id: Option<&str>, static_threshold: f64) {
        info!(
            event = "detector_started",
            node = %self.node_name,
            version = %version,
            run_id = run_id.unwrap_or("unversioned"),
            static_threshold = static_threshold,
            "Telemetry detector started"
        );
    }

    /// Log detector shutdown
    pub fn log_shutdown(&self, reason: &str, processed: u64) {
        info!(
            event = "detector_shutdown",
            node = %self.node_name,
            reason = %reason,
            processed = processed,
            "Telemetry detector shutting down"
        );
    }
}
