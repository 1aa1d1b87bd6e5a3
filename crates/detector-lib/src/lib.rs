//! Streaming anomaly detection for system telemetry
//!
//! This crate provides the core functionality for:
//! - EWMA smoothing of cpu/memory/disk/battery samples
//! - Isolation-forest scoring with pre-trained artifacts
//! - A drift-aware adaptive threshold and debounced decisions
//! - NDJSON sample ingestion
//! - Health checks and observability

pub mod anomaly;
pub mod config;
pub mod error;
pub mod health;
pub mod ingest;
pub mod models;
pub mod observability;
pub mod scoring;

pub use anomaly::Detector;
pub use config::DetectorConfig;
pub use error::{DetectorError, DetectorResult};
pub use health::{
    Component, ComponentHealth, ComponentStatus, HealthRegistry, HealthReport, Readiness,
};
pub use ingest::{apply_line, IngestLoop, LineOutcome};
pub use models::*;
pub use observability::{DetectorMetrics, StructuredLogger};
pub use scoring::{ArtifactBundle, Scorer, MANIFEST_FILE};
