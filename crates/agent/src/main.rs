//! Sysguard Agent - streaming telemetry anomaly detector
//!
//! Reads newline-delimited JSON samples from stdin, writes one JSON decision
//! per sample to stdout and serves health and metrics endpoints. Logs go to
//! stderr so stdout carries decisions only.

use anyhow::{anyhow, Context, Result};
use detector_lib::{
    ArtifactBundle, Detector, DetectorMetrics, HealthRegistry, IngestLoop, StructuredLogger,
};
use std::sync::Arc;
use sysguard_agent::{api, config};
use tokio::io::BufReader;
use tokio::sync::broadcast;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const AGENT_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json().with_writer(std::io::stderr))
        .init();

    info!("Starting sysguard-agent");

    // Load configuration
    let config = config::AgentConfig::load()?;
    info!(
        node_name = %config.node_name,
        artifact_dir = %config.artifact_dir.display(),
        alpha = config.detector.alpha,
        debounce_window = config.detector.debounce_window,
        debounce_required = config.detector.debounce_required,
        "Agent configured"
    );

    let health_registry = HealthRegistry::new();

    let metrics = DetectorMetrics::new();
    let logger = StructuredLogger::new(&config.node_name);

    // Artifacts are mandatory: without them there is nothing to score with
    let artifacts = match ArtifactBundle::load_dir(&config.artifact_dir) {
        Ok(bundle) => Arc::new(bundle),
        Err(e) => {
            error!(error = %e, "Failed to load artifact bundle");
            health_registry.artifacts_failed(e.to_string()).await;
            return Err(e).with_context(|| {
                format!(
                    "Failed to load artifacts from {}",
                    config.artifact_dir.display()
                )
            });
        }
    };
    health_registry.artifacts_loaded(artifacts.run_id()).await;

    let run_id = artifacts.run_id().unwrap_or("unversioned");
    metrics.set_artifact_info(run_id, artifacts.model().trees.len());
    logger.log_startup(AGENT_VERSION, artifacts.run_id(), artifacts.static_threshold());

    let detector = Detector::new(artifacts.clone(), config.detector.clone())
        .context("Failed to initialize detector")?;

    // Create shared application state
    let app_state = Arc::new(api::AppState::new(health_registry.clone(), metrics.clone()));

    // Bind up front so a port conflict aborts startup
    let listener = api::bind(config.api_port).await?;
    let mut api_handle = tokio::spawn(api::serve(listener, app_state));

    health_registry.set_ready(true).await;

    // Ctrl-C stops the ingest loop; EOF on stdin stops it too
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("SIGINT received");
            let _ = shutdown_tx.send(());
        }
    });

    let ingest = IngestLoop::new(detector, metrics, health_registry.clone(), logger);
    let ingest_run = ingest.run(
        BufReader::new(tokio::io::stdin()),
        tokio::io::stdout(),
        shutdown_rx,
    );

    let stats = tokio::select! {
        stats = ingest_run => stats?,
        served = &mut api_handle => {
            health_registry.set_ready(false).await;
            let err = match served {
                Ok(Ok(())) => anyhow!("API server exited unexpectedly"),
                Ok(Err(e)) => e,
                Err(e) => anyhow::Error::new(e).context("API server task panicked"),
            };
            error!(error = ?err, "API server stopped, shutting down");
            return Err(err);
        }
    };

    info!(
        lines = stats.lines,
        processed = stats.processed,
        rejected = stats.rejected,
        malformed = stats.malformed,
        resets = stats.resets,
        final_anomalies = stats.final_anomalies,
        "Shutting down"
    );

    health_registry.set_ready(false).await;
    api_handle.abort();

    Ok(())
}
