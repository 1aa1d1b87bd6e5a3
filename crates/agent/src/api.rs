//! HTTP API for health checks and Prometheus metrics

use anyhow::Context;
use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use detector_lib::{ComponentStatus, DetectorMetrics, HealthRegistry};
use prometheus::proto::MetricFamily;
use prometheus::{Encoder, TextEncoder};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

const TEXT_CONTENT_TYPE: &str = "text/plain; charset=utf-8";

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub health_registry: HealthRegistry,
    pub metrics: DetectorMetrics,
}

impl AppState {
    pub fn new(health_registry: HealthRegistry, metrics: DetectorMetrics) -> Self {
        Self {
            health_registry,
            metrics,
        }
    }
}

/// 200 while operational (a warming detector is degraded), 503 if unhealthy
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;

    let status_code = match health.status {
        ComponentStatus::Healthy | ComponentStatus::Degraded => StatusCode::OK,
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

/// Readiness check response - returns 200 if ready, 503 if not ready
async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

async fn metrics() -> impl IntoResponse {
    render_metrics(&prometheus::gather())
}

/// Encode metric families in the Prometheus text format
fn render_metrics(
    families: &[MetricFamily],
) -> (StatusCode, [(&'static str, &'static str); 1], Vec<u8>) {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(families, &mut buffer) {
        error!(error = %e, "Failed to encode metrics");
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            [("content-type", TEXT_CONTENT_TYPE)],
            Vec::new(),
        );
    }

    (StatusCode::OK, [("content-type", TEXT_CONTENT_TYPE)], buffer)
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .with_state(state)
}

/// Bind the API listener on all interfaces
pub async fn bind(port: u16) -> anyhow::Result<TcpListener> {
    let addr = format!("0.0.0.0:{}", port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind API server to {}", addr))?;
    info!(addr = %addr, "API server listening");
    Ok(listener)
}

/// Serve the API on an already bound listener until the server fails
pub async fn serve(listener: TcpListener, state: Arc<AppState>) -> anyhow::Result<()> {
    axum::serve(listener, create_router(state))
        .await
        .context("API server failed")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_metrics_encodes_families() {
        let counter =
            prometheus::IntCounter::new("api_render_total", "Render test counter").unwrap();
        counter.inc();
        let registry = prometheus::Registry::new();
        registry.register(Box::new(counter)).unwrap();

        let (status, headers, body) = render_metrics(&registry.gather());
        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers[0].1, TEXT_CONTENT_TYPE);
        assert!(String::from_utf8(body).unwrap().contains("api_render_total 1"));
    }

    #[test]
    fn test_render_metrics_encode_failure_is_500() {
        // a family without a name cannot be encoded
        let (status, _, body) = render_metrics(&[MetricFamily::default()]);
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn test_bind_conflict_is_reported() {
        let listener = bind(0).await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let err = bind(port).await.unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to bind API server"));
    }
}
