//! Liveness and readiness state for the detector agent
//!
//! Three fixed components are tracked. Artifacts start unhealthy until a
//! bundle is loaded, the detector follows its phase (COLD and WARMING are
//! degraded, STEADY is healthy) and ingest follows the input stream.
//! Readiness additionally requires the agent to have announced itself ready.

use crate::models::DetectorPhase;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Component {
    Artifacts,
    Detector,
    Ingest,
}

impl Component {
    pub const ALL: [Component; 3] = [Component::Artifacts, Component::Detector, Component::Ingest];

    pub fn as_str(&self) -> &'static str {
        match self {
            Component::Artifacts => "artifacts",
            Component::Detector => "detector",
            Component::Ingest => "ingest",
        }
    }
}

/// Ordered from best to worst, so the overall status is the maximum
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    Healthy,
    /// Operational with reduced confidence
    Degraded,
    Unhealthy,
}

impl ComponentStatus {
    pub fn is_operational(&self) -> bool {
        *self != ComponentStatus::Unhealthy
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComponentHealth {
    pub status: ComponentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl ComponentHealth {
    fn new(status: ComponentStatus, message: Option<String>) -> Self {
        Self {
            status,
            message,
            updated_at: Utc::now(),
        }
    }
}

/// Body of the liveness endpoint
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: ComponentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<DetectorPhase>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    pub components: BTreeMap<Component, ComponentHealth>,
}

/// Body of the readiness endpoint
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Readiness {
    pub ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug)]
struct RegistryState {
    components: BTreeMap<Component, ComponentHealth>,
    phase: Option<DetectorPhase>,
    run_id: Option<String>,
    ready: bool,
}

/// Shared, cloneable handle to the agent's health state
#[derive(Debug, Clone)]
pub struct HealthRegistry {
    state: Arc<RwLock<RegistryState>>,
}

impl Default for HealthRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthRegistry {
    pub fn new() -> Self {
        let mut components = BTreeMap::new();
        components.insert(
            Component::Artifacts,
            ComponentHealth::new(ComponentStatus::Unhealthy, Some("Artifacts not loaded".into())),
        );
        components.insert(
            Component::Detector,
            ComponentHealth::new(ComponentStatus::Degraded, Some(phase_message(DetectorPhase::Cold))),
        );
        components.insert(
            Component::Ingest,
            ComponentHealth::new(ComponentStatus::Degraded, Some("Ingest not started".into())),
        );

        Self {
            state: Arc::new(RwLock::new(RegistryState {
                components,
                phase: None,
                run_id: None,
                ready: false,
            })),
        }
    }

    async fn set(&self, component: Component, status: ComponentStatus, message: Option<String>) {
        let mut state = self.state.write().await;
        state
            .components
            .insert(component, ComponentHealth::new(status, message));
    }

    pub async fn artifacts_loaded(&self, run_id: Option<&str>) {
        self.state.write().await.run_id = run_id.map(str::to_string);
        self.set(Component::Artifacts, ComponentStatus::Healthy, None).await;
    }

    pub async fn artifacts_failed(&self, reason: impl Into<String>) {
        self.set(Component::Artifacts, ComponentStatus::Unhealthy, Some(reason.into()))
            .await;
    }

    /// Reflect the detector phase in its component health
    pub async fn report_phase(&self, phase: DetectorPhase) {
        let status = match phase {
            DetectorPhase::Steady => ComponentStatus::Healthy,
            DetectorPhase::Cold | DetectorPhase::Warming => ComponentStatus::Degraded,
        };
        let message = (status != ComponentStatus::Healthy).then(|| phase_message(phase));
        let mut state = self.state.write().await;
        state.phase = Some(phase);
        state
            .components
            .insert(Component::Detector, ComponentHealth::new(status, message));
    }

    pub async fn ingest_running(&self) {
        self.set(Component::Ingest, ComponentStatus::Healthy, None).await;
    }

    /// Input reached EOF; decisions already made remain valid
    pub async fn ingest_closed(&self) {
        self.set(Component::Ingest, ComponentStatus::Degraded, Some("Input stream closed".into()))
            .await;
    }

    pub async fn ingest_failed(&self, reason: impl Into<String>) {
        self.set(Component::Ingest, ComponentStatus::Unhealthy, Some(reason.into()))
            .await;
    }

    pub async fn set_ready(&self, ready: bool) {
        self.state.write().await.ready = ready;
    }

    pub async fn component(&self, component: Component) -> Option<ComponentHealth> {
        self.state.read().await.components.get(&component).cloned()
    }

    pub async fn health(&self) -> HealthReport {
        let state = self.state.read().await;
        let status = state
            .components
            .values()
            .map(|c| c.status)
            .max()
            .unwrap_or(ComponentStatus::Healthy);
        HealthReport {
            status,
            phase: state.phase,
            run_id: state.run_id.clone(),
            components: state.components.clone(),
        }
    }

    pub async fn readiness(&self) -> Readiness {
        let state = self.state.read().await;
        let not_ready = |reason: String| Readiness {
            ready: false,
            reason: Some(reason),
        };

        if !state.ready {
            return not_ready("Agent not started".to_string());
        }
        for component in Component::ALL {
            if let Some(health) = state.components.get(&component) {
                if !health.status.is_operational() {
                    let detail = health.message.as_deref().unwrap_or("unhealthy");
                    return not_ready(format!("{}: {}", component.as_str(), detail));
                }
            }
        }
        Readiness {
            ready: true,
            reason: None,
        }
    }
}

fn phase_message(phase: DetectorPhase) -> String {
    match phase {
        DetectorPhase::Cold => "No samples processed yet".to_string(),
        DetectorPhase::Warming => "Warming up, using static threshold".to_string(),
        DetectorPhase::Steady => "Adaptive threshold active".to_string(),
    }
}
