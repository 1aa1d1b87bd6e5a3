//! Outlier scoring of smoothed feature vectors

mod artifacts;
mod forest;
mod scaler;

pub use artifacts::{
    compute_checksum, write_manifest, ArtifactBundle, ArtifactManifest, ArtifactSummary,
    StaticThreshold, MANIFEST_FILE, MODEL_FILE, SCALER_FILE, THRESHOLD_FILE,
};
pub use forest::{average_path_length, IsolationForest, IsolationTree, LEAF};
pub use scaler::FeatureScaler;

#[cfg(test)]
pub(crate) use artifacts::fixtures as artifact_fixtures;

use crate::models::FeatureVector;
use std::sync::Arc;

/// Trait for pre-trained scoring implementations
///
/// Implementations must be pure: the same vector always yields the same
/// score. Lower scores are more anomalous.
pub trait Scorer: Send + Sync {
    fn score(&self, features: &FeatureVector) -> f64;
}

/// Standardize with the bundle's scaler, then score with its forest
#[derive(Debug, Clone)]
pub struct IsolationForestScorer {
    artifacts: Arc<ArtifactBundle>,
}

impl IsolationForestScorer {
    pub fn new(artifacts: Arc<ArtifactBundle>) -> Self {
        Self { artifacts }
    }

    pub fn artifacts(&self) -> &Arc<ArtifactBundle> {
        &self.artifacts
    }
}

impl Scorer for IsolationForestScorer {
    fn score(&self, features: &FeatureVector) -> f64 {
        let standardized = self.artifacts.scaler().transform(&features.to_array());
        self.artifacts.model().score_samples(&standardized)
    }
}
