//! Feature standardization

use crate::error::{DetectorError, DetectorResult};
use crate::models::FEATURE_COUNT;
use serde::{Deserialize, Serialize};

/// Per-feature mean/scale fitted by the training pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureScaler {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feature_names: Option<Vec<String>>,
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

impl FeatureScaler {
    pub fn new(mean: [f64; FEATURE_COUNT], scale: [f64; FEATURE_COUNT]) -> Self {
        Self {
            run_id: None,
            feature_names: None,
            mean: mean.to_vec(),
            scale: scale.to_vec(),
        }
    }

    /// Structural checks against the expected feature dimensionality
    pub fn validate(&self) -> DetectorResult<()> {
        if self.mean.len() != FEATURE_COUNT || self.scale.len() != FEATURE_COUNT {
            return Err(DetectorError::IncompatibleArtifacts(format!(
                "scaler has {} means and {} scales, expected {}",
                self.mean.len(),
                self.scale.len(),
                FEATURE_COUNT
            )));
        }
        if let Some(names) = &self.feature_names {
            if names.len() != FEATURE_COUNT {
                return Err(DetectorError::IncompatibleArtifacts(format!(
                    "scaler lists {} feature names, expected {}",
                    names.len(),
                    FEATURE_COUNT
                )));
            }
        }
        if self
            .mean
            .iter()
            .chain(self.scale.iter())
            .any(|v| !v.is_finite())
        {
            return Err(DetectorError::IncompatibleArtifacts(
                "scaler contains non-finite parameters".to_string(),
            ));
        }
        Ok(())
    }

    /// `(x - mean) / scale`, treating a zero scale as 1
    pub fn transform(&self, values: &[f64; FEATURE_COUNT]) -> [f64; FEATURE_COUNT] {
        let mut out = [0.0; FEATURE_COUNT];
        for (i, v) in values.iter().enumerate() {
            let scale = if self.scale[i] == 0.0 { 1.0 } else { self.scale[i] };
            out[i] = (v - self.mean[i]) / scale;
        }
        out
    }
}
