//! Loading and validation of the pre-trained artifact bundle
//!
//! A bundle is a directory holding the feature scaler, the isolation forest
//! and the static threshold produced by one offline training run, plus an
//! optional manifest with SHA256 checksums for each file. All three artifacts
//! are loaded together and checked for structural compatibility; any failure
//! is fatal to detector construction.

use super::forest::IsolationForest;
use super::scaler::FeatureScaler;
use crate::error::{DetectorError, DetectorResult};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

pub const SCALER_FILE: &str = "scaler.json";
pub const MODEL_FILE: &str = "model.json";
pub const THRESHOLD_FILE: &str = "threshold.json";
pub const MANIFEST_FILE: &str = "manifest.json";

const ARTIFACT_FILES: [&str; 3] = [SCALER_FILE, MODEL_FILE, THRESHOLD_FILE];

/// Decision threshold fitted alongside the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaticThreshold {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    pub static_threshold: f64,
}

/// Checksums for the files of one training run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactManifest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    /// File name to lowercase hex SHA256
    pub files: BTreeMap<String, String>,
}

/// Immutable scaler + model + threshold from a single training run
#[derive(Debug, Clone)]
pub struct ArtifactBundle {
    scaler: FeatureScaler,
    model: IsolationForest,
    threshold: StaticThreshold,
    run_id: Option<String>,
}

/// Human-oriented description of a loaded bundle
#[derive(Debug, Clone, Serialize)]
pub struct ArtifactSummary {
    pub run_id: Option<String>,
    pub static_threshold: f64,
    pub trees: usize,
    pub max_samples: u64,
    pub total_nodes: usize,
    pub scaler_mean: Vec<f64>,
    pub scaler_scale: Vec<f64>,
}

impl ArtifactBundle {
    /// Assemble a bundle from already-parsed artifacts
    pub fn from_parts(
        scaler: FeatureScaler,
        model: IsolationForest,
        threshold: StaticThreshold,
    ) -> DetectorResult<Self> {
        scaler.validate()?;
        model.validate()?;
        if !threshold.static_threshold.is_finite() {
            return Err(DetectorError::IncompatibleArtifacts(format!(
                "static threshold is not finite ({})",
                threshold.static_threshold
            )));
        }

        let run_id = consistent_run_id([
            (SCALER_FILE, scaler.run_id.as_deref()),
            (MODEL_FILE, model.run_id.as_deref()),
            (THRESHOLD_FILE, threshold.run_id.as_deref()),
        ])?;

        Ok(Self {
            scaler,
            model,
            threshold,
            run_id,
        })
    }

    fn from_contents(
        dir: &Path,
        manifest: Option<&ArtifactManifest>,
        contents: &[Vec<u8>; 3],
    ) -> DetectorResult<Self> {
        if let Some(manifest) = manifest {
            for (name, data) in ARTIFACT_FILES.iter().zip(contents) {
                let expected = manifest.files.get(*name).ok_or_else(|| {
                    DetectorError::IncompatibleArtifacts(format!("manifest does not list {}", name))
                })?;
                verify_checksum(name, expected, data)?;
            }
        }

        let [scaler, model, threshold] = contents;
        Self::from_parts(
            parse_json(&dir.join(SCALER_FILE), scaler)?,
            parse_json(&dir.join(MODEL_FILE), model)?,
            parse_json(&dir.join(THRESHOLD_FILE), threshold)?,
        )
    }

    /// Parse and validate the three artifact files in `dir`, ignoring any
    /// manifest
    pub fn read_parts(dir: &Path) -> DetectorResult<Self> {
        let contents = read_artifact_files(dir)?;
        Self::from_contents(dir, None, &contents)
    }

    /// Load a bundle from `dir`, verifying the manifest when one is present
    ///
    /// Each file is read once; checksums are computed over the same bytes
    /// that are parsed.
    pub fn load_dir(dir: &Path) -> DetectorResult<Self> {
        let manifest_path = dir.join(MANIFEST_FILE);
        let manifest: Option<ArtifactManifest> = if manifest_path.exists() {
            let data = read_file(&manifest_path)?;
            Some(parse_json(&manifest_path, &data)?)
        } else {
            debug!(dir = %dir.display(), "No artifact manifest, skipping checksum validation");
            None
        };

        let contents = read_artifact_files(dir)?;
        let bundle = Self::from_contents(dir, manifest.as_ref(), &contents)?;

        if let Some(manifest_run) = manifest.as_ref().and_then(|m| m.run_id.as_deref()) {
            if let Some(run_id) = bundle.run_id() {
                if run_id != manifest_run {
                    return Err(DetectorError::IncompatibleArtifacts(format!(
                        "manifest run {} does not match artifact run {}",
                        manifest_run, run_id
                    )));
                }
            }
        }

        info!(
            dir = %dir.display(),
            run_id = ?bundle.run_id,
            trees = bundle.model.trees.len(),
            static_threshold = bundle.threshold.static_threshold,
            verified = manifest.is_some(),
            "Loaded artifact bundle"
        );

        Ok(bundle)
    }

    pub fn scaler(&self) -> &FeatureScaler {
        &self.scaler
    }

    pub fn model(&self) -> &IsolationForest {
        &self.model
    }

    pub fn static_threshold(&self) -> f64 {
        self.threshold.static_threshold
    }

    pub fn run_id(&self) -> Option<&str> {
        self.run_id.as_deref()
    }

    pub fn summary(&self) -> ArtifactSummary {
        ArtifactSummary {
            run_id: self.run_id.clone(),
            static_threshold: self.threshold.static_threshold,
            trees: self.model.trees.len(),
            max_samples: self.model.max_samples,
            total_nodes: self.model.trees.iter().map(|t| t.children_left.len()).sum(),
            scaler_mean: self.scaler.mean.clone(),
            scaler_scale: self.scaler.scale.clone(),
        }
    }
}

/// Compute checksums for the three artifact files and write `manifest.json`
pub fn write_manifest(dir: &Path, run_id: Option<String>) -> DetectorResult<ArtifactManifest> {
    let contents = read_artifact_files(dir)?;
    let files = ARTIFACT_FILES
        .iter()
        .zip(&contents)
        .map(|(name, data)| (name.to_string(), compute_checksum(data)))
        .collect();
    let manifest = ArtifactManifest { run_id, files };

    let path = dir.join(MANIFEST_FILE);
    let content = serde_json::to_vec_pretty(&manifest).map_err(|source| {
        DetectorError::ArtifactFormat {
            path: path.clone(),
            source,
        }
    })?;
    fs::write(&path, content).map_err(|source| DetectorError::ArtifactIo { path, source })?;

    Ok(manifest)
}

/// Compute SHA256 checksum of data
pub fn compute_checksum(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

fn verify_checksum(name: &str, expected: &str, data: &[u8]) -> DetectorResult<()> {
    let actual = compute_checksum(data);
    if !actual.eq_ignore_ascii_case(expected) {
        return Err(DetectorError::ChecksumMismatch {
            file: name.to_string(),
            expected: expected.to_string(),
            actual,
        });
    }
    debug!(file = name, checksum = %actual, "Artifact checksum validated");
    Ok(())
}

fn read_file(path: &Path) -> DetectorResult<Vec<u8>> {
    fs::read(path).map_err(|source| DetectorError::ArtifactIo {
        path: path.to_path_buf(),
        source,
    })
}

/// Scaler, model and threshold bytes, in that order
fn read_artifact_files(dir: &Path) -> DetectorResult<[Vec<u8>; 3]> {
    let mut contents: [Vec<u8>; 3] = Default::default();
    for (slot, name) in contents.iter_mut().zip(ARTIFACT_FILES) {
        *slot = read_file(&dir.join(name))?;
    }
    Ok(contents)
}

fn parse_json<T: DeserializeOwned>(path: &Path, data: &[u8]) -> DetectorResult<T> {
    serde_json::from_slice(data).map_err(|source| DetectorError::ArtifactFormat {
        path: path.to_path_buf(),
        source,
    })
}

/// All run ids that are present must agree
fn consistent_run_id<'a>(
    ids: [(&'static str, Option<&'a str>); 3],
) -> DetectorResult<Option<String>> {
    let mut seen: Option<(&str, &str)> = None;
    for (file, id) in ids {
        let Some(id) = id else { continue };
        match seen {
            Some((first_file, first_id)) if first_id != id => {
                return Err(DetectorError::IncompatibleArtifacts(format!(
                    "{} is from run {} but {} is from run {}",
                    first_file, first_id, file, id
                )));
            }
            Some(_) => {}
            None => seen = Some((file, id)),
        }
    }
    Ok(seen.map(|(_, id)| id.to_string()))
}
