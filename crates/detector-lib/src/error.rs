//! Error taxonomy for detector construction and per-sample processing

use std::path::PathBuf;
use thiserror::Error;

pub type DetectorResult<T> = Result<T, DetectorError>;

#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("failed to read artifact {path}: {source}")]
    ArtifactIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse artifact {path}: {source}")]
    ArtifactFormat {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("incompatible artifacts: {0}")]
    IncompatibleArtifacts(String),

    #[error("checksum mismatch for {file}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        file: String,
        expected: String,
        actual: String,
    },

    #[error("invalid detector configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid sample: {metric} is not finite ({value})")]
    InvalidSample { metric: &'static str, value: f64 },

    #[error("scorer produced a non-finite score ({0})")]
    InvalidScore(f64),
}

impl DetectorError {
    /// True for the initialization class; the detector must not be built
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            DetectorError::InvalidSample { .. } | DetectorError::InvalidScore(_)
        )
    }
}
