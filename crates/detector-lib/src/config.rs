//! Detector tuning parameters

use crate::error::{DetectorError, DetectorResult};
use serde::{Deserialize, Serialize};

/// Default EWMA smoothing factor
pub const DEFAULT_ALPHA: f64 = 0.4;

/// Default score history capacity (about 5 minutes at 1 Hz)
pub const DEFAULT_HISTORY_CAPACITY: usize = 300;

/// History length at or below which the static threshold is used
pub const DEFAULT_MIN_SAMPLES: usize = 50;

/// Low-tail percentile of recent scores used for drift tracking
pub const DEFAULT_DRIFT_PERCENTILE: f64 = 3.0;

/// Default debounce window and required vote count
pub const DEFAULT_DEBOUNCE_WINDOW: usize = 3;
pub const DEFAULT_DEBOUNCE_REQUIRED: usize = 2;

/// Configuration for a [`Detector`](crate::anomaly::Detector)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// EWMA smoothing factor, in (0, 1]
    pub alpha: f64,
    /// Maximum number of scores retained for drift tracking
    pub history_capacity: usize,
    /// Warm-up length before the adaptive threshold activates
    pub min_samples: usize,
    /// Percentile of the score history used as the drift estimate
    pub drift_percentile: f64,
    /// Number of recent raw decisions considered by the debouncer
    pub debounce_window: usize,
    /// Anomalous votes within the window needed to fire
    pub debounce_required: usize,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            alpha: DEFAULT_ALPHA,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            min_samples: DEFAULT_MIN_SAMPLES,
            drift_percentile: DEFAULT_DRIFT_PERCENTILE,
            debounce_window: DEFAULT_DEBOUNCE_WINDOW,
            debounce_required: DEFAULT_DEBOUNCE_REQUIRED,
        }
    }
}

impl DetectorConfig {
    /// Alternate debounce profile: 3 of the last 5 decisions
    pub fn strict_debounce() -> Self {
        Self {
            debounce_window: 5,
            debounce_required: 3,
            ..Self::default()
        }
    }

    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    pub fn with_debounce(mut self, window: usize, required: usize) -> Self {
        self.debounce_window = window;
        self.debounce_required = required;
        self
    }

    pub fn with_min_samples(mut self, min_samples: usize) -> Self {
        self.min_samples = min_samples;
        self
    }

    /// Reject parameter combinations the pipeline cannot honor
    pub fn validate(&self) -> DetectorResult<()> {
        if !(self.alpha > 0.0 && self.alpha <= 1.0) {
            return Err(DetectorError::InvalidConfig(format!(
                "alpha must be in (0, 1], got {}",
                self.alpha
            )));
        }
        if self.history_capacity == 0 {
            return Err(DetectorError::InvalidConfig(
                "history_capacity must be positive".to_string(),
            ));
        }
        if self.min_samples >= self.history_capacity {
            return Err(DetectorError::InvalidConfig(format!(
                "min_samples ({}) must be below history_capacity ({})",
                self.min_samples, self.history_capacity
            )));
        }
        if !(0.0..=100.0).contains(&self.drift_percentile) {
            return Err(DetectorError::InvalidConfig(format!(
                "drift_percentile must be in [0, 100], got {}",
                self.drift_percentile
            )));
        }
        if self.debounce_window == 0 || self.debounce_required == 0 {
            return Err(DetectorError::InvalidConfig(
                "debounce window and required count must be positive".to_string(),
            ));
        }
        if self.debounce_required > self.debounce_window {
            return Err(DetectorError::InvalidConfig(format!(
                "debounce_required ({}) exceeds debounce_window ({})",
                self.debounce_required, self.debounce_window
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = DetectorConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.alpha, 0.4);
        assert_eq!(config.history_capacity, 300);
        assert_eq!(config.min_samples, 50);
        assert_eq!(config.debounce_window, 3);
        assert_eq!(config.debounce_required, 2);
    }

    #[test]
    fn test_strict_debounce_preset() {
        let config = DetectorConfig::strict_debounce();
        assert!(config.validate().is_ok());
        assert_eq!((config.debounce_window, config.debounce_required), (5, 3));
    }

    #[test]
    fn test_rejects_bad_alpha() {
        assert!(DetectorConfig::default().with_alpha(0.0).validate().is_err());
        assert!(DetectorConfig::default().with_alpha(1.5).validate().is_err());
        assert!(DetectorConfig::default().with_alpha(f64::NAN).validate().is_err());
        assert!(DetectorConfig::default().with_alpha(1.0).validate().is_ok());
    }

    #[test]
    fn test_rejects_required_above_window() {
        let config = DetectorConfig::default().with_debounce(3, 4);
        assert!(matches!(
            config.validate(),
            Err(DetectorError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_rejects_unreachable_warmup() {
        let config = DetectorConfig::default().with_min_samples(300);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_deserialization_uses_defaults() {
        let config: DetectorConfig =
            serde_json::from_str(r#"{"debounce_window": 5, "debounce_required": 3}"#).unwrap();
        assert_eq!(config.debounce_window, 5);
        assert_eq!(config.alpha, DEFAULT_ALPHA);
        assert_eq!(config.min_samples, DEFAULT_MIN_SAMPLES);
    }
}
