//! Per-sample anomaly pipeline
//!
//! Wires one smoother per metric, the scorer, the adaptive threshold and the
//! debouncer into a single synchronous `process` call. A detector is not
//! internally synchronized; callers sharing one across threads must wrap it
//! in a mutex.

use super::debouncer::Debouncer;
use super::smoother::Smoother;
use super::threshold::ThresholdAdapter;
use crate::config::DetectorConfig;
use crate::error::{DetectorError, DetectorResult};
use crate::models::{AnomalyEvent, DetectorPhase, FeatureVector, MetricSample, FEATURE_COUNT};
use crate::scoring::{ArtifactBundle, IsolationForestScorer, Scorer};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Streaming detector turning raw samples into a debounced anomaly signal
pub struct Detector {
    scorer: Arc<dyn Scorer>,
    smoothers: [Smoother; FEATURE_COUNT],
    threshold: ThresholdAdapter,
    debouncer: Debouncer,
    config: DetectorConfig,
    sequence: u64,
}

impl Detector {
    /// Create a detector over a loaded artifact bundle
    pub fn new(artifacts: Arc<ArtifactBundle>, config: DetectorConfig) -> DetectorResult<Self> {
        let static_threshold = artifacts.static_threshold();
        let scorer = Arc::new(IsolationForestScorer::new(artifacts));
        Self::with_scorer(scorer, static_threshold, config)
    }

    /// Load the artifact bundle at `dir` and create a detector over it
    pub fn from_dir(dir: &Path, config: DetectorConfig) -> DetectorResult<Self> {
        config.validate()?;
        let artifacts = Arc::new(ArtifactBundle::load_dir(dir)?);
        Self::new(artifacts, config)
    }

    /// Create a detector around any pre-trained scorer
    pub fn with_scorer(
        scorer: Arc<dyn Scorer>,
        static_threshold: f64,
        config: DetectorConfig,
    ) -> DetectorResult<Self> {
        config.validate()?;
        let threshold = ThresholdAdapter::new(
            static_threshold,
            config.history_capacity,
            config.min_samples,
            config.drift_percentile,
        )?;
        let debouncer = Debouncer::new(config.debounce_window, config.debounce_required)?;

        Ok(Self {
            scorer,
            smoothers: std::array::from_fn(|_| Smoother::new(config.alpha)),
            threshold,
            debouncer,
            config,
            sequence: 0,
        })
    }

    /// Run one sample through the pipeline
    ///
    /// A rejected sample leaves every component untouched.
    pub fn process(&mut self, sample: MetricSample) -> DetectorResult<AnomalyEvent> {
        if let Some((metric, value)) = sample.first_non_finite() {
            return Err(DetectorError::InvalidSample { metric, value });
        }

        let raw = sample.values();
        let mut smoothed = [0.0; FEATURE_COUNT];
        for (i, smoother) in self.smoothers.iter().enumerate() {
            smoothed[i] = smoother.peek(raw[i]);
        }
        let features = FeatureVector::from_array(smoothed);

        let score = self.scorer.score(&features);
        if !score.is_finite() {
            return Err(DetectorError::InvalidScore(score));
        }

        let before = self.phase();
        for (smoother, x) in self.smoothers.iter_mut().zip(raw) {
            smoother.update(x);
        }
        let decision = self.threshold.decide(score);
        let final_anomaly = self.debouncer.add(decision.is_anomaly);
        self.sequence += 1;

        let phase = self.phase();
        if phase != before {
            info!(
                from = before.as_str(),
                to = phase.as_str(),
                history = self.threshold.len(),
                "Detector phase changed"
            );
        }

        debug!(
            sequence = self.sequence,
            cpu = features.cpu,
            memory = features.memory,
            disk = features.disk,
            battery = features.battery,
            score = score,
            threshold = decision.threshold_used,
            raw_anomaly = decision.is_anomaly,
            final_anomaly = final_anomaly,
            "Processed sample"
        );

        Ok(AnomalyEvent {
            sequence: self.sequence,
            score,
            threshold_used: decision.threshold_used,
            raw_anomaly: decision.is_anomaly,
            final_anomaly,
            smoothed: features,
            phase,
        })
    }

    /// Four-argument convenience form of [`process`](Self::process)
    pub fn process_raw(
        &mut self,
        cpu: f64,
        memory: f64,
        disk: f64,
        battery: f64,
    ) -> DetectorResult<AnomalyEvent> {
        self.process(MetricSample::new(cpu, memory, disk, battery))
    }

    /// Clear smoothers, score history and debounce window
    pub fn reset(&mut self) {
        for smoother in &mut self.smoothers {
            smoother.reset();
        }
        self.threshold.reset();
        self.debouncer.reset();
        self.sequence = 0;
        debug!("Detector reset");
    }

    pub fn phase(&self) -> DetectorPhase {
        if self.sequence == 0 {
            DetectorPhase::Cold
        } else if self.threshold.is_adaptive() {
            DetectorPhase::Steady
        } else {
            DetectorPhase::Warming
        }
    }

    /// Threshold the next decision would start from, before its own score
    pub fn current_threshold(&self) -> f64 {
        self.threshold.current_threshold()
    }

    pub fn static_threshold(&self) -> f64 {
        self.threshold.static_threshold()
    }

    pub fn history_len(&self) -> usize {
        self.threshold.len()
    }

    pub fn samples_processed(&self) -> u64 {
        self.sequence
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::artifact_fixtures::bundle;

    #[test]
    fn test_new_rejects_invalid_config() {
        let config = DetectorConfig::default().with_alpha(0.0);
        let err = Detector::new(Arc::new(bundle()), config).err().unwrap();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_from_missing_dir_fails() {
        let dir = tempfile::TempDir::new().unwrap();
        let err = Detector::from_dir(&dir.path().join("absent"), DetectorConfig::default())
            .err()
            .unwrap();
        assert!(matches!(err, DetectorError::ArtifactIo { .. }));
    }

    #[test]
    fn test_process_with_forest() {
        let mut detector = Detector::new(Arc::new(bundle()), DetectorConfig::default()).unwrap();
        assert_eq!(detector.phase(), DetectorPhase::Cold);

        let event = detector.process_raw(31.0, 52.0, 60.0, 79.0).unwrap();
        assert_eq!(event.sequence, 1);
        assert_eq!(event.smoothed.cpu, 31.0);
        assert_eq!(event.threshold_used, -0.55);
        assert_eq!(event.phase, DetectorPhase::Warming);
        assert!(!event.final_anomaly);
        assert!((-1.0..0.0).contains(&event.score));
    }

    #[test]
    fn test_shared_artifacts() {
        let artifacts = Arc::new(bundle());
        let mut a = Detector::new(artifacts.clone(), DetectorConfig::default()).unwrap();
        let mut b = Detector::new(artifacts, DetectorConfig::strict_debounce()).unwrap();

        let ea = a.process_raw(40.0, 50.0, 60.0, 70.0).unwrap();
        let eb = b.process_raw(40.0, 50.0, 60.0, 70.0).unwrap();
        assert_eq!(ea.score, eb.score);
        assert_eq!(b.config().debounce_window, 5);
    }
}
