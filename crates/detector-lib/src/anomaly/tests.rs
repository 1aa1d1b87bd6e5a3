//! Cross-component detector behavior
//!
//! These tests drive the full pipeline with a scorer whose output is a
//! direct function of the cpu feature, so score sequences can be scripted
//! exactly.

#[cfg(test)]
mod pipeline_tests {
    use crate::anomaly::Detector;
    use crate::config::DetectorConfig;
    use crate::error::DetectorError;
    use crate::models::{AnomalyEvent, DetectorPhase, FeatureVector, MetricSample};
    use crate::scoring::artifact_fixtures::bundle;
    use crate::scoring::Scorer;
    use std::sync::Arc;

    /// Score = -cpu / 100, so cpu 30 scores -0.3 and cpu 90 scores -0.9
    struct CpuScorer;

    impl Scorer for CpuScorer {
        fn score(&self, features: &FeatureVector) -> f64 {
            -features.cpu / 100.0
        }
    }

    struct NanScorer;

    impl Scorer for NanScorer {
        fn score(&self, _features: &FeatureVector) -> f64 {
            f64::NAN
        }
    }

    fn scripted_detector() -> Detector {
        // alpha 1 makes smoothing the identity so scores follow inputs exactly
        let config = DetectorConfig::default().with_alpha(1.0);
        Detector::with_scorer(Arc::new(CpuScorer), -0.5, config).unwrap()
    }

    fn sample(cpu: f64) -> MetricSample {
        MetricSample::new(cpu, 50.0, 60.0, 80.0)
    }

    fn varied_samples(n: usize) -> Vec<MetricSample> {
        (0..n)
            .map(|i| {
                let t = i as f64;
                MetricSample::new(
                    30.0 + (t * 0.7).sin() * 25.0,
                    50.0 + (t * 0.3).cos() * 10.0,
                    60.0 + (i % 7) as f64,
                    80.0 - t * 0.05,
                )
            })
            .collect()
    }

    fn run(detector: &mut Detector, samples: &[MetricSample]) -> Vec<AnomalyEvent> {
        samples
            .iter()
            .map(|s| detector.process(*s).unwrap())
            .collect()
    }

    #[test]
    fn test_isolated_spikes_are_debounced() {
        let mut detector = scripted_detector();

        for n in 1..=60u64 {
            let cpu = if n == 55 || n == 58 { 90.0 } else { 30.0 };
            let event = detector.process(sample(cpu)).unwrap();

            assert_eq!(event.sequence, n);
            assert_eq!(event.threshold_used, -0.5, "sample {}", n);
            assert_eq!(event.raw_anomaly, n == 55 || n == 58, "sample {}", n);
            assert!(!event.final_anomaly, "sample {} fired", n);
        }
    }

    #[test]
    fn test_adjacent_spikes_fire() {
        let mut detector = scripted_detector();
        for _ in 0..60 {
            detector.process(sample(30.0)).unwrap();
        }

        let first = detector.process(sample(90.0)).unwrap();
        assert!(first.raw_anomaly);
        assert!(!first.final_anomaly);

        let second = detector.process(sample(90.0)).unwrap();
        assert!(second.final_anomaly);

        // one quiet sample keeps 2 of 3 votes
        let quiet = detector.process(sample(30.0)).unwrap();
        assert!(!quiet.raw_anomaly);
        assert!(quiet.final_anomaly);

        let quiet_again = detector.process(sample(30.0)).unwrap();
        assert!(!quiet_again.final_anomaly);
    }

    #[test]
    fn test_phase_transitions() {
        let mut detector = scripted_detector();
        assert_eq!(detector.phase(), DetectorPhase::Cold);

        for n in 1..=50 {
            let event = detector.process(sample(30.0)).unwrap();
            assert_eq!(event.phase, DetectorPhase::Warming, "sample {}", n);
        }

        let event = detector.process(sample(30.0)).unwrap();
        assert_eq!(event.phase, DetectorPhase::Steady);

        for _ in 0..400 {
            detector.process(sample(30.0)).unwrap();
        }
        assert_eq!(detector.phase(), DetectorPhase::Steady);
        assert_eq!(detector.history_len(), 300);

        detector.reset();
        assert_eq!(detector.phase(), DetectorPhase::Cold);
    }

    #[test]
    fn test_baseline_drift_raises_bar() {
        let mut detector = scripted_detector();
        // baseline settles at -0.6, below the static -0.5
        for _ in 0..100 {
            let event = detector.process(sample(60.0)).unwrap();
            assert!(event.threshold_used <= -0.5);
        }
        let event = detector.process(sample(60.0)).unwrap();
        assert!((event.threshold_used - -0.6).abs() < 1e-12);
        assert!(!event.raw_anomaly);
    }

    #[test]
    fn test_reset_matches_fresh_detector() {
        let artifacts = Arc::new(bundle());
        let samples = varied_samples(120);

        let mut reused = Detector::new(artifacts.clone(), DetectorConfig::default()).unwrap();
        run(&mut reused, &varied_samples(77));
        reused.reset();
        let after_reset = run(&mut reused, &samples);

        let mut fresh = Detector::new(artifacts, DetectorConfig::default()).unwrap();
        let from_fresh = run(&mut fresh, &samples);

        assert_eq!(after_reset, from_fresh);
    }

    #[test]
    fn test_reset_clears_score_history() {
        let mut detector = scripted_detector();
        for _ in 0..80 {
            detector.process(sample(30.0)).unwrap();
        }
        assert_eq!(detector.history_len(), 80);

        detector.reset();
        assert_eq!(detector.history_len(), 0);
        assert_eq!(detector.samples_processed(), 0);

        // a single spike after reset cannot fire with an empty window
        let event = detector.process(sample(90.0)).unwrap();
        assert!(event.raw_anomaly);
        assert!(!event.final_anomaly);
        assert_eq!(event.phase, DetectorPhase::Warming);
    }

    #[test]
    fn test_non_finite_sample_leaves_state_untouched() {
        let artifacts = Arc::new(bundle());
        let samples = varied_samples(40);

        let mut clean = Detector::new(artifacts.clone(), DetectorConfig::default()).unwrap();
        let expected = run(&mut clean, &samples);

        let mut interrupted = Detector::new(artifacts, DetectorConfig::default()).unwrap();
        let mut observed = run(&mut interrupted, &samples[..20]);
        for bad in [
            MetricSample::new(f64::NAN, 1.0, 1.0, 1.0),
            MetricSample::new(1.0, 1.0, f64::INFINITY, 1.0),
            MetricSample::new(1.0, 1.0, 1.0, f64::NEG_INFINITY),
        ] {
            let err = interrupted.process(bad).unwrap_err();
            assert!(matches!(err, DetectorError::InvalidSample { .. }));
            assert!(!err.is_fatal());
        }
        observed.extend(run(&mut interrupted, &samples[20..]));

        assert_eq!(observed, expected);
    }

    #[test]
    fn test_non_finite_score_rejected() {
        let mut detector =
            Detector::with_scorer(Arc::new(NanScorer), -0.5, DetectorConfig::default()).unwrap();
        let err = detector.process(sample(30.0)).unwrap_err();
        assert!(matches!(err, DetectorError::InvalidScore(_)));
        assert_eq!(detector.phase(), DetectorPhase::Cold);
        assert_eq!(detector.history_len(), 0);
    }

    #[test]
    fn test_threshold_never_exceeds_static() {
        let artifacts = Arc::new(bundle());
        let static_threshold = artifacts.static_threshold();
        let mut detector = Detector::new(artifacts, DetectorConfig::default()).unwrap();

        for event in run(&mut detector, &varied_samples(400)) {
            assert!(event.threshold_used <= static_threshold);
        }
    }

    #[test]
    fn test_smoothing_applied_per_metric() {
        let config = DetectorConfig::default();
        let mut detector = Detector::with_scorer(Arc::new(CpuScorer), -0.5, config).unwrap();

        let first = detector.process_raw(10.0, 20.0, 30.0, 40.0).unwrap();
        assert_eq!(first.smoothed, FeatureVector::from_array([10.0, 20.0, 30.0, 40.0]));

        let second = detector.process_raw(20.0, 20.0, 40.0, 40.0).unwrap();
        assert!((second.smoothed.cpu - 14.0).abs() < 1e-12);
        assert_eq!(second.smoothed.memory, 20.0);
        assert!((second.smoothed.disk - 34.0).abs() < 1e-12);
        assert!((second.score - -0.14).abs() < 1e-12);
    }

    #[test]
    fn test_invalid_static_threshold_rejected() {
        let result =
            Detector::with_scorer(Arc::new(CpuScorer), f64::NAN, DetectorConfig::default());
        assert!(result.is_err());
    }
}
