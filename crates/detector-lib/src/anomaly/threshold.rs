//! Drift-aware decision threshold
//!
//! Keeps a bounded history of recent scores and derives a cutoff that never
//! exceeds the statically trained threshold. Once enough history exists, a
//! low-tail percentile of recent scores can pull the cutoff further down when
//! the system's baseline drifts toward scores the static value would flag.

use crate::error::{DetectorError, DetectorResult};
use std::collections::VecDeque;

/// Outcome of a threshold decision for one score
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdDecision {
    pub threshold_used: f64,
    pub is_anomaly: bool,
}

/// Adaptive threshold over a fixed-capacity score history
#[derive(Debug, Clone)]
pub struct ThresholdAdapter {
    static_threshold: f64,
    history: VecDeque<f64>,
    capacity: usize,
    min_samples: usize,
    percentile: f64,
}

impl ThresholdAdapter {
    /// Fails on a non-finite static threshold, a zero capacity, a warm-up
    /// the history could never exceed, or a percentile outside [0, 100]
    pub fn new(
        static_threshold: f64,
        capacity: usize,
        min_samples: usize,
        percentile: f64,
    ) -> DetectorResult<Self> {
        if !static_threshold.is_finite() {
            return Err(DetectorError::IncompatibleArtifacts(format!(
                "static threshold is not finite ({})",
                static_threshold
            )));
        }
        if capacity == 0 || min_samples >= capacity {
            return Err(DetectorError::InvalidConfig(format!(
                "score history needs 0 <= min_samples < capacity, got {} and {}",
                min_samples, capacity
            )));
        }
        if !(0.0..=100.0).contains(&percentile) {
            return Err(DetectorError::InvalidConfig(format!(
                "drift percentile must be within [0, 100], got {}",
                percentile
            )));
        }

        Ok(Self {
            static_threshold,
            history: VecDeque::with_capacity(capacity),
            capacity,
            min_samples,
            percentile,
        })
    }

    /// Append a score, evicting the oldest when at capacity
    pub fn record(&mut self, score: f64) {
        if self.history.len() == self.capacity {
            self.history.pop_front();
        }
        self.history.push_back(score);
    }

    /// Cutoff derived from the current history
    pub fn current_threshold(&self) -> f64 {
        if self.history.len() <= self.min_samples {
            return self.static_threshold;
        }
        let drift_low = percentile(self.history.iter().copied(), self.percentile);
        self.static_threshold.min(drift_low)
    }

    /// Record `score`, then decide it against a threshold that already
    /// includes it in the history.
    pub fn decide(&mut self, score: f64) -> ThresholdDecision {
        self.record(score);
        let threshold_used = self.current_threshold();
        ThresholdDecision {
            threshold_used,
            is_anomaly: score < threshold_used,
        }
    }

    /// True once the drift estimate participates in decisions
    pub fn is_adaptive(&self) -> bool {
        self.history.len() > self.min_samples
    }

    pub fn static_threshold(&self) -> f64 {
        self.static_threshold
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    pub fn reset(&mut self) {
        self.history.clear();
    }
}

/// Percentile with linear interpolation between closest ranks
///
/// Returns `NaN` for an empty input.
pub fn percentile(values: impl IntoIterator<Item = f64>, p: f64) -> f64 {
    let mut sorted: Vec<f64> = values.into_iter().collect();
    if sorted.is_empty() {
        return f64::NAN;
    }
    sorted.sort_by(|a, b| a.total_cmp(b));

    let rank = (p / 100.0).clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    if lower == upper {
        return sorted[lower];
    }
    let frac = rank - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * frac
}

#[cfg(test)]
mod tests {
    use super::*;

    const STATIC: f64 = -0.5;

    fn adapter() -> ThresholdAdapter {
        ThresholdAdapter::new(STATIC, 300, 50, 3.0).unwrap()
    }

    #[test]
    fn test_warmup_uses_static_threshold() {
        let mut t = adapter();
        for i in 0..50 {
            // wildly varying history must not matter during warm-up
            let d = t.decide(if i % 2 == 0 { -0.99 } else { -0.01 });
            assert_eq!(d.threshold_used, STATIC);
        }
        assert_eq!(t.len(), 50);
        assert!(!t.is_adaptive());
    }

    #[test]
    fn test_adaptive_after_min_samples() {
        let mut t = adapter();
        for _ in 0..50 {
            t.decide(-0.3);
        }
        t.decide(-0.3);
        assert!(t.is_adaptive());
    }

    #[test]
    fn test_saturation_constant_history() {
        for s in [-0.7, -0.5, -0.2] {
            let mut t = adapter();
            let mut last = None;
            for _ in 0..300 {
                last = Some(t.decide(s));
            }
            assert_eq!(percentile(t.history.iter().copied(), 3.0), s);
            assert_eq!(last.unwrap().threshold_used, STATIC.min(s));
        }
    }

    #[test]
    fn test_never_exceeds_static() {
        let mut t = adapter();
        let mut x: f64 = 0.123;
        for _ in 0..600 {
            // deterministic pseudo-random scores in [-1, 0)
            x = (x * 9301.0 + 49297.0) % 233280.0;
            let score = -(x / 233280.0);
            let d = t.decide(score);
            assert!(d.threshold_used <= STATIC);
        }
        assert_eq!(t.len(), 300);
    }

    #[test]
    fn test_low_drift_lowers_threshold() {
        let mut t = adapter();
        for _ in 0..100 {
            t.decide(-0.8);
        }
        let d = t.decide(-0.75);
        assert!((d.threshold_used - -0.8).abs() < 1e-12);
        assert!(!d.is_anomaly);
    }

    #[test]
    fn test_current_score_participates_in_own_threshold() {
        let mut t = ThresholdAdapter::new(0.0, 10, 1, 0.0).unwrap();
        t.decide(-0.2);
        // min over history including -0.9 itself: not strictly below
        let d = t.decide(-0.9);
        assert_eq!(d.threshold_used, -0.9);
        assert!(!d.is_anomaly);
    }

    #[test]
    fn test_capacity_eviction_and_reset() {
        let mut t = ThresholdAdapter::new(STATIC, 5, 2, 3.0).unwrap();
        for i in 0..8 {
            t.record(i as f64);
        }
        assert_eq!(t.len(), 5);
        assert_eq!(t.history.front().copied(), Some(3.0));
        t.reset();
        assert!(t.is_empty());
        assert_eq!(t.current_threshold(), STATIC);
    }

    #[test]
    fn test_percentile_interpolation() {
        let values = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(percentile(values, 0.0), 1.0);
        assert_eq!(percentile(values, 50.0), 3.0);
        assert_eq!(percentile(values, 100.0), 5.0);
        assert!((percentile(values, 10.0) - 1.4).abs() < 1e-12);
        assert!(percentile(Vec::<f64>::new(), 3.0).is_nan());
    }

    #[test]
    fn test_history_never_exceeds_capacity() {
        let mut t = ThresholdAdapter::new(STATIC, 1, 0, 3.0).unwrap();
        for i in 0..10 {
            let d = t.decide(-(i as f64) / 10.0);
            assert_eq!(t.len(), 1);
            // a single retained score is its own percentile
            assert_eq!(d.threshold_used, STATIC.min(-(i as f64) / 10.0));
        }
    }

    #[test]
    fn test_invalid_parameters_rejected() {
        assert!(matches!(
            ThresholdAdapter::new(STATIC, 0, 0, 3.0),
            Err(DetectorError::InvalidConfig(_))
        ));
        assert!(ThresholdAdapter::new(STATIC, 50, 50, 3.0).is_err());
        assert!(ThresholdAdapter::new(STATIC, 300, 50, 101.0).is_err());
        assert!(ThresholdAdapter::new(STATIC, 300, 50, f64::NAN).is_err());
        assert!(matches!(
            ThresholdAdapter::new(f64::INFINITY, 300, 50, 3.0),
            Err(DetectorError::IncompatibleArtifacts(_))
        ));
    }
}
