//! Majority-vote debouncing of raw anomaly decisions

use crate::error::{DetectorError, DetectorResult};
use std::collections::VecDeque;

/// Sliding window of the most recent raw decisions
///
/// The final signal fires when at least `required` of the last `window`
/// decisions were anomalous.
#[derive(Debug, Clone)]
pub struct Debouncer {
    history: VecDeque<bool>,
    window: usize,
    required: usize,
}

impl Debouncer {
    /// Requires `1 <= required <= window`
    pub fn new(window: usize, required: usize) -> DetectorResult<Self> {
        if window == 0 || required == 0 || required > window {
            return Err(DetectorError::InvalidConfig(format!(
                "debounce needs 1 <= required <= window, got {} of {}",
                required, window
            )));
        }
        Ok(Self {
            history: VecDeque::with_capacity(window),
            window,
            required,
        })
    }

    /// Record a raw decision and return the debounced one
    pub fn add(&mut self, is_anomaly: bool) -> bool {
        if self.history.len() == self.window {
            self.history.pop_front();
        }
        self.history.push_back(is_anomaly);
        self.votes() >= self.required
    }

    /// Number of anomalous decisions currently in the window
    pub fn votes(&self) -> usize {
        self.history.iter().filter(|&&v| v).count()
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

impl Default for Debouncer {
    fn default() -> Self {
        let window = crate::config::DEFAULT_DEBOUNCE_WINDOW;
        Self {
            history: VecDeque::with_capacity(window),
            window,
            required: crate::config::DEFAULT_DEBOUNCE_REQUIRED,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(d: &mut Debouncer, seq: &[bool]) -> bool {
        seq.iter().fold(false, |_, &v| d.add(v))
    }

    #[test]
    fn test_two_of_three_fires() {
        let mut d = Debouncer::new(3, 2).unwrap();
        assert!(feed(&mut d, &[true, false, true]));
    }

    #[test]
    fn test_one_of_three_holds() {
        let mut d = Debouncer::new(3, 2).unwrap();
        assert!(!feed(&mut d, &[false, false, true]));
    }

    #[test]
    fn test_oldest_vote_evicted() {
        let mut d = Debouncer::new(3, 2).unwrap();
        assert!(feed(&mut d, &[true, true]));
        assert!(d.add(false));
        // first `true` falls out of the window
        assert!(!d.add(false));
        assert_eq!(d.len(), 3);
    }

    #[test]
    fn test_reset_clears_window() {
        let mut d = Debouncer::new(3, 2).unwrap();
        feed(&mut d, &[true, true, true]);
        d.reset();
        assert!(d.is_empty());
        assert!(!d.add(true));
    }

    #[test]
    fn test_strict_profile() {
        let mut d = Debouncer::new(5, 3).unwrap();
        assert!(!feed(&mut d, &[true, false, true, false]));
        assert!(d.add(true));
        assert!(!feed(&mut d, &[false, false]));
    }

    #[test]
    fn test_window_never_exceeds_capacity() {
        let mut d = Debouncer::new(1, 1).unwrap();
        for _ in 0..10 {
            assert!(d.add(true));
        }
        assert_eq!(d.len(), 1);
        assert!(!d.add(false));
    }

    #[test]
    fn test_invalid_window_rejected() {
        for (window, required) in [(0, 0), (0, 1), (3, 0), (2, 3)] {
            let err = Debouncer::new(window, required).unwrap_err();
            assert!(matches!(err, DetectorError::InvalidConfig(_)));
        }
    }

    #[test]
    fn test_default_profile() {
        let mut d = Debouncer::default();
        assert!(!d.add(true));
        assert!(d.add(true));
    }
}
