//! Exponential moving average smoothing
//!
//! One smoother per metric removes sample-to-sample jitter before scoring.
//! The first reading after construction or reset passes through unchanged.

/// EWMA filter over a single metric
#[derive(Debug, Clone)]
pub struct Smoother {
    alpha: f64,
    last: Option<f64>,
}

impl Smoother {
    /// Create a smoother with the given factor, in (0, 1]
    pub fn new(alpha: f64) -> Self {
        Self { alpha, last: None }
    }

    /// Feed a finite value and return the smoothed output
    pub fn update(&mut self, x: f64) -> f64 {
        let next = self.peek(x);
        self.last = Some(next);
        next
    }

    /// Output `update(x)` would produce, without committing it
    pub fn peek(&self, x: f64) -> f64 {
        match self.last {
            None => x,
            Some(last) => self.alpha * x + (1.0 - self.alpha) * last,
        }
    }

    /// Last smoothed value, `None` while cold
    pub fn last(&self) -> Option<f64> {
        self.last
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn reset(&mut self) {
        self.last = None;
    }
}
