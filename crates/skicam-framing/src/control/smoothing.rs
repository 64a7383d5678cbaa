//! Exponential moving average filter.

/// Single-channel EMA: `out = alpha * input + (1 - alpha) * previous`.
///
/// The first sample after construction or [`reset`](Self::reset) passes
/// through unchanged.
#[derive(Debug, Clone)]
pub struct SmoothingFilter {
    alpha: f64,
    value: Option<f64>,
}

impl SmoothingFilter {
    pub fn new(alpha: f64) -> Self {
        Self {
            alpha: alpha.clamp(f64::EPSILON, 1.0),
            value: None,
        }
    }

    /// Feed a sample and return the filtered value.
    pub fn update(&mut self, input: f64) -> f64 {
        let next = match self.value {
            Some(prev) => self.alpha * input + (1.0 - self.alpha) * prev,
            None => input,
        };
        self.value = Some(next);
        next
    }

    /// Last output, if any sample has been seen.
    pub fn value(&self) -> Option<f64> {
        self.value
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn reset(&mut self) {
        self.value = None;
    }
}
