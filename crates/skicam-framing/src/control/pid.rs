//! Proportional-derivative rate controller.

/// PD law: `kp * error + kd * (error - last_error) / dt`.
///
/// The derivative term is skipped on the first update after construction or
/// [`reset`](Self::reset), so re-engaging never produces a spike.
#[derive(Debug, Clone)]
pub struct PdController {
    kp: f64,
    kd: f64,
    last_error: Option<f64>,
}

impl PdController {
    pub fn new(kp: f64, kd: f64) -> Self {
        Self {
            kp,
            kd,
            last_error: None,
        }
    }

    /// Gains with `kd = 2 * sqrt(kp)`.
    pub fn critically_damped(kp: f64) -> Self {
        Self::new(kp, 2.0 * kp.max(0.0).sqrt())
    }

    /// Compute the control output. Returns 0 and keeps its memory when `dt <= 0`.
    pub fn update(&mut self, error: f64, dt: f64) -> f64 {
        if dt <= 0.0 || dt.is_nan() {
            return 0.0;
        }

        let derivative = match self.last_error {
            Some(last) => (error - last) / dt,
            None => 0.0,
        };
        self.last_error = Some(error);

        self.kp * error + self.kd * derivative
    }

    pub fn last_error(&self) -> Option<f64> {
        self.last_error
    }

    pub fn gains(&self) -> (f64, f64) {
        (self.kp, self.kd)
    }

    pub fn reset(&mut self) {
        self.last_error = None;
    }
}
