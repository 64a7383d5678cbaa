//! Crop center following.

use super::pid::PdController;
use super::smoothing::SmoothingFilter;
use crate::config::PanMode;

/// Moves the crop center toward the subject.
///
/// Two pairs of filters run every tick: a responsive pair tracking the
/// subject center, and a slow "framing intent" pair tracking where the
/// operator is trying to keep the subject. Direct mode follows the former;
/// PD mode steers toward the latter at a bounded speed.
#[derive(Debug, Clone)]
pub struct PanController {
    mode: PanMode,
    center_x: SmoothingFilter,
    center_y: SmoothingFilter,
    intent_x: SmoothingFilter,
    intent_y: SmoothingFilter,
    pd_x: PdController,
    pd_y: PdController,
}

impl PanController {
    pub fn new(mode: PanMode, center_alpha: f64, intent_alpha: f64) -> Self {
        let (kp, kd) = match mode {
            PanMode::Pd { kp, kd, .. } => (kp, kd),
            PanMode::Direct => (0.0, 0.0),
        };
        Self {
            mode,
            center_x: SmoothingFilter::new(center_alpha),
            center_y: SmoothingFilter::new(center_alpha),
            intent_x: SmoothingFilter::new(intent_alpha),
            intent_y: SmoothingFilter::new(intent_alpha),
            pd_x: PdController::new(kp, kd),
            pd_y: PdController::new(kp, kd),
        }
    }

    /// Desired (unclamped) crop center for this tick.
    ///
    /// `subject` is the subject center in sensor coordinates.
    pub fn update(&mut self, subject: (f64, f64), current: (f64, f64), dt: f64) -> (f64, f64) {
        let smoothed = (self.center_x.update(subject.0), self.center_y.update(subject.1));
        let intent = (self.intent_x.update(subject.0), self.intent_y.update(subject.1));

        match self.mode {
            PanMode::Direct => smoothed,
            PanMode::Pd { max_speed, .. } => {
                let vx = self.pd_x.update(intent.0 - current.0, dt).clamp(-max_speed, max_speed);
                let vy = self.pd_y.update(intent.1 - current.1, dt).clamp(-max_speed, max_speed);
                (current.0 + vx * dt, current.1 + vy * dt)
            }
        }
    }

    /// Slow framing-intent estimate, if initialised.
    pub fn intent(&self) -> Option<(f64, f64)> {
        Some((self.intent_x.value()?, self.intent_y.value()?))
    }

    pub fn mode(&self) -> PanMode {
        self.mode
    }

    pub fn reset(&mut self) {
        self.center_x.reset();
        self.center_y.reset();
        self.intent_x.reset();
        self.intent_y.reset();
        self.pd_x.reset();
        self.pd_y.reset();
    }
}
