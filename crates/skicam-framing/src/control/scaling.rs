//! Conversion of zoom velocity into a crop scale change.

use crate::config::ScaleUpdateMode;

/// Turns a control velocity into a per-tick scale delta.
///
/// Positive velocity (subject too small) always shrinks the scale, i.e.
/// zooms in. The delta is limited to `max_rate * scale * dt` in either
/// direction.
#[derive(Debug, Clone)]
pub struct ScaleUpdater {
    mode: ScaleUpdateMode,
    max_rate: f64,
}

impl ScaleUpdater {
    pub fn new(mode: ScaleUpdateMode, max_rate: f64) -> Self {
        Self { mode, max_rate }
    }

    pub fn scale_change(&self, velocity: f64, scale: f64, dt: f64) -> f64 {
        let raw = match self.mode {
            ScaleUpdateMode::Logarithmic => -velocity * scale * dt,
            ScaleUpdateMode::Linear { gain } => -velocity * gain * dt,
        };
        let limit = (self.max_rate * scale * dt).abs();
        raw.clamp(-limit, limit)
    }

    pub fn mode(&self) -> ScaleUpdateMode {
        self.mode
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_sign_convention() {
        let updater = ScaleUpdater::new(ScaleUpdateMode::Logarithmic, 5.0);
        assert!(updater.scale_change(0.5, 1.0, 0.1) < 0.0);
        assert!(updater.scale_change(-0.5, 1.0, 0.1) > 0.0);
    }

    #[test]
    fn test_logarithmic_is_fraction_of_scale() {
        let updater = ScaleUpdater::new(ScaleUpdateMode::Logarithmic, 5.0);
        let wide = updater.scale_change(0.5, 1.0, 0.1) / 1.0;
        let tight = updater.scale_change(0.5, 0.1, 0.1) / 0.1;
        assert_abs_diff_eq!(wide, tight, epsilon = 1e-12);
    }

    #[test]
    fn test_linear_ignores_scale() {
        let updater = ScaleUpdater::new(ScaleUpdateMode::Linear { gain: 0.2 }, 100.0);
        assert_abs_diff_eq!(updater.scale_change(1.0, 0.5, 0.1), -0.02, epsilon = 1e-12);
        assert_abs_diff_eq!(updater.scale_change(1.0, 0.9, 0.1), -0.02, epsilon = 1e-12);
    }

    #[test]
    fn test_rate_limit() {
        let updater = ScaleUpdater::new(ScaleUpdateMode::Logarithmic, 2.0);
        // Unlimited would be -10 * 0.5 * 0.1 = -0.5
        assert_abs_diff_eq!(updater.scale_change(10.0, 0.5, 0.1), -0.1, epsilon = 1e-12);
    }
}
