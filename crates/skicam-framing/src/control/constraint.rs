//! Crop scale and center limits.

use skicam_models::NormalizedRect;

/// Keeps the crop scale within range and the crop inside the sensor.
#[derive(Debug, Clone, Copy)]
pub struct ZoomConstraint {
    min_scale: f64,
    max_scale: f64,
}

impl ZoomConstraint {
    pub fn new(min_scale: f64, max_scale: f64) -> Self {
        Self { min_scale, max_scale }
    }

    pub fn clamp_scale(&self, scale: f64) -> f64 {
        if scale.is_nan() {
            return self.max_scale;
        }
        scale.clamp(self.min_scale, self.max_scale)
    }

    /// Clamp a center so a crop of `scale` stays within `[0, 1]^2`.
    pub fn clamp_center(&self, x: f64, y: f64, scale: f64) -> (f64, f64) {
        let half = (scale / 2.0).clamp(0.0, 0.5);
        (x.clamp(half, 1.0 - half), y.clamp(half, 1.0 - half))
    }

    /// Crop rect for a center and scale.
    pub fn crop_rect(&self, center: (f64, f64), scale: f64) -> NormalizedRect {
        NormalizedRect::from_center_scale(center.0, center.1, scale)
    }

    pub fn min_scale(&self) -> f64 {
        self.min_scale
    }

    pub fn max_scale(&self) -> f64 {
        self.max_scale
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_scale() {
        let c = ZoomConstraint::new(0.05, 1.0);
        assert_eq!(c.clamp_scale(0.01), 0.05);
        assert_eq!(c.clamp_scale(1.3), 1.0);
        assert_eq!(c.clamp_scale(0.4), 0.4);
        assert_eq!(c.clamp_scale(f64::NAN), 1.0);
    }

    #[test]
    fn test_clamp_center_keeps_crop_inside() {
        let c = ZoomConstraint::new(0.05, 1.0);
        assert_eq!(c.clamp_center(0.0, 1.0, 0.2), (0.1, 0.9));
        assert_eq!(c.clamp_center(0.3, 0.3, 1.0), (0.5, 0.5));

        let crop = c.crop_rect(c.clamp_center(0.99, 0.01, 0.3), 0.3);
        assert!(crop.left >= 0.0 && crop.top >= 0.0);
        assert!(crop.right <= 1.0 + 1e-12 && crop.bottom <= 1.0 + 1e-12);
    }
}
