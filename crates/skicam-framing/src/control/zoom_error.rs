//! Sizing error against the target subject height.

use skicam_models::NormalizedRect;

use crate::config::HeightReference;

/// Computes "height in crop" and the zoom error for a subject.
#[derive(Debug, Clone)]
pub struct ZoomErrorCalculator {
    target_height_ratio: f64,
    reference: HeightReference,
    min_height: f64,
}

impl ZoomErrorCalculator {
    pub fn new(target_height_ratio: f64, reference: HeightReference, min_height: f64) -> Self {
        Self {
            target_height_ratio,
            reference,
            min_height,
        }
    }

    /// Subject height as a fraction of the current crop.
    pub fn height_in_crop(&self, measured_height: f64, scale: f64) -> f64 {
        let h = measured_height.max(self.min_height);
        match self.reference {
            HeightReference::InCrop => h,
            HeightReference::FullSensor => h / scale.max(self.min_height),
        }
    }

    /// Map a measured center to full-sensor coordinates.
    ///
    /// In-crop measurements are relative to `crop` and are lifted back onto
    /// the sensor; full-sensor measurements pass through.
    pub fn sensor_center(&self, x: f64, y: f64, crop: &NormalizedRect) -> (f64, f64) {
        match self.reference {
            HeightReference::InCrop => (
                crop.left + x * crop.width(),
                crop.top + y * crop.height(),
            ),
            HeightReference::FullSensor => (x, y),
        }
    }

    /// `target - height_in_crop`; positive means the subject is too small.
    pub fn error(&self, height_in_crop: f64) -> f64 {
        self.target_height_ratio - height_in_crop
    }

    /// `|error| / target`
    pub fn relative_error(&self, error: f64) -> f64 {
        error.abs() / self.target_height_ratio
    }

    pub fn target_height_ratio(&self) -> f64 {
        self.target_height_ratio
    }

    pub fn reference(&self) -> HeightReference {
        self.reference
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_in_crop_uses_height_directly() {
        let calc = ZoomErrorCalculator::new(0.15, HeightReference::InCrop, 1e-4);
        assert_abs_diff_eq!(calc.height_in_crop(0.1, 0.5), 0.1);
        assert_abs_diff_eq!(calc.error(0.1), 0.05, epsilon = 1e-12);
        assert_abs_diff_eq!(calc.relative_error(calc.error(0.1)), 1.0 / 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_full_sensor_divides_by_scale() {
        let calc = ZoomErrorCalculator::new(0.15, HeightReference::FullSensor, 1e-4);
        assert_abs_diff_eq!(calc.height_in_crop(0.05, 0.5), 0.1, epsilon = 1e-12);
    }

    #[test]
    fn test_height_floor() {
        let calc = ZoomErrorCalculator::new(0.15, HeightReference::FullSensor, 1e-4);
        assert!(calc.height_in_crop(0.0, 0.0).is_finite());
    }

    #[test]
    fn test_sensor_center_lifts_crop_coordinates() {
        let crop = NormalizedRect::from_center_scale(0.6, 0.4, 0.5);
        let calc = ZoomErrorCalculator::new(0.15, HeightReference::InCrop, 1e-4);
        let (x, y) = calc.sensor_center(0.5, 0.5, &crop);
        assert_abs_diff_eq!(x, 0.6, epsilon = 1e-12);
        assert_abs_diff_eq!(y, 0.4, epsilon = 1e-12);

        let (x, _) = calc.sensor_center(0.0, 0.5, &crop);
        assert_abs_diff_eq!(x, 0.35, epsilon = 1e-12);

        let sensor = ZoomErrorCalculator::new(0.15, HeightReference::FullSensor, 1e-4);
        assert_eq!(sensor.sensor_center(0.2, 0.3, &crop), (0.2, 0.3));
    }
}
