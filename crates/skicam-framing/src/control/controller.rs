//! Automatic zoom/pan controller.
//!
//! Each tick runs, in order: smoothing, error calculation, hysteresis
//! gating, PD rate control, scale update, clamping, and panning. The stages
//! live in sibling modules and are composed here.
//!
//! # Usage
//! ```rust
//! use skicam_framing::control::AutoZoomController;
//! use skicam_framing::config::ControllerConfig;
//! use skicam_models::NormalizedRect;
//!
//! let mut controller = AutoZoomController::new(ControllerConfig::default());
//! let subject = NormalizedRect::from_center(0.5, 0.5, 0.02, 0.05);
//! let crop = controller.update(&subject, 1.0 / 30.0);
//! assert!(crop.width() < 1.0);
//! ```

use tracing::{debug, trace};

use skicam_models::NormalizedRect;

use super::constraint::ZoomConstraint;
use super::hysteresis::HysteresisGate;
use super::pan::PanController;
use super::pid::PdController;
use super::scaling::ScaleUpdater;
use super::smoothing::SmoothingFilter;
use super::zoom_error::ZoomErrorCalculator;
use crate::config::ControllerConfig;

/// Smallest crop width used when deriving a zoom factor.
const MIN_CROP_WIDTH: f64 = 0.01;

/// Zoom factor for a crop: `1 / width`.
pub fn zoom_factor_for(crop: &NormalizedRect) -> f64 {
    1.0 / crop.width().max(MIN_CROP_WIDTH)
}

/// Closed-loop controller producing a crop rect per tick.
#[derive(Debug, Clone)]
pub struct AutoZoomController {
    config: ControllerConfig,
    height_filter: SmoothingFilter,
    error: ZoomErrorCalculator,
    gate: HysteresisGate,
    rate: PdController,
    scaler: ScaleUpdater,
    constraint: ZoomConstraint,
    pan: PanController,
    /// Crop scale, 1.0 = full sensor
    scale: f64,
    /// Crop center on the sensor
    center: (f64, f64),
    last_scale_change: f64,
    last_height_in_crop: Option<f64>,
}

impl AutoZoomController {
    pub fn new(config: ControllerConfig) -> Self {
        let constraint = ZoomConstraint::new(config.min_scale, config.max_scale);
        Self {
            height_filter: SmoothingFilter::new(config.height_alpha),
            error: ZoomErrorCalculator::new(
                config.target_height_ratio,
                config.height_reference,
                config.min_subject_height,
            ),
            gate: HysteresisGate::new(config.trigger_threshold, config.stop_threshold),
            rate: PdController::new(config.kp, config.kd),
            scaler: ScaleUpdater::new(config.scale_update, config.max_zoom_rate),
            pan: PanController::new(config.pan, config.center_alpha, config.intent_alpha),
            scale: constraint.max_scale(),
            center: (0.5, 0.5),
            last_scale_change: 0.0,
            last_height_in_crop: None,
            constraint,
            config,
        }
    }

    /// Run one control tick for the selected subject.
    ///
    /// `subject` is expressed in the frame the detector observes (see
    /// [`HeightReference`](crate::config::HeightReference)). A `dt` that is
    /// not positive leaves every piece of state untouched and returns the
    /// previous crop.
    pub fn update(&mut self, subject: &NormalizedRect, dt: f64) -> NormalizedRect {
        if dt <= 0.0 || dt.is_nan() {
            return self.crop();
        }
        let crop_before = self.crop();

        let height = self.height_filter.update(subject.height());
        let sensor_center = self
            .error
            .sensor_center(subject.center_x(), subject.center_y(), &crop_before);

        let height_in_crop = self.error.height_in_crop(height, self.scale);
        let error = self.error.error(height_in_crop);
        let relative_error = self.error.relative_error(error);
        self.last_height_in_crop = Some(height_in_crop);

        let was_open = self.gate.is_open();
        let change = if self.gate.update(relative_error) {
            let velocity = self.rate.update(error, dt);
            self.scaler.scale_change(velocity, self.scale, dt)
        } else {
            self.rate.reset();
            0.0
        };
        if was_open != self.gate.is_open() {
            debug!(
                zooming = self.gate.is_open(),
                relative_error,
                height_in_crop,
                "Zoom gate toggled"
            );
        }

        let previous = self.scale;
        self.scale = self.constraint.clamp_scale(self.scale + change);
        self.last_scale_change = self.scale - previous;

        let desired = self.pan.update(sensor_center, self.center, dt);
        self.center = self.constraint.clamp_center(desired.0, desired.1, self.scale);

        trace!(
            scale = self.scale,
            center_x = self.center.0,
            center_y = self.center.1,
            error,
            "Controller tick"
        );
        self.crop()
    }

    /// Keep the current crop for a tick without a subject.
    ///
    /// Clears the derivative memory so the next update does not react to
    /// the gap.
    pub fn hold(&mut self) -> NormalizedRect {
        self.rate.reset();
        self.last_scale_change = 0.0;
        self.crop()
    }

    /// Zoom out toward the full frame at `rate` doublings per second.
    pub fn decay_toward_full_frame(&mut self, dt: f64, rate: f64) -> NormalizedRect {
        if dt <= 0.0 || dt.is_nan() {
            return self.crop();
        }
        self.gate.reset();
        self.rate.reset();

        let previous = self.scale;
        self.scale = self.constraint.clamp_scale(self.scale * (rate * dt).exp2());
        self.last_scale_change = self.scale - previous;
        self.center = self.constraint.clamp_center(self.center.0, self.center.1, self.scale);
        self.crop()
    }

    /// Resynchronize with the actual device zoom after manual control.
    ///
    /// Sets `scale = 1 / max(1, factor)`, optionally moves the center, and
    /// clears all filter, gate and derivative memory so stale pre-override
    /// samples do not drag the new estimate.
    pub fn sync_state(&mut self, actual_zoom_factor: f64, center: Option<(f64, f64)>) {
        let factor = if actual_zoom_factor.is_nan() { 1.0 } else { actual_zoom_factor.max(1.0) };
        self.scale = self.constraint.clamp_scale(1.0 / factor);
        let (cx, cy) = center.unwrap_or(self.center);
        self.center = self.constraint.clamp_center(cx, cy, self.scale);

        self.height_filter.reset();
        self.pan.reset();
        self.gate.reset();
        self.rate.reset();
        self.last_scale_change = 0.0;
        self.last_height_in_crop = None;

        debug!(
            zoom_factor = factor,
            scale = self.scale,
            "Controller resynchronized"
        );
    }

    /// Return to full frame, centered, with all memory cleared.
    pub fn reset(&mut self) {
        self.sync_state(1.0, Some((0.5, 0.5)));
        self.scale = self.constraint.max_scale();
        self.center = self.constraint.clamp_center(0.5, 0.5, self.scale);
    }

    /// Current crop rect on the sensor.
    pub fn crop(&self) -> NormalizedRect {
        self.constraint.crop_rect(self.center, self.scale)
    }

    /// Crop the device shows at `zoom_factor` around the current center,
    /// without touching controller state.
    pub fn crop_at_factor(&self, zoom_factor: f64) -> NormalizedRect {
        let factor = if zoom_factor.is_nan() { 1.0 } else { zoom_factor.max(1.0) };
        let scale = self.constraint.clamp_scale(1.0 / factor);
        let center = self.constraint.clamp_center(self.center.0, self.center.1, scale);
        self.constraint.crop_rect(center, scale)
    }

    pub fn zoom_scale(&self) -> f64 {
        self.scale
    }

    pub fn zoom_factor(&self) -> f64 {
        zoom_factor_for(&self.crop())
    }

    pub fn center(&self) -> (f64, f64) {
        self.center
    }

    /// Whether the hysteresis gate is open.
    pub fn is_zooming(&self) -> bool {
        self.gate.is_open()
    }

    /// Scale delta applied by the last tick.
    pub fn last_scale_change(&self) -> f64 {
        self.last_scale_change
    }

    /// Smoothed subject height in crop from the last tick.
    pub fn last_height_in_crop(&self) -> Option<f64> {
        self.last_height_in_crop
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{HeightReference, PanMode};
    use approx::assert_abs_diff_eq;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    const DT: f64 = 1.0 / 60.0;

    fn subject(cx: f64, cy: f64, h: f64) -> NormalizedRect {
        NormalizedRect::from_center(cx, cy, h * 0.4, h)
    }

    #[test]
    fn test_starts_at_full_frame() {
        let controller = AutoZoomController::new(ControllerConfig::default());
        assert_eq!(controller.crop(), NormalizedRect::from_center_scale(0.5, 0.5, 1.0));
        assert_abs_diff_eq!(controller.zoom_factor(), 1.0);
        assert!(!controller.is_zooming());
    }

    #[test]
    fn test_non_positive_dt_is_noop() {
        let mut controller = AutoZoomController::new(ControllerConfig::default());
        controller.update(&subject(0.5, 0.5, 0.05), DT);
        let before = controller.clone();

        let crop = controller.update(&subject(0.1, 0.1, 0.01), 0.0);
        assert_eq!(crop, before.crop());
        controller.update(&subject(0.1, 0.1, 0.01), -1.0);
        assert_eq!(controller.zoom_scale(), before.zoom_scale());
        assert_eq!(controller.center(), before.center());
        assert_eq!(controller.last_height_in_crop(), before.last_height_in_crop());
    }

    #[test]
    fn test_small_subject_zooms_in() {
        let mut controller = AutoZoomController::new(ControllerConfig::default());
        controller.update(&subject(0.5, 0.5, 0.05), DT);
        assert!(controller.is_zooming());
        assert!(controller.last_scale_change() < 0.0);
        assert!(controller.zoom_scale() < 1.0);
    }

    #[test]
    fn test_large_subject_stays_wide() {
        let mut controller = AutoZoomController::new(ControllerConfig::default());
        for _ in 0..60 {
            controller.update(&subject(0.5, 0.5, 0.6), DT);
        }
        // Too big but already at max scale
        assert_eq!(controller.zoom_scale(), 1.0);
    }

    #[test]
    fn test_within_deadband_does_nothing() {
        let mut controller = AutoZoomController::new(ControllerConfig::default());
        for _ in 0..30 {
            controller.update(&subject(0.5, 0.5, 0.14), DT);
        }
        assert!(!controller.is_zooming());
        assert_eq!(controller.zoom_scale(), 1.0);
    }

    #[test]
    fn test_scale_always_clamped() {
        let mut rng = StdRng::seed_from_u64(42);
        let config = ControllerConfig {
            kp: 50.0,
            max_zoom_rate: 50.0,
            ..ControllerConfig::default()
        };
        let mut controller = AutoZoomController::new(config);
        for _ in 0..5000 {
            let h = rng.random_range(0.0..1.5);
            let s = subject(rng.random_range(-0.2..1.2), rng.random_range(-0.2..1.2), h);
            let dt = rng.random_range(-0.01..0.2);
            let crop = controller.update(&s, dt);
            let scale = controller.zoom_scale();
            assert!((0.05..=1.0).contains(&scale), "scale {scale} out of range");
            assert!(crop.left >= -1e-12 && crop.right <= 1.0 + 1e-12);
            assert!(crop.top >= -1e-12 && crop.bottom <= 1.0 + 1e-12);
        }
    }

    #[test]
    fn test_distant_subject_zooms_in_without_overshoot() {
        // Camera sees the cropped buffer; the skier is 5% of the sensor tall
        let mut controller = AutoZoomController::new(ControllerConfig::default());
        let sensor_height = 0.05;
        let mut previous = controller.zoom_scale();
        let mut peak: f64 = 0.0;

        for _ in 0..1800 {
            let scale = controller.zoom_scale();
            let observed = subject(0.5, 0.5, sensor_height / scale);
            controller.update(&observed, DT);

            let scale = controller.zoom_scale();
            assert!(scale <= previous + 1e-12, "scale grew from {previous} to {scale}");
            previous = scale;
            peak = peak.max(sensor_height / scale);
        }

        let in_crop = sensor_height / controller.zoom_scale();
        assert!((0.135..=0.165).contains(&in_crop), "settled at {in_crop}");
        assert!(peak <= 0.15 * 1.1, "overshoot to {peak}");
        assert!(!controller.is_zooming());
    }

    #[test]
    fn test_sync_state_sets_scale() {
        let mut controller = AutoZoomController::new(ControllerConfig::default());
        controller.sync_state(4.0, None);
        assert_abs_diff_eq!(controller.zoom_scale(), 0.25, epsilon = 1e-12);

        controller.sync_state(0.5, None);
        assert_abs_diff_eq!(controller.zoom_scale(), 1.0, epsilon = 1e-12);

        controller.sync_state(100.0, None);
        assert_abs_diff_eq!(controller.zoom_scale(), 0.05, epsilon = 1e-12);
    }

    #[test]
    fn test_sync_then_on_target_is_steady() {
        let mut controller = AutoZoomController::new(ControllerConfig::default());
        for _ in 0..20 {
            controller.update(&subject(0.5, 0.5, 0.02), DT);
        }
        controller.sync_state(4.0, Some((0.5, 0.5)));
        controller.update(&subject(0.5, 0.5, 0.15), DT);
        assert!(controller.last_scale_change().abs() < 1e-9);
        assert_abs_diff_eq!(controller.zoom_scale(), 0.25, epsilon = 1e-9);
    }

    #[test]
    fn test_sync_clears_smoothing_memory() {
        let mut controller = AutoZoomController::new(ControllerConfig::default());
        for _ in 0..20 {
            controller.update(&subject(0.5, 0.5, 0.02), DT);
        }
        controller.sync_state(2.0, None);
        controller.update(&subject(0.5, 0.5, 0.3), DT);
        assert_abs_diff_eq!(controller.last_height_in_crop().unwrap_or(0.0), 0.3, epsilon = 1e-12);
    }

    #[test]
    fn test_full_sensor_reference_divides_height() {
        let config = ControllerConfig {
            height_reference: HeightReference::FullSensor,
            ..ControllerConfig::default()
        };
        let mut controller = AutoZoomController::new(config);
        controller.sync_state(2.0, None);
        controller.update(&subject(0.5, 0.5, 0.05), DT);
        assert_abs_diff_eq!(controller.last_height_in_crop().unwrap_or(0.0), 0.1, epsilon = 1e-12);
    }

    #[test]
    fn test_pan_follows_subject_within_bounds() {
        let mut controller = AutoZoomController::new(ControllerConfig::default());
        controller.sync_state(2.0, None);
        for _ in 0..120 {
            // Subject sits on the right edge of the cropped view
            controller.update(&subject(0.95, 0.5, 0.15), DT);
        }
        let crop = controller.crop();
        assert!(crop.right <= 1.0 + 1e-12);
        assert_abs_diff_eq!(controller.center().0, 0.75, epsilon = 1e-9);
    }

    #[test]
    fn test_pd_pan_mode_moves_gradually() {
        let config = ControllerConfig {
            pan: PanMode::pd(),
            height_reference: HeightReference::FullSensor,
            ..ControllerConfig::default()
        };
        let mut controller = AutoZoomController::new(config);
        controller.sync_state(4.0, None);
        controller.update(&subject(0.7, 0.5, 0.0375), DT);
        let (x, _) = controller.center();
        assert!(x > 0.5 && x < 0.7);
    }

    #[test]
    fn test_hold_keeps_crop() {
        let mut controller = AutoZoomController::new(ControllerConfig::default());
        for _ in 0..10 {
            controller.update(&subject(0.4, 0.5, 0.05), DT);
        }
        let crop = controller.crop();
        assert_eq!(controller.hold(), crop);
        assert_eq!(controller.last_scale_change(), 0.0);
    }

    #[test]
    fn test_decay_toward_full_frame() {
        let mut controller = AutoZoomController::new(ControllerConfig::default());
        controller.sync_state(4.0, Some((0.2, 0.2)));
        controller.decay_toward_full_frame(1.0, 1.0);
        assert_abs_diff_eq!(controller.zoom_scale(), 0.5, epsilon = 1e-12);
        controller.decay_toward_full_frame(5.0, 1.0);
        assert_eq!(controller.zoom_scale(), 1.0);
        assert_eq!(controller.center(), (0.5, 0.5));
    }
}
