//! Manual zoom override.
//!
//! Button and voice handlers drive the device directly while in manual
//! mode. Leaving manual mode resynchronizes the auto controller from the
//! device readout so auto control resumes without a visible jump.

use tracing::info;

use skicam_models::{labels, ZoomMode};

use crate::actuator::ZoomActuator;
use crate::config::ManualZoomConfig;
use crate::control::AutoZoomController;
use crate::error::FramingResult;
use crate::metrics;

/// Tracks the zoom mode and applies manual zoom requests.
#[derive(Debug, Clone)]
pub struct ZoomOverride {
    config: ManualZoomConfig,
    mode: ZoomMode,
    /// Label to show on the next analysed frame
    pending_label: Option<&'static str>,
}

impl ZoomOverride {
    pub fn new(config: ManualZoomConfig) -> Self {
        Self {
            config,
            mode: ZoomMode::Auto,
            pending_label: None,
        }
    }

    pub fn mode(&self) -> ZoomMode {
        self.mode
    }

    pub fn is_manual(&self) -> bool {
        self.mode.is_manual()
    }

    fn enter_manual(&mut self) {
        if self.mode != ZoomMode::Manual {
            info!(from = %self.mode, "Entering manual zoom");
            metrics::record_mode_transition(ZoomMode::Manual.as_str());
            self.mode = ZoomMode::Manual;
        }
        self.pending_label = None;
    }

    /// Zoom-in button pressed: ramp toward the manual ceiling.
    pub fn begin_zoom_in<A>(&mut self, actuator: &mut A) -> FramingResult<()>
    where
        A: ZoomActuator + ?Sized,
    {
        self.enter_manual();
        let target = actuator.max_zoom_factor().min(self.config.max_manual_factor);
        actuator.ramp_zoom(target, self.config.ramp_rate)
    }

    /// Zoom-out button pressed: ramp back to no zoom.
    pub fn begin_zoom_out<A>(&mut self, actuator: &mut A) -> FramingResult<()>
    where
        A: ZoomActuator + ?Sized,
    {
        self.enter_manual();
        actuator.ramp_zoom(1.0, self.config.ramp_rate)
    }

    /// Button released: stop the ramp and return the factor it stopped at.
    pub fn stop_zooming<A: ZoomActuator + ?Sized>(&mut self, actuator: &mut A) -> f64 {
        actuator.cancel_ramp();
        actuator.current_zoom_factor()
    }

    /// Apply a direct zoom factor and keep the controller in step with it.
    pub fn set_manual_zoom<A: ZoomActuator + ?Sized>(
        &mut self,
        factor: f64,
        actuator: &mut A,
        controller: &mut AutoZoomController,
    ) -> FramingResult<()> {
        self.enter_manual();
        actuator.cancel_ramp();
        let result = actuator.apply_zoom(factor);
        controller.sync_state(actuator.current_zoom_factor(), None);
        result
    }

    /// Return to auto mode, resynchronized to the actual device zoom.
    pub fn resume_auto<A: ZoomActuator + ?Sized>(
        &mut self,
        actuator: &mut A,
        controller: &mut AutoZoomController,
    ) {
        actuator.cancel_ramp();
        let actual = actuator.current_zoom_factor();
        controller.sync_state(actual, None);

        if self.mode != ZoomMode::Auto {
            info!(zoom_factor = actual, "Resuming auto zoom");
            metrics::record_mode_transition(ZoomMode::Auto.as_str());
            self.mode = ZoomMode::Auto;
            self.pending_label = Some(labels::AUTO_RESUMED);
        }
    }

    /// Consume the one-shot label set by a mode transition.
    pub fn take_pending_label(&mut self) -> Option<&'static str> {
        self.pending_label.take()
    }

    pub fn config(&self) -> &ManualZoomConfig {
        &self.config
    }
}

impl Default for ZoomOverride {
    fn default() -> Self {
        Self::new(ManualZoomConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actuator::SimulatedActuator;
    use crate::config::ControllerConfig;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_zoom_in_ramps_to_manual_ceiling() {
        let mut device = SimulatedActuator::new(20.0);
        let mut manual = ZoomOverride::default();

        manual.begin_zoom_in(&mut device).unwrap();
        assert!(manual.is_manual());
        device.advance(10.0);
        assert_eq!(device.current_zoom_factor(), 10.0);
    }

    #[test]
    fn test_zoom_in_respects_device_max() {
        let mut device = SimulatedActuator::new(4.0);
        let mut manual = ZoomOverride::default();
        manual.begin_zoom_in(&mut device).unwrap();
        device.advance(10.0);
        assert_eq!(device.current_zoom_factor(), 4.0);
    }

    #[test]
    fn test_stop_zooming_captures_factor() {
        let mut device = SimulatedActuator::new(20.0);
        let mut manual = ZoomOverride::default();
        manual.begin_zoom_in(&mut device).unwrap();
        device.advance(0.5);

        let stopped = manual.stop_zooming(&mut device);
        assert_abs_diff_eq!(stopped, 2.0, epsilon = 1e-12);
        device.advance(1.0);
        assert_abs_diff_eq!(device.current_zoom_factor(), 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_zoom_out_returns_to_unzoomed() {
        let mut device = SimulatedActuator::new(20.0);
        device.apply_zoom(8.0).unwrap();
        let mut manual = ZoomOverride::default();
        manual.begin_zoom_out(&mut device).unwrap();
        device.advance(5.0);
        assert_eq!(device.current_zoom_factor(), 1.0);
    }

    #[test]
    fn test_set_manual_zoom_syncs_controller() {
        let mut device = SimulatedActuator::new(20.0);
        let mut controller = AutoZoomController::new(ControllerConfig::default());
        let mut manual = ZoomOverride::default();

        manual.set_manual_zoom(4.0, &mut device, &mut controller).unwrap();
        assert_eq!(manual.mode(), ZoomMode::Manual);
        assert_abs_diff_eq!(controller.zoom_scale(), 0.25, epsilon = 1e-12);
    }

    #[test]
    fn test_resume_auto_resyncs_from_readout() {
        let mut device = SimulatedActuator::new(20.0);
        let mut controller = AutoZoomController::new(ControllerConfig::default());
        let mut manual = ZoomOverride::default();

        manual.begin_zoom_in(&mut device).unwrap();
        device.advance(1.0);
        manual.resume_auto(&mut device, &mut controller);

        assert_eq!(manual.mode(), ZoomMode::Auto);
        assert!(!device.is_ramping());
        assert_abs_diff_eq!(controller.zoom_scale(), 0.25, epsilon = 1e-12);
        assert_eq!(manual.take_pending_label(), Some(labels::AUTO_RESUMED));
        assert_eq!(manual.take_pending_label(), None);
    }

    #[test]
    fn test_resume_auto_when_already_auto_sets_no_label() {
        let mut device = SimulatedActuator::new(20.0);
        let mut controller = AutoZoomController::new(ControllerConfig::default());
        let mut manual = ZoomOverride::default();
        manual.resume_auto(&mut device, &mut controller);
        assert_eq!(manual.take_pending_label(), None);
    }
}
