//! Synchronous per-frame framing pipeline.
//!
//! One call to [`FramingPipeline::process`] runs detection ingestion,
//! tracking, subject selection and (in auto mode) the zoom controller, then
//! hands the resulting zoom factor to the actuator and returns a
//! [`FrameSnapshot`]. All state lives on the single thread that owns the
//! pipeline.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, warn};

use skicam_models::{labels, FrameSnapshot, NormalizedRect, RawDetection, TrackedBox, ZoomMode};

use crate::actuator::ZoomActuator;
use crate::config::{FramingConfig, NoSubjectPolicy};
use crate::control::{zoom_factor_for, AutoZoomController};
use crate::detection::DetectionAdapter;
use crate::error::FramingResult;
use crate::manual::ZoomOverride;
use crate::metrics;
use crate::selection::TargetSelector;
use crate::tracking::{ByteTracker, TrackerStats};

/// External control requests (buttons, voice, UI).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum ControlCommand {
    /// Zoom-in button held
    ZoomIn,
    /// Zoom-out button held
    ZoomOut,
    /// Zoom button released
    StopZoom,
    SetManualZoom { factor: f64 },
    ResumeAuto,
    /// Drop the subject lock and pick again
    ResetLock,
}

/// Owns every per-session component and runs them once per analysed frame.
pub struct FramingPipeline<A: ZoomActuator> {
    config: FramingConfig,
    adapter: DetectionAdapter,
    tracker: ByteTracker,
    selector: TargetSelector,
    controller: AutoZoomController,
    manual: ZoomOverride,
    actuator: A,
    last_timestamp: Option<f64>,
    frames_processed: u64,
    actuation_failures: u64,
}

impl<A: ZoomActuator> FramingPipeline<A> {
    /// Build a pipeline from a validated configuration.
    pub fn new(config: FramingConfig, actuator: A) -> FramingResult<Self> {
        config.validate()?;
        Ok(Self {
            adapter: DetectionAdapter::new(config.detector.clone()),
            tracker: ByteTracker::new(config.tracker.clone()),
            selector: TargetSelector::new(config.selector.clone()),
            controller: AutoZoomController::new(config.controller.clone()),
            manual: ZoomOverride::new(config.manual.clone()),
            actuator,
            last_timestamp: None,
            frames_processed: 0,
            actuation_failures: 0,
            config,
        })
    }

    /// Process one analysed frame, deriving `dt` from its timestamp.
    ///
    /// The first frame, and any frame whose timestamp does not advance,
    /// uses the nominal analysis interval.
    pub fn process(
        &mut self,
        sequence: u64,
        timestamp: f64,
        raw: &[RawDetection],
    ) -> FrameSnapshot {
        let dt = match self.last_timestamp {
            Some(previous) if timestamp > previous => timestamp - previous,
            _ => self.config.pipeline.analysis_interval(),
        };
        self.last_timestamp = Some(timestamp);
        self.process_with_dt(sequence, timestamp, raw, dt)
    }

    /// Process one analysed frame with an explicit time step.
    pub fn process_with_dt(
        &mut self,
        sequence: u64,
        timestamp: f64,
        raw: &[RawDetection],
        dt: f64,
    ) -> FrameSnapshot {
        let started = Instant::now();
        self.actuator.advance(dt);

        let detections = self.adapter.normalize(raw);
        let tracks = self.tracker.update(&detections);
        let subject = self.selector.select(&tracks);

        let (crop, zoom_factor, height_in_crop) = match self.manual.mode() {
            ZoomMode::Manual => {
                let factor = self.actuator.current_zoom_factor();
                (self.controller.crop_at_factor(factor), factor, None)
            }
            ZoomMode::Auto => {
                let crop = self.run_auto(subject.as_ref(), dt);
                let factor = zoom_factor_for(&crop);
                self.send_zoom(factor);
                let height = subject.and(self.controller.last_height_in_crop());
                (crop, factor, height)
            }
        };

        let debug_label = self.label_for(subject.as_ref());
        self.frames_processed += 1;

        let elapsed = started.elapsed().as_secs_f64();
        metrics::record_frame_analysed(elapsed);
        metrics::set_zoom_factor(zoom_factor);

        debug!(
            sequence,
            tracks = tracks.len(),
            subject = ?subject.map(|s| s.id),
            zoom_factor,
            mode = %self.manual.mode(),
            "Frame processed"
        );

        FrameSnapshot {
            sequence,
            timestamp,
            produced_at: Utc::now(),
            crop,
            detections,
            tracks,
            subject,
            subject_height_in_crop: height_in_crop,
            zoom_factor,
            mode: self.manual.mode(),
            is_zooming: self.controller.is_zooming(),
            locked_track_id: self.selector.locked_id(),
            debug_label: debug_label.to_string(),
            analysis_ms: elapsed * 1000.0,
        }
    }

    fn run_auto(&mut self, subject: Option<&TrackedBox>, dt: f64) -> NormalizedRect {
        match (subject, self.config.pipeline.no_subject) {
            (Some(subject), _) => self.controller.update(&subject.rect, dt),
            (None, NoSubjectPolicy::Hold) => self.controller.hold(),
            (None, NoSubjectPolicy::DecayToFullFrame { rate }) => {
                self.controller.decay_toward_full_frame(dt, rate)
            }
        }
    }

    /// Send a zoom factor to the device. Failures are logged and counted;
    /// controller state is kept so the next tick retries naturally.
    fn send_zoom(&mut self, factor: f64) {
        if let Err(e) = self.actuator.apply_zoom(factor) {
            self.note_actuation_failure(&e);
        }
    }

    fn note_actuation_failure(&mut self, error: &crate::error::FramingError) {
        warn!(error = %error, "Zoom actuation failed");
        metrics::record_actuation_failure();
        self.actuation_failures += 1;
    }

    fn label_for(&mut self, subject: Option<&TrackedBox>) -> &'static str {
        if let Some(label) = self.manual.take_pending_label() {
            return label;
        }
        match (subject.is_some(), self.manual.mode()) {
            (false, _) => labels::NONE,
            (true, ZoomMode::Auto) => labels::PERSON,
            (true, ZoomMode::Manual) => labels::PERSON_MANUAL,
        }
    }

    /// Apply an external control request.
    pub fn apply_command(&mut self, command: ControlCommand) -> FramingResult<()> {
        debug!(?command, "Applying control command");
        let result = match command {
            ControlCommand::ZoomIn => self.manual.begin_zoom_in(&mut self.actuator),
            ControlCommand::ZoomOut => self.manual.begin_zoom_out(&mut self.actuator),
            ControlCommand::StopZoom => {
                self.manual.stop_zooming(&mut self.actuator);
                Ok(())
            }
            ControlCommand::SetManualZoom { factor } => {
                self.manual
                    .set_manual_zoom(factor, &mut self.actuator, &mut self.controller)
            }
            ControlCommand::ResumeAuto => {
                self.manual.resume_auto(&mut self.actuator, &mut self.controller);
                Ok(())
            }
            ControlCommand::ResetLock => {
                self.selector.reset();
                Ok(())
            }
        };

        if let Err(e) = &result {
            self.note_actuation_failure(e);
        }
        result
    }

    /// Resynchronize the auto controller from the current device readout.
    ///
    /// Used when the readout lags the commands issued by [`Self::apply_command`],
    /// once the device has caught up. No-op in manual mode.
    pub fn resync_to_actuator(&mut self) {
        if self.manual.mode() == ZoomMode::Auto {
            self.controller
                .sync_state(self.actuator.current_zoom_factor(), None);
        }
    }

    /// The sensor region the output currently shows.
    pub fn current_crop(&self) -> NormalizedRect {
        match self.manual.mode() {
            ZoomMode::Manual => self
                .controller
                .crop_at_factor(self.actuator.current_zoom_factor()),
            ZoomMode::Auto => self.controller.crop(),
        }
    }

    /// Clear tracking, selection and control state and return to auto mode
    /// at full frame.
    pub fn reset(&mut self) {
        self.tracker.reset();
        self.selector.reset();
        self.controller.reset();
        self.manual = ZoomOverride::new(self.config.manual.clone());
        self.last_timestamp = None;
        self.send_zoom(1.0);
    }

    pub fn mode(&self) -> ZoomMode {
        self.manual.mode()
    }

    pub fn tracker_stats(&self) -> TrackerStats {
        self.tracker.stats()
    }

    pub fn controller(&self) -> &AutoZoomController {
        &self.controller
    }

    pub fn actuator(&self) -> &A {
        &self.actuator
    }

    pub fn actuator_mut(&mut self) -> &mut A {
        &mut self.actuator
    }

    pub fn config(&self) -> &FramingConfig {
        &self.config
    }

    pub fn frames_processed(&self) -> u64 {
        self.frames_processed
    }

    pub fn actuation_failures(&self) -> u64 {
        self.actuation_failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actuator::SimulatedActuator;
    use crate::config::HeightReference;

    fn person(cx: f64, cy: f64, h: f64) -> RawDetection {
        RawDetection::new(cx - h * 0.2, cy - h / 2.0, h * 0.4, h, "person", 0.9)
    }

    fn pipeline() -> FramingPipeline<SimulatedActuator> {
        FramingPipeline::new(FramingConfig::default(), SimulatedActuator::new(20.0)).unwrap()
    }

    #[test]
    fn test_rejects_invalid_config() {
        let mut config = FramingConfig::default();
        config.controller.stop_threshold = 0.5;
        assert!(FramingPipeline::new(config, SimulatedActuator::default()).is_err());
    }

    #[test]
    fn test_rejects_non_finite_config() {
        let mut config = FramingConfig::default();
        config.controller.max_scale = f64::NAN;
        assert!(FramingPipeline::new(config, SimulatedActuator::default()).is_err());
    }

    #[test]
    fn test_resync_to_actuator_follows_device() {
        let mut p = pipeline();
        p.actuator_mut().apply_zoom(4.0).unwrap();
        p.resync_to_actuator();
        assert!((p.controller().zoom_factor() - 4.0).abs() < 1e-9);

        p.apply_command(ControlCommand::SetManualZoom { factor: 2.0 }).unwrap();
        p.actuator_mut().apply_zoom(3.0).unwrap();
        p.resync_to_actuator();
        assert!((p.controller().zoom_factor() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_no_detections_holds_full_frame() {
        let mut p = pipeline();
        let snap = p.process(0, 0.0, &[]);
        assert_eq!(snap.crop, NormalizedRect::FULL_FRAME);
        assert_eq!(snap.debug_label, labels::NONE);
        assert!(snap.subject.is_none());
        assert_eq!(snap.zoom_factor, 1.0);
    }

    #[test]
    fn test_small_subject_starts_zoom() {
        let mut p = pipeline();
        let mut last = p.process(0, 0.0, &[person(0.5, 0.5, 0.05)]);
        for i in 1..10 {
            last = p.process(i, i as f64 * 0.1, &[person(0.5, 0.5, 0.05)]);
        }
        assert_eq!(last.debug_label, labels::PERSON);
        assert_eq!(last.locked_track_id, Some(1));
        assert!(last.is_zooming);
        assert!(last.zoom_factor > 1.0);
        assert_eq!(p.actuator().current_zoom_factor(), last.zoom_factor);
    }

    #[test]
    fn test_ignores_other_labels() {
        let mut p = pipeline();
        let mut car = person(0.5, 0.5, 0.05);
        car.label = "car".to_string();
        let snap = p.process(0, 0.0, &[car]);
        assert!(snap.detections.is_empty());
        assert!(snap.subject.is_none());
    }

    #[test]
    fn test_manual_mode_reports_device_factor() {
        let mut p = pipeline();
        p.apply_command(ControlCommand::SetManualZoom { factor: 3.0 }).unwrap();
        let snap = p.process(0, 0.0, &[person(0.5, 0.5, 0.1)]);
        assert_eq!(snap.mode, ZoomMode::Manual);
        assert_eq!(snap.zoom_factor, 3.0);
        assert_eq!(snap.debug_label, labels::PERSON_MANUAL);
        assert!((snap.crop.width() - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_resume_auto_label_shown_once() {
        let mut p = pipeline();
        p.apply_command(ControlCommand::SetManualZoom { factor: 2.0 }).unwrap();
        p.apply_command(ControlCommand::ResumeAuto).unwrap();

        let first = p.process(0, 0.0, &[]);
        assert_eq!(first.debug_label, labels::AUTO_RESUMED);
        assert_eq!(first.mode, ZoomMode::Auto);
        assert!((first.zoom_factor - 2.0).abs() < 1e-9);

        let second = p.process(1, 0.1, &[]);
        assert_eq!(second.debug_label, labels::NONE);
    }

    #[test]
    fn test_zoom_in_command_ramps_between_frames() {
        let mut p = pipeline();
        p.apply_command(ControlCommand::ZoomIn).unwrap();
        p.process_with_dt(0, 0.0, &[], 0.5);
        assert!((p.actuator().current_zoom_factor() - 2.0).abs() < 1e-9);

        p.apply_command(ControlCommand::StopZoom).unwrap();
        let snap = p.process_with_dt(1, 0.5, &[], 0.5);
        assert!((snap.zoom_factor - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_actuator_failure_keeps_controller_state() {
        let mut p = pipeline();
        for i in 0..5 {
            p.process(i, i as f64 * 0.1, &[person(0.5, 0.5, 0.05)]);
        }
        let scale_before = p.controller().zoom_scale();
        p.actuator_mut().fail_next(1);
        p.process(5, 0.5, &[person(0.5, 0.5, 0.05)]);

        assert_eq!(p.actuation_failures(), 1);
        assert!(p.controller().zoom_scale() <= scale_before);
    }

    #[test]
    fn test_reset_lock_reselects() {
        let mut p = pipeline();
        p.process(0, 0.0, &[person(0.5, 0.5, 0.1)]);
        p.apply_command(ControlCommand::ResetLock).unwrap();
        let snap = p.process(1, 0.1, &[person(0.5, 0.5, 0.1)]);
        assert_eq!(snap.locked_track_id, Some(1));
    }

    #[test]
    fn test_reset_returns_to_full_frame() {
        let mut config = FramingConfig::default();
        config.controller.height_reference = HeightReference::FullSensor;
        let mut p = FramingPipeline::new(config, SimulatedActuator::new(20.0)).unwrap();
        for i in 0..20 {
            p.process(i, i as f64 * 0.1, &[person(0.5, 0.5, 0.05)]);
        }
        assert!(p.current_crop().width() < 1.0);

        p.reset();
        assert_eq!(p.current_crop(), NormalizedRect::FULL_FRAME);
        assert_eq!(p.actuator().current_zoom_factor(), 1.0);
        assert_eq!(p.mode(), ZoomMode::Auto);
    }

    #[test]
    fn test_control_command_serde() {
        let json = r#"{"command":"set_manual_zoom","factor":2.5}"#;
        let command: ControlCommand = serde_json::from_str(json).unwrap();
        assert_eq!(command, ControlCommand::SetManualZoom { factor: 2.5 });
    }
}
