//! Configuration for the framing pipeline.
//!
//! All tunables are injected at construction; nothing here is hot-reloaded
//! once a pipeline or session is running.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use skicam_models::BoxOrigin;

use crate::error::{FramingError, FramingResult};

/// Top-level configuration, aggregating per-stage settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FramingConfig {
    pub detector: DetectorConfig,
    pub tracker: TrackerConfig,
    pub selector: SelectorConfig,
    pub controller: ControllerConfig,
    pub manual: ManualZoomConfig,
    pub pipeline: PipelineConfig,
}

/// Detector output ingestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Class label treated as the subject (default: "person")
    pub subject_label: String,
    /// Detections at or below this confidence are discarded (default: 0.1)
    pub min_confidence: f64,
    /// Vertical origin of the detector's boxes (default: top_left)
    pub origin: BoxOrigin,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            subject_label: "person".to_string(),
            min_confidence: 0.1,
            origin: BoxOrigin::TopLeft,
        }
    }
}

/// Motion filter noise model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KalmanConfig {
    /// Position noise, relative to box height (default: 1/20)
    pub std_weight_position: f64,
    /// Velocity noise, relative to box height (default: 1/160)
    pub std_weight_velocity: f64,
    /// Aspect ratio measurement noise (default: 0.1)
    pub std_aspect_measurement: f64,
    /// Aspect ratio process noise (default: 0.01)
    pub std_aspect_process: f64,
    /// Aspect ratio velocity process noise (default: 1e-5)
    pub std_aspect_velocity: f64,
}

impl Default for KalmanConfig {
    fn default() -> Self {
        Self {
            std_weight_position: 1.0 / 20.0,
            std_weight_velocity: 1.0 / 160.0,
            std_aspect_measurement: 1e-1,
            std_aspect_process: 1e-2,
            std_aspect_velocity: 1e-5,
        }
    }
}

/// Multi-object tracker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Detections at or above this score are high-tier (default: 0.5)
    pub high_confidence: f64,
    /// Detections above this score (and below high) are low-tier (default: 0.1)
    pub low_confidence: f64,
    /// Minimum IoU for high-tier association (default: 0.2)
    pub match_iou: f64,
    /// Minimum IoU for low-tier association (default: 0.5)
    pub low_match_iou: f64,
    /// Tracks are removed once missed frames exceed this (default: 30)
    pub max_missed_frames: u32,
    /// Matches needed before a new track is reported (default: 1)
    pub min_hits_to_activate: u32,
    pub kalman: KalmanConfig,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            high_confidence: 0.5,
            low_confidence: 0.1,
            match_iou: 0.2,
            low_match_iou: 0.5,
            max_missed_frames: 30,
            min_hits_to_activate: 1,
            kalman: KalmanConfig::default(),
        }
    }
}

/// Target selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
    /// Cold-start reference point X (default: 0.5)
    pub reference_x: f64,
    /// Cold-start reference point Y (default: 0.5)
    pub reference_y: f64,
    /// Re-acquire near the last subject instead of the reference point (default: true)
    pub sticky_reacquire: bool,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            reference_x: 0.5,
            reference_y: 0.5,
            sticky_reacquire: true,
        }
    }
}

/// Which frame the detector observes, and therefore how subject height maps
/// to "height in crop".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum HeightReference {
    /// Detector sees the already-cropped buffer; heights are used as-is.
    #[default]
    InCrop,
    /// Detector sees the full sensor; heights are divided by the zoom scale.
    FullSensor,
}

impl FromStr for HeightReference {
    type Err = FramingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "in_crop" | "crop" => Ok(Self::InCrop),
            "full_sensor" | "sensor" => Ok(Self::FullSensor),
            other => Err(FramingError::invalid_config(format!(
                "unknown height reference: {other}"
            ))),
        }
    }
}

/// How a zoom velocity is turned into a scale change.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ScaleUpdateMode {
    /// `-velocity * scale * dt`: constant fractional zoom rate.
    #[default]
    Logarithmic,
    /// `-velocity * gain * dt`
    Linear { gain: f64 },
}

/// How the crop center follows the subject.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum PanMode {
    /// Center tracks the smoothed subject center.
    #[default]
    Direct,
    /// Center moves toward a slow framing-intent target under PD control.
    Pd { kp: f64, kd: f64, max_speed: f64 },
}

impl PanMode {
    /// PD panning with the default gains.
    pub fn pd() -> Self {
        Self::Pd {
            kp: 1.0,
            kd: 0.5,
            max_speed: 5.0,
        }
    }
}

/// Zoom/pan control loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Fraction of frame height the subject should occupy (default: 0.15)
    pub target_height_ratio: f64,
    /// EMA alpha for subject height (default: 0.2)
    pub height_alpha: f64,
    /// EMA alpha for subject center (default: 0.2)
    pub center_alpha: f64,
    /// EMA alpha for the framing-intent filters (default: 0.05)
    pub intent_alpha: f64,
    /// Proportional gain (default: 5.0)
    pub kp: f64,
    /// Derivative gain (default: 2 * sqrt(kp))
    pub kd: f64,
    /// Relative error that opens the gate (default: 0.15)
    pub trigger_threshold: f64,
    /// Relative error below which the gate closes (default: 0.05)
    pub stop_threshold: f64,
    /// Smallest crop scale, i.e. maximum zoom (default: 0.05)
    pub min_scale: f64,
    /// Largest crop scale (default: 1.0)
    pub max_scale: f64,
    /// Maximum fractional scale change per second (default: 5.0)
    pub max_zoom_rate: f64,
    /// Height floor guarding divisions (default: 1e-4)
    pub min_subject_height: f64,
    pub scale_update: ScaleUpdateMode,
    pub height_reference: HeightReference,
    pub pan: PanMode,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self::critically_damped(5.0)
    }
}

impl ControllerConfig {
    /// Default configuration with `kd = 2 * sqrt(kp)`.
    pub fn critically_damped(kp: f64) -> Self {
        Self {
            target_height_ratio: 0.15,
            height_alpha: 0.2,
            center_alpha: 0.2,
            intent_alpha: 0.05,
            kp,
            kd: 2.0 * kp.max(0.0).sqrt(),
            trigger_threshold: 0.15,
            stop_threshold: 0.05,
            min_scale: 0.05,
            max_scale: 1.0,
            max_zoom_rate: 5.0,
            min_subject_height: 1e-4,
            scale_update: ScaleUpdateMode::Logarithmic,
            height_reference: HeightReference::InCrop,
            pan: PanMode::Direct,
        }
    }
}

/// Manual zoom (button hold) behavior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManualZoomConfig {
    /// Ramp speed in zoom doublings per second (default: 2.0)
    pub ramp_rate: f64,
    /// Upper bound for manual zoom-in (default: 10.0)
    pub max_manual_factor: f64,
}

impl Default for ManualZoomConfig {
    fn default() -> Self {
        Self {
            ramp_rate: 2.0,
            max_manual_factor: 10.0,
        }
    }
}

/// Behavior when no subject is selected for a frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum NoSubjectPolicy {
    /// Keep the last crop.
    #[default]
    Hold,
    /// Zoom back out toward full frame at `rate` doublings per second.
    DecayToFullFrame { rate: f64 },
}

/// Frame admission and runtime behavior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Analyse every Nth camera frame (default: 3)
    pub analysis_stride: u32,
    /// Camera frame rate used when timestamps are missing (default: 30.0)
    pub nominal_fps: f64,
    /// Detector deadline in milliseconds; 0 derives one analysis interval (default: 0)
    pub detector_timeout_ms: u64,
    /// Actuator ramp tick rate (default: 60.0)
    pub actuator_tick_hz: f64,
    pub no_subject: NoSubjectPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            analysis_stride: 3,
            nominal_fps: 30.0,
            detector_timeout_ms: 0,
            actuator_tick_hz: 60.0,
            no_subject: NoSubjectPolicy::Hold,
        }
    }
}

impl PipelineConfig {
    /// Seconds between analysed frames at the nominal frame rate.
    pub fn analysis_interval(&self) -> f64 {
        self.analysis_stride.max(1) as f64 / self.nominal_fps
    }

    /// Deadline for one detector call.
    pub fn detector_timeout(&self) -> Duration {
        if self.detector_timeout_ms > 0 {
            Duration::from_millis(self.detector_timeout_ms)
        } else {
            Duration::from_secs_f64(self.analysis_interval())
        }
    }

    /// Period of the actuator task's ramp ticker.
    pub fn actuator_tick(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.actuator_tick_hz)
    }
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.parse().ok())
}

impl FramingConfig {
    /// Create config from `SKICAM_*` environment variables over the defaults.
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Load config from a JSON file and validate it.
    pub fn from_json_file(path: impl AsRef<Path>) -> FramingResult<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `SKICAM_*` environment overrides on top of this config.
    pub fn with_env_overrides(mut self) -> Self {
        let d = &mut self.detector;
        if let Ok(label) = std::env::var("SKICAM_SUBJECT_LABEL") {
            d.subject_label = label;
        }
        d.min_confidence = env_parse("SKICAM_MIN_CONFIDENCE").unwrap_or(d.min_confidence);
        d.origin = env_parse("SKICAM_BOX_ORIGIN").unwrap_or(d.origin);

        let t = &mut self.tracker;
        t.high_confidence = env_parse("SKICAM_HIGH_CONFIDENCE").unwrap_or(t.high_confidence);
        t.low_confidence = env_parse("SKICAM_LOW_CONFIDENCE").unwrap_or(t.low_confidence);
        t.match_iou = env_parse("SKICAM_MATCH_IOU").unwrap_or(t.match_iou);
        t.low_match_iou = env_parse("SKICAM_LOW_MATCH_IOU").unwrap_or(t.low_match_iou);
        t.max_missed_frames =
            env_parse("SKICAM_MAX_MISSED_FRAMES").unwrap_or(t.max_missed_frames);
        t.min_hits_to_activate = env_parse("SKICAM_MIN_HITS").unwrap_or(t.min_hits_to_activate);

        let c = &mut self.controller;
        c.target_height_ratio =
            env_parse("SKICAM_TARGET_HEIGHT").unwrap_or(c.target_height_ratio);
        if let Some(kp) = env_parse::<f64>("SKICAM_KP") {
            c.kp = kp;
            c.kd = 2.0 * kp.max(0.0).sqrt();
        }
        c.kd = env_parse("SKICAM_KD").unwrap_or(c.kd);
        c.trigger_threshold =
            env_parse("SKICAM_TRIGGER_THRESHOLD").unwrap_or(c.trigger_threshold);
        c.stop_threshold = env_parse("SKICAM_STOP_THRESHOLD").unwrap_or(c.stop_threshold);
        c.min_scale = env_parse("SKICAM_MIN_SCALE").unwrap_or(c.min_scale);
        c.max_scale = env_parse("SKICAM_MAX_SCALE").unwrap_or(c.max_scale);
        c.max_zoom_rate = env_parse("SKICAM_MAX_ZOOM_RATE").unwrap_or(c.max_zoom_rate);
        c.height_reference =
            env_parse("SKICAM_HEIGHT_REFERENCE").unwrap_or(c.height_reference);
        if let Ok(pan) = std::env::var("SKICAM_PAN_MODE") {
            c.pan = match pan.to_lowercase().as_str() {
                "pd" => PanMode::pd(),
                _ => PanMode::Direct,
            };
        }

        let m = &mut self.manual;
        m.ramp_rate = env_parse("SKICAM_MANUAL_RAMP_RATE").unwrap_or(m.ramp_rate);
        m.max_manual_factor =
            env_parse("SKICAM_MANUAL_MAX_FACTOR").unwrap_or(m.max_manual_factor);

        let p = &mut self.pipeline;
        p.analysis_stride = env_parse("SKICAM_ANALYSIS_STRIDE").unwrap_or(p.analysis_stride);
        p.nominal_fps = env_parse("SKICAM_NOMINAL_FPS").unwrap_or(p.nominal_fps);
        p.detector_timeout_ms =
            env_parse("SKICAM_DETECTOR_TIMEOUT_MS").unwrap_or(p.detector_timeout_ms);
        if let Some(rate) = env_parse::<f64>("SKICAM_NO_SUBJECT_DECAY_RATE") {
            p.no_subject = if rate > 0.0 {
                NoSubjectPolicy::DecayToFullFrame { rate }
            } else {
                NoSubjectPolicy::Hold
            };
        }

        self
    }

    /// Validate configuration.
    pub fn validate(&self) -> FramingResult<()> {
        let unit = |name: &str, v: f64| {
            if v.is_finite() && (0.0..=1.0).contains(&v) {
                Ok(())
            } else {
                Err(FramingError::invalid_config(format!(
                    "{name} must be within [0, 1], got {v}"
                )))
            }
        };
        let positive = |name: &str, v: f64| {
            if v > 0.0 && v.is_finite() {
                Ok(())
            } else {
                Err(FramingError::invalid_config(format!(
                    "{name} must be positive, got {v}"
                )))
            }
        };
        let alpha = |name: &str, v: f64| {
            if v.is_finite() && v > 0.0 && v <= 1.0 {
                Ok(())
            } else {
                Err(FramingError::invalid_config(format!(
                    "{name} must be within (0, 1], got {v}"
                )))
            }
        };
        let non_negative = |name: &str, v: f64| {
            if v.is_finite() && v >= 0.0 {
                Ok(())
            } else {
                Err(FramingError::invalid_config(format!(
                    "{name} must be finite and non-negative, got {v}"
                )))
            }
        };

        unit("detector.min_confidence", self.detector.min_confidence)?;

        let t = &self.tracker;
        unit("tracker.high_confidence", t.high_confidence)?;
        unit("tracker.low_confidence", t.low_confidence)?;
        unit("tracker.match_iou", t.match_iou)?;
        unit("tracker.low_match_iou", t.low_match_iou)?;
        if t.low_confidence >= t.high_confidence {
            return Err(FramingError::invalid_config(
                "tracker.low_confidence must be below tracker.high_confidence",
            ));
        }

        let c = &self.controller;
        positive("controller.target_height_ratio", c.target_height_ratio)?;
        alpha("controller.height_alpha", c.height_alpha)?;
        alpha("controller.center_alpha", c.center_alpha)?;
        alpha("controller.intent_alpha", c.intent_alpha)?;
        positive("controller.max_zoom_rate", c.max_zoom_rate)?;
        positive("controller.min_scale", c.min_scale)?;
        positive("controller.min_subject_height", c.min_subject_height)?;
        non_negative("controller.kp", c.kp)?;
        non_negative("controller.kd", c.kd)?;
        non_negative("controller.trigger_threshold", c.trigger_threshold)?;
        non_negative("controller.stop_threshold", c.stop_threshold)?;
        if c.stop_threshold >= c.trigger_threshold {
            return Err(FramingError::invalid_config(
                "controller.stop_threshold must be below controller.trigger_threshold",
            ));
        }
        if !c.max_scale.is_finite() || c.min_scale >= c.max_scale || c.max_scale > 1.0 {
            return Err(FramingError::invalid_config(
                "controller scale range must satisfy 0 < min_scale < max_scale <= 1",
            ));
        }
        if let ScaleUpdateMode::Linear { gain } = c.scale_update {
            positive("controller.scale_update.gain", gain)?;
        }
        if let PanMode::Pd { kp, kd, max_speed } = c.pan {
            non_negative("controller.pan.kp", kp)?;
            non_negative("controller.pan.kd", kd)?;
            positive("controller.pan.max_speed", max_speed)?;
        }

        positive("manual.ramp_rate", self.manual.ramp_rate)?;
        let max_manual = self.manual.max_manual_factor;
        if !max_manual.is_finite() || max_manual < 1.0 {
            return Err(FramingError::invalid_config(
                "manual.max_manual_factor must be finite and >= 1",
            ));
        }

        let p = &self.pipeline;
        if p.analysis_stride == 0 {
            return Err(FramingError::invalid_config(
                "pipeline.analysis_stride must be >= 1",
            ));
        }
        positive("pipeline.nominal_fps", p.nominal_fps)?;
        positive("pipeline.actuator_tick_hz", p.actuator_tick_hz)?;
        if let NoSubjectPolicy::DecayToFullFrame { rate } = p.no_subject {
            positive("pipeline.no_subject.rate", rate)?;
        }

        Ok(())
    }
}
