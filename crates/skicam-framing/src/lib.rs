//! Automatic subject framing for a ski camera.
//!
//! This crate turns per-frame person detections into a digital zoom/pan
//! crop that keeps one skier framed at a target height:
//!
//! - [`detection`]: detector boundary and ingestion of raw detector boxes
//! - [`tracking`]: ByteTrack-style multi-object tracking with a Kalman filter
//! - [`selection`]: sticky choice of which track is the subject
//! - [`control`]: the zoom/pan control loop
//! - [`manual`]: manual zoom override and resynchronization
//! - [`actuator`]: the zoom device boundary
//! - [`pipeline`]: the synchronous per-frame composition of the above
//! - [`session`]: the async runtime with keep-latest frame admission
//! - [`replay`]: offline replay of recorded detection logs

pub mod actuator;
pub mod config;
pub mod control;
pub mod detection;
pub mod error;
pub mod logging;
pub mod manual;
pub mod metrics;
pub mod pipeline;
pub mod replay;
pub mod selection;
pub mod session;
pub mod tracking;

pub use actuator::{
    ActuatorCommand, ActuatorState, IssuedCommand, RemoteActuator, SimulatedActuator,
    ZoomActuator, ZoomRamp,
};
pub use config::{
    ControllerConfig, DetectorConfig, FramingConfig, HeightReference, ManualZoomConfig,
    NoSubjectPolicy, PanMode, PipelineConfig, ScaleUpdateMode, SelectorConfig, TrackerConfig,
};
pub use control::AutoZoomController;
pub use detection::{CameraFrame, DetectionAdapter, ReplayDetector, SubjectDetector};
pub use error::{FramingError, FramingResult};
pub use logging::SessionLogger;
pub use manual::ZoomOverride;
pub use pipeline::{ControlCommand, FramingPipeline};
pub use replay::{CropPlan, CropPlanEntry, ReplayOutcome, ReplayRunner};
pub use selection::TargetSelector;
pub use session::{FramingSession, SessionHandle, SessionReport};
pub use tracking::{ByteTracker, TrackerStats};
