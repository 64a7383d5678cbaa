//! Detector boundary: the provider trait, camera frames, and ingestion.
//!
//! The ML detector itself is an external collaborator. It is reached through
//! [`SubjectDetector`], and its output is normalized by [`DetectionAdapter`]
//! before it reaches the tracker.

mod adapter;
mod replay;

pub use adapter::{project_to_view, DetectionAdapter};
pub use replay::{load_replay_log, validate_replay_log, ReplayDetector};

use async_trait::async_trait;
use std::sync::Arc;

use skicam_models::{NormalizedRect, RawDetection};

use crate::error::FramingResult;

/// A camera frame handed to the analysis path.
#[derive(Debug, Clone)]
pub struct CameraFrame {
    /// Monotonic capture sequence number
    pub sequence: u64,
    /// Capture timestamp in seconds
    pub timestamp: f64,
    pub width: u32,
    pub height: u32,
    /// Encoded or raw pixel data; opaque to the pipeline
    pub pixels: Arc<[u8]>,
}

impl CameraFrame {
    /// A frame without pixel data, for detectors that do not read pixels.
    pub fn metadata_only(sequence: u64, timestamp: f64) -> Self {
        Self {
            sequence,
            timestamp,
            width: 0,
            height: 0,
            pixels: Arc::from(Vec::new()),
        }
    }
}

/// Subject detection provider.
///
/// Implementations wrap an object detector and return its native output for
/// one frame. An empty result means "nothing detected" and is not an error.
#[async_trait]
pub trait SubjectDetector: Send + Sync {
    /// Detect subjects in a frame.
    ///
    /// `view` is the sensor region the frame buffer currently shows.
    async fn detect(
        &self,
        frame: &CameraFrame,
        view: &NormalizedRect,
    ) -> FramingResult<Vec<RawDetection>>;

    /// Provider name for logging.
    fn name(&self) -> &'static str;
}
