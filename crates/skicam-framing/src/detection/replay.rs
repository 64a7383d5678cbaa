//! Recorded detection logs, replayed as a detector.

use async_trait::async_trait;
use std::path::Path;
use tracing::debug;

use skicam_models::{NormalizedRect, RawDetection, ReplayLog};

use super::adapter::project_to_view;
use super::{CameraFrame, SubjectDetector};
use crate::error::{FramingError, FramingResult};

/// Load and sanity-check a recorded detection log.
pub fn load_replay_log(path: impl AsRef<Path>) -> FramingResult<ReplayLog> {
    let raw = std::fs::read_to_string(path.as_ref())?;
    let log: ReplayLog = serde_json::from_str(&raw)?;
    validate_replay_log(&log)?;

    debug!(frames = log.frames.len(), fps = log.fps, "Loaded replay log");
    Ok(log)
}

/// Check the frame rate and timestamp ordering of a log.
pub fn validate_replay_log(log: &ReplayLog) -> FramingResult<()> {
    if !log.fps.is_finite() || log.fps <= 0.0 {
        return Err(FramingError::replay_format(format!(
            "fps must be positive, got {}",
            log.fps
        )));
    }
    if log
        .frames
        .iter()
        .any(|frame| !frame.timestamp.is_finite())
    {
        return Err(FramingError::replay_format("frame timestamps must be finite"));
    }
    if log
        .frames
        .windows(2)
        .any(|pair| pair[1].timestamp < pair[0].timestamp)
    {
        return Err(FramingError::replay_format(
            "frame timestamps must be non-decreasing",
        ));
    }
    Ok(())
}

/// Serves recorded full-sensor detections, indexed by frame sequence.
///
/// When `project` is set, detections are re-expressed relative to the
/// current view, emulating a detector that observes the cropped buffer.
pub struct ReplayDetector {
    log: ReplayLog,
    project: bool,
}

impl ReplayDetector {
    pub fn new(log: ReplayLog, project: bool) -> Self {
        Self { log, project }
    }

    pub fn len(&self) -> usize {
        self.log.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.log.frames.is_empty()
    }

    pub fn log(&self) -> &ReplayLog {
        &self.log
    }

    /// Detections for a frame sequence as seen through `view`.
    pub fn detections_for(&self, sequence: u64, view: &NormalizedRect) -> Vec<RawDetection> {
        let Some(frame) = usize::try_from(sequence).ok().and_then(|i| self.log.frames.get(i)) else {
            return Vec::new();
        };

        if self.project {
            frame
                .detections
                .iter()
                .map(|d| project_to_view(d, view, self.log.origin))
                .collect()
        } else {
            frame.detections.clone()
        }
    }
}

#[async_trait]
impl SubjectDetector for ReplayDetector {
    async fn detect(
        &self,
        frame: &CameraFrame,
        view: &NormalizedRect,
    ) -> FramingResult<Vec<RawDetection>> {
        Ok(self.detections_for(frame.sequence, view))
    }

    fn name(&self) -> &'static str {
        "replay"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skicam_models::{BoxOrigin, ReplayFrame};
    use std::io::Write;

    fn sample_log() -> ReplayLog {
        ReplayLog {
            fps: 30.0,
            frame_width: 1920,
            frame_height: 1080,
            origin: BoxOrigin::TopLeft,
            frames: vec![
                ReplayFrame {
                    timestamp: 0.0,
                    detections: vec![RawDetection::new(0.45, 0.45, 0.05, 0.1, "person", 0.9)],
                },
                ReplayFrame {
                    timestamp: 0.1,
                    detections: Vec::new(),
                },
            ],
        }
    }

    #[test]
    fn test_detections_for_out_of_range() {
        let detector = ReplayDetector::new(sample_log(), false);
        assert_eq!(detector.detections_for(0, &NormalizedRect::FULL_FRAME).len(), 1);
        assert!(detector.detections_for(1, &NormalizedRect::FULL_FRAME).is_empty());
        assert!(detector.detections_for(99, &NormalizedRect::FULL_FRAME).is_empty());
    }

    #[test]
    fn test_projection_into_view() {
        let detector = ReplayDetector::new(sample_log(), true);
        let view = NormalizedRect::from_center_scale(0.5, 0.5, 0.5);
        let dets = detector.detections_for(0, &view);
        assert!((dets[0].height - 0.2).abs() < 1e-12);
        assert!((dets[0].x - 0.4).abs() < 1e-12);
    }

    #[test]
    fn test_load_rejects_unordered_timestamps() {
        let mut log = sample_log();
        log.frames[1].timestamp = -1.0;
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(serde_json::to_string(&log).unwrap().as_bytes()).unwrap();

        let err = load_replay_log(file.path()).unwrap_err();
        assert!(matches!(err, FramingError::ReplayFormat(_)));
    }

    #[test]
    fn test_load_round_trip() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(serde_json::to_string(&sample_log()).unwrap().as_bytes()).unwrap();
        let log = load_replay_log(file.path()).unwrap();
        assert_eq!(log, sample_log());
    }

    #[tokio::test]
    async fn test_detect_uses_sequence() {
        let detector = ReplayDetector::new(sample_log(), false);
        let frame = CameraFrame::metadata_only(0, 0.0);
        let dets = detector.detect(&frame, &NormalizedRect::FULL_FRAME).await.unwrap();
        assert_eq!(dets.len(), 1);
        assert_eq!(detector.name(), "replay");
    }
}
