//! Read-only per-frame snapshots published to observers.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::mode::ZoomMode;
use crate::rect::NormalizedRect;
use crate::track::TrackedBox;

/// Human-readable state strings shown on the camera overlay.
pub mod labels {
    pub const NONE: &str = "Label: None";
    pub const PERSON: &str = "Label: Person";
    pub const PERSON_MANUAL: &str = "Label: Person (Manual)";
    pub const AUTO_RESUMED: &str = "Label: Auto Resumed";
}

/// State of the framing pipeline after one analysed frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FrameSnapshot {
    /// Sequence number of the analysed camera frame
    pub sequence: u64,
    /// Capture timestamp of the frame in seconds
    pub timestamp: f64,
    /// Wall-clock time the snapshot was produced
    pub produced_at: DateTime<Utc>,
    /// Crop rect on the full sensor
    pub crop: NormalizedRect,
    /// All subject-class detections that passed ingestion
    pub detections: Vec<NormalizedRect>,
    /// Tracks reported by the tracker this frame
    pub tracks: Vec<TrackedBox>,
    /// Selected subject, if any
    pub subject: Option<TrackedBox>,
    /// Smoothed subject height as a fraction of the crop
    pub subject_height_in_crop: Option<f64>,
    /// Zoom factor sent to the device (1.0 = no zoom)
    pub zoom_factor: f64,
    pub mode: ZoomMode,
    /// Whether the hysteresis gate is open
    pub is_zooming: bool,
    pub locked_track_id: Option<u32>,
    pub debug_label: String,
    /// Time spent analysing the frame, in milliseconds
    pub analysis_ms: f64,
}

impl FrameSnapshot {
    /// A snapshot for an idle, unzoomed pipeline.
    pub fn idle() -> Self {
        Self {
            sequence: 0,
            timestamp: 0.0,
            produced_at: Utc::now(),
            crop: NormalizedRect::FULL_FRAME,
            detections: Vec::new(),
            tracks: Vec::new(),
            subject: None,
            subject_height_in_crop: None,
            zoom_factor: 1.0,
            mode: ZoomMode::Auto,
            is_zooming: false,
            locked_track_id: None,
            debug_label: labels::NONE.to_string(),
            analysis_ms: 0.0,
        }
    }

    /// One-line summary used by replay tooling and debug overlays.
    pub fn debug_line(&self, target_height_ratio: f64) -> String {
        let id = self
            .subject
            .map(|s| s.id.to_string())
            .unwrap_or_else(|| "-".to_string());
        let raw_height = self.subject.map(|s| s.rect.height()).unwrap_or(0.0);
        let crop_height = self.subject_height_in_crop.unwrap_or(0.0);

        format!(
            "Frame {} | {} | ID:{} | Det H: {:.3} | Crop H: {:.3} ({:.3}) | Zoom: {:.2}x | {}",
            self.sequence,
            self.debug_label,
            id,
            raw_height,
            crop_height,
            target_height_ratio,
            self.zoom_factor,
            self.mode,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_line_with_subject() {
        let mut snapshot = FrameSnapshot::idle();
        snapshot.sequence = 42;
        snapshot.subject = Some(TrackedBox::new(3, NormalizedRect::new(0.4, 0.4, 0.45, 0.5)));
        snapshot.subject_height_in_crop = Some(0.1);
        snapshot.zoom_factor = 2.0;
        snapshot.debug_label = labels::PERSON.to_string();

        let line = snapshot.debug_line(0.15);
        assert!(line.starts_with("Frame 42 | Label: Person | ID:3"));
        assert!(line.contains("Crop H: 0.100 (0.150)"));
        assert!(line.contains("Zoom: 2.00x"));
        assert!(line.ends_with("auto"));
    }

    #[test]
    fn test_idle_snapshot() {
        let snapshot = FrameSnapshot::idle();
        assert_eq!(snapshot.crop, NormalizedRect::FULL_FRAME);
        assert!(snapshot.debug_line(0.15).contains("ID:-"));
    }
}
