//! Normalization of detector-native output into top-left normalized rects.

use skicam_models::{BoxOrigin, NormalizedRect, RawDetection};

use crate::config::DetectorConfig;

/// Converts raw detector output into subject candidates.
///
/// Accepts only the configured subject label and confidences strictly above
/// the ingestion floor. The higher track-initiation threshold is applied by
/// the tracker, not here, so faint detections can still extend existing tracks.
#[derive(Debug, Clone)]
pub struct DetectionAdapter {
    config: DetectorConfig,
}

impl DetectionAdapter {
    pub fn new(config: DetectorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Normalize one frame of detector output.
    ///
    /// An empty input yields an empty list. Boxes are clamped to the unit
    /// square; boxes that lie entirely outside the frame are discarded.
    pub fn normalize(&self, raw: &[RawDetection]) -> Vec<NormalizedRect> {
        raw.iter()
            .filter(|d| self.accepts(d))
            .map(|d| self.convert(d))
            .filter(|r| !r.is_degenerate())
            .collect()
    }

    /// Whether a detection passes the label and confidence filters.
    pub fn accepts(&self, detection: &RawDetection) -> bool {
        detection.label.eq_ignore_ascii_case(&self.config.subject_label)
            && detection.confidence > self.config.min_confidence
    }

    /// Convert a single detection to a top-left-origin rect, clamped to the frame.
    pub fn convert(&self, detection: &RawDetection) -> NormalizedRect {
        let top = match self.config.origin {
            BoxOrigin::TopLeft => detection.y,
            BoxOrigin::BottomLeft => 1.0 - (detection.y + detection.height),
        };

        NormalizedRect::from_xywh(detection.x, top, detection.width, detection.height)
            .with_confidence(detection.confidence)
            .clamp_unit()
    }
}

/// Re-express a full-sensor detection relative to the sensor region `view`.
///
/// Used when detections recorded on the full sensor must be fed to a pipeline
/// whose detector contract is "sees the cropped buffer". The detection keeps
/// its origin convention.
pub fn project_to_view(
    detection: &RawDetection,
    view: &NormalizedRect,
    origin: BoxOrigin,
) -> RawDetection {
    let w = view.width();
    let h = view.height();
    if w <= 0.0 || h <= 0.0 {
        return detection.clone();
    }

    let view_y = match origin {
        BoxOrigin::TopLeft => view.top,
        BoxOrigin::BottomLeft => 1.0 - view.bottom,
    };

    RawDetection {
        x: (detection.x - view.left) / w,
        y: (detection.y - view_y) / h,
        width: detection.width / w,
        height: detection.height / h,
        label: detection.label.clone(),
        confidence: detection.confidence,
    }
}
