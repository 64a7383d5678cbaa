//! Normalized rectangles in top-left-origin image space.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

fn default_confidence() -> f64 {
    1.0
}

/// A bounding box in normalized [0, 1] coordinates with a top-left origin.
///
/// Callers guarantee `right >= left` and `bottom >= top`. Zero-area boxes are
/// valid and are used as "no detection" sentinels in some paths.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct NormalizedRect {
    /// Left edge (0.0 = left of frame)
    pub left: f64,
    /// Top edge (0.0 = top of frame)
    pub top: f64,
    /// Right edge
    pub right: f64,
    /// Bottom edge
    pub bottom: f64,
    /// Detector confidence, 1.0 when not applicable
    #[serde(default = "default_confidence")]
    pub confidence: f64,
}

impl NormalizedRect {
    /// The full sensor frame.
    pub const FULL_FRAME: NormalizedRect = NormalizedRect {
        left: 0.0,
        top: 0.0,
        right: 1.0,
        bottom: 1.0,
        confidence: 1.0,
    };

    /// Create a rect from its edges.
    pub fn new(left: f64, top: f64, right: f64, bottom: f64) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
            confidence: 1.0,
        }
    }

    /// Create a rect from a top-left corner and a size.
    pub fn from_xywh(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self::new(x, y, x + width, y + height)
    }

    /// Create a rect centered on `(cx, cy)` with the given size.
    pub fn from_center(cx: f64, cy: f64, width: f64, height: f64) -> Self {
        Self::new(
            cx - width / 2.0,
            cy - height / 2.0,
            cx + width / 2.0,
            cy + height / 2.0,
        )
    }

    /// Create a crop rect from a center and a zoom scale.
    ///
    /// Both axes span `scale`, so the crop keeps the sensor's aspect ratio.
    pub fn from_center_scale(cx: f64, cy: f64, scale: f64) -> Self {
        Self::from_center(cx, cy, scale, scale)
    }

    /// Return a copy carrying the given confidence.
    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence;
        self
    }

    pub fn width(&self) -> f64 {
        self.right - self.left
    }

    pub fn height(&self) -> f64 {
        self.bottom - self.top
    }

    pub fn center_x(&self) -> f64 {
        (self.left + self.right) / 2.0
    }

    pub fn center_y(&self) -> f64 {
        (self.top + self.bottom) / 2.0
    }

    pub fn area(&self) -> f64 {
        self.width().max(0.0) * self.height().max(0.0)
    }

    /// True for zero-area (or inverted) boxes.
    pub fn is_degenerate(&self) -> bool {
        self.area() <= 0.0
    }

    /// Check that the rect lies inside the unit square and has positive area.
    pub fn is_valid(&self) -> bool {
        self.left >= 0.0
            && self.top >= 0.0
            && self.right <= 1.0 + 1e-9
            && self.bottom <= 1.0 + 1e-9
            && !self.is_degenerate()
    }

    /// Intersection-over-union with another rect.
    ///
    /// Returns 0.0 for disjoint boxes and whenever the union area is not positive.
    pub fn iou(&self, other: &NormalizedRect) -> f64 {
        let ix = (self.right.min(other.right) - self.left.max(other.left)).max(0.0);
        let iy = (self.bottom.min(other.bottom) - self.top.max(other.top)).max(0.0);
        let intersection = ix * iy;
        let union = self.area() + other.area() - intersection;

        if union > 0.0 {
            intersection / union
        } else {
            0.0
        }
    }

    /// Clamp all edges into the unit square, preserving edge ordering.
    pub fn clamp_unit(&self) -> Self {
        let left = self.left.clamp(0.0, 1.0);
        let top = self.top.clamp(0.0, 1.0);
        Self {
            left,
            top,
            right: self.right.clamp(0.0, 1.0).max(left),
            bottom: self.bottom.clamp(0.0, 1.0).max(top),
            confidence: self.confidence,
        }
    }

    /// Project a full-sensor rect into the coordinate space of `crop`.
    ///
    /// The result is normalized to the crop, so a box filling the crop maps to
    /// the unit square. A degenerate crop yields a degenerate rect.
    pub fn to_crop_space(&self, crop: &NormalizedRect) -> Self {
        let w = crop.width();
        let h = crop.height();
        if w <= 0.0 || h <= 0.0 {
            return Self::new(0.0, 0.0, 0.0, 0.0).with_confidence(self.confidence);
        }
        Self {
            left: (self.left - crop.left) / w,
            top: (self.top - crop.top) / h,
            right: (self.right - crop.left) / w,
            bottom: (self.bottom - crop.top) / h,
            confidence: self.confidence,
        }
    }

    /// Map a rect expressed relative to `crop` back onto the full sensor.
    pub fn from_crop_space(&self, crop: &NormalizedRect) -> Self {
        let w = crop.width();
        let h = crop.height();
        Self {
            left: crop.left + self.left * w,
            top: crop.top + self.top * h,
            right: crop.left + self.right * w,
            bottom: crop.top + self.bottom * h,
            confidence: self.confidence,
        }
    }

    /// Convert to integer pixel coordinates for a frame of the given size.
    pub fn to_pixels(&self, frame_width: u32, frame_height: u32) -> PixelRect {
        let fw = frame_width as f64;
        let fh = frame_height as f64;
        let x = (self.left.clamp(0.0, 1.0) * fw).round();
        let y = (self.top.clamp(0.0, 1.0) * fh).round();
        let right = (self.right.clamp(0.0, 1.0) * fw).round();
        let bottom = (self.bottom.clamp(0.0, 1.0) * fh).round();

        PixelRect {
            x: x as u32,
            y: y as u32,
            width: (right - x).max(0.0) as u32,
            height: (bottom - y).max(0.0) as u32,
        }
    }
}

impl Default for NormalizedRect {
    fn default() -> Self {
        Self::FULL_FRAME
    }
}

/// A rectangle in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}
