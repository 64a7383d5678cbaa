//! Detector-native detections and the recorded detection log format.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Vertical origin convention of a detector's normalized boxes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum BoxOrigin {
    /// `y` is the distance from the top edge (most ML runtimes).
    #[default]
    TopLeft,
    /// `y` is the distance from the bottom edge (platform vision frameworks).
    BottomLeft,
}

impl BoxOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            BoxOrigin::TopLeft => "top_left",
            BoxOrigin::BottomLeft => "bottom_left",
        }
    }
}

impl fmt::Display for BoxOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for BoxOrigin {
    type Err = BoxOriginParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "top_left" | "topleft" | "top" => Ok(BoxOrigin::TopLeft),
            "bottom_left" | "bottomleft" | "bottom" => Ok(BoxOrigin::BottomLeft),
            _ => Err(BoxOriginParseError(s.to_string())),
        }
    }
}

#[derive(Debug, Error)]
#[error("Unknown box origin: {0}")]
pub struct BoxOriginParseError(String);

/// One raw detector result in the detector's own convention.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RawDetection {
    /// Left edge, normalized
    pub x: f64,
    /// Vertical edge, normalized, measured from the origin edge
    pub y: f64,
    /// Normalized width
    pub width: f64,
    /// Normalized height
    pub height: f64,
    /// Top class label
    pub label: String,
    /// Confidence of the top label
    pub confidence: f64,
}

impl RawDetection {
    pub fn new(
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        label: impl Into<String>,
        confidence: f64,
    ) -> Self {
        Self {
            x,
            y,
            width,
            height,
            label: label.into(),
            confidence,
        }
    }
}

/// One analysed frame in a recorded detection log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ReplayFrame {
    /// Capture timestamp in seconds
    pub timestamp: f64,
    /// Detector output for the full sensor frame
    #[serde(default)]
    pub detections: Vec<RawDetection>,
}

/// A recorded session of full-sensor detections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ReplayLog {
    /// Source frame rate
    pub fps: f64,
    /// Source frame width in pixels
    #[serde(default = "default_frame_width")]
    pub frame_width: u32,
    /// Source frame height in pixels
    #[serde(default = "default_frame_height")]
    pub frame_height: u32,
    /// Origin convention of the recorded boxes
    #[serde(default)]
    pub origin: BoxOrigin,
    pub frames: Vec<ReplayFrame>,
}

fn default_frame_width() -> u32 {
    1920
}

fn default_frame_height() -> u32 {
    1080
}
