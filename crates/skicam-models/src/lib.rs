//! Shared data models for the SkiCam framing pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Normalized and pixel rectangles
//! - Track lifecycle states and tracker output
//! - Raw detector output and recorded detection logs
//! - Zoom modes and per-frame observer snapshots

pub mod detection;
pub mod mode;
pub mod rect;
pub mod snapshot;
pub mod track;

// Re-export common types
pub use detection::{BoxOrigin, BoxOriginParseError, RawDetection, ReplayFrame, ReplayLog};
pub use mode::{ZoomMode, ZoomModeParseError};
pub use rect::{NormalizedRect, PixelRect};
pub use snapshot::{labels, FrameSnapshot};
pub use track::{TrackState, TrackedBox};
