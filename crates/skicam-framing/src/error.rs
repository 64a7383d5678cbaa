//! Error types for the framing pipeline.

use std::time::Duration;
use thiserror::Error;

/// Result type for framing operations.
pub type FramingResult<T> = Result<T, FramingError>;

/// Errors that can occur while configuring or running the framing pipeline.
///
/// None of these are fatal inside the per-frame path: the pipeline logs and
/// degrades instead of propagating them.
#[derive(Debug, Error)]
pub enum FramingError {
    #[error("Zoom actuation failed: {0}")]
    ActuatorFailed(String),

    #[error("Zoom actuator unavailable")]
    ActuatorUnavailable,

    #[error("Detection failed: {0}")]
    DetectionFailed(String),

    #[error("Detector did not respond within {0:?}")]
    DetectorTimeout(Duration),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid replay log: {0}")]
    ReplayFormat(String),

    #[error("Framing session closed")]
    SessionClosed,

    #[error("Session task failed: {0}")]
    TaskFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),
}

impl FramingError {
    /// Create an actuation failure error.
    pub fn actuator_failed(message: impl Into<String>) -> Self {
        Self::ActuatorFailed(message.into())
    }

    /// Create a detection failure error.
    pub fn detection_failed(message: impl Into<String>) -> Self {
        Self::DetectionFailed(message.into())
    }

    /// Create an invalid configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }

    /// Create a replay format error.
    pub fn replay_format(message: impl Into<String>) -> Self {
        Self::ReplayFormat(message.into())
    }

    /// Whether the pipeline may continue after this error.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::ActuatorFailed(_)
                | Self::ActuatorUnavailable
                | Self::DetectionFailed(_)
                | Self::DetectorTimeout(_)
        )
    }
}
