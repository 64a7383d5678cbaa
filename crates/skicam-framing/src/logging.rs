//! Structured session logging.
//!
//! Every event emitted through [`SessionLogger`] carries the session id and
//! operation, so interleaved sessions can be told apart in aggregated logs.

use tracing::{error, info, warn, Span};
use uuid::Uuid;

use skicam_models::ZoomMode;

/// Logger for the lifecycle of one framing session.
#[derive(Debug, Clone)]
pub struct SessionLogger {
    session_id: String,
    operation: String,
}

impl SessionLogger {
    /// Create a logger with a fresh session id.
    ///
    /// # Arguments
    /// * `operation` - What the session does (e.g. "live_framing", "replay")
    pub fn new(operation: &str) -> Self {
        Self {
            session_id: Uuid::new_v4().to_string(),
            operation: operation.to_string(),
        }
    }

    pub fn log_start(&self, message: &str) {
        info!(
            session_id = %self.session_id,
            operation = %self.operation,
            "Session started: {}", message
        );
    }

    pub fn log_progress(&self, message: &str) {
        info!(
            session_id = %self.session_id,
            operation = %self.operation,
            "Session progress: {}", message
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!(
            session_id = %self.session_id,
            operation = %self.operation,
            "Session warning: {}", message
        );
    }

    pub fn log_error(&self, message: &str) {
        error!(
            session_id = %self.session_id,
            operation = %self.operation,
            "Session error: {}", message
        );
    }

    pub fn log_completion(&self, message: &str) {
        info!(
            session_id = %self.session_id,
            operation = %self.operation,
            "Session completed: {}", message
        );
    }

    /// Log a switch between auto and manual zoom.
    pub fn log_mode_change(&self, from: ZoomMode, to: ZoomMode) {
        info!(
            session_id = %self.session_id,
            operation = %self.operation,
            from = %from,
            to = %to,
            "Zoom mode changed"
        );
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// Create a tracing span for the session's tasks.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "session",
            session_id = %self.session_id,
            operation = %self.operation
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_logger_creation() {
        let logger = SessionLogger::new("live_framing");
        assert_eq!(logger.operation(), "live_framing");
        assert!(Uuid::parse_str(logger.session_id()).is_ok());
    }

    #[test]
    fn test_session_ids_are_unique() {
        let a = SessionLogger::new("replay");
        let b = SessionLogger::new("replay");
        assert_ne!(a.session_id(), b.session_id());
    }
}
