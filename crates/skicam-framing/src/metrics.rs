//! Metrics for the framing pipeline.
//!
//! Recorded through the `metrics` facade; they are no-ops until a recorder
//! (for example the Prometheus exporter) is installed by the host binary.

use metrics::{counter, gauge, histogram};

/// Metric names as constants for consistency.
pub mod names {
    // Frame flow
    pub const FRAMES_ANALYSED_TOTAL: &str = "skicam_frames_analysed_total";
    pub const FRAMES_DROPPED_TOTAL: &str = "skicam_frames_dropped_total";
    pub const ANALYSIS_DURATION_SECONDS: &str = "skicam_analysis_duration_seconds";

    // Detector
    pub const DETECTOR_TIMEOUTS_TOTAL: &str = "skicam_detector_timeouts_total";
    pub const DETECTOR_ERRORS_TOTAL: &str = "skicam_detector_errors_total";

    // Tracker
    pub const TRACKS_SPAWNED_TOTAL: &str = "skicam_tracks_spawned_total";
    pub const TRACKS_REMOVED_TOTAL: &str = "skicam_tracks_removed_total";
    pub const SUBJECT_ACQUISITIONS_TOTAL: &str = "skicam_subject_acquisitions_total";

    // Actuation
    pub const ZOOM_FACTOR: &str = "skicam_zoom_factor";
    pub const ACTUATION_FAILURES_TOTAL: &str = "skicam_actuation_failures_total";
    pub const MODE_TRANSITIONS_TOTAL: &str = "skicam_mode_transitions_total";
}

/// Record one analysed frame and its processing time.
pub fn record_frame_analysed(duration_secs: f64) {
    counter!(names::FRAMES_ANALYSED_TOTAL).increment(1);
    histogram!(names::ANALYSIS_DURATION_SECONDS).record(duration_secs);
}

/// Record frames dropped by keep-latest admission.
pub fn record_frames_dropped(count: u64) {
    if count > 0 {
        counter!(names::FRAMES_DROPPED_TOTAL).increment(count);
    }
}

/// Record a detector call that missed its deadline.
pub fn record_detector_timeout(detector: &str) {
    let labels = [("detector", detector.to_string())];
    counter!(names::DETECTOR_TIMEOUTS_TOTAL, &labels).increment(1);
}

/// Record a detector call that returned an error.
pub fn record_detector_error(detector: &str) {
    let labels = [("detector", detector.to_string())];
    counter!(names::DETECTOR_ERRORS_TOTAL, &labels).increment(1);
}

/// Record newly spawned tracks.
pub fn record_tracks_spawned(count: usize) {
    if count > 0 {
        counter!(names::TRACKS_SPAWNED_TOTAL).increment(count as u64);
    }
}

/// Record removed tracks.
pub fn record_tracks_removed(count: usize) {
    if count > 0 {
        counter!(names::TRACKS_REMOVED_TOTAL).increment(count as u64);
    }
}

/// Record a subject lock acquisition.
pub fn record_subject_acquired(reacquired: bool) {
    let labels = [("kind", if reacquired { "reacquire" } else { "cold_start" }.to_string())];
    counter!(names::SUBJECT_ACQUISITIONS_TOTAL, &labels).increment(1);
}

/// Update the zoom factor gauge.
pub fn set_zoom_factor(factor: f64) {
    gauge!(names::ZOOM_FACTOR).set(factor);
}

/// Record a rejected zoom command.
pub fn record_actuation_failure() {
    counter!(names::ACTUATION_FAILURES_TOTAL).increment(1);
}

/// Record a switch between auto and manual zoom.
pub fn record_mode_transition(mode: &str) {
    let labels = [("mode", mode.to_string())];
    counter!(names::MODE_TRANSITIONS_TOTAL, &labels).increment(1);
}
