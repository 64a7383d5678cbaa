//! Sticky subject selection.
//!
//! Once a track is chosen it stays the subject for as long as the tracker
//! reports its id. When it disappears the selector re-acquires the track
//! nearest to where the subject was last seen, preferring continuity over
//! absolute screen position.

use tracing::info;

use skicam_models::TrackedBox;

use crate::config::SelectorConfig;
use crate::metrics;

/// Chooses which track is the subject each frame.
#[derive(Debug, Clone)]
pub struct TargetSelector {
    config: SelectorConfig,
    /// Currently locked track id
    locked_id: Option<u32>,
    /// Center of the last selected subject
    last_center: Option<(f64, f64)>,
}

impl TargetSelector {
    pub fn new(config: SelectorConfig) -> Self {
        Self {
            config,
            locked_id: None,
            last_center: None,
        }
    }

    /// Select the subject among the current tracks.
    ///
    /// With no tracks this returns `None` and leaves the lock in place, so
    /// the subject is recovered if the tracker reports its id again.
    pub fn select(&mut self, tracks: &[TrackedBox]) -> Option<TrackedBox> {
        if tracks.is_empty() {
            return None;
        }

        if let Some(locked) = self.locked_id {
            if let Some(track) = tracks.iter().find(|t| t.id == locked) {
                self.last_center = Some((track.rect.center_x(), track.rect.center_y()));
                return Some(*track);
            }
        }

        let (rx, ry) = self.reference_point();
        let nearest = tracks.iter().min_by(|a, b| {
            let da = distance_sq(a, rx, ry);
            let db = distance_sq(b, rx, ry);
            da.total_cmp(&db)
        })?;

        let reacquired = self.locked_id.is_some();
        info!(
            track_id = nearest.id,
            previous = ?self.locked_id,
            reference_x = rx,
            reference_y = ry,
            "Subject locked"
        );
        metrics::record_subject_acquired(reacquired);

        self.locked_id = Some(nearest.id);
        self.last_center = Some((nearest.rect.center_x(), nearest.rect.center_y()));
        Some(*nearest)
    }

    fn reference_point(&self) -> (f64, f64) {
        match self.last_center {
            Some(center) if self.config.sticky_reacquire => center,
            _ => (self.config.reference_x, self.config.reference_y),
        }
    }

    /// Current locked track id.
    pub fn locked_id(&self) -> Option<u32> {
        self.locked_id
    }

    /// Clear the lock and the remembered subject position.
    pub fn reset(&mut self) {
        self.locked_id = None;
        self.last_center = None;
    }
}

impl Default for TargetSelector {
    fn default() -> Self {
        Self::new(SelectorConfig::default())
    }
}

fn distance_sq(track: &TrackedBox, x: f64, y: f64) -> f64 {
    let dx = track.rect.center_x() - x;
    let dy = track.rect.center_y() - y;
    dx * dx + dy * dy
}
