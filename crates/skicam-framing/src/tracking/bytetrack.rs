//! ByteTrack-style multi-object tracker.
//!
//! Detections are split by confidence. High-confidence detections are
//! associated with both tracked and lost tracks; the remaining tracked tracks
//! then get a second, stricter chance against low-confidence detections, so a
//! subject that is briefly blurred or occluded keeps its identity. Lost tracks
//! are never risked against low-confidence noise.
//!
//! # Usage
//! ```rust
//! use skicam_framing::tracking::ByteTracker;
//! use skicam_framing::config::TrackerConfig;
//! use skicam_models::NormalizedRect;
//!
//! let mut tracker = ByteTracker::new(TrackerConfig::default());
//! let detections = vec![NormalizedRect::new(0.45, 0.4, 0.5, 0.5).with_confidence(0.9)];
//! let tracks = tracker.update(&detections);
//! assert_eq!(tracks[0].id, 1);
//! ```

use serde::Serialize;
use tracing::{debug, trace};

use skicam_models::{NormalizedRect, TrackState, TrackedBox};

use super::matching::{Associator, GreedyIouAssociator};
use super::track::Track;
use crate::config::TrackerConfig;
use crate::metrics;

/// Tracker statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TrackerStats {
    pub active_tracks: usize,
    pub tracked: usize,
    pub lost: usize,
    pub total_tracks_created: u64,
    pub total_tracks_removed: u64,
    pub frames_processed: u64,
}

/// Multi-object tracker with confidence-tiered association.
pub struct ByteTracker {
    config: TrackerConfig,
    associator: Box<dyn Associator>,
    /// Tracks not yet removed
    tracks: Vec<Track>,
    /// Next id to assign; ids start at 1 and are never reused
    next_id: u32,
    total_tracks_created: u64,
    total_tracks_removed: u64,
    frames_processed: u64,
}

impl ByteTracker {
    /// Create a tracker using greedy IoU association.
    pub fn new(config: TrackerConfig) -> Self {
        Self::with_associator(config, Box::new(GreedyIouAssociator))
    }

    /// Create a tracker with a custom association strategy.
    pub fn with_associator(config: TrackerConfig, associator: Box<dyn Associator>) -> Self {
        Self {
            config,
            associator,
            tracks: Vec::new(),
            next_id: 1,
            total_tracks_created: 0,
            total_tracks_removed: 0,
            frames_processed: 0,
        }
    }

    /// Run one tracking cycle and return the tracks in `Tracked` state.
    pub fn update(&mut self, detections: &[NormalizedRect]) -> Vec<TrackedBox> {
        self.frames_processed += 1;

        for track in &mut self.tracks {
            track.predict();
        }

        let (high, low): (Vec<NormalizedRect>, Vec<NormalizedRect>) = detections
            .iter()
            .copied()
            .filter(|d| d.confidence > self.config.low_confidence)
            .partition(|d| d.confidence >= self.config.high_confidence);

        // Stage 1: high-confidence detections against every live track
        let stage1_tracks: Vec<usize> = (0..self.tracks.len()).collect();
        let stage1_boxes: Vec<NormalizedRect> =
            stage1_tracks.iter().map(|&i| self.tracks[i].rect()).collect();
        let first = self
            .associator
            .associate(&stage1_boxes, &high, self.config.match_iou);

        for &(t, d) in &first.matches {
            let track = &mut self.tracks[stage1_tracks[t]];
            if track.state() == TrackState::Lost {
                debug!(
                    track_id = track.id(),
                    missed = track.missed_frames(),
                    "Track re-acquired"
                );
            }
            track.update(&high[d], self.config.min_hits_to_activate);
        }

        // Stage 2: leftover tracked tracks against low-confidence detections
        let stage2_tracks: Vec<usize> = first
            .unmatched_tracks
            .iter()
            .map(|&t| stage1_tracks[t])
            .filter(|&i| self.tracks[i].state() == TrackState::Tracked)
            .collect();
        let stage2_boxes: Vec<NormalizedRect> =
            stage2_tracks.iter().map(|&i| self.tracks[i].rect()).collect();
        let second = self
            .associator
            .associate(&stage2_boxes, &low, self.config.low_match_iou);

        let mut matched = vec![false; self.tracks.len()];
        for &(t, _) in &first.matches {
            matched[stage1_tracks[t]] = true;
        }
        for &(t, d) in &second.matches {
            let idx = stage2_tracks[t];
            self.tracks[idx].update(&low[d], self.config.min_hits_to_activate);
            matched[idx] = true;
        }

        // Aging
        for (idx, track) in self.tracks.iter_mut().enumerate() {
            if !matched[idx] {
                track.mark_missed(self.config.max_missed_frames);
            }
        }

        // Spawn from unmatched high-confidence detections
        let initial_state = if self.config.min_hits_to_activate <= 1 {
            TrackState::Tracked
        } else {
            TrackState::New
        };
        let spawned = first.unmatched_detections.len();
        for &d in &first.unmatched_detections {
            let id = self.next_id;
            self.next_id += 1;
            self.total_tracks_created += 1;
            trace!(track_id = id, confidence = high[d].confidence, "Spawning track");
            self.tracks
                .push(Track::new(id, &high[d], initial_state, self.config.kalman));
        }

        let before = self.tracks.len();
        self.tracks.retain(|t| t.state() != TrackState::Removed);
        let removed = before - self.tracks.len();
        self.total_tracks_removed += removed as u64;

        metrics::record_tracks_spawned(spawned);
        metrics::record_tracks_removed(removed);

        self.tracked_boxes()
    }

    /// Tracks currently in `Tracked` state, in id order.
    pub fn tracked_boxes(&self) -> Vec<TrackedBox> {
        self.tracks
            .iter()
            .filter(|t| t.state() == TrackState::Tracked)
            .map(Track::tracked_box)
            .collect()
    }

    /// Get a live (not removed) track by id.
    pub fn track(&self, id: u32) -> Option<&Track> {
        self.tracks.iter().find(|t| t.id() == id)
    }

    /// Iterate over all live tracks, including lost ones.
    pub fn tracks(&self) -> impl Iterator<Item = &Track> {
        self.tracks.iter()
    }

    /// Drop every track. Ids keep increasing across resets.
    pub fn reset(&mut self) {
        debug!(tracks_cleared = self.tracks.len(), "Tracker reset");
        self.total_tracks_removed += self.tracks.len() as u64;
        self.tracks.clear();
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn associator_name(&self) -> &'static str {
        self.associator.name()
    }

    /// Get statistics.
    pub fn stats(&self) -> TrackerStats {
        TrackerStats {
            active_tracks: self.tracks.len(),
            tracked: self
                .tracks
                .iter()
                .filter(|t| t.state() == TrackState::Tracked)
                .count(),
            lost: self
                .tracks
                .iter()
                .filter(|t| t.state() == TrackState::Lost)
                .count(),
            total_tracks_created: self.total_tracks_created,
            total_tracks_removed: self.total_tracks_removed,
            frames_processed: self.frames_processed,
        }
    }
}

impl Default for ByteTracker {
    fn default() -> Self {
        Self::new(TrackerConfig::default())
    }
}
