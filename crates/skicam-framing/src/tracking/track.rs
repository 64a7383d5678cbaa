//! A single identity-tagged track.

use skicam_models::{NormalizedRect, TrackState, TrackedBox};

use super::kalman::KalmanFilter;
use crate::config::KalmanConfig;

/// Tracked object with its own motion filter.
#[derive(Debug, Clone)]
pub struct Track {
    id: u32,
    rect: NormalizedRect,
    state: TrackState,
    missed_frames: u32,
    hits: u32,
    age: u32,
    score: f64,
    filter: KalmanFilter,
}

impl Track {
    /// Create a track seeded from a single detection.
    pub fn new(
        id: u32,
        detection: &NormalizedRect,
        initial_state: TrackState,
        kalman: KalmanConfig,
    ) -> Self {
        Self {
            id,
            rect: *detection,
            state: initial_state,
            missed_frames: 0,
            hits: 1,
            age: 0,
            score: detection.confidence,
            filter: KalmanFilter::initiate(detection, kalman),
        }
    }

    /// Advance the motion filter and expose the predicted box for matching.
    pub fn predict(&mut self) {
        self.filter.predict();
        self.rect = self.filter.rect().with_confidence(self.score);
        self.age += 1;
    }

    /// Correct with a matched detection.
    ///
    /// A `New` track becomes `Tracked` once it has `min_hits` matches.
    pub fn update(&mut self, detection: &NormalizedRect, min_hits: u32) {
        self.filter.update(detection);
        self.score = detection.confidence;
        self.rect = self.filter.rect().with_confidence(self.score);
        self.hits += 1;
        self.missed_frames = 0;

        if self.state != TrackState::New || self.hits >= min_hits {
            self.state = TrackState::Tracked;
        }
    }

    /// Record a cycle without a match.
    ///
    /// Unconfirmed tracks are removed immediately; others coast as `Lost`
    /// until `missed_frames` exceeds `max_missed`.
    pub fn mark_missed(&mut self, max_missed: u32) {
        self.missed_frames += 1;
        self.state = match self.state {
            TrackState::New | TrackState::Removed => TrackState::Removed,
            TrackState::Tracked | TrackState::Lost if self.missed_frames > max_missed => {
                TrackState::Removed
            }
            TrackState::Tracked | TrackState::Lost => TrackState::Lost,
        };
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn rect(&self) -> NormalizedRect {
        self.rect
    }

    pub fn state(&self) -> TrackState {
        self.state
    }

    pub fn missed_frames(&self) -> u32 {
        self.missed_frames
    }

    pub fn hits(&self) -> u32 {
        self.hits
    }

    pub fn age(&self) -> u32 {
        self.age
    }

    pub fn score(&self) -> f64 {
        self.score
    }

    pub fn filter(&self) -> &KalmanFilter {
        &self.filter
    }

    pub fn tracked_box(&self) -> TrackedBox {
        TrackedBox::new(self.id, self.rect)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detection(cx: f64, conf: f64) -> NormalizedRect {
        NormalizedRect::from_center(cx, 0.5, 0.05, 0.1).with_confidence(conf)
    }

    fn seeded(id: u32, cx: f64, state: TrackState) -> Track {
        Track::new(id, &detection(cx, 0.8), state, KalmanConfig::default())
    }

    #[test]
    fn test_new_track() {
        let track = seeded(7, 0.5, TrackState::Tracked);
        assert_eq!(track.id(), 7);
        assert_eq!(track.hits(), 1);
        assert_eq!(track.state(), TrackState::Tracked);
        assert!((track.score() - 0.8).abs() < 1e-12);
    }

    #[test]
    fn test_lost_then_removed() {
        let mut track = seeded(1, 0.5, TrackState::Tracked);
        for _ in 0..3 {
            track.predict();
            track.mark_missed(3);
            assert_eq!(track.state(), TrackState::Lost);
        }
        track.predict();
        track.mark_missed(3);
        assert_eq!(track.state(), TrackState::Removed);
    }

    #[test]
    fn test_reacquire_resets_missed() {
        let mut track = seeded(1, 0.5, TrackState::Tracked);
        track.predict();
        track.mark_missed(30);
        track.predict();
        track.update(&detection(0.5, 0.7), 1);
        assert_eq!(track.state(), TrackState::Tracked);
        assert_eq!(track.missed_frames(), 0);
        assert_eq!(track.hits(), 2);
    }

    #[test]
    fn test_new_track_needs_confirmation() {
        let mut track = seeded(1, 0.5, TrackState::New);
        track.predict();
        track.update(&detection(0.5, 0.8), 3);
        assert_eq!(track.state(), TrackState::New);
        track.predict();
        track.update(&detection(0.5, 0.8), 3);
        assert_eq!(track.state(), TrackState::Tracked);

        let mut unconfirmed = seeded(2, 0.2, TrackState::New);
        unconfirmed.predict();
        unconfirmed.mark_missed(30);
        assert_eq!(unconfirmed.state(), TrackState::Removed);
    }
}
