//! Detection-to-track association.

use skicam_models::NormalizedRect;

/// Result of associating tracks with detections.
///
/// Indices refer to the slices passed to [`Associator::associate`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Association {
    /// `(track_index, detection_index)` pairs
    pub matches: Vec<(usize, usize)>,
    pub unmatched_tracks: Vec<usize>,
    pub unmatched_detections: Vec<usize>,
}

/// Strategy for pairing predicted track boxes with detections.
///
/// The tracker only depends on this interface, so an optimal assignment
/// solver can replace the greedy default for denser scenes.
pub trait Associator: Send + Sync {
    fn associate(
        &self,
        tracks: &[NormalizedRect],
        detections: &[NormalizedRect],
        min_iou: f64,
    ) -> Association;

    fn name(&self) -> &'static str;
}

/// Greedy maximum-IoU assignment.
///
/// All pairs at or above `min_iou` are sorted by IoU descending and accepted
/// while both sides are still free. Not globally optimal, but adequate for
/// the handful of simultaneous subjects a camera frame holds.
#[derive(Debug, Clone, Copy, Default)]
pub struct GreedyIouAssociator;

impl Associator for GreedyIouAssociator {
    fn associate(
        &self,
        tracks: &[NormalizedRect],
        detections: &[NormalizedRect],
        min_iou: f64,
    ) -> Association {
        if tracks.is_empty() || detections.is_empty() {
            return Association {
                matches: Vec::new(),
                unmatched_tracks: (0..tracks.len()).collect(),
                unmatched_detections: (0..detections.len()).collect(),
            };
        }

        let mut candidates: Vec<(usize, usize, f64)> = Vec::new();
        for (i, track) in tracks.iter().enumerate() {
            for (j, det) in detections.iter().enumerate() {
                let iou = track.iou(det);
                if iou >= min_iou && iou > 0.0 {
                    candidates.push((i, j, iou));
                }
            }
        }
        // Stable sort keeps (track, detection) order among equal IoUs
        candidates.sort_by(|a, b| b.2.total_cmp(&a.2));

        let mut matched_tracks = vec![false; tracks.len()];
        let mut matched_dets = vec![false; detections.len()];
        let mut matches = Vec::new();

        for (track_idx, det_idx, _iou) in candidates {
            if !matched_tracks[track_idx] && !matched_dets[det_idx] {
                matches.push((track_idx, det_idx));
                matched_tracks[track_idx] = true;
                matched_dets[det_idx] = true;
            }
        }

        Association {
            matches,
            unmatched_tracks: (0..tracks.len()).filter(|&i| !matched_tracks[i]).collect(),
            unmatched_detections: (0..detections.len()).filter(|&j| !matched_dets[j]).collect(),
        }
    }

    fn name(&self) -> &'static str {
        "greedy_iou"
    }
}
