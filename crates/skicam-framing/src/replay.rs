//! Offline replay of recorded detection logs.
//!
//! Drives a [`FramingPipeline`] frame by frame from a [`ReplayLog`]. When the
//! controller expects in-crop measurements, each frame's full-sensor boxes
//! are re-expressed relative to the crop produced by the previous frame, the
//! way a detector reading the zoomed buffer would see them.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

use skicam_models::{FrameSnapshot, NormalizedRect, PixelRect, ReplayLog};

use crate::actuator::SimulatedActuator;
use crate::config::{FramingConfig, HeightReference};
use crate::detection::{validate_replay_log, ReplayDetector};
use crate::error::FramingResult;
use crate::pipeline::FramingPipeline;
use crate::tracking::TrackerStats;

/// Crop decision for one replayed frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CropPlanEntry {
    pub sequence: u64,
    pub timestamp: f64,
    pub crop: NormalizedRect,
    /// Crop in source pixels
    pub pixels: PixelRect,
    pub zoom_factor: f64,
    pub subject_id: Option<u32>,
}

/// Crop decisions for a whole log.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CropPlan {
    pub frame_width: u32,
    pub frame_height: u32,
    pub entries: Vec<CropPlanEntry>,
}

impl CropPlan {
    /// Write the plan as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> FramingResult<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

/// Everything a replay produced.
#[derive(Debug, Clone)]
pub struct ReplayOutcome {
    pub snapshots: Vec<FrameSnapshot>,
    pub plan: CropPlan,
    pub tracker: TrackerStats,
}

/// Replays a log through a fresh pipeline with a simulated actuator.
pub struct ReplayRunner {
    config: FramingConfig,
    max_zoom_factor: f64,
}

impl ReplayRunner {
    pub fn new(config: FramingConfig) -> Self {
        Self {
            config,
            max_zoom_factor: 20.0,
        }
    }

    /// Device zoom ceiling for the simulated actuator (default: 20.0).
    pub fn with_max_zoom_factor(mut self, max_zoom_factor: f64) -> Self {
        self.max_zoom_factor = max_zoom_factor;
        self
    }

    /// Run the whole log.
    ///
    /// Each frame steps the controller by its timestamp delta, or by one
    /// recorded frame interval (`1 / fps`) on the first frame and wherever
    /// timestamps repeat.
    pub fn run(&self, log: ReplayLog) -> FramingResult<ReplayOutcome> {
        validate_replay_log(&log)?;
        let mut config = self.config.clone();
        config.detector.origin = log.origin;
        let project = config.controller.height_reference == HeightReference::InCrop;

        let actuator = SimulatedActuator::new(self.max_zoom_factor);
        let mut pipeline = FramingPipeline::new(config, actuator)?;
        let (width, height) = (log.frame_width, log.frame_height);
        let frame_interval = 1.0 / log.fps;
        let timestamps: Vec<f64> = log.frames.iter().map(|f| f.timestamp).collect();
        let detector = ReplayDetector::new(log, project);

        info!(frames = timestamps.len(), project, "Starting replay");

        let mut snapshots = Vec::with_capacity(timestamps.len());
        let mut plan = CropPlan {
            frame_width: width,
            frame_height: height,
            entries: Vec::with_capacity(timestamps.len()),
        };

        let mut previous: Option<f64> = None;
        for (index, timestamp) in timestamps.into_iter().enumerate() {
            let sequence = index as u64;
            let dt = match previous {
                Some(prev) if timestamp > prev => timestamp - prev,
                _ => frame_interval,
            };
            previous = Some(timestamp);

            let view = pipeline.current_crop();
            let raw = detector.detections_for(sequence, &view);
            let snapshot = pipeline.process_with_dt(sequence, timestamp, &raw, dt);

            plan.entries.push(CropPlanEntry {
                sequence,
                timestamp,
                crop: snapshot.crop,
                pixels: snapshot.crop.to_pixels(width, height),
                zoom_factor: snapshot.zoom_factor,
                subject_id: snapshot.subject.map(|s| s.id),
            });
            snapshots.push(snapshot);
        }

        let tracker = pipeline.tracker_stats();
        info!(
            frames = snapshots.len(),
            tracks_created = tracker.total_tracks_created,
            "Replay finished"
        );

        Ok(ReplayOutcome {
            snapshots,
            plan,
            tracker,
        })
    }
}
