//! Synthetic ski scene and a detector that observes it.
//!
//! The scene is a function of time, so a detector sampled at any frame
//! timestamp sees a consistent world. Only the detection noise comes from
//! the seeded random generator.

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Mutex;

use skicam_framing::detection::{CameraFrame, SubjectDetector};
use skicam_framing::error::{FramingError, FramingResult};
use skicam_models::{NormalizedRect, RawDetection};

/// A skier carving toward the camera, plus a static bystander.
#[derive(Debug, Clone)]
pub struct SkierScene {
    /// Skier height on the full sensor at t = 0
    pub start_height: f64,
    /// Height gained per second as the skier approaches
    pub approach_rate: f64,
    /// Horizontal carve amplitude around the frame center
    pub carve_amplitude: f64,
    /// Carve period in seconds
    pub carve_period: f64,
    /// Bystander standing at the edge of the run, if any
    pub bystander: Option<NormalizedRect>,
}

impl Default for SkierScene {
    fn default() -> Self {
        Self {
            start_height: 0.04,
            approach_rate: 0.004,
            carve_amplitude: 0.15,
            carve_period: 4.0,
            bystander: Some(NormalizedRect::from_center(0.12, 0.7, 0.04, 0.1)),
        }
    }
}

impl SkierScene {
    /// Skier box on the full sensor at time `t`.
    pub fn skier_at(&self, t: f64) -> NormalizedRect {
        let height = (self.start_height + self.approach_rate * t).min(0.9);
        let phase = std::f64::consts::TAU * t / self.carve_period;
        let cx = 0.5 + self.carve_amplitude * phase.sin();
        let cy = 0.45 + 0.05 * (phase * 0.5).cos();
        NormalizedRect::from_center(cx, cy, height * 0.4, height)
    }
}

/// Detector that reports the scene with positional noise and dropouts.
pub struct SimulatedDetector {
    scene: SkierScene,
    /// Whether boxes are reported relative to the current view
    in_crop: bool,
    /// Standard deviation of positional noise, as a fraction of box height
    jitter: f64,
    /// Probability that the skier is missed in a frame
    dropout: f64,
    rng: Mutex<StdRng>,
}

impl SimulatedDetector {
    pub fn new(scene: SkierScene, seed: u64) -> Self {
        Self {
            scene,
            in_crop: true,
            jitter: 0.02,
            dropout: 0.05,
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    /// Report boxes on the full sensor instead of the current view.
    pub fn full_sensor(mut self) -> Self {
        self.in_crop = false;
        self
    }

    pub fn with_noise(mut self, jitter: f64, dropout: f64) -> Self {
        self.jitter = jitter;
        self.dropout = dropout;
        self
    }

    pub fn scene(&self) -> &SkierScene {
        &self.scene
    }

    /// Detections for a capture time seen through `view`.
    pub fn observe(&self, t: f64, view: &NormalizedRect) -> FramingResult<Vec<RawDetection>> {
        let mut rng = self
            .rng
            .lock()
            .map_err(|_| FramingError::detection_failed("simulation state poisoned"))?;

        let mut boxes = Vec::with_capacity(2);
        if !rng.random_bool(self.dropout.clamp(0.0, 1.0)) {
            let skier = self.scene.skier_at(t);
            let spread = self.jitter * skier.height();
            let dx = rng.random_range(-spread..=spread);
            let dy = rng.random_range(-spread..=spread);
            let noisy = NormalizedRect::from_center(
                skier.center_x() + dx,
                skier.center_y() + dy,
                skier.width(),
                skier.height(),
            );
            boxes.push(noisy.with_confidence(rng.random_range(0.6..0.95)));
        }
        if let Some(bystander) = self.scene.bystander {
            boxes.push(bystander.with_confidence(rng.random_range(0.3..0.6)));
        }
        drop(rng);

        Ok(boxes
            .into_iter()
            .map(|rect| if self.in_crop { rect.to_crop_space(view) } else { rect })
            .filter(|rect| {
                rect.right > 0.0 && rect.left < 1.0 && rect.bottom > 0.0 && rect.top < 1.0
            })
            .map(|rect| {
                RawDetection::new(
                    rect.left,
                    rect.top,
                    rect.width(),
                    rect.height(),
                    "person",
                    rect.confidence,
                )
            })
            .collect())
    }
}

#[async_trait]
impl SubjectDetector for SimulatedDetector {
    async fn detect(
        &self,
        frame: &CameraFrame,
        view: &NormalizedRect,
    ) -> FramingResult<Vec<RawDetection>> {
        self.observe(frame.timestamp, view)
    }

    fn name(&self) -> &'static str {
        "simulated"
    }
}
