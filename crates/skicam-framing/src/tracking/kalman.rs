//! Constant-velocity Kalman filter over box center, aspect ratio and height.
//!
//! # State Vector
//! ```text
//! [cx, cy, a, h, vcx, vcy, va, vh]
//!  ^center ^aspect/height ^velocities
//! ```
//!
//! Process and measurement noise scale with the estimated box height, so
//! large (close) subjects are allowed to move further per frame in
//! normalized units than small (distant) ones.

use nalgebra::{SMatrix, SVector};
use tracing::trace;

use skicam_models::NormalizedRect;

use crate::config::KalmanConfig;

type StateVector = SVector<f64, 8>;
type StateMatrix = SMatrix<f64, 8, 8>;
type MeasurementVector = SVector<f64, 4>;
type MeasurementMatrix = SMatrix<f64, 4, 4>;
type ObservationMatrix = SMatrix<f64, 4, 8>;

/// Smallest height the filter will carry, in normalized units.
pub const MIN_HEIGHT: f64 = 1e-4;

/// Gain used when the innovation covariance cannot be inverted.
const FALLBACK_GAIN: f64 = 0.4;

/// Convert a rect into a `[cx, cy, aspect, height]` measurement.
pub fn rect_to_measurement(rect: &NormalizedRect) -> [f64; 4] {
    let h = rect.height().max(MIN_HEIGHT);
    let w = rect.width().max(0.0);
    [rect.center_x(), rect.center_y(), w / h, h]
}

/// Kalman filter state owned by a single track.
#[derive(Debug, Clone)]
pub struct KalmanFilter {
    mean: StateVector,
    covariance: StateMatrix,
    motion: StateMatrix,
    observation: ObservationMatrix,
    config: KalmanConfig,
}

impl KalmanFilter {
    /// Seed a filter from a single measurement with zero velocity.
    pub fn initiate(rect: &NormalizedRect, config: KalmanConfig) -> Self {
        let [cx, cy, a, h] = rect_to_measurement(rect);
        let mean = StateVector::from_column_slice(&[cx, cy, a, h, 0.0, 0.0, 0.0, 0.0]);

        let wp = config.std_weight_position;
        let wv = config.std_weight_velocity;
        let std = [
            2.0 * wp * h,
            2.0 * wp * h,
            config.std_aspect_process,
            2.0 * wp * h,
            10.0 * wv * h,
            10.0 * wv * h,
            config.std_aspect_velocity,
            10.0 * wv * h,
        ];
        let covariance =
            StateMatrix::from_diagonal(&StateVector::from_column_slice(&std.map(|s| s * s)));

        let mut motion = StateMatrix::identity();
        let mut observation = ObservationMatrix::zeros();
        for i in 0..4 {
            motion[(i, i + 4)] = 1.0;
            observation[(i, i)] = 1.0;
        }

        Self {
            mean,
            covariance,
            motion,
            observation,
            config,
        }
    }

    /// Advance one step: `x = F x`, `P = F P F^T + Q`.
    pub fn predict(&mut self) {
        let h = self.height();
        let wp = self.config.std_weight_position;
        let wv = self.config.std_weight_velocity;
        let std = [
            wp * h,
            wp * h,
            self.config.std_aspect_process,
            wp * h,
            wv * h,
            wv * h,
            self.config.std_aspect_velocity,
            wv * h,
        ];
        let process_noise =
            StateMatrix::from_diagonal(&StateVector::from_column_slice(&std.map(|s| s * s)));

        self.mean = self.motion * self.mean;
        self.covariance = self.motion * self.covariance * self.motion.transpose() + process_noise;
        self.enforce_bounds();
    }

    /// Correct the state with a measured box.
    pub fn update(&mut self, rect: &NormalizedRect) {
        let measurement = MeasurementVector::from_column_slice(&rect_to_measurement(rect));
        let h = self.height();
        let wp = self.config.std_weight_position;
        let std = [wp * h, wp * h, self.config.std_aspect_measurement, wp * h];
        let measurement_noise = MeasurementMatrix::from_diagonal(
            &MeasurementVector::from_column_slice(&std.map(|s| s * s)),
        );

        let innovation = measurement - self.observation * self.mean;
        let innovation_cov =
            self.observation * self.covariance * self.observation.transpose() + measurement_noise;

        match innovation_cov.try_inverse() {
            Some(inv) => {
                let gain = self.covariance * self.observation.transpose() * inv;
                self.mean += gain * innovation;
                self.covariance =
                    (StateMatrix::identity() - gain * self.observation) * self.covariance;
            }
            None => {
                trace!("Innovation covariance singular, using fixed gain");
                for i in 0..4 {
                    self.mean[i] += FALLBACK_GAIN * innovation[i];
                }
            }
        }
        self.enforce_bounds();
    }

    fn enforce_bounds(&mut self) {
        self.mean[2] = self.mean[2].max(0.0);
        self.mean[3] = self.mean[3].max(MIN_HEIGHT);
    }

    /// Current box estimate.
    pub fn rect(&self) -> NormalizedRect {
        let h = self.height();
        let w = self.mean[2] * h;
        NormalizedRect::from_center(self.mean[0], self.mean[1], w, h)
    }

    pub fn height(&self) -> f64 {
        self.mean[3].max(MIN_HEIGHT)
    }

    /// Estimated center velocity per step.
    pub fn velocity(&self) -> (f64, f64) {
        (self.mean[4], self.mean[5])
    }

    /// Variance of a state dimension.
    pub fn variance(&self, index: usize) -> f64 {
        self.covariance[(index, index)]
    }
}
