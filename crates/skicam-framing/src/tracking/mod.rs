//! Identity tracking across frames.

pub mod bytetrack;
pub mod kalman;
pub mod matching;
pub mod track;

pub use bytetrack::{ByteTracker, TrackerStats};
pub use kalman::KalmanFilter;
pub use matching::{Association, Associator, GreedyIouAssociator};
pub use track::Track;
