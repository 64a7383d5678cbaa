//! Host-side tooling for the SkiCam framing pipeline.
//!
//! - [`telemetry`]: tracing and Prometheus setup for the binaries
//! - [`simulation`]: a synthetic ski scene and detector for demos and tests

pub mod simulation;
pub mod telemetry;

pub use simulation::{SimulatedDetector, SkierScene};
