//! Zoom/pan control loop, split into independently testable stages.

pub mod constraint;
pub mod controller;
pub mod hysteresis;
pub mod pan;
pub mod pid;
pub mod scaling;
pub mod smoothing;
pub mod zoom_error;

pub use constraint::ZoomConstraint;
pub use controller::{zoom_factor_for, AutoZoomController};
pub use hysteresis::HysteresisGate;
pub use pan::PanController;
pub use pid::PdController;
pub use scaling::ScaleUpdater;
pub use smoothing::SmoothingFilter;
pub use zoom_error::ZoomErrorCalculator;
