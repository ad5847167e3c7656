//! Touch calibration: reference targets, coefficient solver and the
//! device calibration sequence
//!
//! The sequence collects three touches at known display targets, samples
//! the touch resistance range, solves the affine map from sensor to display
//! coordinates and uploads it to the device as fixed-point constants.

pub mod calibrator;
pub mod geometry;
pub mod session;
pub mod solver;
pub mod state;

pub use calibrator::{Calibrator, Opener, SessionOutcome};
pub use geometry::ReferenceGeometry;
pub use session::CalibrationSession;
pub use solver::{solve, Coefficients};
pub use state::{FailureReason, Phase, ResistanceRange, SessionEvent};
