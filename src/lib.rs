//! Touch Digitizer Calibration
//!
//! Host-side driver for the framed serial protocol spoken by
//! microcontroller-based resistive touch digitizers. The crate runs the
//! device calibration sequence and computes the affine transform that maps
//! raw sensor coordinates to display coordinates.
//!
//! # Modules
//!
//! - [`protocol`]: `<...>` framing, typed messages and host commands
//! - [`serial`]: the serial channel with cooperative cancellation
//! - [`calibration`]: coefficient solver and the calibration session
//! - [`config`]: TOML-backed calibration settings
//!
//! # Usage
//!
//! ```no_run
//! # #[cfg(feature = "serial")]
//! # fn main() -> anyhow::Result<()> {
//! use touchcal::calibration::{Calibrator, SessionEvent};
//! use touchcal::config::CalibrationConfig;
//!
//! let config = CalibrationConfig::load(std::path::Path::new("touchcal.toml"))?;
//! let (mut calibrator, events) = Calibrator::with_serial_port(config);
//!
//! calibrator.connect();
//! for event in events {
//!     match event {
//!         SessionEvent::Connected(true) => {
//!             calibrator.start_calibration();
//!         }
//!         SessionEvent::CalibrationComplete(_) => break,
//!         failure if failure.is_failure() => break,
//!         other => println!("{:?}", other),
//!     }
//! }
//! calibrator.disconnect();
//! # Ok(())
//! # }
//! # #[cfg(not(feature = "serial"))]
//! # fn main() {}
//! ```

pub mod calibration;
pub mod config;
pub mod error;
pub mod protocol;
pub mod serial;

pub use error::{FrameError, SessionError};
pub use protocol::{Command, ProtocolMessage, TouchPoint};
