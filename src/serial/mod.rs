//! Serial channel to the digitizer
//!
//! This module provides:
//! - A [`Transport`] abstraction over byte-level serial I/O
//! - [`SerialChannel`], which owns the open transport and a cooperative
//!   running flag that unblocks readers on shutdown
//! - Port configuration and enumeration for real hardware (`serial` feature)

pub mod channel;
#[cfg(test)]
pub(crate) mod mock;
#[cfg(feature = "serial")]
pub mod port;

pub use channel::{SerialChannel, Transport, OPEN_RETRY_INTERVAL};
#[cfg(feature = "serial")]
pub use port::{PortConfig, SerialConnection};
