//! Calibration settings
//!
//! Settings are read once from a TOML file (or built in code) and handed to
//! the [`Calibrator`](crate::calibration::Calibrator).
//!
//! ```toml
//! port = "/dev/ttyACM0"
//! rotation = 90
//!
//! [device]
//! class = "uinput"
//! width = 1280
//! height = 800
//!
//! [timing]
//! pressure_timeout_ms = 10000
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

pub use crate::protocol::Rotation;

/// How the device addresses its display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "class", rename_all = "lowercase")]
pub enum DeviceClass {
    /// HID digitizer, both axes span a fixed 0..=10000 logical range
    #[default]
    Hid,
    /// uinput device addressed in display pixels
    Uinput { width: u32, height: u32 },
}

impl DeviceClass {
    pub fn name(&self) -> &'static str {
        match self {
            DeviceClass::Hid => "hid",
            DeviceClass::Uinput { .. } => "uinput",
        }
    }
}

/// Delays and timeouts of the calibration sequence, in milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timing {
    /// Wait before opening the port; the device resets when the port opens
    pub open_settle_ms: u64,
    /// How long to keep retrying the port
    pub open_timeout_ms: u64,
    /// Pause after each calibration point while the UI moves the target
    pub point_settle_ms: u64,
    /// Longest wait for the finger to be lifted during pressure sampling
    pub pressure_timeout_ms: u64,
    /// Sleep between polls of an idle port
    pub poll_interval_ms: u64,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            open_settle_ms: 1000,
            open_timeout_ms: 10_000,
            point_settle_ms: 1000,
            pressure_timeout_ms: 10_000,
            poll_interval_ms: 5,
        }
    }
}

impl Timing {
    /// All delays zero, short timeouts
    pub fn immediate() -> Self {
        Self {
            open_settle_ms: 0,
            open_timeout_ms: 100,
            point_settle_ms: 0,
            pressure_timeout_ms: 1000,
            poll_interval_ms: 1,
        }
    }

    pub fn open_settle(&self) -> Duration {
        Duration::from_millis(self.open_settle_ms)
    }

    pub fn open_timeout(&self) -> Duration {
        Duration::from_millis(self.open_timeout_ms)
    }

    pub fn point_settle(&self) -> Duration {
        Duration::from_millis(self.point_settle_ms)
    }

    pub fn pressure_timeout(&self) -> Duration {
        Duration::from_millis(self.pressure_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Everything the calibration core needs from the outside
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    /// Serial port identifier (e.g., /dev/ttyACM0, COM3)
    pub port: String,
    pub rotation: Rotation,
    pub device: DeviceClass,
    pub timing: Timing,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            port: default_port().to_string(),
            rotation: Rotation::default(),
            device: DeviceClass::default(),
            timing: Timing::default(),
        }
    }
}

impl CalibrationConfig {
    pub fn new(port: &str, device: DeviceClass) -> Self {
        Self {
            port: port.to_string(),
            device,
            ..Default::default()
        }
    }

    pub fn with_rotation(mut self, rotation: Rotation) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn with_timing(mut self, timing: Timing) -> Self {
        self.timing = timing;
        self
    }

    /// Load settings from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&content)
            .with_context(|| format!("Invalid config file: {}", path.display()))
    }

    /// Parse settings from TOML content
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).with_context(|| "Failed to parse calibration config")
    }

    /// Render the settings as TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).with_context(|| "Failed to serialize calibration config")
    }
}

fn default_port() -> &'static str {
    if cfg!(windows) {
        "COM3"
    } else {
        "/dev/ttyACM0"
    }
}
