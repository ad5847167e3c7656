//! Host-to-device commands

use serde::{Deserialize, Serialize};
use std::fmt;

use super::frame::{FRAME_END, FRAME_START};

/// Scale applied to real-valued constants before they go on the wire
pub const FIXED_POINT_SCALE: f64 = 10000.0;

/// Display rotation configured on the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub enum Rotation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    /// Code sent in `SET_ROTATION`
    pub fn code(self) -> u8 {
        match self {
            Rotation::Deg0 => 0,
            Rotation::Deg90 => 1,
            Rotation::Deg180 => 2,
            Rotation::Deg270 => 3,
        }
    }

    pub fn degrees(self) -> u16 {
        u16::from(self.code()) * 90
    }
}

impl TryFrom<u16> for Rotation {
    type Error = String;

    /// Accepts degrees (0, 90, 180, 270)
    fn try_from(degrees: u16) -> Result<Self, Self::Error> {
        match degrees {
            0 => Ok(Rotation::Deg0),
            90 => Ok(Rotation::Deg90),
            180 => Ok(Rotation::Deg180),
            270 => Ok(Rotation::Deg270),
            other => Err(format!(
                "invalid rotation {other}, expected one of 0, 90, 180, 270"
            )),
        }
    }
}

impl From<Rotation> for u16 {
    fn from(rotation: Rotation) -> Self {
        rotation.degrees()
    }
}

impl fmt::Display for Rotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}°", self.degrees())
    }
}

/// A command frame sent to the device
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    /// Request the next calibration touch
    CalPoint,
    /// Start resistance sampling
    CalPressure,
    /// Calibration finished successfully
    CalSuccess,
    /// The last response was rejected
    Error,
    SetRotation(Rotation),
    /// `$<letter>:<value>` calibration constant, already in wire units
    SetConstant { letter: char, value: i64 },
}

impl Command {
    /// Constant command for a real value, quantized to four decimal places
    ///
    /// Returns `None` when the value is not finite or does not fit the wire integer.
    pub fn fixed_point(letter: char, value: f64) -> Option<Self> {
        to_fixed_point(value).map(|value| Command::SetConstant { letter, value })
    }

    /// Render the command as a complete frame
    pub fn encode(&self) -> String {
        self.to_string()
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.encode().into_bytes()
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", FRAME_START as char)?;
        match self {
            Command::CalPoint => write!(f, "CAL_POINT")?,
            Command::CalPressure => write!(f, "CAL_PRESSURE")?,
            Command::CalSuccess => write!(f, "CAL_SUCCESS")?,
            Command::Error => write!(f, "ERROR")?,
            Command::SetRotation(rotation) => write!(f, "SET_ROTATION:{}", rotation.code())?,
            Command::SetConstant { letter, value } => write!(f, "${letter}:{value}")?,
        }
        write!(f, "{}", FRAME_END as char)
    }
}

/// `round(value * 10000)`, or `None` if the result is not a finite 32-bit integer
pub fn to_fixed_point(value: f64) -> Option<i64> {
    let scaled = (value * FIXED_POINT_SCALE).round();
    if scaled.is_finite() && scaled >= f64::from(i32::MIN) && scaled <= f64::from(i32::MAX) {
        Some(scaled as i64)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_frames() {
        assert_eq!(Command::CalPoint.encode(), "<CAL_POINT>");
        assert_eq!(Command::CalPressure.encode(), "<CAL_PRESSURE>");
        assert_eq!(Command::CalSuccess.encode(), "<CAL_SUCCESS>");
        assert_eq!(Command::Error.encode(), "<ERROR>");
    }

    #[test]
    fn test_set_rotation_uses_code() {
        assert_eq!(Command::SetRotation(Rotation::Deg0).encode(), "<SET_ROTATION:0>");
        assert_eq!(Command::SetRotation(Rotation::Deg270).encode(), "<SET_ROTATION:3>");
    }

    #[test]
    fn test_constant_is_fixed_point() {
        assert_eq!(
            Command::fixed_point('A', 1.0).map(|c| c.encode()),
            Some("<$A:10000>".to_string())
        );
        assert_eq!(
            Command::fixed_point('C', -12.34567).map(|c| c.encode()),
            Some("<$C:-123457>".to_string())
        );
        assert_eq!(
            Command::SetConstant { letter: 'M', value: 150 }.encode(),
            "<$M:150>"
        );
    }

    #[test]
    fn test_non_finite_constant_is_refused() {
        assert_eq!(Command::fixed_point('A', f64::NAN), None);
        assert_eq!(Command::fixed_point('B', f64::INFINITY), None);
        assert_eq!(Command::fixed_point('C', 1.0e12), None);
    }

    #[test]
    fn test_rotation_degrees() {
        assert_eq!(Rotation::try_from(90u16), Ok(Rotation::Deg90));
        assert!(Rotation::try_from(45u16).is_err());
        assert_eq!(u16::from(Rotation::Deg180), 180);
        assert_eq!(Rotation::Deg90.code(), 1);
    }
}
