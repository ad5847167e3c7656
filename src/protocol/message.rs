//! Decoded device messages

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::frame::{FIELD_SEPARATOR, FRAME_END, FRAME_START};
use crate::error::FrameError;

/// Acknowledgment description sent by the device after an accepted write
pub const ACK_OK: &str = "OK";

/// Command token the device uses to end pressure sampling
pub const STOP_COMMAND: &str = "STOP";

/// Command token of free-text device log lines
pub const LOG_COMMAND: &str = "LOG";

/// A raw sensor coordinate, a device coordinate, or a resistance reading in `z`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct TouchPoint {
    pub x: i32,
    pub y: i32,
    #[serde(default)]
    pub z: i32,
}

impl TouchPoint {
    /// Create a point with `z` left at zero
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y, z: 0 }
    }

    pub const fn with_z(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }
}

impl fmt::Display for TouchPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// One decoded frame: either a text message or a point, never both
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolMessage {
    /// Acknowledgments, errors and device log lines
    Text { command: String, description: String },
    /// Touch points and pressure samples
    Point { command: String, point: TouchPoint },
}

impl ProtocolMessage {
    pub fn text(command: &str, description: &str) -> Self {
        ProtocolMessage::Text {
            command: command.to_string(),
            description: description.to_string(),
        }
    }

    pub fn point(command: &str, point: TouchPoint) -> Self {
        ProtocolMessage::Point {
            command: command.to_string(),
            point,
        }
    }

    /// Decode the contents of a frame (without the delimiters)
    pub fn parse(payload: &str) -> Result<Self, FrameError> {
        let fields: Vec<&str> = payload.split(FIELD_SEPARATOR).collect();

        match fields.as_slice() {
            [command, description] => Ok(Self::text(command, description)),
            [command, x, y, z] => {
                let coordinate = |value: &str| {
                    value
                        .trim()
                        .parse::<i32>()
                        .map_err(|_| FrameError::InvalidCoordinate {
                            value: value.to_string(),
                            frame: payload.to_string(),
                        })
                };

                Ok(Self::point(
                    command,
                    TouchPoint::with_z(coordinate(*x)?, coordinate(*y)?, coordinate(*z)?),
                ))
            }
            _ => Err(FrameError::FieldCount {
                count: fields.len(),
                frame: payload.to_string(),
            }),
        }
    }

    pub fn command(&self) -> &str {
        match self {
            ProtocolMessage::Text { command, .. } | ProtocolMessage::Point { command, .. } => {
                command
            }
        }
    }

    pub fn description(&self) -> Option<&str> {
        match self {
            ProtocolMessage::Text { description, .. } => Some(description),
            ProtocolMessage::Point { .. } => None,
        }
    }

    pub fn touch_point(&self) -> Option<TouchPoint> {
        match self {
            ProtocolMessage::Point { point, .. } => Some(*point),
            ProtocolMessage::Text { .. } => None,
        }
    }

    /// True only for a text message whose description is exactly `OK`
    pub fn is_ok(&self) -> bool {
        self.description() == Some(ACK_OK)
    }

    pub fn is_stop(&self) -> bool {
        self.command() == STOP_COMMAND
    }

    pub fn is_log(&self) -> bool {
        matches!(self, ProtocolMessage::Text { command, .. } if command == LOG_COMMAND)
    }

    /// Render the message as a complete frame
    pub fn encode(&self) -> String {
        self.to_string()
    }
}

impl FromStr for ProtocolMessage {
    type Err = FrameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for ProtocolMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let start = FRAME_START as char;
        let end = FRAME_END as char;
        match self {
            ProtocolMessage::Text {
                command,
                description,
            } => write!(f, "{start}{command}:{description}{end}"),
            ProtocolMessage::Point { command, point } => write!(
                f,
                "{start}{command}:{}:{}:{}{end}",
                point.x, point.y, point.z
            ),
        }
    }
}
