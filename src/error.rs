//! Error types shared by the protocol and calibration layers

use std::time::Duration;
use thiserror::Error;

use crate::protocol::MAX_FRAME_LEN;

/// A frame arrived but could not be turned into a message
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    /// Only 2-field and 4-field frames are valid
    #[error("unexpected field count {count} in frame {frame:?}")]
    FieldCount { count: usize, frame: String },

    /// A coordinate field of a point frame is not a base-10 integer
    #[error("invalid coordinate {value:?} in frame {frame:?}")]
    InvalidCoordinate { value: String, frame: String },

    #[error("frame exceeds {} bytes", MAX_FRAME_LEN)]
    TooLong,
}

/// Terminal conditions of a calibration or rotation sequence
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("serial port did not open within {0:?}")]
    ConnectTimeout(Duration),

    #[error("malformed message: {0}")]
    MessageParse(#[from] FrameError),

    #[error("device rejected {command}: {response}")]
    ProtocolRejection { command: String, response: String },

    #[error("no STOP received from the device within {0:?}")]
    PressureTimeout(Duration),

    #[error("pressure sampling ended without any resistance samples")]
    NoPressureSamples,

    #[error("serial stream closed")]
    StreamClosed,

    /// A read deadline passed before a complete frame arrived
    #[error("timed out waiting for the device")]
    Timeout,

    /// The three calibration touches do not define an affine map
    #[error("calibration touches are degenerate (coefficient {0} is not representable)")]
    DegenerateCalibration(char),

    #[error("serial port is not connected")]
    NotConnected,

    #[error("serial I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SessionError {
    /// Whether the error was caused by the channel shutting down rather than the device
    pub fn is_closed(&self) -> bool {
        matches!(self, SessionError::StreamClosed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_error_messages() {
        let err = FrameError::FieldCount {
            count: 3,
            frame: "A:1:2".to_string(),
        };
        assert_eq!(err.to_string(), "unexpected field count 3 in frame \"A:1:2\"");
        assert_eq!(FrameError::TooLong.to_string(), "frame exceeds 256 bytes");
    }

    #[test]
    fn test_frame_error_converts_to_session_error() {
        let err: SessionError = FrameError::TooLong.into();
        assert!(matches!(err, SessionError::MessageParse(FrameError::TooLong)));
        assert!(!err.is_closed());
        assert!(SessionError::StreamClosed.is_closed());
    }
}
