//! Incremental frame extraction from the serial byte stream

use log::trace;

use super::message::ProtocolMessage;
use crate::error::FrameError;

pub const FRAME_START: u8 = b'<';
pub const FRAME_END: u8 = b'>';
pub const FIELD_SEPARATOR: char = ':';

/// Longest frame payload accepted before the frame is dropped
pub const MAX_FRAME_LEN: usize = 256;

/// Collects bytes into frames and decodes each completed frame
///
/// Bytes outside a frame are discarded. A start byte inside a frame
/// restarts it, the same way the device resets its receive buffer.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
    in_frame: bool,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one byte; returns a result once a frame is complete
    pub fn push(&mut self, byte: u8) -> Option<Result<ProtocolMessage, FrameError>> {
        match byte {
            FRAME_START => {
                if self.in_frame && !self.buffer.is_empty() {
                    trace!(
                        "Restarting frame, dropped {:?}",
                        String::from_utf8_lossy(&self.buffer)
                    );
                }
                self.buffer.clear();
                self.in_frame = true;
                None
            }
            FRAME_END if self.in_frame => {
                let payload = String::from_utf8_lossy(&self.buffer).into_owned();
                self.reset();
                Some(ProtocolMessage::parse(&payload))
            }
            _ if self.in_frame => {
                if self.buffer.len() >= MAX_FRAME_LEN {
                    self.reset();
                    return Some(Err(FrameError::TooLong));
                }
                self.buffer.push(byte);
                None
            }
            _ => {
                trace!("Discarding byte outside frame: {:#04x}", byte);
                None
            }
        }
    }

    pub fn is_in_frame(&self) -> bool {
        self.in_frame
    }

    /// Drop any partially received frame
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.in_frame = false;
    }
}
