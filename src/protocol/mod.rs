//! Wire protocol spoken with the digitizer firmware
//!
//! Every message travels as a frame: a `<` start byte, `:`-separated
//! fields and a `>` end byte. The device sends two frame shapes:
//! - `<COMMAND:description>` for acknowledgments and log lines
//! - `<COMMAND:x:y:z>` for touch points and resistance samples

pub mod command;
pub mod frame;
pub mod message;

pub use command::{Command, Rotation};
pub use frame::{FrameDecoder, FIELD_SEPARATOR, FRAME_END, FRAME_START, MAX_FRAME_LEN};
pub use message::{ProtocolMessage, TouchPoint};
