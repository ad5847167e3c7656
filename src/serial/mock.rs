//! Scripted in-memory device for tests

use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex};

use super::channel::Transport;
use crate::protocol::FRAME_END;

/// Frames written by the host, in order
#[derive(Debug, Clone, Default)]
pub struct SentFrames(Arc<Mutex<Vec<String>>>);

impl SentFrames {
    pub fn get(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn contains(&self, frame: &str) -> bool {
        self.get().iter().any(|f| f == frame)
    }

    fn push(&self, frame: String) {
        self.0.lock().unwrap().push(frame);
    }
}

/// Replays one canned reply for each complete frame the host writes
#[derive(Debug, Default)]
pub struct ScriptedDevice {
    inbox: VecDeque<u8>,
    replies: VecDeque<Vec<u8>>,
    partial: Vec<u8>,
    sent: SentFrames,
    hang_up: bool,
}

impl ScriptedDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the bytes sent back after the next host frame
    pub fn reply(mut self, bytes: &str) -> Self {
        self.replies.push_back(bytes.as_bytes().to_vec());
        self
    }

    /// Bytes already waiting when the port is opened
    pub fn preload(mut self, bytes: &str) -> Self {
        self.inbox.extend(bytes.as_bytes());
        self
    }

    /// Report end of stream once the inbox runs dry
    pub fn hang_up(mut self) -> Self {
        self.hang_up = true;
        self
    }

    pub fn sent_frames(&self) -> SentFrames {
        self.sent.clone()
    }
}

impl Transport for ScriptedDevice {
    fn read_byte(&mut self) -> io::Result<Option<u8>> {
        match self.inbox.pop_front() {
            Some(byte) => Ok(Some(byte)),
            None if self.hang_up => Err(io::ErrorKind::UnexpectedEof.into()),
            None => Ok(None),
        }
    }

    fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        for &byte in data {
            self.partial.push(byte);
            if byte == FRAME_END {
                let frame = String::from_utf8_lossy(&self.partial).into_owned();
                self.partial.clear();
                self.sent.push(frame);
                if let Some(reply) = self.replies.pop_front() {
                    self.inbox.extend(reply);
                }
            }
        }
        Ok(())
    }

    fn clear(&mut self) -> io::Result<()> {
        self.inbox.clear();
        Ok(())
    }
}
