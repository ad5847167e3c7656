//! Blocking, cancellable serial channel

use log::{debug, warn};
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use crate::error::SessionError;
use crate::protocol::{Command, FrameDecoder, ProtocolMessage};

/// Delay between attempts to open the port
pub const OPEN_RETRY_INTERVAL: Duration = Duration::from_millis(250);

/// Byte-level access to an open serial connection
pub trait Transport: Send {
    /// Read a single byte
    ///
    /// `Ok(None)` means no data arrived within the transport's own read timeout.
    fn read_byte(&mut self) -> io::Result<Option<u8>>;

    /// Write the whole buffer
    fn write_all(&mut self, data: &[u8]) -> io::Result<()>;

    /// Discard stale input and output
    fn clear(&mut self) -> io::Result<()> {
        Ok(())
    }
}

type SharedTransport = Arc<Mutex<Option<Box<dyn Transport>>>>;

/// Handle to the serial connection shared by the caller and the session worker
///
/// Clones refer to the same connection and the same running flag. Reads
/// poll the transport and return [`SessionError::StreamClosed`] as soon as
/// the running flag is cleared.
#[derive(Clone)]
pub struct SerialChannel {
    transport: SharedTransport,
    running: Arc<AtomicBool>,
    poll_interval: Duration,
}

impl SerialChannel {
    pub fn new(poll_interval: Duration) -> Self {
        Self {
            transport: Arc::new(Mutex::new(None)),
            running: Arc::new(AtomicBool::new(false)),
            poll_interval,
        }
    }

    /// Open the connection, retrying until `timeout` elapses
    ///
    /// Sleeps for `settle` first since the device may still be starting up.
    /// Stale buffered data is discarded once the port is open.
    pub fn open_with<F>(&self, mut opener: F, settle: Duration, timeout: Duration) -> bool
    where
        F: FnMut() -> anyhow::Result<Box<dyn Transport>>,
    {
        if self.is_open() {
            return true;
        }

        thread::sleep(settle);
        let deadline = Instant::now() + timeout;

        loop {
            match opener() {
                Ok(mut transport) => {
                    if let Err(e) = transport.clear() {
                        warn!("Failed to clear serial buffers: {}", e);
                    }
                    *self.lock() = Some(transport);
                    self.running.store(true, Ordering::SeqCst);
                    debug!("Serial channel open");
                    return true;
                }
                Err(e) => debug!("Open attempt failed: {:#}", e),
            }

            let now = Instant::now();
            if now >= deadline {
                warn!("Serial port did not open within {:?}", timeout);
                return false;
            }
            thread::sleep(OPEN_RETRY_INTERVAL.min(deadline - now));
        }
    }

    pub fn is_open(&self) -> bool {
        self.lock().is_some()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Stop all blocked readers and close the connection
    pub fn close(&self) {
        self.running.store(false, Ordering::SeqCst);
        if self.lock().take().is_some() {
            debug!("Serial channel closed");
        }
    }

    /// Block until one byte arrives, the deadline passes or the channel closes
    pub fn read_byte(&self, deadline: Option<Instant>) -> Result<u8, SessionError> {
        loop {
            if !self.is_running() {
                return Err(SessionError::StreamClosed);
            }
            if deadline.is_some_and(|d| Instant::now() >= d) {
                return Err(SessionError::Timeout);
            }

            let polled = {
                let mut guard = self.lock();
                let transport = guard.as_mut().ok_or(SessionError::StreamClosed)?;
                transport.read_byte()
            };

            match polled {
                Ok(Some(byte)) => return Ok(byte),
                Ok(None) => {}
                Err(e)
                    if matches!(
                        e.kind(),
                        io::ErrorKind::TimedOut
                            | io::ErrorKind::WouldBlock
                            | io::ErrorKind::Interrupted
                    ) => {}
                Err(e)
                    if matches!(
                        e.kind(),
                        io::ErrorKind::UnexpectedEof | io::ErrorKind::BrokenPipe
                    ) =>
                {
                    debug!("Serial stream ended: {}", e);
                    return Err(SessionError::StreamClosed);
                }
                Err(e) => return Err(e.into()),
            }

            thread::sleep(self.poll_interval);
        }
    }

    /// Read the next complete frame and decode it
    pub fn read_message(&self, deadline: Option<Instant>) -> Result<ProtocolMessage, SessionError> {
        let mut decoder = FrameDecoder::new();
        loop {
            let byte = self.read_byte(deadline)?;
            if let Some(result) = decoder.push(byte) {
                return match result {
                    Ok(message) => {
                        debug!("RX {}", message);
                        Ok(message)
                    }
                    Err(e) => {
                        warn!("Malformed frame from device: {}", e);
                        Err(e.into())
                    }
                };
            }
        }
    }

    /// Write raw bytes; refused once the channel has been closed
    pub fn write(&self, data: &[u8]) -> Result<(), SessionError> {
        if !self.is_running() {
            return Err(SessionError::StreamClosed);
        }
        let mut guard = self.lock();
        let transport = guard.as_mut().ok_or(SessionError::StreamClosed)?;
        transport.write_all(data)?;
        Ok(())
    }

    pub fn send(&self, command: &Command) -> Result<(), SessionError> {
        debug!("TX {}", command);
        self.write(&command.to_bytes())
    }

    fn lock(&self) -> MutexGuard<'_, Option<Box<dyn Transport>>> {
        self.transport.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for SerialChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialChannel")
            .field("open", &self.is_open())
            .field("running", &self.is_running())
            .field("poll_interval", &self.poll_interval)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serial::mock::ScriptedDevice;

    const POLL: Duration = Duration::from_millis(1);

    fn open_channel(device: ScriptedDevice) -> SerialChannel {
        let channel = SerialChannel::new(POLL);
        let mut device = Some(device);
        let opened = channel.open_with(
            move || {
                device
                    .take()
                    .map(|d| Box::new(d) as Box<dyn Transport>)
                    .ok_or_else(|| anyhow::anyhow!("already opened"))
            },
            Duration::ZERO,
            Duration::from_secs(1),
        );
        assert!(opened);
        channel
    }

    #[test]
    fn test_open_retries_until_port_appears() {
        let channel = SerialChannel::new(POLL);
        let mut attempts = 0;
        let opened = channel.open_with(
            || {
                attempts += 1;
                if attempts < 3 {
                    anyhow::bail!("port busy");
                }
                Ok(Box::new(ScriptedDevice::new()) as Box<dyn Transport>)
            },
            Duration::ZERO,
            Duration::from_secs(5),
        );

        assert!(opened);
        assert_eq!(attempts, 3);
        assert!(channel.is_open());
        assert!(channel.is_running());
    }

    #[test]
    fn test_open_reports_failure_on_timeout() {
        let channel = SerialChannel::new(POLL);
        let opened = channel.open_with(
            || anyhow::bail!("no such device"),
            Duration::ZERO,
            Duration::from_millis(20),
        );

        assert!(!opened);
        assert!(!channel.is_open());
        assert!(!channel.is_running());
    }

    #[test]
    fn test_open_discards_stale_input() {
        let channel = open_channel(ScriptedDevice::new().preload("<LOG:stale>"));
        channel.send(&Command::CalPoint).unwrap();

        let deadline = Instant::now() + Duration::from_millis(20);
        assert!(matches!(
            channel.read_message(Some(deadline)),
            Err(SessionError::Timeout)
        ));
    }

    #[test]
    fn test_request_response() {
        let device = ScriptedDevice::new().reply("noise<PT:10:20:0>");
        let sent = device.sent_frames();
        let channel = open_channel(device);

        channel.send(&Command::CalPoint).unwrap();
        let message = channel.read_message(None).unwrap();

        assert_eq!(message.touch_point(), Some(crate::protocol::TouchPoint::new(10, 20)));
        assert_eq!(sent.get(), vec!["<CAL_POINT>"]);
    }

    #[test]
    fn test_malformed_frame_is_parse_error() {
        let channel = open_channel(ScriptedDevice::new().reply("<A:1:2>"));
        channel.send(&Command::CalPoint).unwrap();
        assert!(matches!(
            channel.read_message(None),
            Err(SessionError::MessageParse(_))
        ));
    }

    #[test]
    fn test_close_unblocks_reader() {
        let channel = open_channel(ScriptedDevice::new());
        let reader = channel.clone();
        let handle = thread::spawn(move || reader.read_message(None));

        thread::sleep(Duration::from_millis(20));
        channel.close();

        let result = handle.join().unwrap();
        assert!(matches!(result, Err(SessionError::StreamClosed)));
        assert!(!channel.is_open());
    }

    #[test]
    fn test_read_after_close_returns_immediately() {
        let channel = open_channel(ScriptedDevice::new());
        channel.close();
        channel.close();

        let started = Instant::now();
        assert!(matches!(channel.read_byte(None), Err(SessionError::StreamClosed)));
        assert!(started.elapsed() < Duration::from_millis(100));
        assert!(matches!(
            channel.send(&Command::Error),
            Err(SessionError::StreamClosed)
        ));
    }

    #[test]
    fn test_end_of_stream_is_closed() {
        let channel = open_channel(ScriptedDevice::new().hang_up());
        assert!(matches!(channel.read_byte(None), Err(SessionError::StreamClosed)));
    }
}
