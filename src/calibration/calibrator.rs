//! Caller-facing handle that runs connection and calibration in the background

use log::{debug, error, info, warn};
use std::io;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use super::session::CalibrationSession;
use super::solver::Coefficients;
use super::state::{FailureReason, Phase, SessionEvent};
use crate::config::CalibrationConfig;
use crate::error::SessionError;
use crate::serial::{SerialChannel, Transport};

/// Opens a fresh transport to the device; called once per connection attempt
pub type Opener = Box<dyn FnMut() -> anyhow::Result<Box<dyn Transport>> + Send>;

/// Result of a background sequence: the solved coefficients for a full
/// calibration, `None` for a rotation-only run
pub type SessionOutcome = Result<Option<Coefficients>, SessionError>;

/// Drives one device through connect, calibrate and disconnect
///
/// Every blocking step runs on its own thread. Progress arrives on the
/// [`SessionEvent`] receiver returned by [`Calibrator::new`]. Dropping the
/// calibrator disconnects and unblocks any running sequence.
pub struct Calibrator {
    config: CalibrationConfig,
    channel: SerialChannel,
    opener: Arc<Mutex<Opener>>,
    events: Sender<SessionEvent>,
    phase: Arc<Mutex<Phase>>,
    connector: Option<JoinHandle<bool>>,
    worker: Option<JoinHandle<SessionOutcome>>,
}

impl Calibrator {
    pub fn new<F>(config: CalibrationConfig, opener: F) -> (Self, Receiver<SessionEvent>)
    where
        F: FnMut() -> anyhow::Result<Box<dyn Transport>> + Send + 'static,
    {
        let (events, receiver) = mpsc::channel();
        let calibrator = Self {
            channel: SerialChannel::new(config.timing.poll_interval()),
            config,
            opener: Arc::new(Mutex::new(Box::new(opener))),
            events,
            phase: Arc::new(Mutex::new(Phase::Disconnected)),
            connector: None,
            worker: None,
        };
        (calibrator, receiver)
    }

    /// Calibrator talking to the serial port named in the config
    #[cfg(feature = "serial")]
    pub fn with_serial_port(config: CalibrationConfig) -> (Self, Receiver<SessionEvent>) {
        use crate::serial::{PortConfig, SerialConnection};

        let port_config =
            PortConfig::new(&config.port).with_timeout(config.timing.poll_interval());
        Self::new(config, move || {
            let connection = SerialConnection::open(port_config.clone())?;
            Ok(Box::new(connection) as Box<dyn Transport>)
        })
    }

    pub fn config(&self) -> &CalibrationConfig {
        &self.config
    }

    pub fn phase(&self) -> Phase {
        *self.phase.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_connected(&self) -> bool {
        self.channel.is_open() && self.channel.is_running()
    }

    /// True while a connection attempt or a sequence is still running
    pub fn is_busy(&self) -> bool {
        is_running(&self.connector) || is_running(&self.worker)
    }

    /// Open the port in the background
    ///
    /// Reports [`SessionEvent::Connected`] once the port opens or the open
    /// timeout expires.
    pub fn connect(&mut self) {
        if self.is_connected() {
            let _ = self.events.send(SessionEvent::Connected(true));
            return;
        }
        if is_running(&self.connector) {
            debug!("Connection attempt already in progress");
            return;
        }

        let channel = self.channel.clone();
        let opener = Arc::clone(&self.opener);
        let events = self.events.clone();
        let phase = Arc::clone(&self.phase);
        let timing = self.config.timing;
        let port = self.config.port.clone();

        set_phase(&phase, Phase::Connecting);
        self.connector = Some(thread::spawn(move || {
            info!("Connecting to {}", port);
            let connected = {
                let mut opener = opener.lock().unwrap_or_else(PoisonError::into_inner);
                channel.open_with(&mut *opener, timing.open_settle(), timing.open_timeout())
            };

            if connected {
                info!("Connected to {}", port);
                set_phase(&phase, Phase::Connected);
            } else {
                warn!("Could not open {}", port);
                set_phase(&phase, Phase::Failed(FailureReason::ConnectTimeout));
            }
            let _ = events.send(SessionEvent::Connected(connected));
            connected
        }));
    }

    /// Block until the pending connection attempt finishes
    pub fn wait_for_connection(&mut self) -> Result<(), SessionError> {
        let connected = match self.connector.take() {
            Some(handle) => handle.join().unwrap_or_else(|_| {
                error!("Connection thread panicked");
                false
            }),
            None => self.is_connected(),
        };

        if connected {
            Ok(())
        } else {
            Err(SessionError::ConnectTimeout(self.config.timing.open_timeout()))
        }
    }

    /// Start the full calibration sequence in the background
    ///
    /// Returns false when the device is not connected or another sequence
    /// is still running.
    pub fn start_calibration(&mut self) -> bool {
        self.spawn_session("calibration", |session| session.run().map(Some))
    }

    /// Only set the display rotation, then confirm with the device
    pub fn set_rotation_only(&mut self) -> bool {
        self.spawn_session("rotation", |session| session.run_rotation_only().map(|_| None))
    }

    fn spawn_session<F>(&mut self, name: &'static str, body: F) -> bool
    where
        F: FnOnce(&mut CalibrationSession) -> SessionOutcome + Send + 'static,
    {
        if !self.is_connected() {
            warn!("Cannot start {}: not connected", name);
            return false;
        }
        // The port is open, so the connection thread is only delivering its event
        if let Some(handle) = self.connector.take() {
            let _ = handle.join();
        }
        if self.is_busy() {
            warn!("Cannot start {}: device busy", name);
            return false;
        }
        if let Some(Err(e)) = self.wait() {
            debug!("Discarding previous outcome: {}", e);
        }

        let mut session = CalibrationSession::with_phase(
            self.channel.clone(),
            self.config.clone(),
            self.events.clone(),
            Arc::clone(&self.phase),
        );
        info!("Starting {}", name);
        self.worker = Some(thread::spawn(move || body(&mut session)));
        true
    }

    /// Block until the running sequence finishes and return its outcome
    ///
    /// `None` if no sequence was started since the last wait.
    pub fn wait(&mut self) -> Option<SessionOutcome> {
        let handle = self.worker.take()?;
        Some(handle.join().unwrap_or_else(|_| {
            error!("Calibration thread panicked");
            Err(SessionError::Io(io::Error::other("calibration thread panicked")))
        }))
    }

    /// Close the port and stop any running sequence
    ///
    /// A sequence blocked on the device ends with
    /// [`SessionError::StreamClosed`]; its outcome is returned.
    pub fn disconnect(&mut self) -> Option<SessionOutcome> {
        self.channel.close();
        if self.connector.is_some() {
            let _ = self.wait_for_connection();
            // The attempt may have opened the port after the close above
            self.channel.close();
        }
        let outcome = self.wait();
        set_phase(&self.phase, Phase::Disconnected);
        debug!("Disconnected from {}", self.config.port);
        outcome
    }
}

impl Drop for Calibrator {
    fn drop(&mut self) {
        self.disconnect();
    }
}

fn is_running<T>(handle: &Option<JoinHandle<T>>) -> bool {
    handle.as_ref().is_some_and(|h| !h.is_finished())
}

fn set_phase(phase: &Mutex<Phase>, next: Phase) {
    *phase.lock().unwrap_or_else(PoisonError::into_inner) = next;
}
