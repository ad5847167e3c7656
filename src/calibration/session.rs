//! Calibration sequence run against the device
//!
//! A session drives one request/response exchange at a time over the
//! [`SerialChannel`]: three calibration touches, resistance sampling,
//! coefficient upload and rotation. Progress is reported through
//! [`SessionEvent`]s in the order the phases complete.

use log::{debug, info, warn};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Instant;

use super::geometry::ReferenceGeometry;
use super::solver::{solve, Coefficients};
use super::state::{FailureReason, Phase, ResistanceRange, SessionEvent};
use crate::config::CalibrationConfig;
use crate::error::SessionError;
use crate::protocol::{Command, ProtocolMessage, TouchPoint};
use crate::serial::SerialChannel;

/// Number of calibration touches
pub const POINT_COUNT: usize = 3;

/// Letter of the pressure threshold constant, sent after the coefficients
pub const PRESSURE_THRESHOLD_LETTER: char = 'M';

/// State of one calibration or rotation sequence
///
/// Owned by the worker thread that runs it; the caller only observes the
/// phase and the events.
pub struct CalibrationSession {
    channel: SerialChannel,
    config: CalibrationConfig,
    events: Sender<SessionEvent>,
    phase: Arc<Mutex<Phase>>,
    points: [Option<TouchPoint>; POINT_COUNT],
    resistance: ResistanceRange,
    coefficients: Option<Coefficients>,
}

impl CalibrationSession {
    pub fn new(
        channel: SerialChannel,
        config: CalibrationConfig,
        events: Sender<SessionEvent>,
    ) -> Self {
        let phase = if channel.is_open() {
            Phase::Connected
        } else {
            Phase::Disconnected
        };
        Self::with_phase(channel, config, events, Arc::new(Mutex::new(phase)))
    }

    /// Create a session that publishes its phase to a shared cell
    pub(crate) fn with_phase(
        channel: SerialChannel,
        config: CalibrationConfig,
        events: Sender<SessionEvent>,
        phase: Arc<Mutex<Phase>>,
    ) -> Self {
        Self {
            channel,
            config,
            events,
            phase,
            points: [None; POINT_COUNT],
            resistance: ResistanceRange::default(),
            coefficients: None,
        }
    }

    pub fn phase(&self) -> Phase {
        *self.phase.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn points(&self) -> [Option<TouchPoint>; POINT_COUNT] {
        self.points
    }

    pub fn resistance(&self) -> ResistanceRange {
        self.resistance
    }

    pub fn coefficients(&self) -> Option<Coefficients> {
        self.coefficients
    }

    /// Run the full calibration sequence
    pub fn run(&mut self) -> Result<Coefficients, SessionError> {
        self.ensure_connected()?;

        let points = self.collect_points()?;
        let resistance = self.collect_pressure()?;
        let (coefficients, wire) = self.solve_coefficients(points)?;
        self.transmit(&wire, resistance)?;
        self.set_rotation()?;
        self.finish()?;

        Ok(coefficients)
    }

    /// Set the display rotation without calibrating
    pub fn run_rotation_only(&mut self) -> Result<(), SessionError> {
        self.ensure_connected()?;
        self.set_rotation()?;
        self.finish()
    }

    fn ensure_connected(&mut self) -> Result<(), SessionError> {
        if self.channel.is_open() && self.channel.is_running() {
            self.transition(Phase::Connected);
            Ok(())
        } else {
            self.notify(SessionEvent::CalibrationComplete(false));
            Err(self.fail(FailureReason::StreamClosed, SessionError::NotConnected))
        }
    }

    fn collect_points(&mut self) -> Result<[TouchPoint; POINT_COUNT], SessionError> {
        let mut collected = [TouchPoint::default(); POINT_COUNT];

        for (index, slot) in collected.iter_mut().enumerate() {
            self.transition(Phase::CollectingPoint(index));

            let result = self
                .channel
                .send(&Command::CalPoint)
                .and_then(|_| self.read_point());

            match result {
                Ok(point) => {
                    info!("Point {} received: x={} y={}", index, point.x, point.y);
                    *slot = point;
                    self.points[index] = Some(point);
                    self.notify(SessionEvent::PointReceived {
                        success: true,
                        next_index: index + 1,
                    });
                    // Give the UI time to move the target
                    thread::sleep(self.config.timing.point_settle());
                }
                Err(e) => {
                    self.notify(SessionEvent::PointReceived {
                        success: false,
                        next_index: index,
                    });
                    return Err(self.fail(FailureReason::PointParseError, e));
                }
            }
        }

        Ok(collected)
    }

    fn read_point(&mut self) -> Result<TouchPoint, SessionError> {
        loop {
            let message = self.channel.read_message(None)?;
            if message.is_log() {
                self.device_log(&message);
                continue;
            }
            return message
                .touch_point()
                .ok_or_else(|| SessionError::ProtocolRejection {
                    command: Command::CalPoint.to_string(),
                    response: message.to_string(),
                });
        }
    }

    fn collect_pressure(&mut self) -> Result<ResistanceRange, SessionError> {
        self.transition(Phase::CollectingPressure);

        let result = self
            .channel
            .send(&Command::CalPressure)
            .and_then(|_| self.sample_resistance());

        match result {
            Ok(range) => {
                info!("Resistance range: {}..={}", range.min, range.max);
                self.resistance = range;
                self.notify(SessionEvent::PressureReceived(true));
                Ok(range)
            }
            Err(e) => {
                self.notify(SessionEvent::PressureReceived(false));
                Err(self.fail(FailureReason::PressureTimeoutOrParseError, e))
            }
        }
    }

    /// Track resistance samples until the device reports the finger lifted
    fn sample_resistance(&mut self) -> Result<ResistanceRange, SessionError> {
        let timeout = self.config.timing.pressure_timeout();
        let deadline = Instant::now() + timeout;
        let mut range = ResistanceRange::default();

        loop {
            let message = match self.channel.read_message(Some(deadline)) {
                Err(SessionError::Timeout) => return Err(SessionError::PressureTimeout(timeout)),
                other => other?,
            };

            if message.is_stop() {
                return if range.is_valid() {
                    Ok(range)
                } else {
                    Err(SessionError::NoPressureSamples)
                };
            }

            match message.touch_point() {
                Some(sample) => range.observe(sample.z),
                None if message.is_log() => self.device_log(&message),
                None => debug!("Ignoring {} during pressure sampling", message),
            }
        }
    }

    /// Solve the coefficients and convert them to wire values
    fn solve_coefficients(
        &mut self,
        points: [TouchPoint; POINT_COUNT],
    ) -> Result<(Coefficients, [Command; 6]), SessionError> {
        self.transition(Phase::Solving);

        let geometry = ReferenceGeometry::for_device(&self.config.device);
        let coefficients = solve(points, geometry.targets());
        info!("Coefficients: {}", coefficients);
        self.coefficients = Some(coefficients);

        match coefficients.quantize() {
            Ok(wire) => Ok((coefficients, wire)),
            Err(e) => {
                self.notify(SessionEvent::CalibrationComplete(false));
                Err(self.fail(FailureReason::DegenerateCalibration, e))
            }
        }
    }

    fn transmit(
        &mut self,
        wire: &[Command; 6],
        resistance: ResistanceRange,
    ) -> Result<(), SessionError> {
        self.transition(Phase::TransmittingCoefficients);

        let threshold = Command::SetConstant {
            letter: PRESSURE_THRESHOLD_LETTER,
            value: i64::from(resistance.min),
        };

        for command in wire.iter().copied().chain([threshold]) {
            if let Err(e) = self.send_constant(command) {
                self.notify(SessionEvent::CalibrationComplete(false));
                return Err(self.fail(FailureReason::CoefficientRejected, e));
            }
        }

        Ok(())
    }

    fn send_constant(&mut self, command: Command) -> Result<(), SessionError> {
        self.channel.send(&command)?;

        let receipt = self.channel.read_message(None)?;
        if !receipt.is_ok() {
            warn!("Device rejected {}: {}", command, receipt);
            self.channel.send(&Command::Error)?;
            return Err(SessionError::ProtocolRejection {
                command: command.to_string(),
                response: receipt.to_string(),
            });
        }

        self.read_info_line()
    }

    fn set_rotation(&mut self) -> Result<(), SessionError> {
        self.transition(Phase::SettingRotation);

        if let Err(e) = self.exchange_rotation() {
            self.notify(SessionEvent::CalibrationComplete(false));
            return Err(self.fail(FailureReason::RotationFailed, e));
        }
        Ok(())
    }

    fn exchange_rotation(&mut self) -> Result<(), SessionError> {
        let command = Command::SetRotation(self.config.rotation);
        self.channel.send(&command)?;

        let receipt = self.channel.read_message(None)?;
        if receipt.is_ok() {
            self.read_info_line()
        } else {
            // A rejected rotation still counts as success upward
            warn!("Device rejected {}: {}", command, receipt);
            self.channel.send(&Command::Error)
        }
    }

    fn finish(&mut self) -> Result<(), SessionError> {
        if let Err(e) = self.channel.send(&Command::CalSuccess) {
            self.notify(SessionEvent::CalibrationComplete(false));
            return Err(self.fail(FailureReason::StreamClosed, e));
        }
        self.transition(Phase::Complete);
        self.notify(SessionEvent::CalibrationComplete(true));
        Ok(())
    }

    /// Read the informational line the device sends after an acknowledgment
    fn read_info_line(&mut self) -> Result<(), SessionError> {
        match self.channel.read_message(None) {
            Ok(message) => {
                self.device_log(&message);
                Ok(())
            }
            Err(SessionError::MessageParse(e)) => {
                warn!("Unreadable device log line: {}", e);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    fn device_log(&self, message: &ProtocolMessage) {
        let text = match message.description() {
            Some(description) => description.to_string(),
            None => message.to_string(),
        };
        info!("Device: {}", text);
        self.notify(SessionEvent::DeviceLog(text));
    }

    fn notify(&self, event: SessionEvent) {
        debug!("Event: {:?}", event);
        // The caller may have stopped listening; the sequence still runs to completion
        let _ = self.events.send(event);
    }

    fn transition(&mut self, next: Phase) {
        let mut phase = self.phase.lock().unwrap_or_else(PoisonError::into_inner);
        debug!("Phase: {} -> {}", *phase, next);
        *phase = next;
    }

    fn fail(&mut self, reason: FailureReason, error: SessionError) -> SessionError {
        let reason = if error.is_closed() {
            FailureReason::StreamClosed
        } else {
            reason
        };
        warn!("Calibration failed while {}: {}", self.phase(), error);
        self.transition(Phase::Failed(reason));
        error
    }
}
