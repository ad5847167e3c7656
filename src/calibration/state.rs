//! Session phases, notifications and the resistance range

use std::fmt;

/// Resistance reading that any real sample undercuts
pub const RESISTANCE_MIN_SENTINEL: i32 = 65535;

/// Where a calibration or rotation sequence currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    /// Waiting for touch `0..3`
    CollectingPoint(usize),
    CollectingPressure,
    Solving,
    TransmittingCoefficients,
    SettingRotation,
    Complete,
    Failed(FailureReason),
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Disconnected => write!(f, "disconnected"),
            Phase::Connecting => write!(f, "connecting"),
            Phase::Connected => write!(f, "connected"),
            Phase::CollectingPoint(index) => write!(f, "collecting point {}", index + 1),
            Phase::CollectingPressure => write!(f, "collecting pressure"),
            Phase::Solving => write!(f, "solving"),
            Phase::TransmittingCoefficients => write!(f, "transmitting coefficients"),
            Phase::SettingRotation => write!(f, "setting rotation"),
            Phase::Complete => write!(f, "complete"),
            Phase::Failed(reason) => write!(f, "failed ({})", reason),
        }
    }
}

/// Why a sequence ended in [`Phase::Failed`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureReason {
    ConnectTimeout,
    PointParseError,
    PressureTimeoutOrParseError,
    DegenerateCalibration,
    CoefficientRejected,
    RotationFailed,
    /// The channel was closed or hit end of stream mid-sequence
    StreamClosed,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            FailureReason::ConnectTimeout => "connect timeout",
            FailureReason::PointParseError => "point parse error",
            FailureReason::PressureTimeoutOrParseError => "pressure timeout or parse error",
            FailureReason::DegenerateCalibration => "degenerate calibration",
            FailureReason::CoefficientRejected => "coefficient rejected",
            FailureReason::RotationFailed => "rotation failed",
            FailureReason::StreamClosed => "stream closed",
        };
        f.write_str(text)
    }
}

/// Progress notifications delivered to the caller, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Connected(bool),
    /// On success `next_index` is the number of points collected so far;
    /// on failure it is the index of the point that failed
    PointReceived { success: bool, next_index: usize },
    PressureReceived(bool),
    CalibrationComplete(bool),
    /// Free-text line reported by the device firmware
    DeviceLog(String),
}

impl SessionEvent {
    /// A `false` outcome on any phase ends the sequence
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            SessionEvent::Connected(false)
                | SessionEvent::PointReceived { success: false, .. }
                | SessionEvent::PressureReceived(false)
                | SessionEvent::CalibrationComplete(false)
        )
    }
}

/// Running minimum and maximum of the resistance samples
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResistanceRange {
    pub min: i32,
    pub max: i32,
}

impl Default for ResistanceRange {
    fn default() -> Self {
        Self {
            min: RESISTANCE_MIN_SENTINEL,
            max: 0,
        }
    }
}

impl ResistanceRange {
    pub fn observe(&mut self, resistance: i32) {
        self.min = self.min.min(resistance);
        self.max = self.max.max(resistance);
    }

    /// False until at least one sample has been observed
    pub fn is_valid(&self) -> bool {
        self.min <= self.max
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resistance_tracking() {
        let mut range = ResistanceRange::default();
        assert!(!range.is_valid());

        for z in [300, 150, 900, 150] {
            range.observe(z);
        }
        assert_eq!(range, ResistanceRange { min: 150, max: 900 });
        assert!(range.is_valid());
    }

    #[test]
    fn test_single_sample_range() {
        let mut range = ResistanceRange::default();
        range.observe(0);
        assert_eq!(range, ResistanceRange { min: 0, max: 0 });
        assert!(range.is_valid());
    }

    #[test]
    fn test_failure_events() {
        assert!(SessionEvent::PointReceived {
            success: false,
            next_index: 1
        }
        .is_failure());
        assert!(!SessionEvent::PressureReceived(true).is_failure());
        assert!(!SessionEvent::DeviceLog("ready".to_string()).is_failure());
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(Phase::CollectingPoint(0).to_string(), "collecting point 1");
        assert_eq!(
            Phase::Failed(FailureReason::CoefficientRejected).to_string(),
            "failed (coefficient rejected)"
        );
        assert_eq!(Phase::Complete.to_string(), "complete");
    }
}
