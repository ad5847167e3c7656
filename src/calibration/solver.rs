//! Three-point affine calibration
//!
//! Solves for the map
//!
//! ```text
//! device_x = A * sensor_x + B * sensor_y + C
//! device_y = D * sensor_x + E * sensor_y + F
//! ```
//!
//! that sends each of three sensor touches onto its display target.

use std::fmt;

use crate::error::SessionError;
use crate::protocol::{Command, TouchPoint};

/// Affine calibration coefficients
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coefficients {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl Coefficients {
    /// Coefficients paired with their wire letters, in upload order
    pub fn values(&self) -> [(char, f64); 6] {
        [
            ('A', self.a),
            ('B', self.b),
            ('C', self.c),
            ('D', self.d),
            ('E', self.e),
            ('F', self.f),
        ]
    }

    /// Constant commands carrying the fixed-point values (`round(value * 10000)`)
    ///
    /// Fails on the first coefficient that is not finite or overflows the
    /// device's integer, which is how degenerate touches show up.
    pub fn quantize(&self) -> Result<[Command; 6], SessionError> {
        let mut wire = [Command::Error; 6];
        for (slot, (letter, value)) in wire.iter_mut().zip(self.values()) {
            *slot = Command::fixed_point(letter, value)
                .ok_or(SessionError::DegenerateCalibration(letter))?;
        }
        Ok(wire)
    }

    /// Map a sensor point to display coordinates
    pub fn map(&self, sensor: TouchPoint) -> TouchPoint {
        let x = f64::from(sensor.x);
        let y = f64::from(sensor.y);
        TouchPoint::with_z(
            (self.a * x + self.b * y + self.c).round() as i32,
            (self.d * x + self.e * y + self.f).round() as i32,
            sensor.z,
        )
    }
}

impl fmt::Display for Coefficients {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "A={:.6} B={:.6} C={:.6} D={:.6} E={:.6} F={:.6}",
            self.a, self.b, self.c, self.d, self.e, self.f
        )
    }
}

/// Solve the affine map taking `sensor[i]` onto `device[i]`
///
/// No guard against degenerate input: collinear sensor points, or
/// `sensor[1].y == sensor[2].y`, produce non-finite coefficients.
pub fn solve(sensor: [TouchPoint; 3], device: [TouchPoint; 3]) -> Coefficients {
    let [t1, t2, t3] = sensor.map(|p| (f64::from(p.x), f64::from(p.y)));
    let [d1, d2, d3] = device.map(|p| (f64::from(p.x), f64::from(p.y)));

    let denom = t1.0 * (t2.1 - t3.1) + t2.0 * (t3.1 - t1.1) + t3.0 * (t1.1 - t2.1);

    let a = (d1.0 * (t2.1 - t3.1) + d2.0 * (t3.1 - t1.1) + d3.0 * (t1.1 - t2.1)) / denom;
    let b = (a * (t3.0 - t2.0) + d2.0 - d3.0) / (t2.1 - t3.1);
    let c = d3.0 - a * t3.0 - b * t3.1;

    let d = (d1.1 * (t2.1 - t3.1) + d2.1 * (t3.1 - t1.1) + d3.1 * (t1.1 - t2.1)) / denom;
    let e = (d * (t3.0 - t2.0) + d2.1 - d3.1) / (t2.1 - t3.1);
    let f = d3.1 - d * t3.0 - e * t3.1;

    Coefficients { a, b, c, d, e, f }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::ReferenceGeometry;

    const TOLERANCE: f64 = 1e-9;

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < TOLERANCE,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn test_identity_mapping() {
        let targets = ReferenceGeometry::hid().targets();
        let coefficients = solve(targets, targets);

        assert_close(coefficients.a, 1.0);
        assert_close(coefficients.b, 0.0);
        assert_close(coefficients.c, 0.0);
        assert_close(coefficients.d, 0.0);
        assert_close(coefficients.e, 1.0);
        assert_close(coefficients.f, 0.0);
    }

    #[test]
    fn test_scaling_sensor_points() {
        let targets = ReferenceGeometry::hid().targets();
        let raw = [
            TouchPoint::new(812, 455),
            TouchPoint::new(498, 790),
            TouchPoint::new(140, 122),
        ];
        let k = 4;
        let scaled = raw.map(|p| TouchPoint::new(p.x * k, p.y * k));

        let base = solve(raw, targets);
        let result = solve(scaled, targets);
        let k = f64::from(k);

        assert_close(result.a, base.a / k);
        assert_close(result.b, base.b / k);
        assert_close(result.d, base.d / k);
        assert_close(result.e, base.e / k);
        assert!((result.c - base.c).abs() < 1e-6);
        assert!((result.f - base.f).abs() < 1e-6);
    }

    #[test]
    fn test_recovers_known_transform() {
        // Sensor axes swapped, scaled and offset relative to the display
        let truth = Coefficients {
            a: 0.0,
            b: 9.5,
            c: -240.0,
            d: -11.25,
            e: 0.0,
            f: 10800.0,
        };
        let sensor = [
            TouchPoint::new(400, 980),
            TouchPoint::new(80, 560),
            TouchPoint::new(872, 130),
        ];
        let device = sensor.map(|p| truth.map(p));

        let solved = solve(sensor, device);
        for ((_, expected), (_, actual)) in truth.values().iter().zip(solved.values()) {
            assert!((expected - actual).abs() < 1e-6, "{expected} vs {actual}");
        }
        for (s, d) in sensor.iter().zip(device) {
            assert_eq!(solved.map(*s), d);
        }
    }

    #[test]
    fn test_pixel_targets_from_raw_touches() {
        let geometry = ReferenceGeometry::pixels(800, 480);
        let sensor = [
            TouchPoint::new(3510, 2080),
            TouchPoint::new(2050, 3590),
            TouchPoint::new(560, 560),
        ];

        let coefficients = solve(sensor, geometry.targets());
        assert!(coefficients.quantize().is_ok());
        for (s, target) in sensor.iter().zip(geometry.targets()) {
            assert_eq!(coefficients.map(*s), target);
        }
    }

    #[test]
    fn test_collinear_points_are_not_finite() {
        let sensor = [
            TouchPoint::new(100, 100),
            TouchPoint::new(200, 200),
            TouchPoint::new(300, 300),
        ];
        let coefficients = solve(sensor, ReferenceGeometry::hid().targets());

        assert!(!coefficients.a.is_finite());
        assert!(matches!(
            coefficients.quantize(),
            Err(SessionError::DegenerateCalibration('A'))
        ));
    }

    #[test]
    fn test_equal_y_on_last_two_points_is_not_finite() {
        let sensor = [
            TouchPoint::new(0, 0),
            TouchPoint::new(100, 500),
            TouchPoint::new(300, 500),
        ];
        let coefficients = solve(sensor, ReferenceGeometry::hid().targets());

        assert!(coefficients.a.is_finite());
        assert!(!coefficients.b.is_finite());
        assert!(matches!(
            coefficients.quantize(),
            Err(SessionError::DegenerateCalibration('B'))
        ));
    }

    #[test]
    fn test_quantize() {
        let coefficients = Coefficients {
            a: 1.23456,
            b: -0.00004,
            c: 250.5,
            d: 0.0,
            e: 1.0,
            f: -3.0,
        };

        let frames: Vec<String> = coefficients
            .quantize()
            .unwrap()
            .iter()
            .map(Command::encode)
            .collect();
        assert_eq!(
            frames,
            [
                "<$A:12346>",
                "<$B:0>",
                "<$C:2505000>",
                "<$D:0>",
                "<$E:10000>",
                "<$F:-30000>",
            ]
        );
    }
}
