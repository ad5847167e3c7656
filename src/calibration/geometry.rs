//! Display-space positions of the three calibration targets

use crate::config::DeviceClass;
use crate::protocol::TouchPoint;

/// Full-scale value of both HID axes
pub const HID_AXIS_MAX: i32 = 10_000;

/// Fraction of each axis kept as margin between the targets and the edge
const TARGET_MARGIN: f64 = 0.1;

/// Where the right-center, bottom-center and top-left targets are drawn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReferenceGeometry {
    pub right_center: TouchPoint,
    pub bottom_center: TouchPoint,
    pub top_left: TouchPoint,
}

impl ReferenceGeometry {
    pub fn for_device(device: &DeviceClass) -> Self {
        match *device {
            DeviceClass::Hid => Self::hid(),
            DeviceClass::Uinput { width, height } => Self::pixels(width, height),
        }
    }

    /// Fixed targets on the 0..=10000 HID axes
    pub fn hid() -> Self {
        Self {
            right_center: TouchPoint::new(9000, 5000),
            bottom_center: TouchPoint::new(5000, 9000),
            top_left: TouchPoint::new(1000, 1000),
        }
    }

    /// Targets inset 10% from the edges of a `width` x `height` display
    ///
    /// Pixel coordinates are zero-indexed, so every value is one less than
    /// the plain proportion.
    pub fn pixels(width: u32, height: u32) -> Self {
        let x_max = i32::try_from(width).unwrap_or(i32::MAX);
        let y_max = i32::try_from(height).unwrap_or(i32::MAX);
        let x_offset = (TARGET_MARGIN * f64::from(x_max)).round() as i32;
        let y_offset = (TARGET_MARGIN * f64::from(y_max)).round() as i32;

        Self {
            right_center: TouchPoint::new(x_max - x_offset - 1, y_max / 2 - 1),
            bottom_center: TouchPoint::new(x_max / 2 - 1, y_max - y_offset - 1),
            top_left: TouchPoint::new(x_offset - 1, y_offset - 1),
        }
    }

    /// Targets in the order they are presented to the user
    pub fn targets(&self) -> [TouchPoint; 3] {
        [self.right_center, self.bottom_center, self.top_left]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hid_targets() {
        let geometry = ReferenceGeometry::for_device(&DeviceClass::Hid);
        assert_eq!(
            geometry.targets(),
            [
                TouchPoint::new(9000, 5000),
                TouchPoint::new(5000, 9000),
                TouchPoint::new(1000, 1000),
            ]
        );
        assert!(geometry.targets().iter().all(|p| p.x < HID_AXIS_MAX && p.y < HID_AXIS_MAX));
    }

    #[test]
    fn test_pixel_targets() {
        let geometry = ReferenceGeometry::for_device(&DeviceClass::Uinput {
            width: 1280,
            height: 800,
        });
        assert_eq!(geometry.right_center, TouchPoint::new(1151, 399));
        assert_eq!(geometry.bottom_center, TouchPoint::new(639, 719));
        assert_eq!(geometry.top_left, TouchPoint::new(127, 79));
    }

    #[test]
    fn test_pixel_targets_odd_resolution() {
        let geometry = ReferenceGeometry::pixels(1366, 767);
        // offsets round 136.6 -> 137 and 76.7 -> 77
        assert_eq!(geometry.right_center, TouchPoint::new(1228, 382));
        assert_eq!(geometry.bottom_center, TouchPoint::new(682, 689));
        assert_eq!(geometry.top_left, TouchPoint::new(136, 76));
    }
}
