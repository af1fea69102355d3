use crate::answers::{Measurement, RPLIDAR_RESP_MEASUREMENT_QUALITY_SHIFT};
use std::cmp::Ordering;
use std::f32::consts::PI;

/// Sync bit of [`ScanPoint::flag`], set on the first point of a revolution.
pub const SCAN_POINT_FLAG_SYNCBIT: u8 = 0x1;

/// Converts an angle in degrees × 64 to the Q14 representation of [`ScanPoint`].
#[inline]
pub fn angle_q6_to_angle_z_q14(angle_q6: u32) -> u16 {
    ((angle_q6 << 8) / 90) as u16
}

/// Represents a single measurement point from a laser scan, the unit the map layer consumes.
///
/// Contains angle, distance, quality, and sync flag information.
/// The internal representation uses fixed-point values.
/// Use the provided methods (`angle()`, `distance()`, etc.) for floating-point access.
#[derive(Debug, Clone, Copy, Default, Eq)]
pub struct ScanPoint {
    /// Angle in Q14 fixed-point, a quarter turn being `1 << 14`.
    pub angle_z_q14: u16,
    /// Distance in millimeters, Q2 fixed-point.
    pub dist_mm_q2: u32,
    /// Quality indicator (0-255). A value of 0 indicates an invalid measurement.
    pub quality: u8,
    /// Bit 0 marks the first point of a revolution.
    pub flag: u8,
}

impl ScanPoint {
    /// Returns the angle of the scan point in radians (0 to 2*PI).
    #[inline]
    pub fn angle(&self) -> f32 {
        (self.angle_z_q14 as f32) / 16384f32 / 2f32 * PI
    }

    #[inline]
    pub fn angle_degrees(&self) -> f32 {
        (self.angle_z_q14 as f32) * 90f32 / 16384f32
    }

    /// Returns the distance of the scan point in meters.
    #[inline]
    pub fn distance(&self) -> f32 {
        (self.dist_mm_q2 as f32) / 4000f32
    }

    /// Returns `true` if this point starts a new 360-degree revolution.
    #[inline]
    pub fn is_sync(&self) -> bool {
        (self.flag & SCAN_POINT_FLAG_SYNCBIT) == SCAN_POINT_FLAG_SYNCBIT
    }

    /// Returns `true` if the point has non-zero quality and distance.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.quality != 0 && self.dist_mm_q2 != 0
    }
}

impl From<&Measurement> for ScanPoint {
    fn from(m: &Measurement) -> ScanPoint {
        ScanPoint {
            angle_z_q14: angle_q6_to_angle_z_q14(m.angle_q6 as u32),
            dist_mm_q2: m.distance_q2 as u32,
            quality: m.quality << RPLIDAR_RESP_MEASUREMENT_QUALITY_SHIFT,
            flag: if m.is_revolution_start() {
                SCAN_POINT_FLAG_SYNCBIT
            } else {
                0
            },
        }
    }
}

impl Ord for ScanPoint {
    /// Orders points by angle only.
    fn cmp(&self, other: &ScanPoint) -> Ordering {
        self.angle_z_q14.cmp(&other.angle_z_q14)
    }
}

impl PartialOrd for ScanPoint {
    fn partial_cmp(&self, other: &ScanPoint) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for ScanPoint {
    fn eq(&self, other: &ScanPoint) -> bool {
        self.angle_z_q14 == other.angle_z_q14
            && self.dist_mm_q2 == other.dist_mm_q2
            && self.quality == other.quality
            && self.flag == other.flag
    }
}

/// Represents the health status reported by the RPLIDAR device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    /// The device reports it is operating correctly.
    Healthy,
    /// The device reports a warning condition, but may still be operational. Contains the warning code.
    Warning(u16),
    /// The device reports a fatal error and is likely not operational. Contains the error code.
    Error(u16),
}
