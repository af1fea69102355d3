//! Converts dense capsuled measurement frames (0x85) into scan points.

use crate::answers::{DenseMeasurement, DENSE_CABIN_COUNT, RPLIDAR_RESP_MEASUREMENT_QUALITY_SHIFT};
use crate::types::{angle_q6_to_angle_z_q14, ScanPoint, SCAN_POINT_FLAG_SYNCBIT};
use log::trace;

const ANGLE_360_Q8: u32 = 360u32 << 8;
const ANGLE_360_Q16: u32 = 360u32 << 16;

/// Quality reported for every dense point with a return; the frame carries none.
const DENSE_QUALITY: u8 = 0x2F << RPLIDAR_RESP_MEASUREMENT_QUALITY_SHIFT;

/// Start angle in Q8, folded into one turn.
#[inline]
fn start_angle_q8(frame: &DenseMeasurement) -> u32 {
    ((frame.start_angle_q6 as u32) << 2) % ANGLE_360_Q8
}

#[inline]
fn angle_diff_q8(prev_q8: u32, cur_q8: u32) -> u32 {
    if prev_q8 > cur_q8 {
        ANGLE_360_Q8 + cur_q8 - prev_q8
    } else {
        cur_q8 - prev_q8
    }
}

/// Whether the point at `cur_angle_q16` is the first one past 0 degrees.
/// Reports only the rising edge, so a wrap is flagged once.
#[inline]
fn check_dense_sync(cur_angle_q16: u32, angle_inc_q16: u32, last_sync_bit: &mut bool) -> bool {
    let crossing = ((cur_angle_q16 + angle_inc_q16) % ANGLE_360_Q16) < (angle_inc_q16 << 1);
    let sync = crossing && !*last_sync_bit;
    *last_sync_bit = sync;
    sync
}

/// Turns a stream of dense frames into scan points.
///
/// A frame only carries its own start angle, so its points are placed once the
/// following frame arrives: each call to [`DenseScanDecoder::push`] returns the
/// points of the previous frame, spread evenly up to the new start angle.
#[derive(Debug, Clone, Default)]
pub struct DenseScanDecoder {
    prev: Option<DenseMeasurement>,
}

impl DenseScanDecoder {
    pub fn new() -> DenseScanDecoder {
        DenseScanDecoder { prev: None }
    }

    /// Forgets the cached frame.
    pub fn reset(&mut self) {
        self.prev = None;
    }

    /// Feeds the next frame. Returns the 40 points of the previously fed frame,
    /// or `None` when nothing was cached or `frame` starts a new sequence.
    pub fn push(&mut self, frame: &DenseMeasurement) -> Option<[ScanPoint; DENSE_CABIN_COUNT]> {
        if frame.start {
            trace!("Dense frame starts a new sequence, cache reset");
            self.prev = Some(*frame);
            return None;
        }

        let prev = self.prev.replace(*frame)?;
        let prev_q8 = start_angle_q8(&prev);
        let diff_angle_q8 = angle_diff_q8(prev_q8, start_angle_q8(frame));
        let angle_inc_q16 = (diff_angle_q8 << 8) / DENSE_CABIN_COUNT as u32;
        let mut cur_angle_raw_q16 = prev_q8 << 8;
        let mut last_sync_bit = false;
        trace!(
            "Dense frame: start Q8 {} -> {}, increment Q16 {}",
            prev_q8,
            start_angle_q8(frame),
            angle_inc_q16
        );

        let mut points = [ScanPoint::default(); DENSE_CABIN_COUNT];
        for (point, distance) in points.iter_mut().zip(prev.distances.iter()) {
            let dist_q2 = (*distance as u32) << 2;
            let angle_q6 = (cur_angle_raw_q16 % ANGLE_360_Q16) >> 10;
            let sync = check_dense_sync(cur_angle_raw_q16, angle_inc_q16, &mut last_sync_bit);

            *point = ScanPoint {
                angle_z_q14: angle_q6_to_angle_z_q14(angle_q6),
                dist_mm_q2: dist_q2,
                quality: if dist_q2 != 0 { DENSE_QUALITY } else { 0 },
                flag: if sync { SCAN_POINT_FLAG_SYNCBIT } else { 0 },
            };
            cur_angle_raw_q16 += angle_inc_q16;
        }
        Some(points)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(start_deg: u16, start: bool, distance: u16) -> DenseMeasurement {
        DenseMeasurement::new(start_deg * 64, start, [distance; DENSE_CABIN_COUNT])
    }

    #[test]
    fn first_frame_yields_nothing() {
        let mut decoder = DenseScanDecoder::new();
        assert!(decoder.push(&frame(0, false, 1000)).is_none());
    }

    #[test]
    fn points_interpolate_between_start_angles() {
        let mut decoder = DenseScanDecoder::new();
        decoder.push(&frame(10, true, 1000));
        let points = decoder.push(&frame(50, false, 2000)).unwrap();

        assert_eq!(points.len(), 40);
        assert!((points[0].angle_degrees() - 10.0).abs() < 0.01);
        assert!((points[20].angle_degrees() - 30.0).abs() < 0.01);
        assert!((points[39].angle_degrees() - 49.0).abs() < 0.01);
        assert!(points.windows(2).all(|w| w[0] < w[1]));
        assert!(points.iter().all(|p| p.dist_mm_q2 == 4000 && p.quality == DENSE_QUALITY));
        assert!(points.iter().all(|p| !p.is_sync()));
    }

    #[test]
    fn wrap_past_zero_flags_one_sync_point() {
        let mut decoder = DenseScanDecoder::new();
        decoder.push(&frame(350, false, 0));
        let points = decoder.push(&frame(10, false, 0)).unwrap();

        assert_eq!(points.iter().filter(|p| p.is_sync()).count(), 1);
        assert!(points.iter().all(|p| !p.is_valid()));
        assert!(points.iter().all(|p| p.angle_degrees() < 360.0));
    }

    #[test]
    fn start_angle_past_full_turn_is_folded() {
        let mut decoder = DenseScanDecoder::new();
        decoder.push(&DenseMeasurement::new(0x7FFF, false, [1000; DENSE_CABIN_COUNT]));
        let points = decoder.push(&frame(0, false, 1000)).unwrap();
        assert!(points.iter().all(|p| p.angle_degrees() < 360.0));
        assert!((points[0].angle_degrees() - 151.98).abs() < 0.05);
    }

    #[test]
    fn start_flag_resets_cache() {
        let mut decoder = DenseScanDecoder::new();
        decoder.push(&frame(10, false, 1000));
        assert!(decoder.push(&frame(20, true, 1000)).is_none());
        let points = decoder.push(&frame(30, false, 1000)).unwrap();
        assert!((points[0].angle_degrees() - 20.0).abs() < 0.01);

        decoder.reset();
        assert!(decoder.push(&frame(40, false, 1000)).is_none());
    }
}
