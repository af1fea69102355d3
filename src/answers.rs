//! Fixed-layout response records sent by the RPLIDAR, with explicit byte-level
//! decoding and encoding. Every multi-byte field is little-endian.

use crate::base::PayloadError;
use crate::checksum::xor_checksum;
use crate::internals::CONFIGURATION_PAYLOAD_MAX;
use crate::types::HealthStatus;
use byteorder::{ByteOrder, LittleEndian};
use std::fmt::Write as _;

/// Response type identifier for device information.
pub const RPLIDAR_ANS_TYPE_DEVINFO: u8 = 0x04;
/// Response type identifier for device health status.
pub const RPLIDAR_ANS_TYPE_DEVHEALTH: u8 = 0x06;
/// Response type identifier for the sample rate of the standard and express modes.
pub const RPLIDAR_ANS_TYPE_SAMPLE_RATE: u8 = 0x15;
/// Response type identifier for a configuration entry.
pub const RPLIDAR_ANS_TYPE_GET_LIDAR_CONF: u8 = 0x20;
/// Response type identifier for legacy measurement data (single point per frame).
pub const RPLIDAR_ANS_TYPE_MEASUREMENT: u8 = 0x81;
/// Response type identifier for dense capsuled measurement data (40 points per frame).
pub const RPLIDAR_ANS_TYPE_MEASUREMENT_DENSE_CAPSULED: u8 = 0x85;

/// Health status code indicating the LIDAR is operating correctly.
pub const RPLIDAR_HEALTH_STATUS_OK: u8 = 0;
/// Health status code indicating a non-critical warning.
pub const RPLIDAR_HEALTH_STATUS_WARNING: u8 = 1;

/// Bit shift for extracting the quality value from the first measurement byte.
pub const RPLIDAR_RESP_MEASUREMENT_QUALITY_SHIFT: usize = 2;
/// Bit shift for extracting the angle from the second measurement word.
pub const RPLIDAR_RESP_MEASUREMENT_ANGLE_SHIFT: usize = 1;
/// Expected upper nibble of the first byte of a dense frame.
pub const RPLIDAR_RESP_MEASUREMENT_EXP_SYNC_1: u8 = 0xA;
/// Expected upper nibble of the second byte of a dense frame.
pub const RPLIDAR_RESP_MEASUREMENT_EXP_SYNC_2: u8 = 0x5;

/// Number of distances carried by one dense frame.
pub const DENSE_CABIN_COUNT: usize = 40;

/// Exclusive upper bound of a dense frame's start angle, 360 degrees in Q6.
pub const DENSE_START_ANGLE_LIMIT_Q6: u16 = 360 * 64;

/// Kind of a response, as declared by the type byte of its descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResponseType {
    DeviceInfo,
    Health,
    SampleRate,
    Configuration,
    Measurement,
    DenseMeasurement,
    /// A type byte this driver does not understand.
    Unknown(u8),
}

impl ResponseType {
    /// Maps a descriptor type byte to its response type.
    pub fn from_tag(tag: u8) -> ResponseType {
        match tag {
            RPLIDAR_ANS_TYPE_DEVINFO => ResponseType::DeviceInfo,
            RPLIDAR_ANS_TYPE_DEVHEALTH => ResponseType::Health,
            RPLIDAR_ANS_TYPE_SAMPLE_RATE => ResponseType::SampleRate,
            RPLIDAR_ANS_TYPE_GET_LIDAR_CONF => ResponseType::Configuration,
            RPLIDAR_ANS_TYPE_MEASUREMENT => ResponseType::Measurement,
            RPLIDAR_ANS_TYPE_MEASUREMENT_DENSE_CAPSULED => ResponseType::DenseMeasurement,
            other => ResponseType::Unknown(other),
        }
    }

    /// The descriptor type byte of this response type.
    pub fn tag(self) -> u8 {
        match self {
            ResponseType::DeviceInfo => RPLIDAR_ANS_TYPE_DEVINFO,
            ResponseType::Health => RPLIDAR_ANS_TYPE_DEVHEALTH,
            ResponseType::SampleRate => RPLIDAR_ANS_TYPE_SAMPLE_RATE,
            ResponseType::Configuration => RPLIDAR_ANS_TYPE_GET_LIDAR_CONF,
            ResponseType::Measurement => RPLIDAR_ANS_TYPE_MEASUREMENT,
            ResponseType::DenseMeasurement => RPLIDAR_ANS_TYPE_MEASUREMENT_DENSE_CAPSULED,
            ResponseType::Unknown(tag) => tag,
        }
    }
}

fn check_size(response: ResponseType, expected: usize, buf: &[u8]) -> Result<(), PayloadError> {
    if buf.len() != expected {
        Err(PayloadError::LengthMismatch {
            response,
            expected,
            actual: buf.len(),
        })
    } else {
        Ok(())
    }
}

/// Data structure containing device information received from the RPLIDAR.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct DeviceInfo {
    /// Model family, upper nibble of the model byte.
    pub model_major: u8,
    /// Sub-model, lower nibble of the model byte.
    pub model_sub: u8,
    pub fw_minor: u8,
    pub fw_major: u8,
    /// Hardware revision.
    pub hardware: u8,
    /// 16-byte unique serial number.
    pub serial_number: [u8; 16],
}

impl DeviceInfo {
    /// Encoded size in bytes.
    pub const SIZE: usize = 20;

    pub fn decode(buf: &[u8]) -> Result<DeviceInfo, PayloadError> {
        check_size(ResponseType::DeviceInfo, Self::SIZE, buf)?;
        let mut serial_number = [0u8; 16];
        serial_number.copy_from_slice(&buf[4..20]);
        Ok(DeviceInfo {
            model_major: buf[0] >> 4,
            model_sub: buf[0] & 0x0F,
            fw_minor: buf[1],
            fw_major: buf[2],
            hardware: buf[3],
            serial_number,
        })
    }

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        buf[0] = (self.model_major << 4) | (self.model_sub & 0x0F);
        buf[1] = self.fw_minor;
        buf[2] = self.fw_major;
        buf[3] = self.hardware;
        buf[4..20].copy_from_slice(&self.serial_number);
        buf
    }

    /// Full model byte as reported by the sensor.
    pub fn model(&self) -> u8 {
        (self.model_major << 4) | (self.model_sub & 0x0F)
    }

    /// Firmware version as `major << 8 | minor`.
    pub fn firmware_version(&self) -> u16 {
        ((self.fw_major as u16) << 8) | self.fw_minor as u16
    }

    /// Serial number rendered as 32 uppercase hex digits.
    pub fn serial_number_hex(&self) -> String {
        let mut out = String::with_capacity(32);
        for b in self.serial_number.iter() {
            let _ = write!(out, "{:02X}", b);
        }
        out
    }
}

/// Data structure containing device health status received from the RPLIDAR.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct DeviceHealth {
    /// Health status code (0 good, 1 warning, 2 and above error).
    pub status: u8,
    /// Error code associated with the status.
    pub error_code: u16,
}

impl DeviceHealth {
    pub const SIZE: usize = 3;

    pub fn decode(buf: &[u8]) -> Result<DeviceHealth, PayloadError> {
        check_size(ResponseType::Health, Self::SIZE, buf)?;
        Ok(DeviceHealth {
            status: buf[0],
            error_code: LittleEndian::read_u16(&buf[1..3]),
        })
    }

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        buf[0] = self.status;
        LittleEndian::write_u16(&mut buf[1..3], self.error_code);
        buf
    }

    /// Classifies the raw status byte.
    pub fn status(&self) -> HealthStatus {
        match self.status {
            RPLIDAR_HEALTH_STATUS_OK => HealthStatus::Healthy,
            RPLIDAR_HEALTH_STATUS_WARNING => HealthStatus::Warning(self.error_code),
            _ => HealthStatus::Error(self.error_code),
        }
    }
}

/// Time taken by a single measurement, in microseconds, for both scan modes.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct SampleRate {
    pub standard_us: u16,
    pub express_us: u16,
}

impl SampleRate {
    pub const SIZE: usize = 4;

    pub fn decode(buf: &[u8]) -> Result<SampleRate, PayloadError> {
        check_size(ResponseType::SampleRate, Self::SIZE, buf)?;
        Ok(SampleRate {
            standard_us: LittleEndian::read_u16(&buf[0..2]),
            express_us: LittleEndian::read_u16(&buf[2..4]),
        })
    }

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        LittleEndian::write_u16(&mut buf[0..2], self.standard_us);
        LittleEndian::write_u16(&mut buf[2..4], self.express_us);
        buf
    }
}

/// A configuration entry: its 32-bit type id followed by a type-specific payload.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Configuration {
    pub config_type: u32,
    pub payload: heapless::Vec<u8, CONFIGURATION_PAYLOAD_MAX>,
}

impl Configuration {
    /// Size of the type id preceding the payload.
    pub const HEADER_SIZE: usize = 4;

    /// Builds an entry, failing if the payload exceeds `CONFIGURATION_PAYLOAD_MAX`.
    pub fn new(config_type: u32, payload: &[u8]) -> Result<Configuration, PayloadError> {
        let mut conf = Configuration {
            config_type,
            payload: heapless::Vec::new(),
        };
        conf.payload
            .extend_from_slice(payload)
            .map_err(|_| Self::out_of_range(Self::HEADER_SIZE + payload.len()))?;
        Ok(conf)
    }

    fn out_of_range(actual: usize) -> PayloadError {
        PayloadError::LengthOutOfRange {
            response: ResponseType::Configuration,
            min: Self::HEADER_SIZE,
            max: Self::HEADER_SIZE + CONFIGURATION_PAYLOAD_MAX,
            actual,
        }
    }

    pub fn decode(buf: &[u8]) -> Result<Configuration, PayloadError> {
        if buf.len() < Self::HEADER_SIZE {
            return Err(Self::out_of_range(buf.len()));
        }
        Configuration::new(
            LittleEndian::read_u32(&buf[0..4]),
            &buf[Self::HEADER_SIZE..],
        )
        .map_err(|_| Self::out_of_range(buf.len()))
    }

    pub fn to_bytes(&self) -> heapless::Vec<u8, { 4 + CONFIGURATION_PAYLOAD_MAX }> {
        let mut out = heapless::Vec::new();
        out.extend_from_slice(&self.config_type.to_le_bytes()).ok();
        out.extend_from_slice(&self.payload).ok();
        out
    }

    /// Encoded size in bytes.
    pub fn len(&self) -> usize {
        Self::HEADER_SIZE + self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    pub fn as_u8(&self) -> Option<u8> {
        self.payload.first().copied()
    }

    pub fn as_u16(&self) -> Option<u16> {
        (self.payload.len() >= 2).then(|| LittleEndian::read_u16(&self.payload[0..2]))
    }

    pub fn as_u32(&self) -> Option<u32> {
        (self.payload.len() >= 4).then(|| LittleEndian::read_u32(&self.payload[0..4]))
    }

    /// Reads the payload as a NUL-terminated string, as used by scan mode names.
    pub fn as_str(&self) -> Option<&str> {
        let end = self
            .payload
            .iter()
            .position(|b| *b == 0)
            .unwrap_or(self.payload.len());
        std::str::from_utf8(&self.payload[..end]).ok()
    }
}

/// A single legacy measurement point.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct Measurement {
    /// Start flag: bit 0 marks the first point of a revolution, bit 1 is its inverse.
    pub start: u8,
    /// Signal quality, 0 to 63.
    pub quality: u8,
    /// Structural check bit, 1 on every well-formed frame.
    pub check: bool,
    /// Angle in degrees times 64.
    pub angle_q6: u16,
    /// Distance in millimeters times 4. 0 means no return.
    pub distance_q2: u16,
}

impl Measurement {
    pub const SIZE: usize = 5;

    pub fn decode(buf: &[u8]) -> Result<Measurement, PayloadError> {
        check_size(ResponseType::Measurement, Self::SIZE, buf)?;
        let angle_check = LittleEndian::read_u16(&buf[1..3]);
        Ok(Measurement {
            start: buf[0] & 0x03,
            quality: buf[0] >> RPLIDAR_RESP_MEASUREMENT_QUALITY_SHIFT,
            check: angle_check & 0x1 == 0x1,
            angle_q6: angle_check >> RPLIDAR_RESP_MEASUREMENT_ANGLE_SHIFT,
            distance_q2: LittleEndian::read_u16(&buf[3..5]),
        })
    }

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        buf[0] = (self.quality << RPLIDAR_RESP_MEASUREMENT_QUALITY_SHIFT) | (self.start & 0x03);
        LittleEndian::write_u16(
            &mut buf[1..3],
            (self.angle_q6 << RPLIDAR_RESP_MEASUREMENT_ANGLE_SHIFT) | self.check as u16,
        );
        LittleEndian::write_u16(&mut buf[3..5], self.distance_q2);
        buf
    }

    #[inline]
    pub fn is_revolution_start(&self) -> bool {
        self.start & 0x01 == 0x01
    }

    #[inline]
    pub fn angle_degrees(&self) -> f32 {
        self.angle_q6 as f32 / 64.0
    }

    #[inline]
    pub fn distance_mm(&self) -> f32 {
        self.distance_q2 as f32 / 4.0
    }
}

/// A dense capsuled measurement frame: 40 distances spread over the angular span
/// between this frame's start angle and the next one's.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct DenseMeasurement {
    /// Low nibble of the frame checksum.
    pub checksum1: u8,
    /// Sync nibble, `0xA` on a well-formed frame.
    pub sync1: u8,
    /// High nibble of the frame checksum.
    pub checksum2: u8,
    /// Sync nibble, `0x5` on a well-formed frame.
    pub sync2: u8,
    /// Start angle of the first distance, degrees times 64.
    pub start_angle_q6: u16,
    /// Set on the first frame of a new measurement sequence.
    pub start: bool,
    /// Distances in millimeters. 0 means no return.
    pub distances: [u16; DENSE_CABIN_COUNT],
}

impl Default for DenseMeasurement {
    fn default() -> Self {
        DenseMeasurement::new(0, false, [0; DENSE_CABIN_COUNT])
    }
}

impl DenseMeasurement {
    pub const SIZE: usize = 4 + 2 * DENSE_CABIN_COUNT;

    /// Builds a well-formed frame, filling in sync nibbles and checksum.
    pub fn new(start_angle_q6: u16, start: bool, distances: [u16; DENSE_CABIN_COUNT]) -> Self {
        let mut frame = DenseMeasurement {
            checksum1: 0,
            sync1: RPLIDAR_RESP_MEASUREMENT_EXP_SYNC_1,
            checksum2: 0,
            sync2: RPLIDAR_RESP_MEASUREMENT_EXP_SYNC_2,
            start_angle_q6: start_angle_q6 & 0x7FFF,
            start,
            distances,
        };
        let checksum = frame.computed_checksum();
        frame.checksum1 = checksum & 0x0F;
        frame.checksum2 = checksum >> 4;
        frame
    }

    pub fn decode(buf: &[u8]) -> Result<DenseMeasurement, PayloadError> {
        check_size(ResponseType::DenseMeasurement, Self::SIZE, buf)?;
        let angle_start = LittleEndian::read_u16(&buf[2..4]);
        let mut distances = [0u16; DENSE_CABIN_COUNT];
        LittleEndian::read_u16_into(&buf[4..], &mut distances);
        Ok(DenseMeasurement {
            checksum1: buf[0] & 0x0F,
            sync1: buf[0] >> 4,
            checksum2: buf[1] & 0x0F,
            sync2: buf[1] >> 4,
            start_angle_q6: angle_start & 0x7FFF,
            start: angle_start & 0x8000 != 0,
            distances,
        })
    }

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        buf[0] = (self.sync1 << 4) | (self.checksum1 & 0x0F);
        buf[1] = (self.sync2 << 4) | (self.checksum2 & 0x0F);
        LittleEndian::write_u16(
            &mut buf[2..4],
            (self.start_angle_q6 & 0x7FFF) | ((self.start as u16) << 15),
        );
        LittleEndian::write_u16_into(&self.distances, &mut buf[4..]);
        buf
    }

    /// Checksum carried by the frame.
    #[inline]
    pub fn checksum(&self) -> u8 {
        (self.checksum1 & 0x0F) | (self.checksum2 << 4)
    }

    /// XOR of every byte after the two sync bytes.
    pub fn computed_checksum(&self) -> u8 {
        xor_checksum(&self.to_bytes()[2..])
    }

    /// Whether both sync nibbles are present.
    pub fn has_sync(&self) -> bool {
        self.sync1 == RPLIDAR_RESP_MEASUREMENT_EXP_SYNC_1
            && self.sync2 == RPLIDAR_RESP_MEASUREMENT_EXP_SYNC_2
    }

    /// Whether the start angle lies below 360 degrees. The 15-bit field can encode up to 512.
    pub fn has_valid_start_angle(&self) -> bool {
        self.start_angle_q6 < DENSE_START_ANGLE_LIMIT_Q6
    }

    /// Whether sync nibbles, checksum and start angle all hold.
    pub fn is_well_formed(&self) -> bool {
        self.has_sync()
            && self.checksum() == self.computed_checksum()
            && self.has_valid_start_angle()
    }

    #[inline]
    pub fn start_angle_degrees(&self) -> f32 {
        self.start_angle_q6 as f32 / 64.0
    }
}

/// A decoded response of any known type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    DeviceInfo(DeviceInfo),
    Health(DeviceHealth),
    SampleRate(SampleRate),
    Configuration(Configuration),
    Measurement(Measurement),
    DenseMeasurement(DenseMeasurement),
}

impl Response {
    /// Decodes `payload` as the record `response` declares, checking its size.
    pub fn decode(response: ResponseType, payload: &[u8]) -> Result<Response, PayloadError> {
        Ok(match response {
            ResponseType::DeviceInfo => Response::DeviceInfo(DeviceInfo::decode(payload)?),
            ResponseType::Health => Response::Health(DeviceHealth::decode(payload)?),
            ResponseType::SampleRate => Response::SampleRate(SampleRate::decode(payload)?),
            ResponseType::Configuration => {
                Response::Configuration(Configuration::decode(payload)?)
            }
            ResponseType::Measurement => Response::Measurement(Measurement::decode(payload)?),
            ResponseType::DenseMeasurement => {
                Response::DenseMeasurement(DenseMeasurement::decode(payload)?)
            }
            ResponseType::Unknown(tag) => return Err(PayloadError::UnknownResponse(tag)),
        })
    }

    pub fn response_type(&self) -> ResponseType {
        match self {
            Response::DeviceInfo(_) => ResponseType::DeviceInfo,
            Response::Health(_) => ResponseType::Health,
            Response::SampleRate(_) => ResponseType::SampleRate,
            Response::Configuration(_) => ResponseType::Configuration,
            Response::Measurement(_) => ResponseType::Measurement,
            Response::DenseMeasurement(_) => ResponseType::DenseMeasurement,
        }
    }
}
