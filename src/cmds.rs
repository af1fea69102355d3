/// Sync byte every command frame starts with.
pub const RPLIDAR_CMD_SYNC_BYTE: u8 = 0xA5;

// Commands without payload

/// Command code to start a scan in legacy mode, one measurement per frame.
pub const RPLIDAR_CMD_SCAN: u8 = 0x20;

/// Command code to stop the measurement process of the LIDAR.
pub const RPLIDAR_CMD_STOP: u8 = 0x25;

/// Command code to reset the LIDAR core. The sensor sends no acknowledgement.
pub const RPLIDAR_CMD_RESET: u8 = 0x40;

/// Command code to request device information (model, firmware, hardware, serial number).
pub const RPLIDAR_CMD_GET_DEVICE_INFO: u8 = 0x50;

/// Command code to request the device's health status.
pub const RPLIDAR_CMD_GET_DEVICE_HEALTH: u8 = 0x52;

/// Command code to request the time per sample of the standard and express modes.
pub const RPLIDAR_CMD_GET_SAMPLERATE: u8 = 0x59;

// Commands with payload

/// Command code to start an express scan, 40 distances per frame.
/// Carries an `RPLIDAR_EXPRESS_SCAN_PAYLOAD_SIZE` byte payload.
pub const RPLIDAR_CMD_EXPRESS_SCAN: u8 = 0x82;

/// Payload size of the express scan command (work mode, two reserved fields).
pub const RPLIDAR_EXPRESS_SCAN_PAYLOAD_SIZE: usize = 5;

/// Command code to retrieve a LIDAR configuration entry.
/// The payload is the little-endian `u32` configuration type followed by its parameter.
pub const RPLIDAR_CMD_GET_LIDAR_CONF: u8 = 0x84;

/// Command code to set the motor speed in RPM. The payload is a little-endian `u16`.
pub const RPLIDAR_CMD_SET_MOTOR_SPEED: u8 = 0xA8;

// LIDAR configurations (used as the type id of RPLIDAR_CMD_GET_LIDAR_CONF)

/// Configuration type ID to request the total number of supported scan modes. Response is u16.
pub const RPLIDAR_CONF_SCAN_MODE_COUNT: u32 = 0x00000070;

/// Configuration type ID to request the sample duration of a scan mode (Q8 microseconds).
/// Requires a 2-byte payload (u16 scan mode ID). Response is u32.
pub const RPLIDAR_CONF_SCAN_MODE_US_PER_SAMPLE: u32 = 0x00000071;

/// Configuration type ID to request the maximum distance of a scan mode (Q8 meters).
/// Requires a 2-byte payload (u16 scan mode ID). Response is u32.
pub const RPLIDAR_CONF_SCAN_MODE_MAX_DISTANCE: u32 = 0x00000074;

/// Configuration type ID to request the answer type used by a scan mode.
/// Requires a 2-byte payload (u16 scan mode ID). Response is u8.
pub const RPLIDAR_CONF_SCAN_MODE_ANS_TYPE: u32 = 0x00000075;

/// Configuration type ID to request the ID of the typical scan mode. Response is u16.
pub const RPLIDAR_CONF_SCAN_MODE_TYPICAL: u32 = 0x0000007C;

/// Configuration type ID to request the name of a scan mode.
/// Requires a 2-byte payload (u16 scan mode ID). Response is a NUL-terminated string.
pub const RPLIDAR_CONF_SCAN_MODE_NAME: u32 = 0x0000007F;
