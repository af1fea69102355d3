use std::time::Duration;

/// Default timeout duration for waiting for responses from the RPLIDAR.
pub const RPLIDAR_DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);

/// Time the sensor needs to reboot its scanning core after a reset command.
pub const RPLIDAR_DEFAULT_RESET_SETTLE: Duration = Duration::from_millis(500);

/// Interval between two checks of the completion signal while a synchronous request waits.
pub const RPLIDAR_DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Default capacity of the ring buffer the background receiver writes into.
pub const RPLIDAR_DEFAULT_RX_BUFFER_SIZE: usize = 2048;

/// Capacity of the buffer a single response payload is assembled in.
/// Descriptors declaring a longer payload are rejected.
pub const RESPONSE_BUFFER_SIZE: usize = 128;

/// Size of a response descriptor, sync bytes included.
pub const DESCRIPTOR_SIZE: usize = 7;

/// Upper bound for configuration payloads, request parameter and response alike.
pub const CONFIGURATION_PAYLOAD_MAX: usize = 64;

/// Upper bound for the payload of any command frame.
pub const COMMAND_PAYLOAD_MAX: usize = 4 + CONFIGURATION_PAYLOAD_MAX;

/// Largest encoded command frame: sync, opcode, length, payload and checksum.
pub const COMMAND_FRAME_MAX: usize = 4 + COMMAND_PAYLOAD_MAX;
