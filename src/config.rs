use crate::internals::*;
use std::time::Duration;

/// Tunables of [`RplidarDriver`](crate::RplidarDriver).
///
/// # Example
/// ```rust
/// # use rplidar_mapper::DriverConfig;
/// # use std::time::Duration;
/// let config = DriverConfig::default()
///     .with_rx_buffer_size(4096)
///     .with_default_timeout(Duration::from_millis(500));
/// assert_eq!(config.rx_buffer_size, 4096);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriverConfig {
    /// Capacity of the receive ring buffer in bytes.
    pub rx_buffer_size: usize,
    /// Timeout of the convenience getters.
    pub default_timeout: Duration,
    /// How long `reset` blocks before the parser is reset.
    pub reset_settle: Duration,
    /// Delay between two checks of the completion signal.
    pub poll_interval: Duration,
}

impl Default for DriverConfig {
    fn default() -> Self {
        DriverConfig {
            rx_buffer_size: RPLIDAR_DEFAULT_RX_BUFFER_SIZE,
            default_timeout: RPLIDAR_DEFAULT_TIMEOUT,
            reset_settle: RPLIDAR_DEFAULT_RESET_SETTLE,
            poll_interval: RPLIDAR_DEFAULT_POLL_INTERVAL,
        }
    }
}

impl DriverConfig {
    pub fn with_rx_buffer_size(mut self, rx_buffer_size: usize) -> Self {
        self.rx_buffer_size = rx_buffer_size;
        self
    }

    pub fn with_default_timeout(mut self, default_timeout: Duration) -> Self {
        self.default_timeout = default_timeout;
        self
    }

    pub fn with_reset_settle(mut self, reset_settle: Duration) -> Self {
        self.reset_settle = reset_settle;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }
}
