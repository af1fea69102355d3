//! # Rplidar Mapper
//!
//! `rplidar_mapper` is the protocol core of a room-mapping device built around a
//! Slamtec RPLIDAR sensor. Bytes arrive from a background receiver (interrupt,
//! DMA or reader thread) into a fixed ring buffer, are framed by an incremental
//! parser and routed either to a caller blocked in a synchronous request or to a
//! registered [`Listener`].
//!
//! # Example
//! ```ignore
//! # use rplidar_mapper::{IoTransport, RplidarDriver, SystemClock, Measurement};
//! # use std::time::Duration;
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let port = serialport::new("/dev/ttyUSB0", 115200)
//!     .timeout(Duration::from_millis(10))
//!     .open()?;
//! let transport = IoTransport::new(port.try_clone()?, port);
//! let mut lidar = RplidarDriver::new(transport, SystemClock::new())?;
//!
//! let info = lidar.get_device_info()?;
//! println!("model {}.{}", info.model_major, info.model_sub);
//!
//! let mut points = [Measurement::default(); 64];
//! lidar.start_scan(Some(&mut points), Duration::from_secs(2))?;
//! lidar.stop_scan()?;
//! # Ok(())
//! # }
//! ```

extern crate byteorder;
extern crate heapless;
extern crate log;

mod answers;
pub mod base;
mod checksum;
pub mod cmds;
mod config;
mod dispatcher;
mod internals;
mod parsers;
mod protocol;
pub mod types;

pub use crate::answers::*;
pub use crate::base::{
    Clock, Command, Error, FramingError, IoTransport, ParserFault, PayloadError, ReceiverStats,
    Result, RxHandle, RxRing, SystemClock, Transport,
};
pub use crate::config::DriverConfig;
pub use crate::dispatcher::{Listener, ResponseDispatcher};
pub use crate::parsers::DenseScanDecoder;
pub use crate::protocol::{Descriptor, FrameParser, FrameSink, ParserState, SendMode};
pub use crate::types::{HealthStatus, ScanPoint};

use crate::base::Shared;
use crate::cmds::*;
use log::{error, trace, warn};
use std::sync::Arc;
use std::time::Duration;

/// Unwraps a captured response of the expected variant.
macro_rules! expect_response {
    ($resp:expr, $variant:ident) => {
        match $resp {
            Response::$variant(value) => Ok(value),
            other => Err(Error::PayloadMismatch(PayloadError::UnknownResponse(
                other.response_type().tag(),
            ))),
        }
    };
}

/// Whole milliseconds covering `duration`, rounded up.
#[inline]
fn duration_to_ms(duration: Duration) -> u32 {
    let ms = (duration.as_micros() + 999) / 1000;
    ms.min(u32::MAX as u128) as u32
}

/// Control interface of one RPLIDAR sensor.
///
/// Owns the transport, the clock and the receive context shared with the
/// transport's background receiver. Every request starts by resetting the
/// parser, so a fault left behind by an earlier exchange never outlives it.
///
/// Query-style requests take an optional destination. With one, the call blocks
/// until the response is copied or `timeout` elapses (`Duration::ZERO` waits
/// forever). Without one, the call returns once the command is sent and the
/// response goes to the listener.
pub struct RplidarDriver<T: Transport, C: Clock> {
    transport: T,
    clock: C,
    config: DriverConfig,
    shared: Arc<Shared>,
}

impl<T: Transport, C: Clock> RplidarDriver<T, C> {
    /// Creates a driver with the default [`DriverConfig`] and arms reception.
    pub fn new(transport: T, clock: C) -> Result<RplidarDriver<T, C>> {
        RplidarDriver::with_config(transport, clock, DriverConfig::default())
    }

    /// Creates a driver with a custom configuration and arms reception.
    pub fn with_config(
        mut transport: T,
        clock: C,
        config: DriverConfig,
    ) -> Result<RplidarDriver<T, C>> {
        trace!("Creating new RplidarDriver with {:?}", config);
        let shared = Shared::new(config.rx_buffer_size);
        if let Err(e) = transport.begin_receive(RxHandle::new(shared.clone())) {
            error!("Failed to arm reception: {}", e);
            return Err(e);
        }
        Ok(RplidarDriver {
            transport,
            clock,
            config,
            shared,
        })
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    /// Handle feeding received bytes into this driver.
    pub fn rx_handle(&self) -> RxHandle {
        RxHandle::new(self.shared.clone())
    }

    /// Registers the listener receiving every frame no synchronous request waits for.
    pub fn set_listener<L: Listener + 'static>(&mut self, listener: L) {
        self.shared.lock().dispatcher.set_listener(Box::new(listener));
    }

    pub fn clear_listener(&mut self) -> Option<Box<dyn Listener>> {
        self.shared.lock().dispatcher.clear_listener()
    }

    pub fn parser_state(&self) -> ParserState {
        self.shared.lock().parser_state()
    }

    /// Fault that stopped the parser, if it is in [`ParserState::Error`].
    pub fn last_fault(&self) -> Option<ParserFault> {
        self.shared.lock().last_fault()
    }

    pub fn stats(&self) -> ReceiverStats {
        self.shared.lock().stats()
    }

    /// Aborts reception, drops partial frames and unparsed bytes, clears the
    /// completion signal and arms reception again. Frames go to the listener afterwards.
    pub fn reset_parser(&mut self) -> Result<()> {
        self.restart_receive(|dispatcher| dispatcher.arm_listener())
    }

    fn restart_receive(&mut self, arm: impl FnOnce(&mut ResponseDispatcher)) -> Result<()> {
        trace!("Resetting receive path");
        self.transport.abort_receive();
        {
            let mut receiver = self.shared.lock();
            receiver.reset();
            self.shared.signal.clear();
            arm(&mut receiver.dispatcher);
        }
        self.transport
            .begin_receive(RxHandle::new(self.shared.clone()))
            .map_err(|e| {
                error!("Failed to re-arm reception: {}", e);
                e
            })
    }

    fn send(&mut self, cmd: &Command) -> Result<()> {
        trace!("Sending command {:02X}", cmd.opcode);
        self.transport.transmit(&cmd.encode()).map_err(|e| {
            error!("Failed to send command {:02X}: {}", cmd.opcode, e);
            e
        })
    }

    /// Waits until `done` reports completion, re-checking every poll interval.
    fn poll_until<R>(
        &self,
        timeout: Duration,
        mut done: impl FnMut(&Self) -> Result<Option<R>>,
    ) -> Result<R> {
        let timeout_ms = duration_to_ms(timeout);
        let poll_ms = duration_to_ms(self.config.poll_interval);
        let start = self.clock.now_ms();

        loop {
            if let Some(result) = done(self)? {
                return Ok(result);
            }
            if !timeout.is_zero() && self.clock.now_ms().wrapping_sub(start) >= timeout_ms {
                warn!("Timeout after {:?} waiting for response", timeout);
                return Err(Error::OperationTimeout);
            }
            self.clock.delay_ms(poll_ms);
        }
    }

    /// Sends `cmd` and, with `wait` set, blocks for one response of type `response`.
    fn query(
        &mut self,
        cmd: &Command,
        response: ResponseType,
        wait: bool,
        timeout: Duration,
    ) -> Result<Option<Response>> {
        if !wait {
            self.restart_receive(|dispatcher| dispatcher.arm_listener())?;
            self.send(cmd)?;
            return Ok(None);
        }

        self.restart_receive(|dispatcher| dispatcher.arm_query(response))?;
        self.send(cmd)?;
        self.poll_until(timeout, |driver| {
            if driver.shared.signal.last_completed() != Some(response) {
                return Ok(None);
            }
            let mut receiver = driver.shared.lock();
            let captured = receiver.dispatcher.drain_captured().next();
            Ok(captured)
        })
        .map(|resp| {
            trace!("Received {:?} response", response);
            Some(resp)
        })
    }

    /// Sends `cmd` and, given a non-empty destination, copies the next
    /// `dest.len()` frames of type `response` into it.
    fn scan<M>(
        &mut self,
        cmd: &Command,
        response: ResponseType,
        dest: Option<&mut [M]>,
        timeout: Duration,
        extract: fn(Response) -> Option<M>,
    ) -> Result<usize> {
        let dest = match dest {
            Some(dest) if !dest.is_empty() => dest,
            _ => {
                self.restart_receive(|dispatcher| dispatcher.arm_listener())?;
                self.send(cmd)?;
                return Ok(0);
            }
        };

        let count = dest.len();
        self.restart_receive(|dispatcher| dispatcher.arm_scan(response, count))?;
        self.send(cmd)?;

        let outcome = self.poll_until(timeout, |driver| {
            Ok((driver.shared.signal.remaining() == 0).then_some(()))
        });

        let copied = {
            let mut receiver = self.shared.lock();
            let frames = receiver.dispatcher.drain_captured().filter_map(extract);
            dest.iter_mut().zip(frames).map(|(slot, m)| *slot = m).count()
        };

        match outcome {
            Ok(()) => Ok(copied),
            Err(e) => {
                if let Error::OperationTimeout = e {
                    warn!("Scan timed out with {} of {} frames copied", copied, count);
                }
                Err(e)
            }
        }
    }

    /// Starts a legacy scan, one measurement per frame.
    ///
    /// With a non-empty `dest`, blocks until `dest.len()` measurements were copied
    /// and returns that count. Otherwise measurements go to the listener until the
    /// next request and `Ok(0)` is returned right after sending.
    pub fn start_scan(
        &mut self,
        dest: Option<&mut [Measurement]>,
        timeout: Duration,
    ) -> Result<usize> {
        trace!("Starting scan");
        self.scan(
            &Command::new(RPLIDAR_CMD_SCAN),
            ResponseType::Measurement,
            dest,
            timeout,
            |frame| match frame {
                Response::Measurement(m) => Some(m),
                _ => None,
            },
        )
    }

    /// Starts an express scan, 40 distances per frame. Same contract as [`start_scan`](Self::start_scan).
    pub fn start_scan_express(
        &mut self,
        dest: Option<&mut [DenseMeasurement]>,
        timeout: Duration,
    ) -> Result<usize> {
        trace!("Starting express scan");
        self.scan(
            &Command::express_scan(),
            ResponseType::DenseMeasurement,
            dest,
            timeout,
            |frame| match frame {
                Response::DenseMeasurement(m) => Some(m),
                _ => None,
            },
        )
    }

    /// Sends the stop command. Does not wait and leaves the parser alone,
    /// a frame already on the wire may still be delivered.
    pub fn stop_scan(&mut self) -> Result<()> {
        trace!("Stopping scan");
        self.send(&Command::new(RPLIDAR_CMD_STOP))
    }

    /// Resets the sensor core, waits for it to settle, then resets the parser.
    /// The boot banner printed meanwhile is not framed and gets dropped.
    pub fn reset(&mut self) -> Result<()> {
        trace!("Resetting sensor core");
        self.send(&Command::new(RPLIDAR_CMD_RESET))?;
        self.clock.delay_ms(duration_to_ms(self.config.reset_settle));
        self.reset_parser()
    }

    /// Sets the motor speed in RPM. Does not wait.
    pub fn set_motor_speed(&mut self, rpm: u16) -> Result<()> {
        trace!("Setting motor speed to {} rpm", rpm);
        self.send(&Command::motor_speed(rpm))
    }

    pub fn request_health(
        &mut self,
        dest: Option<&mut DeviceHealth>,
        timeout: Duration,
    ) -> Result<()> {
        let cmd = Command::new(RPLIDAR_CMD_GET_DEVICE_HEALTH);
        if let Some(resp) = self.query(&cmd, ResponseType::Health, dest.is_some(), timeout)? {
            let health = expect_response!(resp, Health)?;
            trace!(
                "Device health: status={}, error_code={:04X}",
                health.status,
                health.error_code
            );
            if let Some(dest) = dest {
                *dest = health;
            }
        }
        Ok(())
    }

    pub fn request_device_info(
        &mut self,
        dest: Option<&mut DeviceInfo>,
        timeout: Duration,
    ) -> Result<()> {
        let cmd = Command::new(RPLIDAR_CMD_GET_DEVICE_INFO);
        if let Some(resp) = self.query(&cmd, ResponseType::DeviceInfo, dest.is_some(), timeout)? {
            let info = expect_response!(resp, DeviceInfo)?;
            trace!(
                "Device info: model={:02X}, firmware={:04X}, serial={}",
                info.model(),
                info.firmware_version(),
                info.serial_number_hex()
            );
            if let Some(dest) = dest {
                *dest = info;
            }
        }
        Ok(())
    }

    pub fn request_sample_rate(
        &mut self,
        dest: Option<&mut SampleRate>,
        timeout: Duration,
    ) -> Result<()> {
        let cmd = Command::new(RPLIDAR_CMD_GET_SAMPLERATE);
        if let Some(resp) = self.query(&cmd, ResponseType::SampleRate, dest.is_some(), timeout)? {
            let rate = expect_response!(resp, SampleRate)?;
            if let Some(dest) = dest {
                *dest = rate;
            }
        }
        Ok(())
    }

    /// Queries configuration entry `config_type`. `param` is at most
    /// `CONFIGURATION_PAYLOAD_MAX` bytes, longer ones fail before anything is sent.
    pub fn request_configuration(
        &mut self,
        config_type: u32,
        param: &[u8],
        dest: Option<&mut Configuration>,
        timeout: Duration,
    ) -> Result<()> {
        let cmd = Command::configuration(config_type, param)?;
        trace!("Requesting configuration {:08X}", config_type);
        if let Some(resp) =
            self.query(&cmd, ResponseType::Configuration, dest.is_some(), timeout)?
        {
            let conf = expect_response!(resp, Configuration)?;
            if let Some(dest) = dest {
                *dest = conf;
            }
        }
        Ok(())
    }

    /// Gets the device information (model, firmware, hardware, serial number) of the RPLIDAR.
    /// Uses the configured default timeout.
    pub fn get_device_info(&mut self) -> Result<DeviceInfo> {
        self.get_device_info_with_timeout(self.config.default_timeout)
    }

    pub fn get_device_info_with_timeout(&mut self, timeout: Duration) -> Result<DeviceInfo> {
        let mut info = DeviceInfo::default();
        self.request_device_info(Some(&mut info), timeout)?;
        Ok(info)
    }

    pub fn get_device_health(&mut self) -> Result<DeviceHealth> {
        self.get_device_health_with_timeout(self.config.default_timeout)
    }

    pub fn get_device_health_with_timeout(&mut self, timeout: Duration) -> Result<DeviceHealth> {
        let mut health = DeviceHealth::default();
        self.request_health(Some(&mut health), timeout)?;
        Ok(health)
    }

    /// Classified health of the sensor, using the default timeout.
    pub fn get_health_status(&mut self) -> Result<HealthStatus> {
        let status = self.get_device_health()?.status();
        if status != HealthStatus::Healthy {
            warn!("Sensor reports {:?}", status);
        }
        Ok(status)
    }

    pub fn get_sample_rate(&mut self) -> Result<SampleRate> {
        let mut rate = SampleRate::default();
        self.request_sample_rate(Some(&mut rate), self.config.default_timeout)?;
        Ok(rate)
    }

    pub fn get_lidar_conf(&mut self, config_type: u32, param: &[u8]) -> Result<Configuration> {
        self.get_lidar_conf_with_timeout(config_type, param, self.config.default_timeout)
    }

    pub fn get_lidar_conf_with_timeout(
        &mut self,
        config_type: u32,
        param: &[u8],
        timeout: Duration,
    ) -> Result<Configuration> {
        let mut conf = Configuration::default();
        self.request_configuration(config_type, param, Some(&mut conf), timeout)?;
        Ok(conf)
    }
}

impl<T: Transport, C: Clock> Drop for RplidarDriver<T, C> {
    fn drop(&mut self) {
        self.transport.abort_receive();
    }
}
