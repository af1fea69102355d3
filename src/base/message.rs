use crate::base::error::{Error, Result};
use crate::checksum::Checksum;
use crate::cmds::*;
use crate::internals::{COMMAND_FRAME_MAX, COMMAND_PAYLOAD_MAX, CONFIGURATION_PAYLOAD_MAX};
use log::trace;

/// A command sent to the RPLIDAR device: an opcode and an optional payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    /// The command code.
    pub opcode: u8,

    /// Payload data, empty for payload-less commands.
    pub payload: heapless::Vec<u8, COMMAND_PAYLOAD_MAX>,
}

impl Command {
    /// Creates a new command with no payload.
    pub fn new(opcode: u8) -> Command {
        Command {
            opcode,
            payload: heapless::Vec::new(),
        }
    }

    /// Creates a new command carrying `data` as payload.
    pub fn with_payload(opcode: u8, data: &[u8]) -> Result<Command> {
        let mut cmd = Command::new(opcode);
        cmd.payload
            .extend_from_slice(data)
            .map_err(|_| Error::PayloadTooLarge {
                size: data.len(),
                max: COMMAND_PAYLOAD_MAX,
            })?;
        Ok(cmd)
    }

    /// Legacy express scan: work mode 0 and both reserved fields zero.
    pub fn express_scan() -> Command {
        let mut cmd = Command::new(RPLIDAR_CMD_EXPRESS_SCAN);
        cmd.payload
            .resize(RPLIDAR_EXPRESS_SCAN_PAYLOAD_SIZE, 0)
            .ok();
        cmd
    }

    pub fn motor_speed(rpm: u16) -> Command {
        let mut cmd = Command::new(RPLIDAR_CMD_SET_MOTOR_SPEED);
        cmd.payload.extend_from_slice(&rpm.to_le_bytes()).ok();
        cmd
    }

    /// Configuration query for `config_type` with an optional parameter of up to
    /// `CONFIGURATION_PAYLOAD_MAX` bytes.
    pub fn configuration(config_type: u32, param: &[u8]) -> Result<Command> {
        if param.len() > CONFIGURATION_PAYLOAD_MAX {
            return Err(Error::PayloadTooLarge {
                size: param.len(),
                max: CONFIGURATION_PAYLOAD_MAX,
            });
        }
        let mut cmd = Command::new(RPLIDAR_CMD_GET_LIDAR_CONF);
        cmd.payload.extend_from_slice(&config_type.to_le_bytes()).ok();
        cmd.payload.extend_from_slice(param).ok();
        Ok(cmd)
    }

    /// Encodes the command into its wire frame.
    ///
    /// Payload-less commands are `[sync][opcode]`. Otherwise the frame is
    /// `[sync][opcode][len][payload..][checksum]`, the checksum being the
    /// additive sum of every preceding byte.
    pub fn encode(&self) -> heapless::Vec<u8, COMMAND_FRAME_MAX> {
        let mut frame = heapless::Vec::new();
        // Frame capacity covers the largest payload, pushes cannot fail.
        frame.push(RPLIDAR_CMD_SYNC_BYTE).ok();
        frame.push(self.opcode).ok();

        if !self.payload.is_empty() {
            frame.push(self.payload.len() as u8).ok();
            frame.extend_from_slice(&self.payload).ok();

            let mut checksum = Checksum::new();
            checksum.push_slice(&frame);
            frame.push(checksum.checksum()).ok();
        }

        trace!(
            "Encoded command {:02X} into {} bytes: {:02X?}",
            self.opcode,
            frame.len(),
            frame.as_slice()
        );
        frame
    }
}
