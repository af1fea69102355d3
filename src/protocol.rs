use crate::answers::ResponseType;
use crate::base::{FramingError, ParserFault, PayloadError, Result};
use crate::internals::{DESCRIPTOR_SIZE, RESPONSE_BUFFER_SIZE};
use byteorder::{ByteOrder, LittleEndian};
use log::{error, trace};
use std::cmp::min;

const RPLIDAR_ANS_SYNC_BYTES: [u8; 2] = [0xA5, 0x5A];

const RPLIDAR_ANS_HEADER_SIZE_MASK: u32 = 0x3FFFFFFF;
const RPLIDAR_ANS_HEADER_SUBTYPE_SHIFT: u32 = 30;

const RPLIDAR_ANS_PKTFLAG_SINGLE: u8 = 0x0;
const RPLIDAR_ANS_PKTFLAG_LOOP: u8 = 0x1;

/// How many payload frames follow a descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendMode {
    /// Exactly one payload.
    Single,
    /// Payload-only frames repeat until the sensor is stopped or reset.
    Multi,
}

/// Response descriptor preceding every answer of the sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Descriptor {
    pub length: usize,
    pub mode: SendMode,
    pub response: ResponseType,
}

impl Descriptor {
    /// Decodes a complete descriptor, sync bytes included.
    pub fn decode(buf: &[u8; DESCRIPTOR_SIZE]) -> std::result::Result<Descriptor, FramingError> {
        for (index, expected) in RPLIDAR_ANS_SYNC_BYTES.iter().enumerate() {
            if buf[index] != *expected {
                return Err(FramingError::SyncByte {
                    index,
                    value: buf[index],
                });
            }
        }

        let size_q30_subtype = LittleEndian::read_u32(&buf[2..6]);
        let mode = match (size_q30_subtype >> RPLIDAR_ANS_HEADER_SUBTYPE_SHIFT) as u8 {
            RPLIDAR_ANS_PKTFLAG_SINGLE => SendMode::Single,
            RPLIDAR_ANS_PKTFLAG_LOOP => SendMode::Multi,
            other => return Err(FramingError::UnknownMode(other)),
        };

        Ok(Descriptor {
            length: (size_q30_subtype & RPLIDAR_ANS_HEADER_SIZE_MASK) as usize,
            mode,
            response: ResponseType::from_tag(buf[6]),
        })
    }

    pub fn to_bytes(&self) -> [u8; DESCRIPTOR_SIZE] {
        let mode = match self.mode {
            SendMode::Single => RPLIDAR_ANS_PKTFLAG_SINGLE,
            SendMode::Multi => RPLIDAR_ANS_PKTFLAG_LOOP,
        };
        let mut buf = [0u8; DESCRIPTOR_SIZE];
        buf[..2].copy_from_slice(&RPLIDAR_ANS_SYNC_BYTES);
        LittleEndian::write_u32(
            &mut buf[2..6],
            (self.length as u32 & RPLIDAR_ANS_HEADER_SIZE_MASK)
                | ((mode as u32) << RPLIDAR_ANS_HEADER_SUBTYPE_SHIFT),
        );
        buf[6] = self.response.tag();
        buf
    }
}

/// Receives every complete payload the parser assembles.
pub trait FrameSink {
    /// Handles one payload. An error moves the parser into its error state.
    fn on_frame(
        &mut self,
        response: ResponseType,
        payload: &[u8],
    ) -> std::result::Result<(), PayloadError>;
}

/// Framing state of the parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParserState {
    AwaitingDescriptor,
    AwaitingSingleResponse,
    AwaitingMultiResponse,
    /// Terminal until `reset`; every byte is dropped.
    Error,
}

/// Incremental decoder for the RPLIDAR response stream.
///
/// Bytes can arrive in spans of any size; the parser keeps partial descriptors
/// and payloads between calls to [`FrameParser::feed`] in fixed buffers.
#[derive(Debug, Clone)]
pub struct FrameParser {
    state: ParserState,
    descriptor_buf: [u8; DESCRIPTOR_SIZE],
    descriptor_len: usize,
    response: ResponseType,
    response_size: usize,
    response_buf: [u8; RESPONSE_BUFFER_SIZE],
    response_len: usize,
    last_fault: Option<ParserFault>,
}

impl Default for FrameParser {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameParser {
    pub fn new() -> FrameParser {
        FrameParser {
            state: ParserState::AwaitingDescriptor,
            descriptor_buf: [0; DESCRIPTOR_SIZE],
            descriptor_len: 0,
            response: ResponseType::Unknown(0),
            response_size: 0,
            response_buf: [0; RESPONSE_BUFFER_SIZE],
            response_len: 0,
            last_fault: None,
        }
    }

    pub fn state(&self) -> ParserState {
        self.state
    }

    /// Fault that moved the parser into [`ParserState::Error`], if any.
    pub fn last_fault(&self) -> Option<ParserFault> {
        self.last_fault
    }

    /// Returns to `AwaitingDescriptor`, dropping any partial frame and the remembered fault.
    pub fn reset(&mut self) {
        trace!("Parser state -> AwaitingDescriptor (reset)");
        self.state = ParserState::AwaitingDescriptor;
        self.descriptor_len = 0;
        self.response_size = 0;
        self.response_len = 0;
        self.last_fault = None;
    }

    /// Consumes a span of received bytes, handing every completed payload to `sink`.
    ///
    /// Returns the fault that moved the parser into its error state. Once in that
    /// state, the rest of the span and every later span are dropped until `reset`.
    pub fn feed<S: FrameSink + ?Sized>(&mut self, bytes: &[u8], sink: &mut S) -> Result<()> {
        let mut i = 0;
        while i < bytes.len() {
            let consumed = match self.state {
                ParserState::Error => return Ok(()),
                ParserState::AwaitingDescriptor => self.feed_descriptor(&bytes[i..], sink),
                ParserState::AwaitingSingleResponse | ParserState::AwaitingMultiResponse => {
                    self.feed_response(&bytes[i..], sink)
                }
            };

            match consumed {
                Ok(n) => i += n,
                Err(fault) => return Err(self.fail(fault).into()),
            }
        }
        Ok(())
    }

    fn fail(&mut self, fault: ParserFault) -> ParserFault {
        error!("Parser state -> Error: {}", fault);
        self.state = ParserState::Error;
        self.last_fault = Some(fault);
        fault
    }

    fn feed_descriptor<S: FrameSink + ?Sized>(
        &mut self,
        buf: &[u8],
        sink: &mut S,
    ) -> std::result::Result<usize, ParserFault> {
        let read = min(DESCRIPTOR_SIZE - self.descriptor_len, buf.len());
        self.descriptor_buf[self.descriptor_len..self.descriptor_len + read]
            .copy_from_slice(&buf[..read]);
        self.descriptor_len += read;

        if self.descriptor_len < DESCRIPTOR_SIZE {
            return Ok(read);
        }
        self.descriptor_len = 0;

        let descriptor = Descriptor::decode(&self.descriptor_buf).map_err(ParserFault::Framing)?;
        trace!(
            "Descriptor: type={:?}, length={}, mode={:?}",
            descriptor.response,
            descriptor.length,
            descriptor.mode
        );

        if descriptor.length > RESPONSE_BUFFER_SIZE {
            return Err(ParserFault::Framing(FramingError::LengthOverflow {
                declared: descriptor.length,
                capacity: RESPONSE_BUFFER_SIZE,
            }));
        }

        self.response = descriptor.response;
        self.response_size = descriptor.length;
        self.response_len = 0;

        match (descriptor.mode, descriptor.length) {
            (SendMode::Multi, 0) => Err(ParserFault::Framing(FramingError::EmptyStream)),
            (SendMode::Single, 0) => {
                sink.on_frame(self.response, &[])
                    .map_err(ParserFault::Payload)?;
                Ok(read)
            }
            (SendMode::Single, _) => {
                trace!("Parser state -> AwaitingSingleResponse");
                self.state = ParserState::AwaitingSingleResponse;
                Ok(read)
            }
            (SendMode::Multi, _) => {
                trace!("Parser state -> AwaitingMultiResponse");
                self.state = ParserState::AwaitingMultiResponse;
                Ok(read)
            }
        }
    }

    fn feed_response<S: FrameSink + ?Sized>(
        &mut self,
        buf: &[u8],
        sink: &mut S,
    ) -> std::result::Result<usize, ParserFault> {
        let read = min(self.response_size - self.response_len, buf.len());
        self.response_buf[self.response_len..self.response_len + read]
            .copy_from_slice(&buf[..read]);
        self.response_len += read;

        if self.response_len < self.response_size {
            return Ok(read);
        }
        self.response_len = 0;

        sink.on_frame(self.response, &self.response_buf[..self.response_size])
            .map_err(ParserFault::Payload)?;

        if self.state == ParserState::AwaitingSingleResponse {
            trace!("Parser state -> AwaitingDescriptor");
            self.state = ParserState::AwaitingDescriptor;
        }
        Ok(read)
    }
}
