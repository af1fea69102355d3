use crate::answers::ResponseType;
use std::error;
use std::fmt;
use std::io;

/// Represents errors that can occur during RPLIDAR operations.
#[derive(Debug)]
pub enum Error {
    /// The transport failed to send or to arm reception. Contains a description of the failure.
    TransportError { description: String },

    /// The byte stream violated the framing rules. The parser stays in its error state until reset.
    FramingError(FramingError),

    /// A complete payload did not match what its response type requires.
    PayloadMismatch(PayloadError),

    /// The execution of operation is timed out.
    OperationTimeout,

    /// A command payload exceeds the bound of its command.
    PayloadTooLarge { size: usize, max: usize },

    /// An I/O error occurred while communicating with the underlying stream (e.g., serial port).
    IoError(io::Error),
}

/// Violations detected while assembling a descriptor or a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramingError {
    /// Descriptor sync byte at `index` (0 or 1) had an unexpected value.
    SyncByte { index: usize, value: u8 },
    /// Declared payload length does not fit the response buffer.
    LengthOverflow { declared: usize, capacity: usize },
    /// Send mode other than single or multi.
    UnknownMode(u8),
    /// Multi-mode descriptor declaring zero-length frames.
    EmptyStream,
}

/// Violations detected while interpreting a complete payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadError {
    LengthMismatch {
        response: ResponseType,
        expected: usize,
        actual: usize,
    },
    LengthOutOfRange {
        response: ResponseType,
        min: usize,
        max: usize,
        actual: usize,
    },
    UnknownResponse(u8),
}

impl fmt::Display for FramingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FramingError::SyncByte { index, value } => {
                write!(f, "bad sync byte {} in descriptor: 0x{:02X}", index, value)
            }
            FramingError::LengthOverflow { declared, capacity } => write!(
                f,
                "declared length {} exceeds response buffer of {} bytes",
                declared, capacity
            ),
            FramingError::UnknownMode(mode) => write!(f, "unknown send mode {}", mode),
            FramingError::EmptyStream => write!(f, "multi-response stream with zero-length frames"),
        }
    }
}

impl fmt::Display for PayloadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PayloadError::LengthMismatch {
                response,
                expected,
                actual,
            } => write!(
                f,
                "{:?} payload is {} bytes, expected {}",
                response, actual, expected
            ),
            PayloadError::LengthOutOfRange {
                response,
                min,
                max,
                actual,
            } => write!(
                f,
                "{:?} payload is {} bytes, expected {} to {}",
                response, actual, min, max
            ),
            PayloadError::UnknownResponse(tag) => write!(f, "unknown response type 0x{:02X}", tag),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::TransportError { description } => write!(f, "transport error: {}", description),
            Error::FramingError(err) => write!(f, "framing error: {}", err),
            Error::PayloadMismatch(err) => write!(f, "payload mismatch: {}", err),
            Error::OperationTimeout => write!(f, "operation timeout"),
            Error::PayloadTooLarge { size, max } => {
                write!(f, "payload of {} bytes exceeds limit of {}", size, max)
            }
            Error::IoError(err) => write!(f, "io error: {}", err),
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Error::IoError(err) => Some(err),
            _ => None,
        }
    }
}

impl error::Error for FramingError {}

impl error::Error for PayloadError {}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::IoError(err)
    }
}

impl From<FramingError> for Error {
    fn from(err: FramingError) -> Self {
        Error::FramingError(err)
    }
}

impl From<PayloadError> for Error {
    fn from(err: PayloadError) -> Self {
        Error::PayloadMismatch(err)
    }
}

/// A specialized `Result` type for RPLIDAR operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Fault that moved the frame parser into its error state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParserFault {
    Framing(FramingError),
    Payload(PayloadError),
}

impl From<ParserFault> for Error {
    fn from(fault: ParserFault) -> Self {
        match fault {
            ParserFault::Framing(err) => Error::FramingError(err),
            ParserFault::Payload(err) => Error::PayloadMismatch(err),
        }
    }
}

impl fmt::Display for ParserFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParserFault::Framing(err) => write!(f, "{}", err),
            ParserFault::Payload(err) => write!(f, "{}", err),
        }
    }
}
