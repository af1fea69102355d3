mod channel;
mod error;
mod io;
mod message;
mod rx_ring;
mod traits;

pub use self::channel::{ReceiverStats, RxHandle, Signal};
pub(crate) use self::channel::Shared;
pub use self::error::{Error, FramingError, ParserFault, PayloadError, Result};
pub use self::io::{IoTransport, SystemClock};
pub use self::message::Command;
pub use self::rx_ring::RxRing;
pub use self::traits::{Clock, Transport};
