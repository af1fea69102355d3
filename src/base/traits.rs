use crate::base::channel::RxHandle;
use crate::base::error::Result;

/// Serial link to the sensor.
///
/// Reception runs continuously in the background once armed: the transport
/// pushes arriving bytes through the `RxHandle` from whatever context it
/// receives them in (interrupt, DMA completion, reader thread).
pub trait Transport {
    /// Arms continuous background reception into `rx`.
    fn begin_receive(&mut self, rx: RxHandle) -> Result<()>;

    /// Sends `bytes` to the sensor. Does not wait for any answer.
    fn transmit(&mut self, bytes: &[u8]) -> Result<()>;

    /// Cancels reception in flight. Bytes already pushed are unaffected.
    fn abort_receive(&mut self);
}

/// Monotonic millisecond time source.
pub trait Clock {
    /// Milliseconds since an arbitrary origin. Wraps around at `u32::MAX`.
    fn now_ms(&self) -> u32;

    /// Blocks the caller for `ms` milliseconds.
    fn delay_ms(&self, ms: u32);
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn begin_receive(&mut self, rx: RxHandle) -> Result<()> {
        (**self).begin_receive(rx)
    }

    fn transmit(&mut self, bytes: &[u8]) -> Result<()> {
        (**self).transmit(bytes)
    }

    fn abort_receive(&mut self) {
        (**self).abort_receive()
    }
}
