use crate::answers::ResponseType;
use crate::base::rx_ring::RxRing;
use crate::dispatcher::ResponseDispatcher;
use crate::protocol::{FrameParser, ParserState};
use crate::base::error::ParserFault;
use log::trace;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Completion signal the foreground polls without taking the receive lock.
#[derive(Debug, Default)]
pub struct Signal {
    /// Type tag of the last captured frame, 0 for none.
    last_completed: AtomicU8,
    remaining: AtomicUsize,
}

impl Signal {
    pub fn new() -> Signal {
        Signal::default()
    }

    pub fn clear(&self) {
        self.last_completed.store(0, Ordering::Release);
        self.remaining.store(0, Ordering::Release);
    }

    pub fn complete(&self, response: ResponseType) {
        self.last_completed.store(response.tag(), Ordering::Release);
    }

    pub fn last_completed(&self) -> Option<ResponseType> {
        match self.last_completed.load(Ordering::Acquire) {
            0 => None,
            tag => Some(ResponseType::from_tag(tag)),
        }
    }

    pub fn set_remaining(&self, remaining: usize) {
        self.remaining.store(remaining, Ordering::Release);
    }

    /// Frames the armed request still waits for.
    pub fn remaining(&self) -> usize {
        self.remaining.load(Ordering::Acquire)
    }
}

/// Counters of the receive path, readable at any time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReceiverStats {
    pub bytes_received: u64,
    /// Frames captured for a caller or handed to the listener.
    pub frames_delivered: u64,
    /// Measurement frames failing their check bit, sync nibbles or checksum.
    pub frames_discarded: u64,
    /// Frames with no listener to take them, or past the count of a bounded scan.
    pub frames_ignored: u64,
    pub framing_faults: u64,
}

/// Everything the data-arrival handler touches.
pub(crate) struct Receiver {
    pub(crate) ring: RxRing,
    pub(crate) parser: FrameParser,
    pub(crate) dispatcher: ResponseDispatcher,
    bytes_received: u64,
    framing_faults: u64,
}

impl Receiver {
    fn new(rx_buffer_size: usize, signal: Arc<Signal>) -> Receiver {
        Receiver {
            ring: RxRing::with_capacity(rx_buffer_size),
            parser: FrameParser::new(),
            dispatcher: ResponseDispatcher::new(signal),
            bytes_received: 0,
            framing_faults: 0,
        }
    }

    fn receive(&mut self, bytes: &[u8]) {
        for chunk in bytes.chunks(self.ring.capacity()) {
            let head = self.ring.write(chunk);
            self.bytes_received += chunk.len() as u64;
            self.on_data(head);
        }
    }

    /// Parses everything between the parse position and `head`, tail segment first.
    fn on_data(&mut self, head: usize) {
        let (first, second) = self.ring.pending(head);
        for span in [first, second] {
            if span.is_empty() {
                continue;
            }
            if self.parser.feed(span, &mut self.dispatcher).is_err() {
                self.framing_faults += 1;
            }
        }
        self.ring.consume_to(head);
    }

    /// Drops any partial frame and unparsed bytes.
    pub(crate) fn reset(&mut self) {
        self.parser.reset();
        self.ring.discard();
    }

    pub(crate) fn parser_state(&self) -> ParserState {
        self.parser.state()
    }

    pub(crate) fn last_fault(&self) -> Option<ParserFault> {
        self.parser.last_fault()
    }

    pub(crate) fn stats(&self) -> ReceiverStats {
        ReceiverStats {
            bytes_received: self.bytes_received,
            frames_delivered: self.dispatcher.frames_delivered(),
            frames_discarded: self.dispatcher.frames_discarded(),
            frames_ignored: self.dispatcher.frames_ignored(),
            framing_faults: self.framing_faults,
        }
    }
}

/// State shared between the driver and the receiving context.
pub(crate) struct Shared {
    receiver: Mutex<Receiver>,
    pub(crate) signal: Arc<Signal>,
}

impl Shared {
    pub(crate) fn new(rx_buffer_size: usize) -> Arc<Shared> {
        trace!("Creating receive context with {} byte ring", rx_buffer_size);
        let signal = Arc::new(Signal::new());
        Arc::new(Shared {
            receiver: Mutex::new(Receiver::new(rx_buffer_size, signal.clone())),
            signal,
        })
    }

    /// Locks the receive context. A panic in a listener does not wedge the driver.
    pub(crate) fn lock(&self) -> MutexGuard<'_, Receiver> {
        self.receiver.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Handle the transport pushes received bytes through.
///
/// Cheap to clone and safe to move to a reader thread or interrupt context.
#[derive(Clone)]
pub struct RxHandle {
    shared: Arc<Shared>,
}

impl RxHandle {
    pub(crate) fn new(shared: Arc<Shared>) -> RxHandle {
        RxHandle { shared }
    }

    /// Writes `bytes` into the ring at the current head and parses them.
    pub fn receive(&self, bytes: &[u8]) {
        if bytes.is_empty() {
            return;
        }
        self.shared.lock().receive(bytes);
    }
}

impl std::fmt::Debug for RxHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RxHandle").finish_non_exhaustive()
    }
}
