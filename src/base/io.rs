//! Host-side implementations of [`Transport`] and [`Clock`] over std I/O.

use crate::base::channel::RxHandle;
use crate::base::error::{Error, Result};
use crate::base::traits::{Clock, Transport};
use log::{error, trace};
use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

const PUMP_READ_BUFFER_SIZE: usize = 256;

/// [`Clock`] backed by `std::time::Instant` and `thread::sleep`.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> SystemClock {
        SystemClock {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> u32 {
        self.origin.elapsed().as_millis() as u32
    }

    fn delay_ms(&self, ms: u32) {
        thread::sleep(Duration::from_millis(ms as u64));
    }
}

/// Handle the reader thread delivers into. `None` while reception is aborted.
type RxSlot = Arc<Mutex<Option<RxHandle>>>;

/// Reader thread pushing everything it reads into the currently attached `RxHandle`.
///
/// The thread outlives aborts: detaching the handle is enough to stop delivery,
/// bytes read while detached are dropped.
struct RxPump {
    stop: Arc<AtomicBool>,
    slot: RxSlot,
    handle: JoinHandle<()>,
}

impl RxPump {
    fn spawn<R: Read + Send + 'static>(mut reader: R, rx: RxHandle) -> io::Result<RxPump> {
        let stop = Arc::new(AtomicBool::new(false));
        let slot: RxSlot = Arc::new(Mutex::new(Some(rx)));
        let thread_stop = stop.clone();
        let thread_slot = slot.clone();

        let handle = thread::Builder::new()
            .name("rplidar-rx".to_owned())
            .spawn(move || {
                let mut buf = [0u8; PUMP_READ_BUFFER_SIZE];
                while !thread_stop.load(Ordering::Acquire) {
                    match reader.read(&mut buf) {
                        Ok(0) => {
                            trace!("Receive stream reached end of file");
                            break;
                        }
                        Ok(read) => {
                            // An abort waits for this delivery to finish.
                            let slot = thread_slot.lock().unwrap_or_else(PoisonError::into_inner);
                            if let Some(rx) = slot.as_ref() {
                                rx.receive(&buf[..read]);
                            }
                        }
                        Err(e)
                            if matches!(
                                e.kind(),
                                io::ErrorKind::TimedOut
                                    | io::ErrorKind::WouldBlock
                                    | io::ErrorKind::Interrupted
                            ) => {}
                        Err(e) => {
                            error!("IO error reading from stream: {}", e);
                            break;
                        }
                    }
                }
            })?;

        Ok(RxPump { stop, slot, handle })
    }

    fn attach(&self, rx: Option<RxHandle>) {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = rx;
    }

    fn is_attached(&self) -> bool {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }
}

/// [`Transport`] over a std reader/writer pair, such as the two halves of a serial port.
///
/// Reception runs on a dedicated thread started by the first `begin_receive`.
/// `abort_receive` only detaches the receive handle, so it never waits for a
/// pending read. The thread exits after the stream ends, fails, or the transport
/// is dropped and its current read returns.
pub struct IoTransport<R, W> {
    reader: Option<R>,
    writer: W,
    pump: Option<RxPump>,
}

impl<R, W> IoTransport<R, W>
where
    R: Read + Send + 'static,
    W: Write,
{
    pub fn new(reader: R, writer: W) -> IoTransport<R, W> {
        IoTransport {
            reader: Some(reader),
            writer,
            pump: None,
        }
    }

    /// Whether received bytes are currently delivered to a handle.
    pub fn is_receiving(&self) -> bool {
        self.pump
            .as_ref()
            .map_or(false, |pump| pump.is_running() && pump.is_attached())
    }
}

impl<R, W> Transport for IoTransport<R, W>
where
    R: Read + Send + 'static,
    W: Write,
{
    fn begin_receive(&mut self, rx: RxHandle) -> Result<()> {
        if let Some(pump) = self.pump.as_ref() {
            if !pump.is_running() {
                return Err(Error::TransportError {
                    description: "receive stream has ended".to_owned(),
                });
            }
            trace!("Attaching receive handle");
            pump.attach(Some(rx));
            return Ok(());
        }

        let reader = self.reader.take().ok_or_else(|| Error::TransportError {
            description: "reader is no longer available".to_owned(),
        })?;
        trace!("Starting receive thread");
        self.pump = Some(RxPump::spawn(reader, rx)?);
        Ok(())
    }

    fn transmit(&mut self, bytes: &[u8]) -> Result<()> {
        trace!("Writing {} bytes to stream", bytes.len());
        self.writer
            .write_all(bytes)
            .and_then(|_| self.writer.flush())
            .map_err(|e| Error::TransportError {
                description: e.to_string(),
            })
    }

    fn abort_receive(&mut self) {
        if let Some(pump) = self.pump.as_ref() {
            trace!("Detaching receive handle");
            pump.attach(None);
        }
    }
}

impl<R, W> Drop for IoTransport<R, W> {
    fn drop(&mut self) {
        if let Some(pump) = self.pump.take() {
            pump.stop.store(true, Ordering::Release);
            pump.attach(None);
        }
    }
}
