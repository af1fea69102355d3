use crate::answers::*;
use crate::base::{PayloadError, Signal};
use crate::protocol::FrameSink;
use log::{trace, warn};
use std::sync::Arc;
use std::vec::Drain;

/// Receives responses that no synchronous request is waiting for.
///
/// Methods run on the receiving context. The references are only valid for the
/// duration of the call.
pub trait Listener: Send {
    fn on_device_info(&mut self, _info: &DeviceInfo) {}

    fn on_health(&mut self, _health: &DeviceHealth) {}

    fn on_sample_rate(&mut self, _rate: &SampleRate) {}

    fn on_configuration(&mut self, _conf: &Configuration) {}

    fn on_measurement(&mut self, _measurement: &Measurement) {}

    fn on_dense_measurement(&mut self, _measurement: &DenseMeasurement) {}
}

/// Where the next matching frame goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Capture {
    Listener,
    /// One frame of the given type is captured, then delivery reverts to the listener.
    Query(ResponseType),
    /// Up to `remaining` frames of the given type are captured; later ones are ignored.
    Scan {
        response: ResponseType,
        remaining: usize,
    },
}

/// Routes complete payloads to the waiting caller or the registered listener.
///
/// Frames for a synchronous caller land in a capture buffer reserved when the
/// request is armed, sized to the number of frames it asked for. Capturing
/// never grows it, so the receiving context does not allocate.
pub struct ResponseDispatcher {
    capture: Capture,
    captured: Vec<Response>,
    listener: Option<Box<dyn Listener>>,
    signal: Arc<Signal>,
    frames_delivered: u64,
    frames_discarded: u64,
    frames_ignored: u64,
}

impl ResponseDispatcher {
    pub fn new(signal: Arc<Signal>) -> ResponseDispatcher {
        ResponseDispatcher {
            capture: Capture::Listener,
            captured: Vec::new(),
            listener: None,
            signal,
            frames_delivered: 0,
            frames_discarded: 0,
            frames_ignored: 0,
        }
    }

    pub fn set_listener(&mut self, listener: Box<dyn Listener>) {
        self.listener = Some(listener);
    }

    pub fn clear_listener(&mut self) -> Option<Box<dyn Listener>> {
        self.listener.take()
    }

    /// Delivers every frame to the listener.
    pub fn arm_listener(&mut self) {
        trace!("Dispatcher armed for listener delivery");
        self.rearm(Capture::Listener, 0);
    }

    /// Captures the next frame of type `response` for a synchronous caller.
    pub fn arm_query(&mut self, response: ResponseType) {
        trace!("Dispatcher armed for {:?}", response);
        self.signal.set_remaining(1);
        self.rearm(Capture::Query(response), 1);
    }

    /// Captures the next `count` frames of type `response`. `count` must be non-zero.
    pub fn arm_scan(&mut self, response: ResponseType, count: usize) {
        trace!("Dispatcher armed for {} {:?} frames", count, response);
        self.signal.set_remaining(count);
        self.rearm(
            Capture::Scan {
                response,
                remaining: count,
            },
            count,
        );
    }

    fn rearm(&mut self, capture: Capture, count: usize) {
        self.capture = capture;
        self.captured.clear();
        self.captured.reserve_exact(count);
    }

    /// Hands out the captured frames in arrival order. Capacity is kept, so
    /// frames still owed to the armed request can be captured afterwards.
    pub fn drain_captured(&mut self) -> Drain<'_, Response> {
        self.captured.drain(..)
    }

    pub fn frames_delivered(&self) -> u64 {
        self.frames_delivered
    }

    pub fn frames_discarded(&self) -> u64 {
        self.frames_discarded
    }

    pub fn frames_ignored(&self) -> u64 {
        self.frames_ignored
    }

    /// Validates, decodes and routes one payload.
    pub fn dispatch(
        &mut self,
        response: ResponseType,
        payload: &[u8],
    ) -> std::result::Result<(), PayloadError> {
        let decoded = Response::decode(response, payload)?;

        if !is_well_formed(&decoded) {
            warn!("Discarding malformed {:?} frame", response);
            self.frames_discarded += 1;
            return Ok(());
        }

        match self.capture {
            Capture::Query(expected) if expected == response => {
                self.capture_frame(decoded, 0);
                self.capture = Capture::Listener;
            }
            Capture::Scan {
                response: expected,
                remaining,
            } if expected == response => {
                if remaining == 0 {
                    self.frames_ignored += 1;
                } else {
                    self.capture_frame(decoded, remaining - 1);
                    self.capture = Capture::Scan {
                        response: expected,
                        remaining: remaining - 1,
                    };
                }
            }
            _ => self.deliver(&decoded),
        }
        Ok(())
    }

    fn capture_frame(&mut self, decoded: Response, remaining: usize) {
        let response = decoded.response_type();
        trace!("Captured {:?} frame, {} to go", response, remaining);
        self.captured.push(decoded);
        self.frames_delivered += 1;
        self.signal.set_remaining(remaining);
        self.signal.complete(response);
    }

    fn deliver(&mut self, decoded: &Response) {
        let listener = match self.listener.as_mut() {
            Some(listener) => listener,
            None => {
                self.frames_ignored += 1;
                return;
            }
        };

        match decoded {
            Response::DeviceInfo(info) => listener.on_device_info(info),
            Response::Health(health) => listener.on_health(health),
            Response::SampleRate(rate) => listener.on_sample_rate(rate),
            Response::Configuration(conf) => listener.on_configuration(conf),
            Response::Measurement(m) => listener.on_measurement(m),
            Response::DenseMeasurement(m) => listener.on_dense_measurement(m),
        }
        self.frames_delivered += 1;
    }
}

fn is_well_formed(decoded: &Response) -> bool {
    match decoded {
        Response::Measurement(m) => m.check,
        Response::DenseMeasurement(m) => m.is_well_formed(),
        _ => true,
    }
}

impl FrameSink for ResponseDispatcher {
    fn on_frame(
        &mut self,
        response: ResponseType,
        payload: &[u8],
    ) -> std::result::Result<(), PayloadError> {
        self.dispatch(response, payload)
    }
}
