use rplidar_mapper::cmds::*;
use rplidar_mapper::*;
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::{Arc, Mutex};
use std::time::Duration;

// --- Simulated serial link and time ---

#[derive(Default)]
struct Bench {
    now: u32,
    rx: Option<RxHandle>,
    sent: Vec<Vec<u8>>,
    /// Bytes pushed back as soon as a command with this opcode is sent.
    replies: Vec<(u8, Vec<u8>)>,
    /// Bytes pushed once the virtual clock reaches the given time.
    scheduled: Vec<(u32, Vec<u8>)>,
    begins: usize,
    aborts: usize,
    fail_transmit: bool,
}

struct MockTransport {
    bench: Rc<RefCell<Bench>>,
}

impl Transport for MockTransport {
    fn begin_receive(&mut self, rx: RxHandle) -> Result<()> {
        let mut bench = self.bench.borrow_mut();
        bench.begins += 1;
        bench.rx = Some(rx);
        Ok(())
    }

    fn transmit(&mut self, bytes: &[u8]) -> Result<()> {
        let (rx, reply) = {
            let mut bench = self.bench.borrow_mut();
            if bench.fail_transmit {
                return Err(Error::TransportError {
                    description: "link down".to_owned(),
                });
            }
            bench.sent.push(bytes.to_vec());
            let reply = bench
                .replies
                .iter()
                .find(|(opcode, _)| *opcode == bytes[1])
                .map(|(_, reply)| reply.clone());
            (bench.rx.clone(), reply)
        };
        if let (Some(rx), Some(reply)) = (rx, reply) {
            rx.receive(&reply);
        }
        Ok(())
    }

    fn abort_receive(&mut self) {
        let mut bench = self.bench.borrow_mut();
        bench.aborts += 1;
        bench.rx = None;
    }
}

struct VirtualClock {
    bench: Rc<RefCell<Bench>>,
}

impl Clock for VirtualClock {
    fn now_ms(&self) -> u32 {
        self.bench.borrow().now
    }

    fn delay_ms(&self, ms: u32) {
        let (rx, due) = {
            let mut bench = self.bench.borrow_mut();
            bench.now = bench.now.wrapping_add(ms.max(1));
            let now = bench.now;
            let (due, later): (Vec<_>, Vec<_>) =
                bench.scheduled.drain(..).partition(|(at, _)| *at <= now);
            bench.scheduled = later;
            (bench.rx.clone(), due)
        };
        if let Some(rx) = rx {
            for (_, bytes) in due {
                rx.receive(&bytes);
            }
        }
    }
}

type Driver = RplidarDriver<MockTransport, VirtualClock>;

fn driver_with(config: DriverConfig) -> (Driver, Rc<RefCell<Bench>>) {
    let bench = Rc::new(RefCell::new(Bench::default()));
    let driver = RplidarDriver::with_config(
        MockTransport {
            bench: bench.clone(),
        },
        VirtualClock {
            bench: bench.clone(),
        },
        config,
    )
    .unwrap();
    (driver, bench)
}

fn driver() -> (Driver, Rc<RefCell<Bench>>) {
    driver_with(DriverConfig::default())
}

// --- Wire fixtures ---

fn single(tag: u8, payload: &[u8]) -> Vec<u8> {
    let mut bytes = Descriptor {
        length: payload.len(),
        mode: SendMode::Single,
        response: ResponseType::from_tag(tag),
    }
    .to_bytes()
    .to_vec();
    bytes.extend_from_slice(payload);
    bytes
}

fn device_info_frame() -> Vec<u8> {
    let mut bytes = vec![0xA5, 0x5A, 0x14, 0x00, 0x00, 0x00, 0x04];
    bytes.extend_from_slice(&[0x41, 0x03, 0x02, 0x05]);
    bytes.extend_from_slice(b"RPLIDARC1123456\0");
    bytes
}

fn measurement_stream(distances: &[u16]) -> Vec<u8> {
    let mut bytes = vec![0xA5, 0x5A, 0x05, 0x00, 0x00, 0x40, 0x81];
    for d in distances {
        bytes.extend_from_slice(&[0xF1, 0x61, 0x09]);
        bytes.extend_from_slice(&d.to_le_bytes());
    }
    bytes
}

#[derive(Default)]
struct Seen {
    measurements: Vec<Measurement>,
    dense: Vec<DenseMeasurement>,
    health: Vec<DeviceHealth>,
}

#[derive(Clone, Default)]
struct Recorder(Arc<Mutex<Seen>>);

impl Listener for Recorder {
    fn on_measurement(&mut self, measurement: &Measurement) {
        self.0.lock().unwrap().measurements.push(*measurement);
    }

    fn on_dense_measurement(&mut self, measurement: &DenseMeasurement) {
        self.0.lock().unwrap().dense.push(*measurement);
    }

    fn on_health(&mut self, health: &DeviceHealth) {
        self.0.lock().unwrap().health.push(*health);
    }
}

// --- Scenarios ---

#[test]
fn device_info_round_trip() {
    let (mut lidar, bench) = driver();
    bench
        .borrow_mut()
        .replies
        .push((RPLIDAR_CMD_GET_DEVICE_INFO, device_info_frame()));

    let info = lidar.get_device_info().unwrap();
    assert_eq!(info.model_major, 4);
    assert_eq!(info.model_sub, 1);
    assert_eq!(info.fw_major, 2);
    assert_eq!(info.fw_minor, 3);
    assert_eq!(info.hardware, 5);
    assert_eq!(&info.serial_number, b"RPLIDARC1123456\0");

    let bench = bench.borrow();
    assert_eq!(bench.sent, vec![vec![0xA5, 0x50]]);
    assert_eq!(bench.begins, 2);
    assert_eq!(bench.aborts, 1);
    assert_eq!(lidar.parser_state(), ParserState::AwaitingDescriptor);
}

#[test]
fn health_waits_for_its_frame() {
    let (mut lidar, bench) = driver();
    bench
        .borrow_mut()
        .scheduled
        .push((40, single(0x06, &[1, 0x34, 0x12])));

    let mut health = DeviceHealth::default();
    lidar
        .request_health(Some(&mut health), Duration::from_millis(100))
        .unwrap();
    assert!(bench.borrow().now >= 40);
    assert_eq!(health.status(), HealthStatus::Warning(0x1234));
}

#[test]
fn health_times_out_without_frame() {
    let (mut lidar, bench) = driver();
    let mut health = DeviceHealth::default();
    let err = lidar
        .request_health(Some(&mut health), Duration::from_millis(100))
        .unwrap_err();

    assert!(matches!(err, Error::OperationTimeout));
    assert!(bench.borrow().now >= 100);
    assert_eq!(health, DeviceHealth::default());
}

#[test]
fn sub_millisecond_timeout_still_expires() {
    let (mut lidar, bench) = driver();
    bench
        .borrow_mut()
        .scheduled
        .push((60_000, single(0x06, &[0, 0, 0])));

    let mut health = DeviceHealth::default();
    let err = lidar
        .request_health(Some(&mut health), Duration::from_micros(500))
        .unwrap_err();
    assert!(matches!(err, Error::OperationTimeout));
    assert!(bench.borrow().now < 10);
}

#[test]
fn zero_timeout_waits_indefinitely() {
    let (mut lidar, bench) = driver();
    bench
        .borrow_mut()
        .scheduled
        .push((5_000, single(0x15, &[0xFA, 0x01, 0x7D, 0x00])));

    let mut rate = SampleRate::default();
    lidar
        .request_sample_rate(Some(&mut rate), Duration::ZERO)
        .unwrap();
    assert_eq!(rate.standard_us, 506);
    assert_eq!(rate.express_us, 125);
}

#[test]
fn async_health_goes_to_listener() {
    let (mut lidar, bench) = driver();
    let recorder = Recorder::default();
    lidar.set_listener(recorder.clone());
    bench
        .borrow_mut()
        .replies
        .push((RPLIDAR_CMD_GET_DEVICE_HEALTH, single(0x06, &[0, 0, 0])));

    lidar.request_health(None, Duration::from_millis(10)).unwrap();
    assert_eq!(recorder.0.lock().unwrap().health.len(), 1);
    assert_eq!(bench.borrow().now, 0);
}

#[test]
fn async_scan_streams_to_listener() {
    let (mut lidar, bench) = driver();
    let recorder = Recorder::default();
    lidar.set_listener(recorder.clone());

    assert_eq!(lidar.start_scan(None, Duration::ZERO).unwrap(), 0);
    assert_eq!(bench.borrow().sent, vec![vec![0xA5, 0x20]]);

    let mut stream = vec![0xA5, 0x5A, 0x05, 0x00, 0x00, 0x40, 0x81];
    stream.extend_from_slice(&[0xF1, 0x61, 0x09, 0xD6, 0x1F]);
    lidar.rx_handle().receive(&stream);

    let seen = recorder.0.lock().unwrap();
    assert_eq!(seen.measurements.len(), 1);
    let m = seen.measurements[0];
    assert_eq!(m.quality, 60);
    assert_eq!(m.angle_q6, 1200);
    assert_eq!(m.distance_q2, 8150);
    assert!(m.check);
    assert!(m.is_revolution_start());
}

#[test]
fn check_bit_failure_is_not_delivered() {
    let (mut lidar, _bench) = driver();
    let recorder = Recorder::default();
    lidar.set_listener(recorder.clone());
    lidar.start_scan(Some(&mut []), Duration::ZERO).unwrap();

    let mut stream = measurement_stream(&[100, 200]);
    stream[7 + 1] &= 0xFE;
    lidar.rx_handle().receive(&stream);

    let seen = recorder.0.lock().unwrap();
    assert_eq!(seen.measurements.len(), 1);
    assert_eq!(seen.measurements[0].distance_q2, 200);
    assert_eq!(lidar.stats().frames_discarded, 1);
    assert_eq!(lidar.parser_state(), ParserState::AwaitingMultiResponse);
}

#[test]
fn bounded_scan_copies_at_most_count() {
    let (mut lidar, bench) = driver();
    bench
        .borrow_mut()
        .replies
        .push((RPLIDAR_CMD_SCAN, measurement_stream(&[10, 20, 30, 40, 50])));
    let recorder = Recorder::default();
    lidar.set_listener(recorder.clone());

    let mut dest = [Measurement::default(); 3];
    let copied = lidar
        .start_scan(Some(&mut dest), Duration::from_millis(50))
        .unwrap();

    assert_eq!(copied, 3);
    assert_eq!(
        dest.iter().map(|m| m.distance_q2).collect::<Vec<_>>(),
        vec![10, 20, 30]
    );
    assert_eq!(lidar.stats().frames_ignored, 2);
    assert!(recorder.0.lock().unwrap().measurements.is_empty());
}

#[test]
fn scan_burst_longer_than_a_revolution_is_copied_whole() {
    let (mut lidar, bench) = driver();
    let first: Vec<u16> = (0..40).collect();
    bench
        .borrow_mut()
        .replies
        .push((RPLIDAR_CMD_SCAN, measurement_stream(&first)));

    let mut dest = [Measurement::default(); 40];
    assert_eq!(
        lidar
            .start_scan(Some(&mut dest), Duration::from_millis(50))
            .unwrap(),
        40
    );
    assert_eq!(
        dest.iter().map(|m| m.distance_q2).collect::<Vec<_>>(),
        first
    );
    assert_eq!(lidar.stats().frames_delivered, 40);
    assert_eq!(bench.borrow().now, 0);

    // A late burst lands between two polls.
    let distances: Vec<u16> = (0..720).collect();
    let mut stream = measurement_stream(&distances);
    let tail = stream.split_off(7 + 5 * 300);
    {
        let mut bench = bench.borrow_mut();
        bench.replies.clear();
        bench.replies.push((RPLIDAR_CMD_SCAN, stream));
        bench.scheduled.push((3, tail));
    }
    let mut dest = vec![Measurement::default(); 720];
    assert_eq!(
        lidar
            .start_scan(Some(dest.as_mut_slice()), Duration::from_millis(50))
            .unwrap(),
        720
    );
    assert_eq!(
        dest.iter().map(|m| m.distance_q2).collect::<Vec<_>>(),
        distances
    );
}

#[test]
fn scan_times_out_when_frames_stop() {
    let (mut lidar, bench) = driver();
    bench
        .borrow_mut()
        .replies
        .push((RPLIDAR_CMD_SCAN, measurement_stream(&[10, 20])));

    let mut dest = [Measurement::default(); 4];
    assert!(matches!(
        lidar.start_scan(Some(&mut dest), Duration::from_millis(20)),
        Err(Error::OperationTimeout)
    ));
    assert_eq!(dest[1].distance_q2, 20);
}

#[test]
fn express_scan_collects_dense_frames() {
    let (mut lidar, bench) = driver();
    let mut stream = vec![0xA5, 0x5A, 0x54, 0x00, 0x00, 0x40, 0x85];
    for start in [0u16, 40] {
        stream.extend_from_slice(
            &DenseMeasurement::new(start * 64, start == 0, [1500; 40]).to_bytes(),
        );
    }
    bench
        .borrow_mut()
        .replies
        .push((RPLIDAR_CMD_EXPRESS_SCAN, stream));

    let mut dest = [DenseMeasurement::default(); 2];
    assert_eq!(
        lidar
            .start_scan_express(Some(&mut dest), Duration::from_millis(50))
            .unwrap(),
        2
    );
    assert_eq!(
        bench.borrow().sent[0],
        vec![0xA5, 0x82, 0x05, 0, 0, 0, 0, 0, 0x2C]
    );

    let mut decoder = DenseScanDecoder::new();
    assert!(decoder.push(&dest[0]).is_none());
    let points = decoder.push(&dest[1]).unwrap();
    assert_eq!(points.len(), 40);
    assert!(points.iter().all(|p| p.dist_mm_q2 == 6000));
}

#[test]
fn configuration_request_and_checksum() {
    let (mut lidar, bench) = driver();
    bench.borrow_mut().replies.push((
        RPLIDAR_CMD_GET_LIDAR_CONF,
        single(0x20, &[0x7C, 0x00, 0x00, 0x00, 0x02, 0x00]),
    ));

    let conf = lidar
        .get_lidar_conf(RPLIDAR_CONF_SCAN_MODE_TYPICAL, &[])
        .unwrap();
    assert_eq!(conf.config_type, RPLIDAR_CONF_SCAN_MODE_TYPICAL);
    assert_eq!(conf.as_u16(), Some(2));

    let sent = bench.borrow().sent[0].clone();
    assert_eq!(&sent[..7], &[0xA5, 0x84, 0x04, 0x7C, 0x00, 0x00, 0x00]);
    let sum = sent[..7].iter().fold(0u8, |acc, b| acc.wrapping_add(*b));
    assert_eq!(sent[7], sum);
}

#[test]
fn oversized_configuration_sends_nothing() {
    let (mut lidar, bench) = driver();
    let err = lidar
        .request_configuration(RPLIDAR_CONF_SCAN_MODE_NAME, &[0; 65], None, Duration::ZERO)
        .unwrap_err();
    assert!(matches!(err, Error::PayloadTooLarge { size: 65, max: 64 }));
    assert!(bench.borrow().sent.is_empty());
    assert_eq!(bench.borrow().aborts, 0);
}

#[test]
fn stop_and_motor_only_transmit() {
    let (mut lidar, bench) = driver();
    lidar.stop_scan().unwrap();
    lidar.set_motor_speed(600).unwrap();

    let bench = bench.borrow();
    assert_eq!(
        bench.sent,
        vec![vec![0xA5, 0x25], vec![0xA5, 0xA8, 0x02, 0x58, 0x02, 0xA9]]
    );
    assert_eq!(bench.begins, 1);
    assert_eq!(bench.aborts, 0);
    assert_eq!(bench.now, 0);
}

#[test]
fn reset_settles_then_drops_boot_banner() {
    let (mut lidar, bench) = driver();
    bench
        .borrow_mut()
        .scheduled
        .push((100, b"RP LIDAR System.\r\nFirmware Ver 1.29".to_vec()));

    lidar.reset().unwrap();

    assert_eq!(bench.borrow().sent, vec![vec![0xA5, 0x40]]);
    assert!(bench.borrow().now >= 500);
    assert_eq!(lidar.stats().framing_faults, 1);
    assert_eq!(lidar.parser_state(), ParserState::AwaitingDescriptor);
    assert_eq!(lidar.last_fault(), None);
}

#[test]
fn bad_sync_stops_parser_until_next_request() {
    let (mut lidar, bench) = driver();
    let recorder = Recorder::default();
    lidar.set_listener(recorder.clone());
    let rx = lidar.rx_handle();

    let mut stream = measurement_stream(&[1, 2]);
    stream[1] = 0x5B;
    rx.receive(&stream);
    assert_eq!(lidar.parser_state(), ParserState::Error);
    assert!(matches!(
        lidar.last_fault(),
        Some(ParserFault::Framing(FramingError::SyncByte { index: 1, value: 0x5B }))
    ));

    rx.receive(&measurement_stream(&[3]));
    assert!(recorder.0.lock().unwrap().measurements.is_empty());

    bench
        .borrow_mut()
        .replies
        .push((RPLIDAR_CMD_GET_DEVICE_HEALTH, single(0x06, &[0, 0, 0])));
    assert_eq!(lidar.get_health_status().unwrap(), HealthStatus::Healthy);
}

#[test]
fn payload_size_mismatch_faults_parser() {
    let (mut lidar, bench) = driver();
    bench
        .borrow_mut()
        .replies
        .push((RPLIDAR_CMD_GET_DEVICE_HEALTH, single(0x06, &[0, 0])));

    let err = lidar
        .request_health(Some(&mut DeviceHealth::default()), Duration::from_millis(10))
        .unwrap_err();
    assert!(matches!(err, Error::OperationTimeout));
    assert!(matches!(
        lidar.last_fault(),
        Some(ParserFault::Payload(PayloadError::LengthMismatch {
            expected: 3,
            actual: 2,
            ..
        }))
    ));
}

#[test]
fn byte_by_byte_delivery_across_wraparound() {
    let (mut lidar, _bench) = driver_with(DriverConfig::default().with_rx_buffer_size(16));
    let recorder = Recorder::default();
    lidar.set_listener(recorder.clone());
    lidar.start_scan(None, Duration::ZERO).unwrap();

    let distances: Vec<u16> = (0..20).map(|i| 100 + i).collect();
    let stream = measurement_stream(&distances);
    let rx = lidar.rx_handle();
    for (i, chunk) in stream.chunks(3).enumerate() {
        if i % 2 == 0 {
            for byte in chunk {
                rx.receive(std::slice::from_ref(byte));
            }
        } else {
            rx.receive(chunk);
        }
    }

    let seen = recorder.0.lock().unwrap();
    assert_eq!(
        seen.measurements.iter().map(|m| m.distance_q2).collect::<Vec<_>>(),
        distances
    );
    assert_eq!(lidar.stats().bytes_received, stream.len() as u64);
}

#[test]
fn transmit_failure_is_reported() {
    let (mut lidar, bench) = driver();
    bench.borrow_mut().fail_transmit = true;

    assert!(matches!(
        lidar.get_device_health(),
        Err(Error::TransportError { .. })
    ));
    assert!(matches!(
        lidar.stop_scan(),
        Err(Error::TransportError { .. })
    ));
}
