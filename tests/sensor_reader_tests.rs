// tests/sensor_reader_tests.rs
//! Acquisition worker behaviour seen through the public API

use grip_core::acquisition::{ReaderState, SensorReader};
use grip_core::config::SensorConfig;
use grip_core::hal::simulator::{SimulatedDynamometer, SimulatorConfig};
use grip_core::hal::{Connection, ConnectionType, DeviceError, DeviceInfo, ForceDevice};
use grip_core::utils::{MockTimeProvider, TimeProvider};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

fn config() -> SensorConfig {
    SensorConfig {
        sample_interval_ms: 1,
        queue_capacity: 32,
        ..SensorConfig::default()
    }
}

fn wait_for<F: Fn() -> bool>(cond: F) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(1));
    }
    false
}

/// Device that records every driver call
struct RecordingDevice {
    calls: Arc<Mutex<Vec<&'static str>>>,
    reading: Arc<AtomicBool>,
}

impl RecordingDevice {
    fn new() -> (Self, Arc<Mutex<Vec<&'static str>>>, Arc<AtomicBool>) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let reading = Arc::new(AtomicBool::new(false));
        let device = Self { calls: Arc::clone(&calls), reading: Arc::clone(&reading) };
        (device, calls, reading)
    }

    fn log(&self, call: &'static str) {
        self.calls.lock().push(call);
    }
}

impl ForceDevice for RecordingDevice {
    fn open(&mut self, connection: &Connection) -> Result<(), DeviceError> {
        assert_eq!(connection.kind, ConnectionType::Usb);
        self.log("open");
        Ok(())
    }

    fn select_sensors(&mut self, _channels: &[u8]) -> Result<(), DeviceError> {
        self.log("select_sensors");
        Ok(())
    }

    fn start(&mut self, _interval_ms: u32) -> Result<(), DeviceError> {
        self.log("start");
        Ok(())
    }

    fn read(&mut self) -> Result<Option<Vec<f64>>, DeviceError> {
        self.reading.store(true, Ordering::SeqCst);
        thread::sleep(Duration::from_millis(2));
        self.reading.store(false, Ordering::SeqCst);
        Ok(Some(vec![12.0, 0.0, 0.0, 0.0]))
    }

    fn stop(&mut self) -> Result<(), DeviceError> {
        assert!(!self.reading.load(Ordering::SeqCst), "stop during read");
        self.log("stop");
        Ok(())
    }

    fn close(&mut self) -> Result<(), DeviceError> {
        assert!(!self.reading.load(Ordering::SeqCst), "close during read");
        self.log("close");
        Ok(())
    }

    fn device_info(&self) -> DeviceInfo {
        DeviceInfo {
            name: "Recording".to_string(),
            serial_number: "0".to_string(),
            available_channels: 4,
            connection: ConnectionType::Usb,
        }
    }
}

#[test]
fn test_shutdown_releases_device_after_worker_exits() {
    let (device, calls, _reading) = RecordingDevice::new();
    let clock: Arc<dyn TimeProvider> = Arc::new(MockTimeProvider::new(0));
    let mut reader = SensorReader::spawn(Box::new(device), &config(), clock);
    assert!(reader.is_running());
    assert_eq!(reader.device_info().map(|i| i.name.as_str()), Some("Recording"));

    assert!(wait_for(|| reader.counters().samples_read >= 3));
    reader.shutdown().expect("Failed to shut down reader");

    assert_eq!(*calls.lock(), vec!["open", "select_sensors", "start", "stop", "close"]);
    assert_eq!(reader.state(), &ReaderState::Stopped);
}

#[test]
fn test_drop_shuts_reader_down() {
    let (device, calls, _reading) = RecordingDevice::new();
    let clock: Arc<dyn TimeProvider> = Arc::new(MockTimeProvider::new(0));
    {
        let reader = SensorReader::spawn(Box::new(device), &config(), clock);
        assert!(wait_for(|| reader.latest().is_some()));
    }
    assert_eq!(calls.lock().last(), Some(&"close"));
}

#[test]
fn test_samples_are_stamped_from_injected_clock() {
    let clock = Arc::new(MockTimeProvider::new(0));
    clock.advance_secs(42.0);
    let device = SimulatedDynamometer::new(SimulatorConfig::constant(80.0));
    let mut reader = SensorReader::spawn(Box::new(device), &config(), clock.clone());

    let sample = reader.recv_timeout(Duration::from_secs(5)).expect("no sample");
    assert!((sample.timestamp - 42.0).abs() < 1e-9);
    assert_eq!(sample.sequence, 1);
    assert_eq!(sample.primary(), Some(80.0));
    reader.shutdown().unwrap();
}

#[test]
fn test_empty_reads_publish_nothing() {
    let mut sim = SimulatorConfig::constant(5.0);
    sim.faults.empty_read_every = Some(1);
    let clock: Arc<dyn TimeProvider> = Arc::new(MockTimeProvider::new(0));
    let mut reader = SensorReader::spawn(Box::new(SimulatedDynamometer::new(sim)), &config(), clock);

    assert!(wait_for(|| reader.counters().empty_reads >= 10));
    assert!(reader.latest().is_none());
    assert!(reader.drain().is_empty());
    assert_eq!(reader.counters().samples_read, 0);
    reader.shutdown().unwrap();
}

#[test]
fn test_latest_tracks_newest_sample() {
    let clock = Arc::new(MockTimeProvider::new(0));
    let device = SimulatedDynamometer::new(SimulatorConfig::constant(3.0));
    let cfg = SensorConfig { queue_capacity: 1, ..config() };
    let mut reader = SensorReader::spawn(Box::new(device), &cfg, clock);

    assert!(wait_for(|| reader.counters().samples_read > 5));
    let latest = reader.latest().expect("latest sample");
    let queued = reader.drain();
    assert!(queued.len() <= 1);
    if let Some(oldest) = queued.first() {
        assert!(oldest.sequence <= latest.sequence);
    }
    reader.shutdown().unwrap();
}
