// src/acquisition/sensor_reader.rs
//! Background dynamometer polling
//!
//! The worker thread owns the device while it runs and publishes every
//! sample twice: into a bounded queue (full queue drops the sample) and into
//! a latest-value slot (last write wins). Shutdown is a fixed handshake:
//! raise the stop flag, close the queue, join the worker, and only then stop
//! and close the device. The worker hands the device back through its join
//! handle, so the device cannot be released while a read is in flight.

use crate::config::SensorConfig;
use crate::hal::{DeviceError, DeviceInfo, ForceDevice, ForceSample};
use crate::utils::time::TimeProvider;
use crossbeam::channel::{bounded, Receiver, Sender, TrySendError};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Reader lifecycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReaderState {
    Running,
    /// The device could not be brought up; the session continues without data
    Disabled { reason: String },
    Stopped,
}

#[derive(Debug, Default)]
struct ReaderStats {
    samples_read: AtomicU64,
    samples_dropped: AtomicU64,
    empty_reads: AtomicU64,
    read_errors: AtomicU64,
}

/// Snapshot of the worker counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReaderCounters {
    pub samples_read: u64,
    pub samples_dropped: u64,
    pub empty_reads: u64,
    pub read_errors: u64,
}

pub struct SensorReader {
    receiver: Option<Receiver<ForceSample>>,
    latest: Arc<Mutex<Option<ForceSample>>>,
    stop: Arc<AtomicBool>,
    worker: Option<JoinHandle<Box<dyn ForceDevice>>>,
    stats: Arc<ReaderStats>,
    state: ReaderState,
    device_info: Option<DeviceInfo>,
}

impl SensorReader {
    /// Open the device and start polling it. Never fails: if the device
    /// cannot be opened or started the reader comes back disabled.
    pub fn spawn(
        mut device: Box<dyn ForceDevice>,
        config: &SensorConfig,
        clock: Arc<dyn TimeProvider>,
    ) -> Self {
        if let Err(e) = Self::bring_up(device.as_mut(), config) {
            error!(error = %e, "error opening sensor, continuing without force data");
            return Self::disabled(e.to_string());
        }
        let device_info = device.device_info();
        info!(device = %device_info.name, channels = ?config.channels, "sensor started");

        let (tx, rx) = bounded(config.queue_capacity.max(1));
        let latest = Arc::new(Mutex::new(None));
        let stop = Arc::new(AtomicBool::new(false));
        let stats = Arc::new(ReaderStats::default());
        let retry_delay = Duration::from_millis(config.sample_interval_ms as u64);

        let worker = {
            let latest = Arc::clone(&latest);
            let stop = Arc::clone(&stop);
            let stats = Arc::clone(&stats);
            thread::Builder::new()
                .name("sensor-reader".to_string())
                .spawn(move || poll_device(device, tx, latest, stop, stats, clock, retry_delay))
        };

        match worker {
            Ok(handle) => Self {
                receiver: Some(rx),
                latest,
                stop,
                worker: Some(handle),
                stats,
                state: ReaderState::Running,
                device_info: Some(device_info),
            },
            Err(e) => {
                // the closure, and the device with it, was dropped by the failed spawn
                error!(error = %e, "failed to spawn sensor worker");
                Self::disabled(format!("failed to spawn sensor worker: {}", e))
            }
        }
    }

    fn bring_up(device: &mut dyn ForceDevice, config: &SensorConfig) -> Result<(), DeviceError> {
        device.open(&config.connection())?;
        let started = device
            .select_sensors(&config.channels)
            .and_then(|_| device.start(config.sample_interval_ms));
        if let Err(e) = started {
            let _ = device.close();
            return Err(e);
        }
        Ok(())
    }

    fn disabled(reason: String) -> Self {
        Self {
            receiver: None,
            latest: Arc::new(Mutex::new(None)),
            stop: Arc::new(AtomicBool::new(true)),
            worker: None,
            stats: Arc::new(ReaderStats::default()),
            state: ReaderState::Disabled { reason },
            device_info: None,
        }
    }

    pub fn state(&self) -> &ReaderState {
        &self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == ReaderState::Running
    }

    pub fn device_info(&self) -> Option<&DeviceInfo> {
        self.device_info.as_ref()
    }

    /// Most recent sample, without consuming the queue
    pub fn latest(&self) -> Option<ForceSample> {
        self.latest.lock().clone()
    }

    /// Everything queued since the last call, oldest first
    pub fn drain(&self) -> Vec<ForceSample> {
        self.receiver
            .as_ref()
            .map(|rx| rx.try_iter().collect())
            .unwrap_or_default()
    }

    /// Wait up to `timeout` for the next queued sample
    pub fn recv_timeout(&self, timeout: Duration) -> Option<ForceSample> {
        self.receiver.as_ref()?.recv_timeout(timeout).ok()
    }

    pub fn counters(&self) -> ReaderCounters {
        ReaderCounters {
            samples_read: self.stats.samples_read.load(Ordering::Relaxed),
            samples_dropped: self.stats.samples_dropped.load(Ordering::Relaxed),
            empty_reads: self.stats.empty_reads.load(Ordering::Relaxed),
            read_errors: self.stats.read_errors.load(Ordering::Relaxed),
        }
    }

    /// Stop the worker, then stop and close the device. Idempotent.
    pub fn shutdown(&mut self) -> Result<(), DeviceError> {
        let Some(handle) = self.worker.take() else {
            return Ok(());
        };
        self.stop.store(true, Ordering::Release);
        drop(self.receiver.take());

        let mut device = match handle.join() {
            Ok(device) => device,
            Err(_) => {
                self.state = ReaderState::Stopped;
                error!("sensor worker panicked; device handle lost");
                return Err(DeviceError::ReadFailed("sensor worker panicked".to_string()));
            }
        };
        self.state = ReaderState::Stopped;

        let stopped = device.stop();
        let closed = device.close();
        let counters = self.counters();
        info!(
            read = counters.samples_read,
            dropped = counters.samples_dropped,
            errors = counters.read_errors,
            "sensor stopped"
        );
        stopped.and(closed)
    }
}

impl Drop for SensorReader {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            warn!(error = %e, "error stopping sensor");
        }
    }
}

fn poll_device(
    mut device: Box<dyn ForceDevice>,
    tx: Sender<ForceSample>,
    latest: Arc<Mutex<Option<ForceSample>>>,
    stop: Arc<AtomicBool>,
    stats: Arc<ReaderStats>,
    clock: Arc<dyn TimeProvider>,
    retry_delay: Duration,
) -> Box<dyn ForceDevice> {
    let mut sequence = 0u64;
    while !stop.load(Ordering::Acquire) {
        match device.read() {
            Ok(Some(values)) => {
                sequence += 1;
                let sample = ForceSample {
                    timestamp: clock.now_secs(),
                    sequence,
                    values,
                };
                *latest.lock() = Some(sample.clone());
                stats.samples_read.fetch_add(1, Ordering::Relaxed);
                match tx.try_send(sample) {
                    Ok(()) => {}
                    Err(TrySendError::Full(_)) => {
                        stats.samples_dropped.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(TrySendError::Disconnected(_)) => break,
                }
            }
            Ok(None) => {
                stats.empty_reads.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                stats.read_errors.fetch_add(1, Ordering::Relaxed);
                warn!(error = %e, "sensor read error");
                thread::sleep(retry_delay);
            }
        }
    }
    debug!(samples = sequence, "sensor worker exiting");
    device
}
