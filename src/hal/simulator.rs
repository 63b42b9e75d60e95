//! Simulated hand dynamometer
//!
//! Generates a grip-force signal on channel 1 from a configurable
//! [`ForceProfile`] plus uniform noise; any further selected channels carry
//! noise only. Reads are paced to the sampling interval unless
//! `pace_reads` is off, in which case they return immediately and the
//! profile advances on the sample clock (`sequence × interval`).
//!
//! Faults (open failure, periodic read errors, empty reads) can be injected
//! to exercise the degraded paths of the acquisition worker.

use crate::config::constants::{cycle, sensor};
use crate::hal::{Connection, ConnectionType, DeviceError, DeviceInfo, DeviceStatus, ForceDevice};
use crate::protocol::phase::reference_force;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::debug;

/// Shape of the simulated grip force over time
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ForceProfile {
    Constant { newtons: f64 },
    Sinusoidal { offset_newtons: f64, amplitude_newtons: f64, frequency_hz: f64 },
    /// Follows the 30 s guidance trapezoid at full target
    Trapezoid { peak_newtons: f64 },
    Random { max_newtons: f64 },
}

/// Deterministic fault injection
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct FaultInjection {
    #[serde(default)]
    pub fail_open: bool,
    /// Every n-th read returns `DeviceError::ReadFailed`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_error_every: Option<u64>,
    /// Every n-th read returns no data
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub empty_read_every: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SimulatorConfig {
    pub profile: ForceProfile,
    pub noise_newtons: f64,
    pub available_channels: usize,
    pub pace_reads: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    #[serde(default)]
    pub faults: FaultInjection,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            profile: ForceProfile::Trapezoid { peak_newtons: 60.0 },
            noise_newtons: 0.5,
            available_channels: sensor::DEFAULT_CHANNELS.len(),
            pace_reads: true,
            seed: None,
            faults: FaultInjection::default(),
        }
    }
}

impl SimulatorConfig {
    /// Noise-free, unpaced constant force; handy for tests
    pub fn constant(newtons: f64) -> Self {
        Self {
            profile: ForceProfile::Constant { newtons },
            noise_newtons: 0.0,
            pace_reads: false,
            seed: Some(0),
            ..Self::default()
        }
    }
}

pub struct SimulatedDynamometer {
    config: SimulatorConfig,
    status: DeviceStatus,
    selected: Vec<u8>,
    interval: Duration,
    sequence: u64,
    next_due: Option<Instant>,
    rng: StdRng,
}

impl SimulatedDynamometer {
    pub fn new(config: SimulatorConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            config,
            status: DeviceStatus::Closed,
            selected: Vec::new(),
            interval: Duration::from_millis(sensor::DEFAULT_SAMPLE_INTERVAL_MS as u64),
            sequence: 0,
            next_due: None,
            rng,
        }
    }

    pub fn status(&self) -> DeviceStatus {
        self.status
    }

    /// Force in Newtons at `t` seconds after sampling started
    pub fn force_at(&mut self, t: f64) -> f64 {
        match self.config.profile {
            ForceProfile::Constant { newtons } => newtons,
            ForceProfile::Sinusoidal { offset_newtons, amplitude_newtons, frequency_hz } => {
                offset_newtons
                    + amplitude_newtons * (2.0 * std::f64::consts::PI * frequency_hz * t).sin()
            }
            ForceProfile::Trapezoid { peak_newtons } => {
                peak_newtons * reference_force(t % cycle::CYCLE_DURATION_SECS, 1.0)
            }
            ForceProfile::Random { max_newtons } => {
                if max_newtons > 0.0 {
                    self.rng.gen_range(0.0..max_newtons)
                } else {
                    0.0
                }
            }
        }
    }

    fn noise(&mut self) -> f64 {
        let n = self.config.noise_newtons;
        if n > 0.0 {
            self.rng.gen_range(-n..=n)
        } else {
            0.0
        }
    }

    fn pace(&mut self) {
        if !self.config.pace_reads {
            return;
        }
        let now = Instant::now();
        let due = self.next_due.unwrap_or(now);
        if due > now {
            std::thread::sleep(due - now);
        }
        self.next_due = Some(due.max(now) + self.interval);
    }

    fn is_nth(counter: u64, every: Option<u64>) -> bool {
        matches!(every, Some(n) if n > 0 && counter % n == 0)
    }
}

impl ForceDevice for SimulatedDynamometer {
    fn open(&mut self, connection: &Connection) -> Result<(), DeviceError> {
        if self.config.faults.fail_open {
            return Err(DeviceError::OpenFailed(format!(
                "no {:?} device answered{}",
                connection.kind,
                connection
                    .device_name
                    .as_deref()
                    .map(|n| format!(" as {}", n))
                    .unwrap_or_default()
            )));
        }
        self.status = DeviceStatus::Open;
        debug!(?connection, "simulated dynamometer opened");
        Ok(())
    }

    fn select_sensors(&mut self, channels: &[u8]) -> Result<(), DeviceError> {
        if self.status == DeviceStatus::Closed {
            return Err(DeviceError::NotOpen);
        }
        if channels.is_empty() {
            return Err(DeviceError::NoChannels);
        }
        let available = self.config.available_channels;
        if let Some(&channel) = channels
            .iter()
            .find(|&&c| c == 0 || c as usize > available)
        {
            return Err(DeviceError::InvalidChannel { channel, available });
        }
        self.selected = channels.to_vec();
        Ok(())
    }

    fn start(&mut self, interval_ms: u32) -> Result<(), DeviceError> {
        if self.status == DeviceStatus::Closed {
            return Err(DeviceError::NotOpen);
        }
        if interval_ms < sensor::MIN_SAMPLE_INTERVAL_MS {
            return Err(DeviceError::InvalidInterval(interval_ms));
        }
        if self.selected.is_empty() {
            self.selected = vec![1];
        }
        self.interval = Duration::from_millis(interval_ms as u64);
        self.sequence = 0;
        self.next_due = None;
        self.status = DeviceStatus::Sampling;
        Ok(())
    }

    fn read(&mut self) -> Result<Option<Vec<f64>>, DeviceError> {
        if self.status != DeviceStatus::Sampling {
            return Err(DeviceError::NotStarted);
        }
        self.pace();
        self.sequence += 1;

        let faults = &self.config.faults;
        if Self::is_nth(self.sequence, faults.read_error_every) {
            return Err(DeviceError::ReadFailed(format!(
                "simulated transfer error at read {}",
                self.sequence
            )));
        }
        if Self::is_nth(self.sequence, faults.empty_read_every) {
            return Ok(None);
        }

        let t = (self.sequence - 1) as f64 * self.interval.as_secs_f64();
        let selected = self.selected.clone();
        let values = selected
            .iter()
            .map(|&channel| {
                let base = if channel == 1 { self.force_at(t) } else { 0.0 };
                base + self.noise()
            })
            .collect();
        Ok(Some(values))
    }

    fn stop(&mut self) -> Result<(), DeviceError> {
        match self.status {
            DeviceStatus::Closed => Err(DeviceError::NotOpen),
            _ => {
                self.status = DeviceStatus::Open;
                Ok(())
            }
        }
    }

    fn close(&mut self) -> Result<(), DeviceError> {
        if self.status == DeviceStatus::Closed {
            return Err(DeviceError::NotOpen);
        }
        self.status = DeviceStatus::Closed;
        self.selected.clear();
        Ok(())
    }

    fn device_info(&self) -> DeviceInfo {
        DeviceInfo {
            name: "Simulated Hand Dynamometer".to_string(),
            serial_number: "SIM-HD-0001".to_string(),
            available_channels: self.config.available_channels,
            connection: ConnectionType::Usb,
        }
    }
}
