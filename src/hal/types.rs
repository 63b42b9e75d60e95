// src/hal/types.rs
//! Core types for dynamometer abstraction

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One reading of every selected sensor channel
#[derive(Debug, Clone, PartialEq)]
pub struct ForceSample {
    /// Seconds on the session's monotonic clock
    pub timestamp: f64,
    pub sequence: u64,
    /// Channel values in selection order; channel 1 is grip force in Newtons
    pub values: Vec<f64>,
}

impl ForceSample {
    /// Grip force, the first selected channel
    pub fn primary(&self) -> Option<f64> {
        self.values.first().copied()
    }
}

/// Device information reported after open
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub name: String,
    pub serial_number: String,
    pub available_channels: usize,
    pub connection: ConnectionType,
}

/// Transport used to reach the dynamometer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionType {
    Usb,
    Ble,
}

/// Connection request passed to [`ForceDevice::open`](crate::hal::ForceDevice::open)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    pub kind: ConnectionType,
    /// Specific device to open; `None` opens the first one found
    pub device_name: Option<String>,
}

impl Connection {
    pub fn usb(device_name: Option<String>) -> Self {
        Self {
            kind: ConnectionType::Usb,
            device_name,
        }
    }
}

/// Device lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceStatus {
    Closed,
    Open,
    Sampling,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DeviceError {
    #[error("device not found: {0}")]
    NotFound(String),
    #[error("failed to open device: {0}")]
    OpenFailed(String),
    #[error("device is not open")]
    NotOpen,
    #[error("device is not sampling")]
    NotStarted,
    #[error("sensor channel {channel} not available (device has {available})")]
    InvalidChannel { channel: u8, available: usize },
    #[error("no sensor channels selected")]
    NoChannels,
    #[error("invalid sample interval: {0} ms")]
    InvalidInterval(u32),
    #[error("read failed: {0}")]
    ReadFailed(String),
}
