// src/hal/traits.rs
//! Core HAL trait for dynamometer abstraction

use crate::hal::types::{Connection, DeviceError, DeviceInfo};

/// Hand-dynamometer driver, shaped after the vendor SDK call sequence:
/// `open → select_sensors → start → read* → stop → close`.
///
/// Implementations are moved into the acquisition worker thread and handed
/// back on join, so they only need to be `Send`.
pub trait ForceDevice: Send {
    /// Open the device over the requested transport
    fn open(&mut self, connection: &Connection) -> Result<(), DeviceError>;

    /// Choose which sensor channels (1-based) are returned by `read`
    fn select_sensors(&mut self, channels: &[u8]) -> Result<(), DeviceError>;

    /// Begin sampling every `interval_ms`
    fn start(&mut self, interval_ms: u32) -> Result<(), DeviceError>;

    /// Next reading of the selected channels.
    ///
    /// `Ok(None)` means the device produced no data this period.
    fn read(&mut self) -> Result<Option<Vec<f64>>, DeviceError>;

    /// Stop sampling
    fn stop(&mut self) -> Result<(), DeviceError>;

    /// Release the device handle
    fn close(&mut self) -> Result<(), DeviceError>;

    fn device_info(&self) -> DeviceInfo;
}
