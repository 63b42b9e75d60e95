//! grip-core: grip-force experiment and MVC calibration library
//!
//! This library drives hand-dynamometer studies. It features:
//!
//! - Hardware abstraction for force sensors, with a simulated dynamometer
//! - A background acquisition worker with a bounded sample queue
//! - The 30 s force-guidance cycle and a two-block trial sequencer
//! - MVC calibration runs and force normalization
//! - CSV / JSON persistence of event logs, trial orders and MVC tables
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use grip_core::acquisition::SensorReader;
//! use grip_core::config::SystemConfig;
//! use grip_core::hal::simulator::SimulatedDynamometer;
//! use grip_core::utils::MonotonicTimeProvider;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let config = SystemConfig::default();
//! let device = SimulatedDynamometer::new(config.sensor.simulator.clone());
//! let mut reader = SensorReader::spawn(
//!     Box::new(device),
//!     &config.sensor,
//!     Arc::new(MonotonicTimeProvider::new()),
//! );
//!
//! for _ in 0..10 {
//!     if let Some(sample) = reader.recv_timeout(Duration::from_millis(100)) {
//!         println!("grip force: {:?} N", sample.primary());
//!     }
//! }
//! reader.shutdown().ok();
//! ```

#![warn(clippy::all)]
#![allow(clippy::module_inception)]

pub mod acquisition;
pub mod config;
pub mod error;
pub mod hal;
pub mod logging;
pub mod persistence;
pub mod protocol;
pub mod scoring;
pub mod session;
pub mod telemetry;
pub mod utils;

// Re-export commonly used types for convenience
pub use acquisition::{SensorReader, TraceBuffer};
pub use config::{ConfigLoader, SystemConfig};
pub use error::{GripError, GripResult};
pub use hal::{DeviceError, DeviceInfo, ForceDevice, ForceSample};
pub use protocol::{GripType, MvcLevel, SessionEvent, SessionState, TrialBlock, TrialSpec};
pub use scoring::MvcReference;
pub use session::{CalibrationSession, ForceExperiment};
pub use utils::time::TimeProvider;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Get library information
pub fn version_info() -> VersionInfo {
    VersionInfo {
        name: NAME.to_string(),
        version: VERSION.to_string(),
        description: "Grip-force experiment and MVC calibration core".to_string(),
        features: vec![
            "Force sensor abstraction and simulator".to_string(),
            "Background acquisition worker".to_string(),
            "Trial sequencing over the force-guidance cycle".to_string(),
            "MVC calibration and normalization".to_string(),
            "CSV and JSON session records".to_string(),
        ],
    }
}

/// Library version information
#[derive(Debug, Clone)]
pub struct VersionInfo {
    /// Library name
    pub name: String,
    /// Version string
    pub version: String,
    /// Description
    pub description: String,
    /// List of features
    pub features: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_info() {
        let info = version_info();
        assert_eq!(info.name, NAME);
        assert_eq!(info.version, VERSION);
        assert!(!info.features.is_empty());
    }

    #[test]
    fn test_constants() {
        assert_eq!(NAME, "grip-core");
        assert!(!VERSION.is_empty());
    }
}
