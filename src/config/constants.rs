// src/config/constants.rs
//! System-wide configuration constants

/// Fixed 30 s force-guidance cycle
pub mod cycle {
    pub const CYCLE_DURATION_SECS: f64 = 30.0;
    pub const REST_START_SECS: f64 = 0.0;
    pub const READY_START_SECS: f64 = 5.0;
    pub const RAMP_UP_START_SECS: f64 = 10.0;
    pub const HOLD_START_SECS: f64 = 15.0;
    pub const RAMP_DOWN_START_SECS: f64 = 25.0;

    /// "Get Ready!" cue toggles visibility this many times per second
    pub const READY_BLINK_TOGGLES_PER_SEC: f64 = 3.0;
}

/// Trial generation and block sequencing
pub mod trials {
    pub const DEFAULT_REPEATS_PER_CONDITION: usize = 5;
    pub const MAX_REPEATS_PER_CONDITION: usize = 50;
    pub const BLOCKS_PER_SESSION: usize = 2;
    pub const DEFAULT_BREAK_DURATION_SECS: f64 = 5.0 * 60.0;
    pub const DEFAULT_TICK_INTERVAL_MS: u64 = 5;
}

/// Dynamometer acquisition
pub mod sensor {
    pub const DEFAULT_DEVICE_NAME: &str = "GDX-HD 155003H9";
    pub const DEFAULT_CHANNELS: [u8; 4] = [1, 2, 3, 4];
    pub const DEFAULT_SAMPLE_INTERVAL_MS: u32 = 20;
    pub const MIN_SAMPLE_INTERVAL_MS: u32 = 1;
    pub const DEFAULT_QUEUE_CAPACITY: usize = 100;
    pub const MAX_CHANNELS: usize = 8;
}

/// MVC calibration sequence
pub mod calibration {
    pub const DEFAULT_PRE_TRIAL_SECS: f64 = 5.0;
    pub const DEFAULT_TRIAL_SECS: f64 = 5.0;
    pub const DEFAULT_REST_SECS: f64 = 10.0;
    pub const DEFAULT_POST_TRIAL_SECS: f64 = 5.0;
    pub const DEFAULT_TICK_INTERVAL_MS: u64 = 50;
    pub const DEFAULT_MAX_TRACE_SAMPLES: usize = 1500;
    pub const GO_BLINK_INTERVAL_MS: u64 = 500;
    pub const TRIALS_PER_MOTION: usize = 2;
}

/// Force normalization
pub mod scoring {
    pub const PLACEHOLDER_MVC_NEWTONS: f64 = 100.0;
    pub const MIN_FORCE_NEWTONS: f64 = 0.0;
    pub const MVC_PERCENT_LEVELS: [u8; 4] = [20, 40, 60, 80];
}

/// Live telemetry stream
pub mod telemetry {
    pub const STREAM_NAME: &str = "ForceSensor";
    pub const STREAM_TYPE: &str = "Force";
    pub const CHANNEL_COUNT: usize = 4;
    pub const NOMINAL_RATE_HZ: f64 = 50.0;
    pub const SOURCE_ID: &str = "force_stream_001";
    pub const DEFAULT_OUTLET_CAPACITY: usize = 1024;
}

/// Output files
pub mod output {
    pub const DEFAULT_DIRECTORY: &str = ".";
    pub const MVC_RESULTS_CSV: &str = "mvc_results.csv";
    pub const MVC_RESULTS_JSON: &str = "mvc_results.json";
    pub const MVC_PERCENTAGES_CSV: &str = "mvc_percentages.csv";
    pub const MVC_PERCENTAGES_JSON: &str = "mvc_percentages.json";
    pub const EVENT_LOG_PREFIX: &str = "experiment_timestamps";
    pub const TRIAL_ORDERS_PREFIX: &str = "trial_orders";
    pub const FILE_STAMP_FORMAT: &str = "%Y%m%d_%H%M";
    pub const UNKNOWN_PARTICIPANT: &str = "Unknown";
}

/// Configuration file locations
pub mod paths {
    pub const SYSTEM_CONFIG_PATH: &str = "/etc/grip-core/config.toml";
    pub const USER_CONFIG_DIR: &str = ".grip-core";
    pub const DEFAULT_CONFIG_FILE: &str = "config/default.toml";
    pub const LOCAL_CONFIG_FILE: &str = "config/local.toml";
    pub const ENV_PREFIX: &str = "GRIP__";
    pub const ENV_SEPARATOR: &str = "__";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_boundaries_are_ordered() {
        let starts = [
            cycle::REST_START_SECS,
            cycle::READY_START_SECS,
            cycle::RAMP_UP_START_SECS,
            cycle::HOLD_START_SECS,
            cycle::RAMP_DOWN_START_SECS,
            cycle::CYCLE_DURATION_SECS,
        ];
        assert!(starts.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_default_channels_match_telemetry() {
        assert_eq!(sensor::DEFAULT_CHANNELS.len(), telemetry::CHANNEL_COUNT);
        assert!(sensor::DEFAULT_CHANNELS.len() <= sensor::MAX_CHANNELS);
    }
}
