// src/config/mod.rs
//! Configuration management

pub mod constants;
pub mod loader;

pub use constants::*;
pub use loader::{ConfigError, ConfigLoader};

use crate::hal::simulator::SimulatorConfig;
use crate::hal::{Connection, ConnectionType};
use crate::protocol::{CalibrationTiming, SequencerConfig};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Complete system configuration
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
pub struct SystemConfig {
    #[serde(default)]
    pub sensor: SensorConfig,
    #[serde(default)]
    pub experiment: ExperimentConfig,
    #[serde(default)]
    pub calibration: CalibrationConfig,
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Dynamometer connection and acquisition worker
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct SensorConfig {
    #[serde(default = "defaults::connection")]
    pub connection: ConnectionType,

    /// Device to open; `None` opens the first one found
    #[serde(default = "defaults::device_name", skip_serializing_if = "Option::is_none")]
    pub device_name: Option<String>,

    #[serde(default = "defaults::channels")]
    pub channels: Vec<u8>,

    #[serde(default = "defaults::sample_interval_ms")]
    pub sample_interval_ms: u32,

    #[serde(default = "defaults::queue_capacity")]
    pub queue_capacity: usize,

    #[serde(default)]
    pub simulator: SimulatorConfig,
}

impl SensorConfig {
    pub fn connection(&self) -> Connection {
        Connection {
            kind: self.connection,
            device_name: self.device_name.clone(),
        }
    }

    pub fn sample_rate_hz(&self) -> f64 {
        1000.0 / self.sample_interval_ms.max(1) as f64
    }
}

/// Grip-force experiment session
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ExperimentConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub participant_id: Option<String>,

    #[serde(default = "defaults::repeats_per_condition")]
    pub repeats_per_condition: usize,

    #[serde(default = "defaults::break_duration_secs")]
    pub break_duration_secs: f64,

    /// Start section 2 as soon as the break ends instead of waiting for the operator
    #[serde(default)]
    pub auto_resume_after_break: bool,

    #[serde(default = "defaults::experiment_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Seed for the trial shuffle; random when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl ExperimentConfig {
    pub fn sequencer_config(&self) -> SequencerConfig {
        SequencerConfig {
            break_duration_secs: self.break_duration_secs,
            auto_resume_after_break: self.auto_resume_after_break,
        }
    }

    pub fn participant(&self) -> &str {
        self.participant_id
            .as_deref()
            .filter(|p| !p.trim().is_empty())
            .unwrap_or(output::UNKNOWN_PARTICIPANT)
    }
}

/// MVC calibration run
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct CalibrationConfig {
    #[serde(default = "defaults::pre_trial_secs")]
    pub pre_trial_secs: f64,

    #[serde(default = "defaults::trial_secs")]
    pub trial_secs: f64,

    #[serde(default = "defaults::rest_secs")]
    pub rest_secs: f64,

    #[serde(default = "defaults::post_trial_secs")]
    pub post_trial_secs: f64,

    #[serde(default = "defaults::calibration_tick_interval_ms")]
    pub tick_interval_ms: u64,

    #[serde(default = "defaults::max_trace_samples")]
    pub max_trace_samples: usize,
}

impl From<&CalibrationConfig> for CalibrationTiming {
    fn from(config: &CalibrationConfig) -> Self {
        CalibrationTiming {
            pre_trial_secs: config.pre_trial_secs,
            trial_secs: config.trial_secs,
            rest_secs: config.rest_secs,
            post_trial_secs: config.post_trial_secs,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ScoringConfig {
    /// Reference used for any grip without a valid calibration value
    #[serde(default = "defaults::placeholder_mvc_newtons")]
    pub placeholder_mvc_newtons: f64,

    #[serde(default = "defaults::min_force_newtons")]
    pub min_force_newtons: f64,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct OutputConfig {
    #[serde(default = "defaults::output_directory")]
    pub directory: PathBuf,
}

impl OutputConfig {
    pub fn path(&self, file_name: &str) -> PathBuf {
        self.directory.join(file_name)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct TelemetryConfig {
    #[serde(default = "defaults::telemetry_enabled")]
    pub enabled: bool,

    #[serde(default = "defaults::outlet_capacity")]
    pub outlet_capacity: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct LoggingConfig {
    /// `EnvFilter` directive; `RUST_LOG` takes precedence when set
    #[serde(default = "defaults::log_level")]
    pub level: String,

    #[serde(default)]
    pub json: bool,
}

/// Default value providers using constants
mod defaults {
    use crate::config::constants::*;
    use crate::hal::ConnectionType;
    use std::path::PathBuf;

    pub fn connection() -> ConnectionType { ConnectionType::Usb }
    pub fn device_name() -> Option<String> { Some(sensor::DEFAULT_DEVICE_NAME.to_string()) }
    pub fn channels() -> Vec<u8> { sensor::DEFAULT_CHANNELS.to_vec() }
    pub fn sample_interval_ms() -> u32 { sensor::DEFAULT_SAMPLE_INTERVAL_MS }
    pub fn queue_capacity() -> usize { sensor::DEFAULT_QUEUE_CAPACITY }

    pub fn repeats_per_condition() -> usize { trials::DEFAULT_REPEATS_PER_CONDITION }
    pub fn break_duration_secs() -> f64 { trials::DEFAULT_BREAK_DURATION_SECS }
    pub fn experiment_tick_interval_ms() -> u64 { trials::DEFAULT_TICK_INTERVAL_MS }

    pub fn pre_trial_secs() -> f64 { calibration::DEFAULT_PRE_TRIAL_SECS }
    pub fn trial_secs() -> f64 { calibration::DEFAULT_TRIAL_SECS }
    pub fn rest_secs() -> f64 { calibration::DEFAULT_REST_SECS }
    pub fn post_trial_secs() -> f64 { calibration::DEFAULT_POST_TRIAL_SECS }
    pub fn calibration_tick_interval_ms() -> u64 { calibration::DEFAULT_TICK_INTERVAL_MS }
    pub fn max_trace_samples() -> usize { calibration::DEFAULT_MAX_TRACE_SAMPLES }

    pub fn placeholder_mvc_newtons() -> f64 { scoring::PLACEHOLDER_MVC_NEWTONS }
    pub fn min_force_newtons() -> f64 { scoring::MIN_FORCE_NEWTONS }

    pub fn output_directory() -> PathBuf { PathBuf::from(output::DEFAULT_DIRECTORY) }

    pub fn telemetry_enabled() -> bool { true }
    pub fn outlet_capacity() -> usize { telemetry::DEFAULT_OUTLET_CAPACITY }

    pub fn log_level() -> String { "info".to_string() }
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            connection: defaults::connection(),
            device_name: defaults::device_name(),
            channels: defaults::channels(),
            sample_interval_ms: defaults::sample_interval_ms(),
            queue_capacity: defaults::queue_capacity(),
            simulator: SimulatorConfig::default(),
        }
    }
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            participant_id: None,
            repeats_per_condition: defaults::repeats_per_condition(),
            break_duration_secs: defaults::break_duration_secs(),
            auto_resume_after_break: false,
            tick_interval_ms: defaults::experiment_tick_interval_ms(),
            seed: None,
        }
    }
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            pre_trial_secs: defaults::pre_trial_secs(),
            trial_secs: defaults::trial_secs(),
            rest_secs: defaults::rest_secs(),
            post_trial_secs: defaults::post_trial_secs(),
            tick_interval_ms: defaults::calibration_tick_interval_ms(),
            max_trace_samples: defaults::max_trace_samples(),
        }
    }
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            placeholder_mvc_newtons: defaults::placeholder_mvc_newtons(),
            min_force_newtons: defaults::min_force_newtons(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self { directory: defaults::output_directory() }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: defaults::telemetry_enabled(),
            outlet_capacity: defaults::outlet_capacity(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: defaults::log_level(), json: false }
    }
}

impl SystemConfig {
    /// Validate configuration consistency, returning every violation
    pub fn validate_consistency(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        let sensor_cfg = &self.sensor;
        if sensor_cfg.sample_interval_ms < sensor::MIN_SAMPLE_INTERVAL_MS {
            errors.push(format!(
                "sensor.sample_interval_ms must be at least {} ms",
                sensor::MIN_SAMPLE_INTERVAL_MS
            ));
        }
        if sensor_cfg.channels.is_empty() {
            errors.push("sensor.channels must select at least one channel".to_string());
        }
        if sensor_cfg.channels.len() > sensor::MAX_CHANNELS {
            errors.push(format!(
                "sensor.channels selects {} channels, maximum is {}",
                sensor_cfg.channels.len(),
                sensor::MAX_CHANNELS
            ));
        }
        if sensor_cfg.channels.contains(&0) {
            errors.push("sensor.channels are numbered from 1".to_string());
        }
        if sensor_cfg.queue_capacity == 0 {
            errors.push("sensor.queue_capacity must be positive".to_string());
        }
        if self.telemetry.enabled && sensor_cfg.channels.len() != telemetry::CHANNEL_COUNT {
            errors.push(format!(
                "telemetry stream carries {} channels but sensor.channels selects {}",
                telemetry::CHANNEL_COUNT,
                sensor_cfg.channels.len()
            ));
        }

        let exp = &self.experiment;
        if exp.repeats_per_condition == 0 || exp.repeats_per_condition > trials::MAX_REPEATS_PER_CONDITION {
            errors.push(format!(
                "experiment.repeats_per_condition must be within 1..={}",
                trials::MAX_REPEATS_PER_CONDITION
            ));
        }
        if !(exp.break_duration_secs >= 0.0) {
            errors.push("experiment.break_duration_secs must be non-negative".to_string());
        }
        if exp.tick_interval_ms == 0 {
            errors.push("experiment.tick_interval_ms must be positive".to_string());
        }

        let cal = &self.calibration;
        let durations = [
            ("pre_trial_secs", cal.pre_trial_secs),
            ("trial_secs", cal.trial_secs),
            ("rest_secs", cal.rest_secs),
            ("post_trial_secs", cal.post_trial_secs),
        ];
        for (name, secs) in durations {
            if !(secs >= 0.0) || !secs.is_finite() {
                errors.push(format!("calibration.{} must be a non-negative duration", name));
            }
        }
        if !(cal.trial_secs > 0.0) {
            errors.push("calibration.trial_secs must be positive".to_string());
        }
        let timing = CalibrationTiming::from(cal);
        if timing.trial1_window().end > timing.trial2_window().start {
            errors.push("calibration measurement windows overlap".to_string());
        }
        if cal.tick_interval_ms == 0 {
            errors.push("calibration.tick_interval_ms must be positive".to_string());
        }

        if !(self.scoring.placeholder_mvc_newtons > self.scoring.min_force_newtons) {
            errors.push(format!(
                "scoring.placeholder_mvc_newtons ({}) must exceed min_force_newtons ({})",
                self.scoring.placeholder_mvc_newtons, self.scoring.min_force_newtons
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
