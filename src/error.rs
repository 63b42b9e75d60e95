// src/error.rs
//! Unified error handling for grip-core
//!
//! Each subsystem owns a narrow error enum (`DeviceError`, `ConfigError`,
//! `PersistenceError`, `TrialParseError`, `TelemetryError`). They all convert into
//! [`GripError`] so session drivers and binaries can propagate with `?`.

use thiserror::Error;

use crate::config::ConfigError;
use crate::hal::DeviceError;
use crate::persistence::PersistenceError;
use crate::protocol::TrialParseError;
use crate::telemetry::TelemetryError;

/// Unified error type for the whole crate
#[derive(Debug, Error)]
pub enum GripError {
    /// Dynamometer failures (open, read, stop, close)
    #[error("device error: {0}")]
    Device(#[from] DeviceError),

    /// Configuration loading or validation
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Event log, trial orders and MVC tables
    #[error("persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    /// Malformed trial identifier
    #[error("trial error: {0}")]
    Trial(#[from] TrialParseError),

    /// Live stream outlet
    #[error("telemetry error: {0}")]
    Telemetry(#[from] TelemetryError),

    /// Session driver used out of order
    #[error("session error: {operation}: {reason}")]
    Session { operation: String, reason: String },
}

impl GripError {
    pub fn session(operation: &str, reason: impl Into<String>) -> Self {
        GripError::Session {
            operation: operation.to_string(),
            reason: reason.into(),
        }
    }

    /// Whether the session may keep running after this error.
    ///
    /// Device, persistence and telemetry failures degrade the session;
    /// configuration and protocol misuse do not.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            GripError::Device(_) | GripError::Persistence(_) | GripError::Telemetry(_)
        )
    }
}

/// Result alias used across the crate
pub type GripResult<T> = Result<T, GripError>;
