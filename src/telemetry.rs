// src/telemetry.rs
//! Outgoing live force stream
//!
//! [`TelemetryOutlet`] is the seam to a lab streaming layer. The crate ships
//! a bounded-channel outlet, for in-process consumers and tests, and a null
//! outlet for sessions that stream nothing.

use crate::config::constants::telemetry;
use crossbeam::channel::{bounded, Receiver, Sender, TrySendError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelFormat {
    Float32,
}

/// Stream metadata announced to consumers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamInfo {
    pub name: String,
    pub stream_type: String,
    pub channel_count: usize,
    pub nominal_rate_hz: f64,
    pub channel_format: ChannelFormat,
    pub source_id: String,
}

impl Default for StreamInfo {
    fn default() -> Self {
        Self {
            name: telemetry::STREAM_NAME.to_string(),
            stream_type: telemetry::STREAM_TYPE.to_string(),
            channel_count: telemetry::CHANNEL_COUNT,
            nominal_rate_hz: telemetry::NOMINAL_RATE_HZ,
            channel_format: ChannelFormat::Float32,
            source_id: telemetry::SOURCE_ID.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TelemetryError {
    #[error("sample has {got} channels, stream expects {expected}")]
    ChannelMismatch { expected: usize, got: usize },
    #[error("telemetry consumer disconnected")]
    Closed,
}

/// One pushed sample, narrowed to the stream's float32 format
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetrySample {
    pub timestamp: f64,
    pub values: Vec<f32>,
}

pub trait TelemetryOutlet: Send {
    fn info(&self) -> &StreamInfo;

    fn push_sample(&mut self, values: &[f64], timestamp: f64) -> Result<(), TelemetryError>;
}

/// Outlet backed by a bounded channel; pushes to a full channel are dropped
/// and counted
pub struct ChannelOutlet {
    info: StreamInfo,
    tx: Sender<TelemetrySample>,
    dropped: u64,
}

impl ChannelOutlet {
    pub fn new(info: StreamInfo, capacity: usize) -> (Self, Receiver<TelemetrySample>) {
        let (tx, rx) = bounded(capacity.max(1));
        (Self { info, tx, dropped: 0 }, rx)
    }

    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

impl TelemetryOutlet for ChannelOutlet {
    fn info(&self) -> &StreamInfo {
        &self.info
    }

    fn push_sample(&mut self, values: &[f64], timestamp: f64) -> Result<(), TelemetryError> {
        check_channels(&self.info, values)?;
        let sample = TelemetrySample {
            timestamp,
            values: values.iter().map(|&v| v as f32).collect(),
        };
        match self.tx.try_send(sample) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                self.dropped += 1;
                Ok(())
            }
            Err(TrySendError::Disconnected(_)) => Err(TelemetryError::Closed),
        }
    }
}

/// Outlet that validates and discards
#[derive(Debug, Default)]
pub struct NullOutlet {
    info: StreamInfo,
}

impl NullOutlet {
    pub fn new(info: StreamInfo) -> Self {
        Self { info }
    }
}

impl TelemetryOutlet for NullOutlet {
    fn info(&self) -> &StreamInfo {
        &self.info
    }

    fn push_sample(&mut self, values: &[f64], _timestamp: f64) -> Result<(), TelemetryError> {
        check_channels(&self.info, values)
    }
}

fn check_channels(info: &StreamInfo, values: &[f64]) -> Result<(), TelemetryError> {
    if values.len() != info.channel_count {
        return Err(TelemetryError::ChannelMismatch {
            expected: info.channel_count,
            got: values.len(),
        });
    }
    Ok(())
}
