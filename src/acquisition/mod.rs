// src/acquisition/mod.rs
//! Sensor acquisition and live trace buffering

pub mod sensor_reader;
pub mod trace_buffer;

pub use sensor_reader::{ReaderCounters, ReaderState, SensorReader};
pub use trace_buffer::TraceBuffer;
