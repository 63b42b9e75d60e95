// src/session/mod.rs
//! Session drivers tying the protocol state machines to devices and files

pub mod calibration;
pub mod experiment;
pub mod runner;

pub use calibration::{CalibrationSession, CalibrationUpdate};
pub use experiment::{ExperimentFrame, ForceExperiment};
pub use runner::{load_config, run_calibration, run_experiment, ExperimentReport, RunEnd};
