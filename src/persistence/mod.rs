// src/persistence/mod.rs
//! CSV / JSON output of experiment sessions and MVC calibrations

pub mod event_log;
pub mod mvc_results;
pub mod percentages;
pub mod trial_orders;

pub use event_log::{LogRow, SessionLog};
pub use mvc_results::{MvcRecord, MvcResultsStore};
pub use percentages::write_percentages;
pub use trial_orders::{read_trial_orders, write_trial_orders};

use crate::config::constants::output;
use crate::protocol::TrialParseError;
use chrono::{DateTime, Local};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid trial identifier: {0}")]
    Trial(#[from] TrialParseError),
    #[error("malformed file: {0}")]
    Malformed(String),
}

pub type PersistenceResult<T> = Result<T, PersistenceError>;

/// `YYYYmmdd_HHMM` stamp used in session file names
pub fn file_stamp(at: DateTime<Local>) -> String {
    at.format(output::FILE_STAMP_FORMAT).to_string()
}
