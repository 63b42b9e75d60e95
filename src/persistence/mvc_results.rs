//! MVC results table: `mvc_results.csv` plus a JSON-lines mirror
//!
//! Both files are append-only; the CSV header is written only when the file
//! is first created. The most recent row is the reference for the next
//! experiment session.

use crate::config::constants::output;
use crate::persistence::PersistenceResult;
use crate::protocol::{GripType, MotionResults};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// One calibration of all three motions, in Newtons
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MvcRecord {
    #[serde(rename = "ParticipantID")]
    pub participant_id: String,
    #[serde(rename = "Date")]
    pub date: String,
    #[serde(rename = "Time")]
    pub time: String,
    #[serde(rename = "Full Grasp (Grip)", default, deserialize_with = "csv::invalid_option")]
    pub full_grasp: Option<f64>,
    #[serde(rename = "Pinch (Index Finger)", default, deserialize_with = "csv::invalid_option")]
    pub index_pinch: Option<f64>,
    #[serde(rename = "Pinch (Middle Finger)", default, deserialize_with = "csv::invalid_option")]
    pub middle_pinch: Option<f64>,
}

impl MvcRecord {
    pub fn new(participant_id: &str, results: &MotionResults, at: DateTime<Local>) -> Self {
        let participant_id = match participant_id.trim() {
            "" => output::UNKNOWN_PARTICIPANT.to_string(),
            id => id.to_string(),
        };
        Self {
            participant_id,
            date: at.format("%Y-%m-%d").to_string(),
            time: at.format("%H:%M:%S").to_string(),
            full_grasp: Some(results.full_grasp),
            index_pinch: Some(results.index_pinch),
            middle_pinch: Some(results.middle_pinch),
        }
    }

    pub fn value(&self, grip: GripType) -> Option<f64> {
        match grip {
            GripType::FullGrasp => self.full_grasp,
            GripType::IndexPinch => self.index_pinch,
            GripType::MiddlePinch => self.middle_pinch,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MvcResultsStore {
    csv_path: PathBuf,
    json_path: PathBuf,
}

impl MvcResultsStore {
    pub fn new(dir: &Path) -> Self {
        Self {
            csv_path: dir.join(output::MVC_RESULTS_CSV),
            json_path: dir.join(output::MVC_RESULTS_JSON),
        }
    }

    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }

    pub fn json_path(&self) -> &Path {
        &self.json_path
    }

    pub fn append(&self, record: &MvcRecord) -> PersistenceResult<()> {
        if let Some(dir) = self.csv_path.parent() {
            std::fs::create_dir_all(dir)?;
        }

        let write_header = std::fs::metadata(&self.csv_path)
            .map(|m| m.len() == 0)
            .unwrap_or(true);
        let file = OpenOptions::new().create(true).append(true).open(&self.csv_path)?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(write_header)
            .from_writer(file);
        writer.serialize(record)?;
        writer.flush()?;

        let mut json = OpenOptions::new().create(true).append(true).open(&self.json_path)?;
        serde_json::to_writer(&mut json, record)?;
        writeln!(json)?;

        info!(
            participant = %record.participant_id,
            path = %self.csv_path.display(),
            "saved MVC results"
        );
        Ok(())
    }

    /// Every readable row; malformed rows are skipped
    pub fn records(&self) -> PersistenceResult<Vec<MvcRecord>> {
        if !self.csv_path.exists() {
            return Ok(Vec::new());
        }
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_path(&self.csv_path)?;
        let mut records = Vec::new();
        for (line, row) in reader.deserialize::<MvcRecord>().enumerate() {
            match row {
                Ok(record) => records.push(record),
                Err(e) => warn!(row = line + 1, error = %e, "skipping malformed MVC row"),
            }
        }
        Ok(records)
    }

    /// Most recent calibration, if any
    pub fn load_last(&self) -> PersistenceResult<Option<MvcRecord>> {
        Ok(self.records()?.pop())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn results(full: f64, index: f64, middle: f64) -> MotionResults {
        MotionResults { full_grasp: full, index_pinch: index, middle_pinch: middle }
    }

    fn at() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 5, 2, 14, 30, 5).unwrap()
    }

    #[test]
    fn test_header_written_once() {
        let dir = TempDir::new().unwrap();
        let store = MvcResultsStore::new(dir.path());
        store.append(&MvcRecord::new("P01", &results(300.0, 50.0, 40.0), at())).unwrap();
        store.append(&MvcRecord::new("P02", &results(310.5, 55.0, 45.0), at())).unwrap();

        let text = std::fs::read_to_string(store.csv_path()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(
            lines[0],
            "ParticipantID,Date,Time,Full Grasp (Grip),Pinch (Index Finger),Pinch (Middle Finger)"
        );
        assert_eq!(lines[1], "P01,2024-05-02,14:30:05,300.0,50.0,40.0");
    }

    #[test]
    fn test_json_lines_mirror() {
        let dir = TempDir::new().unwrap();
        let store = MvcResultsStore::new(dir.path());
        store.append(&MvcRecord::new("", &results(1.0, 2.0, 3.0), at())).unwrap();
        store.append(&MvcRecord::new("P9", &results(4.0, 5.0, 6.0), at())).unwrap();

        let text = std::fs::read_to_string(store.json_path()).unwrap();
        let rows: Vec<serde_json::Value> = text
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["ParticipantID"], "Unknown");
        assert_eq!(rows[1]["Pinch (Middle Finger)"], 6.0);
    }

    #[test]
    fn test_load_last_returns_latest_row() {
        let dir = TempDir::new().unwrap();
        let store = MvcResultsStore::new(dir.path());
        assert_eq!(store.load_last().unwrap(), None);

        store.append(&MvcRecord::new("P01", &results(300.0, 50.0, 40.0), at())).unwrap();
        store.append(&MvcRecord::new("P02", &results(250.0, 45.0, 35.0), at())).unwrap();

        let last = store.load_last().unwrap().unwrap();
        assert_eq!(last.participant_id, "P02");
        assert_eq!(last.value(GripType::FullGrasp), Some(250.0));
    }

    #[test]
    fn test_blank_and_invalid_cells_read_as_missing() {
        let dir = TempDir::new().unwrap();
        let store = MvcResultsStore::new(dir.path());
        std::fs::write(
            store.csv_path(),
            "ParticipantID,Date,Time,Full Grasp (Grip),Pinch (Index Finger),Pinch (Middle Finger)\n\
             P03,2024-01-01,10:00:00,,abc,42.5\n",
        )
        .unwrap();

        let last = store.load_last().unwrap().unwrap();
        assert_eq!(last.full_grasp, None);
        assert_eq!(last.index_pinch, None);
        assert_eq!(last.middle_pinch, Some(42.5));
    }
}
