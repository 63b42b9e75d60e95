//! Append-only experiment event log (`experiment_timestamps_<stamp>.csv`)

use crate::config::constants::output;
use crate::persistence::PersistenceResult;
use crate::protocol::SessionEvent;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

pub const HEADER: [&str; 4] = ["Section", "Event", "TrialID", "Timestamp"];

/// One row of the event log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRow {
    #[serde(rename = "Section")]
    pub section: u8,
    #[serde(rename = "Event")]
    pub event: String,
    /// Empty for section and break events
    #[serde(rename = "TrialID")]
    pub trial_id: String,
    #[serde(rename = "Timestamp")]
    pub timestamp: f64,
}

impl From<&SessionEvent> for LogRow {
    fn from(event: &SessionEvent) -> Self {
        LogRow {
            section: event.section,
            event: event.kind.name().to_string(),
            trial_id: event.trial.map(|t| t.to_string()).unwrap_or_default(),
            timestamp: event.at,
        }
    }
}

/// Event log writer. Every row is flushed as it is written and mirrored in
/// memory for the session driver and tests.
pub struct SessionLog<W: Write> {
    writer: csv::Writer<W>,
    rows: Vec<LogRow>,
    path: Option<PathBuf>,
}

impl SessionLog<File> {
    /// Create `<dir>/experiment_timestamps_<stamp>.csv` and write the header
    pub fn create(dir: &Path, stamp: &str) -> PersistenceResult<Self> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(format!("{}_{}.csv", output::EVENT_LOG_PREFIX, stamp));
        let file = File::create(&path)?;
        let mut log = Self::from_writer(file)?;
        log.path = Some(path);
        Ok(log)
    }
}

impl<W: Write> SessionLog<W> {
    pub fn from_writer(inner: W) -> PersistenceResult<Self> {
        let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(inner);
        writer.write_record(HEADER)?;
        writer.flush()?;
        Ok(Self {
            writer,
            rows: Vec::new(),
            path: None,
        })
    }

    pub fn append(&mut self, event: &SessionEvent) -> PersistenceResult<()> {
        self.append_row(LogRow::from(event))
    }

    pub fn append_all<'a, I>(&mut self, events: I) -> PersistenceResult<()>
    where
        I: IntoIterator<Item = &'a SessionEvent>,
    {
        for event in events {
            self.append(event)?;
        }
        Ok(())
    }

    pub fn append_row(&mut self, row: LogRow) -> PersistenceResult<()> {
        self.writer.serialize(&row)?;
        self.writer.flush()?;
        self.rows.push(row);
        Ok(())
    }

    pub fn rows(&self) -> &[LogRow] {
        &self.rows
    }

    /// Number of rows recorded for `event`
    pub fn count(&self, event: &str) -> usize {
        self.rows.iter().filter(|r| r.event == event).count()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn into_inner(self) -> PersistenceResult<W> {
        self.writer
            .into_inner()
            .map_err(|e| std::io::Error::other(e.error().to_string()).into())
    }
}
