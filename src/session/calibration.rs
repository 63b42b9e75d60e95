// src/session/calibration.rs
//! MVC calibration driver: one run per selected motion, results saved once
//! all three motions are measured

use crate::config::constants::output;
use crate::config::SystemConfig;
use crate::error::{GripError, GripResult};
use crate::persistence::{MvcRecord, MvcResultsStore};
use crate::protocol::{
    CalibrationResults, CalibrationRun, CalibrationTiming, CalibrationTransition, GripType, MvcSummary,
};
use chrono::Local;
use std::fmt::Write as _;
use tracing::info;

/// Outcome of one calibration tick
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CalibrationUpdate {
    pub transitions: Vec<CalibrationTransition>,
    /// Set on the tick the run finishes
    pub summary: Option<MvcSummary>,
    /// Set when that run completed the participant's three motions
    pub saved: Option<MvcRecord>,
}

pub struct CalibrationSession {
    participant: String,
    timing: CalibrationTiming,
    max_trace_samples: usize,
    run: Option<CalibrationRun>,
    results: CalibrationResults,
    store: MvcResultsStore,
    last_summary: Option<MvcSummary>,
}

impl CalibrationSession {
    pub fn new(config: &SystemConfig, participant: &str) -> Self {
        let mut session = Self {
            participant: String::new(),
            timing: CalibrationTiming::from(&config.calibration),
            max_trace_samples: config.calibration.max_trace_samples,
            run: None,
            results: CalibrationResults::new(),
            store: MvcResultsStore::new(&config.output.directory),
            last_summary: None,
        };
        session.set_participant(participant);
        session
    }

    pub fn set_participant(&mut self, participant: &str) {
        self.participant = match participant.trim() {
            "" => output::UNKNOWN_PARTICIPANT.to_string(),
            p => p.to_string(),
        };
    }

    pub fn participant(&self) -> &str {
        &self.participant
    }

    pub fn run(&self) -> Option<&CalibrationRun> {
        self.run.as_ref()
    }

    pub fn results(&self) -> &CalibrationResults {
        &self.results
    }

    pub fn store(&self) -> &MvcResultsStore {
        &self.store
    }

    pub fn last_summary(&self) -> Option<&MvcSummary> {
        self.last_summary.as_ref()
    }

    pub fn is_measuring(&self) -> bool {
        self.run.as_ref().is_some_and(|r| !r.is_finished())
    }

    /// Begin a run for `motion`, discarding the previous run's trace
    pub fn start(&mut self, motion: GripType, now: f64) -> GripResult<()> {
        if self.is_measuring() {
            return Err(GripError::session("start", "a calibration run is already in progress"));
        }
        self.last_summary = None;
        self.run = Some(CalibrationRun::start(motion, self.timing, now, self.max_trace_samples));
        Ok(())
    }

    /// One display tick with the latest grip force, if any
    pub fn update(&mut self, now: f64, force: Option<f64>) -> GripResult<CalibrationUpdate> {
        let Some(run) = self.run.as_mut() else {
            return Ok(CalibrationUpdate::default());
        };
        if run.is_finished() {
            return Ok(CalibrationUpdate::default());
        }

        let transitions = run.advance(now);
        run.record(now, force);
        if !run.is_finished() {
            return Ok(CalibrationUpdate { transitions, ..Default::default() });
        }

        let motion = run.motion();
        let summary = run.summary();
        info!(
            motion = motion.motion_label(),
            trial1 = ?summary.trial1,
            trial2 = ?summary.trial2,
            overall = ?summary.overall,
            "calibration run finished"
        );
        self.last_summary = Some(summary);

        let saved = match self.results.insert(motion, summary.overall) {
            Some(results) => {
                let record = MvcRecord::new(&self.participant, &results, Local::now());
                self.store.append(&record)?;
                Some(record)
            }
            None => None,
        };
        Ok(CalibrationUpdate { transitions, summary: Some(summary), saved })
    }

    /// Abort the current run without recording a result. Returns whether a
    /// run was in progress.
    pub fn stop_measurement(&mut self) -> bool {
        let aborted = self.is_measuring();
        if aborted {
            if let Some(run) = self.run.take() {
                info!(motion = run.motion().motion_label(), "measurement stopped");
            }
        }
        aborted
    }

    /// Operator cue for the current run
    pub fn cue(&self, now: f64) -> String {
        match &self.run {
            Some(run) if !run.is_finished() => run.cue(now),
            Some(_) => String::new(),
            None => "Measurement stopped.".to_string(),
        }
    }

    /// Participant and the motions measured so far
    pub fn results_text(&self) -> String {
        let mut text = format!("Participant ID: {}\nResults:\n", self.participant);
        for (motion, value) in self.results.iter() {
            let _ = writeln!(text, "{}: {:.2} N", motion.motion_label(), value);
        }
        text
    }

    pub fn summary_text(&self) -> Option<String> {
        self.last_summary.map(|s| s.text(&self.timing))
    }
}
