// src/session/experiment.rs
//! Grip-force experiment driver
//!
//! One [`ForceExperiment::update`] call is one tick of the operator display:
//! advance the sequencer, persist whatever it emitted, then fold the latest
//! force sample into the live traces and the telemetry stream.

use crate::config::constants::{cycle, output};
use crate::config::SystemConfig;
use crate::error::GripResult;
use crate::hal::ForceSample;
use crate::persistence::{
    file_stamp, write_percentages, write_trial_orders, MvcResultsStore, SessionLog,
};
use crate::protocol::{
    guidance_profile, reference_force, EventKind, Phase, PhaseCue, SessionEvent, SessionState,
    SessionStatus, TrialBlock, TrialSpec,
};
use crate::acquisition::TraceBuffer;
use crate::scoring::{MvcPercentages, MvcReference};
use crate::telemetry::TelemetryOutlet;
use chrono::{DateTime, Local};
use rand::Rng;
use std::fs::File;
use std::io::Write;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Snapshot of everything the operator display shows
#[derive(Debug, Clone, PartialEq)]
pub struct ExperimentFrame {
    pub status: SessionStatus,
    pub section: u8,
    pub trial: Option<TrialSpec>,
    /// 1-based position in the current block
    pub trial_number: usize,
    pub block_len: usize,
    pub cycle_time: Option<f64>,
    pub phase: Option<Phase>,
    pub cue: Option<PhaseCue>,
    /// Target force (fraction of MVC) right now
    pub reference: Option<f64>,
    /// Last normalized force
    pub force: Option<f64>,
    /// Static guidance trapezoid for the current trial
    pub guidance: Option<[(f64, f64); 5]>,
    pub instruction: String,
}

pub struct ForceExperiment<W: Write = File> {
    state: SessionState,
    reference: MvcReference,
    log: SessionLog<W>,
    outlet: Box<dyn TelemetryOutlet>,
    force_trace: TraceBuffer,
    reference_trace: TraceBuffer,
    last_force: Option<f64>,
    participant: String,
    trial_orders: Option<PathBuf>,
    telemetry_failed: bool,
}

impl ForceExperiment<File> {
    /// Load the MVC reference, shuffle both blocks, and create the session
    /// files under the configured output directory
    pub fn prepare<R: Rng + ?Sized>(
        config: &SystemConfig,
        rng: &mut R,
        outlet: Box<dyn TelemetryOutlet>,
        at: DateTime<Local>,
    ) -> GripResult<Self> {
        let dir = &config.output.directory;
        let store = MvcResultsStore::new(dir);
        let last = store.load_last().unwrap_or_else(|e| {
            warn!(error = %e, path = %store.csv_path().display(), "could not read MVC results");
            None
        });
        let reference = MvcReference::from_last_record(last.as_ref(), &config.scoring);
        if let Some(record) = &last {
            if let Err(e) = write_percentages(dir, &MvcPercentages::from_record(record)) {
                warn!(error = %e, "could not write MVC percentages");
            }
        }

        let participant = config
            .experiment
            .participant_id
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .or(reference.participant_id())
            .unwrap_or(output::UNKNOWN_PARTICIPANT)
            .to_string();

        let repeats = config.experiment.repeats_per_condition;
        let blocks = [TrialBlock::generate(repeats, rng), TrialBlock::generate(repeats, rng)];

        let stamp = file_stamp(at);
        let orders = write_trial_orders(dir, &stamp, &participant, &blocks)?;
        let log = SessionLog::create(dir, &stamp)?;
        info!(
            participant = %participant,
            trials = blocks[0].len() + blocks[1].len(),
            log = ?log.path(),
            "experiment prepared"
        );

        let [first, second] = blocks;
        let mut experiment = Self::new(first, second, reference, log, outlet, config);
        experiment.participant = participant;
        experiment.trial_orders = Some(orders);
        Ok(experiment)
    }
}

impl<W: Write> ForceExperiment<W> {
    pub fn new(
        first: TrialBlock,
        second: TrialBlock,
        reference: MvcReference,
        log: SessionLog<W>,
        outlet: Box<dyn TelemetryOutlet>,
        config: &SystemConfig,
    ) -> Self {
        let rate = config.sensor.sample_rate_hz();
        Self {
            state: SessionState::new(first, second, config.experiment.sequencer_config()),
            reference,
            log,
            outlet,
            force_trace: TraceBuffer::for_window(cycle::CYCLE_DURATION_SECS, rate),
            reference_trace: TraceBuffer::for_window(cycle::CYCLE_DURATION_SECS, rate),
            last_force: None,
            participant: output::UNKNOWN_PARTICIPANT.to_string(),
            trial_orders: None,
            telemetry_failed: false,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn reference(&self) -> &MvcReference {
        &self.reference
    }

    pub fn log(&self) -> &SessionLog<W> {
        &self.log
    }

    pub fn participant(&self) -> &str {
        &self.participant
    }

    pub fn trial_orders_path(&self) -> Option<&std::path::Path> {
        self.trial_orders.as_deref()
    }

    pub fn force_trace(&self) -> &TraceBuffer {
        &self.force_trace
    }

    pub fn reference_trace(&self) -> &TraceBuffer {
        &self.reference_trace
    }

    pub fn is_ended(&self) -> bool {
        self.state.is_ended()
    }

    /// Start the first section, or resume after the break
    pub fn start(&mut self, now: f64) -> GripResult<Vec<SessionEvent>> {
        let events = self.state.start(now);
        self.record(&events)?;
        Ok(events)
    }

    /// One display tick
    pub fn update(&mut self, now: f64, sample: Option<&ForceSample>) -> GripResult<Vec<SessionEvent>> {
        let events = self.state.tick(now);
        self.record(&events)?;

        if let (Some(sample), Some(trial), Some(cycle_time)) =
            (sample, self.state.current_trial(), self.state.cycle_time(now))
        {
            self.track(now, cycle_time, trial, sample);
        }
        Ok(events)
    }

    /// Operator stop. Safe to call any number of times.
    pub fn stop(&mut self, now: f64) -> GripResult<Vec<SessionEvent>> {
        let events = self.state.stop(now);
        self.record(&events)?;
        if !events.is_empty() {
            info!(path = ?self.log.path(), "experiment stopped");
        }
        Ok(events)
    }

    pub fn frame(&self, now: f64) -> ExperimentFrame {
        let trial = self.state.current_trial();
        let cycle_time = self.state.cycle_time(now);
        let cue = cycle_time.and_then(PhaseCue::at);
        let instruction = match self.state.status() {
            SessionStatus::Idle => "Press Start to begin the experiment.".to_string(),
            SessionStatus::Running => cue.as_ref().map(PhaseCue::text).unwrap_or_default(),
            SessionStatus::OnBreak { until } => format!(
                "Break time! Please rest for {} minutes.",
                ((until - now).max(0.0) / 60.0).ceil() as u64
            ),
            SessionStatus::AwaitingResume => {
                "Break is over. Press Start to resume the experiment.".to_string()
            }
            SessionStatus::Ended => "Experiment \n Stopped.".to_string(),
        };

        ExperimentFrame {
            status: self.state.status(),
            section: self.state.section(),
            trial,
            trial_number: self.state.trial_index() + 1,
            block_len: self.state.blocks()[usize::from(self.state.section() - 1)].len(),
            cycle_time,
            phase: cycle_time.and_then(Phase::at),
            cue,
            reference: cycle_time
                .zip(trial)
                .map(|(t, trial)| reference_force(t, trial.target_fraction())),
            force: self.last_force,
            guidance: trial.map(|t| guidance_profile(t.target_fraction())),
            instruction,
        }
    }

    fn record(&mut self, events: &[SessionEvent]) -> GripResult<()> {
        for event in events {
            debug!(section = event.section, event = %event.kind, trial = ?event.trial.map(|t| t.to_string()), "session event");
            self.log.append(event)?;
            if matches!(event.kind, EventKind::SectionStart | EventKind::BreakStop) {
                self.force_trace.clear();
                self.reference_trace.clear();
                self.last_force = None;
            }
        }
        Ok(())
    }

    fn track(&mut self, now: f64, cycle_time: f64, trial: TrialSpec, sample: &ForceSample) {
        let channels = self.outlet.info().channel_count;
        if sample.values.len() != channels {
            debug!(got = sample.values.len(), expected = channels, "incomplete sample skipped");
            return;
        }
        if let Err(e) = self.outlet.push_sample(&sample.values, sample.timestamp) {
            if !self.telemetry_failed {
                warn!(error = %e, "telemetry push failed");
                self.telemetry_failed = true;
            }
        }

        let Some(raw) = sample.primary() else { return };
        let normalized = self.reference.normalize(raw, trial.grip);
        let elapsed = self.state.elapsed(now);
        self.force_trace.push(elapsed, normalized);
        self.reference_trace
            .push(elapsed, reference_force(cycle_time, trial.target_fraction()));
        self.last_force = Some(normalized);
    }
}
