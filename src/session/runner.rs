// src/session/runner.rs
//! Startup and headless tick loops behind the binaries.
//!
//! Both loops poll an interrupt flag between ticks. However a loop ends
//! (completed, interrupted or failed), the session is closed out and the
//! sensor reader is shut down before returning.

use crate::acquisition::SensorReader;
use crate::config::{ConfigLoader, LoggingConfig, SystemConfig};
use crate::error::GripResult;
use crate::logging;
use crate::protocol::{EventKind, GripType, SessionStatus};
use crate::session::{CalibrationSession, ForceExperiment};
use crate::telemetry::TelemetrySample;
use crate::utils::TimeProvider;
use crossbeam::channel::Receiver;
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;
use tracing::{info, warn};

/// How a headless loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunEnd {
    Completed,
    Interrupted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExperimentReport {
    pub end: RunEnd,
    /// Samples taken off the telemetry channel
    pub streamed: usize,
}

/// Load the layered configuration and install the subscriber it names.
/// A configuration that fails to load still leaves a default subscriber
/// behind, so the caller can log the failure.
pub fn load_config(path: Option<PathBuf>) -> GripResult<SystemConfig> {
    match ConfigLoader::with_override(path).load_system_config() {
        Ok(config) => {
            logging::init(&config.logging);
            Ok(config)
        }
        Err(e) => {
            logging::init(&LoggingConfig::default());
            Err(e.into())
        }
    }
}

/// Turn a recoverable error into a warning so the loop keeps ticking
fn recover<T>(result: GripResult<T>, operation: &str) -> GripResult<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_recoverable() => {
            warn!(operation, error = %e, "continuing after error");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

fn release(reader: &mut SensorReader) {
    if let Err(e) = reader.shutdown() {
        warn!(error = %e, "error stopping sensor");
    }
}

fn interrupted(interrupt: &AtomicBool) -> bool {
    interrupt.load(Ordering::SeqCst)
}

/// Run both blocks to the end, resuming on its own after the break.
///
/// The termination row is written even when the loop is interrupted or
/// fails; the first error wins.
pub fn run_experiment<W: Write>(
    experiment: &mut ForceExperiment<W>,
    reader: &mut SensorReader,
    clock: &dyn TimeProvider,
    tick: Duration,
    interrupt: &AtomicBool,
    telemetry: Option<&Receiver<TelemetrySample>>,
) -> GripResult<ExperimentReport> {
    let result = drive_experiment(experiment, reader, clock, tick, interrupt, telemetry);
    let stopped = experiment.stop(clock.now_secs());
    release(reader);
    let report = result?;
    stopped?;
    Ok(report)
}

fn drive_experiment<W: Write>(
    experiment: &mut ForceExperiment<W>,
    reader: &SensorReader,
    clock: &dyn TimeProvider,
    tick: Duration,
    interrupt: &AtomicBool,
    telemetry: Option<&Receiver<TelemetrySample>>,
) -> GripResult<ExperimentReport> {
    let mut streamed = 0usize;
    experiment.start(clock.now_secs())?;

    while !experiment.is_ended() {
        if interrupted(interrupt) {
            info!("experiment interrupted");
            return Ok(ExperimentReport { end: RunEnd::Interrupted, streamed });
        }

        let now = clock.now_secs();
        let latest = reader.drain().pop();
        let events = recover(experiment.update(now, latest.as_ref()), "update")?.unwrap_or_default();
        for event in events {
            if event.kind != EventKind::TrialStart {
                continue;
            }
            if let Some(trial) = event.trial {
                let frame = experiment.frame(now);
                info!(
                    section = event.section,
                    trial = %trial,
                    position = frame.trial_number,
                    of = frame.block_len,
                    "trial started"
                );
            }
        }

        // no operator at the console: resume as soon as the break is over
        if experiment.state().status() == SessionStatus::AwaitingResume {
            info!("resuming with the second block");
            recover(experiment.start(clock.now_secs()), "resume")?;
        }

        if let Some(rx) = telemetry {
            streamed += rx.try_iter().count();
        }
        thread::sleep(tick);
    }
    Ok(ExperimentReport { end: RunEnd::Completed, streamed })
}

/// Measure each motion in turn. An interrupt discards the run in progress.
pub fn run_calibration(
    session: &mut CalibrationSession,
    motions: &[GripType],
    reader: &mut SensorReader,
    clock: &dyn TimeProvider,
    tick: Duration,
    interrupt: &AtomicBool,
) -> GripResult<RunEnd> {
    let result = drive_calibration(session, motions, reader, clock, tick, interrupt);
    session.stop_measurement();
    release(reader);
    result
}

fn drive_calibration(
    session: &mut CalibrationSession,
    motions: &[GripType],
    reader: &SensorReader,
    clock: &dyn TimeProvider,
    tick: Duration,
    interrupt: &AtomicBool,
) -> GripResult<RunEnd> {
    for &motion in motions {
        session.start(motion, clock.now_secs())?;
        let mut last_cue = String::new();
        loop {
            if interrupted(interrupt) {
                info!(motion = motion.motion_label(), "calibration interrupted");
                return Ok(RunEnd::Interrupted);
            }

            let now = clock.now_secs();
            let force = reader.latest().and_then(|s| s.primary());
            if let Some(update) = recover(session.update(now, force), "update")? {
                let cue = session.cue(now);
                if cue != last_cue && !cue.is_empty() {
                    info!(motion = motion.motion_label(), "{}", cue);
                }
                last_cue = cue;

                if update.summary.is_some() {
                    if let Some(text) = session.summary_text() {
                        info!(motion = motion.motion_label(), "\n{}", text);
                    }
                }
                if let Some(record) = update.saved {
                    info!(
                        participant = %record.participant_id,
                        path = %session.store().csv_path().display(),
                        "all motions measured"
                    );
                }
            }

            if !session.is_measuring() {
                break;
            }
            thread::sleep(tick);
        }
    }
    Ok(RunEnd::Completed)
}
