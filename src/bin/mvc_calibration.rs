//! Headless MVC calibration.
//! - Measures each requested motion in turn on the simulated dynamometer
//! - Appends the participant's results to the MVC tables once all three
//!   motions are measured

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use grip_core::acquisition::SensorReader;
use grip_core::hal::simulator::SimulatedDynamometer;
use grip_core::protocol::GripType;
use grip_core::session::{load_config, run_calibration, CalibrationSession, RunEnd};
use grip_core::utils::{MonotonicTimeProvider, TimeProvider};
use grip_core::GripResult;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Motion {
    FullGrasp,
    IndexPinch,
    MiddlePinch,
}

impl From<Motion> for GripType {
    fn from(motion: Motion) -> Self {
        match motion {
            Motion::FullGrasp => GripType::FullGrasp,
            Motion::IndexPinch => GripType::IndexPinch,
            Motion::MiddlePinch => GripType::MiddlePinch,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "mvc-calibration", version, about = "Measure maximum voluntary contraction per motion")]
struct Args {
    /// Extra configuration file, applied after the standard search path
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Participant identifier; "Unknown" when empty
    #[arg(long, default_value = "")]
    participant: String,

    /// Motions to measure, in order; all three when omitted
    #[arg(long, value_enum)]
    motion: Vec<Motion>,
}

fn main() -> ExitCode {
    let args = Args::parse();
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "calibration aborted");
            eprintln!("mvc-calibration: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> GripResult<()> {
    let config = load_config(args.config)?;

    let interrupt = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&interrupt);
    if let Err(e) = ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst)) {
        warn!(error = %e, "Ctrl-C handler not installed");
    }

    let motions: Vec<GripType> = if args.motion.is_empty() {
        GripType::MOTION_ORDER.to_vec()
    } else {
        args.motion.into_iter().map(GripType::from).collect()
    };

    let clock: Arc<dyn TimeProvider> = Arc::new(MonotonicTimeProvider::new());
    let device = SimulatedDynamometer::new(config.sensor.simulator.clone());
    let mut reader = SensorReader::spawn(Box::new(device), &config.sensor, Arc::clone(&clock));
    if !reader.is_running() {
        warn!("sensor unavailable, measuring zero force");
    }

    let mut session = CalibrationSession::new(&config, &args.participant);
    let end = run_calibration(
        &mut session,
        &motions,
        &mut reader,
        clock.as_ref(),
        Duration::from_millis(config.calibration.tick_interval_ms),
        &interrupt,
    )?;

    if end == RunEnd::Interrupted {
        info!("calibration interrupted, unfinished run discarded");
    }
    info!("\n{}", session.results_text());
    Ok(())
}
