//! Headless grip-force experiment runner.
//! - Loads the layered configuration (plus an optional `--config` file)
//! - Drives the simulated dynamometer through both trial blocks
//! - Writes the event log and trial orders to the output directory

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use clap::Parser;
use grip_core::acquisition::SensorReader;
use grip_core::hal::simulator::SimulatedDynamometer;
use grip_core::session::{load_config, run_experiment, ForceExperiment};
use grip_core::telemetry::{ChannelOutlet, NullOutlet, StreamInfo, TelemetryOutlet};
use grip_core::utils::{MonotonicTimeProvider, TimeProvider};
use grip_core::GripResult;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{error, info, warn};

#[derive(Debug, Parser)]
#[command(name = "grip-experiment", version, about = "Run a grip-force experiment session")]
struct Args {
    /// Extra configuration file, applied after the standard search path
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

fn main() -> ExitCode {
    let args = Args::parse();
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "experiment aborted");
            eprintln!("grip-experiment: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn interrupt_flag() -> Arc<AtomicBool> {
    let interrupt = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&interrupt);
    if let Err(e) = ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst)) {
        warn!(error = %e, "Ctrl-C handler not installed");
    }
    interrupt
}

fn run(args: Args) -> GripResult<()> {
    let config = load_config(args.config)?;
    let interrupt = interrupt_flag();

    let clock: Arc<dyn TimeProvider> = Arc::new(MonotonicTimeProvider::new());
    let mut rng = match config.experiment.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let (outlet, telemetry_rx) = if config.telemetry.enabled {
        let (outlet, rx) = ChannelOutlet::new(StreamInfo::default(), config.telemetry.outlet_capacity);
        (Box::new(outlet) as Box<dyn TelemetryOutlet>, Some(rx))
    } else {
        (Box::new(NullOutlet::default()) as Box<dyn TelemetryOutlet>, None)
    };

    let mut experiment = ForceExperiment::prepare(&config, &mut rng, outlet, Local::now())?;
    let device = SimulatedDynamometer::new(config.sensor.simulator.clone());
    let mut reader = SensorReader::spawn(Box::new(device), &config.sensor, Arc::clone(&clock));
    if !reader.is_running() {
        warn!("sensor unavailable, running without force data");
    }

    let report = run_experiment(
        &mut experiment,
        &mut reader,
        clock.as_ref(),
        Duration::from_millis(config.experiment.tick_interval_ms),
        &interrupt,
        telemetry_rx.as_ref(),
    )?;

    let counters = reader.counters();
    info!(
        end = ?report.end,
        log = ?experiment.log().path(),
        trial_orders = ?experiment.trial_orders_path(),
        samples = counters.samples_read,
        dropped = counters.samples_dropped,
        streamed = report.streamed,
        "experiment finished"
    );
    Ok(())
}
