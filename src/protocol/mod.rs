//! Experiment protocol: trial identifiers, the force-guidance cycle, trial
//! sequencing and the MVC calibration sequence.
//!
//! Everything here is pure state plus transition functions over seconds on
//! a monotonic clock; timers, devices and files live in the session drivers.

pub mod calibration;
pub mod phase;
pub mod sequencer;
pub mod trial;

pub use calibration::{
    CalibrationPhase, CalibrationResults, CalibrationRun, CalibrationTiming, CalibrationTransition,
    MotionResults, MvcSummary,
};
pub use phase::{guidance_profile, reference_force, Phase, PhaseCue, PhaseEvent, PhaseTracker, PHASE_BOUNDARIES};
pub use sequencer::{EventKind, SequencerConfig, SessionEvent, SessionState, SessionStatus};
pub use trial::{GripType, MvcLevel, TrialBlock, TrialParseError, TrialSpec};
