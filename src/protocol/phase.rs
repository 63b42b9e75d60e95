//! Force-guidance cycle: phases, boundary events and the reference trapezoid
//!
//! A trial is one fixed 30 s cycle:
//!
//! ```text
//! Rest [0,5)  Ready [5,10)  RampUp [10,15)  Hold [15,25)  RampDown [25,30)
//! ```
//!
//! The reference force is zero until the ramp, rises linearly to the trial's
//! target fraction, holds, and falls back to zero at the end of the cycle.

use crate::config::constants::cycle::*;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    Rest,
    Ready,
    RampUp,
    Hold,
    RampDown,
}

impl Phase {
    pub const ALL: [Phase; 5] = [Phase::Rest, Phase::Ready, Phase::RampUp, Phase::Hold, Phase::RampDown];

    /// Phase active at `cycle_time`, `None` outside `[0, 30)`
    pub fn at(cycle_time: f64) -> Option<Phase> {
        Phase::ALL
            .into_iter()
            .find(|p| (p.start_secs()..p.end_secs()).contains(&cycle_time))
    }

    pub fn start_secs(self) -> f64 {
        match self {
            Phase::Rest => REST_START_SECS,
            Phase::Ready => READY_START_SECS,
            Phase::RampUp => RAMP_UP_START_SECS,
            Phase::Hold => HOLD_START_SECS,
            Phase::RampDown => RAMP_DOWN_START_SECS,
        }
    }

    pub fn end_secs(self) -> f64 {
        match self {
            Phase::Rest => READY_START_SECS,
            Phase::Ready => RAMP_UP_START_SECS,
            Phase::RampUp => HOLD_START_SECS,
            Phase::Hold => RAMP_DOWN_START_SECS,
            Phase::RampDown => CYCLE_DURATION_SECS,
        }
    }
}

/// Named boundary events of the cycle, in firing order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PhaseEvent {
    RestPhaseStart,
    RestPhaseStop,
    GetReadyStart,
    GetReadyStop,
    RampUpPhaseStart,
    RampUpPhaseStop,
    HoldPhaseStart,
    HoldPhaseStop,
    RampDownPhaseStart,
    RampDownPhaseStop,
}

impl PhaseEvent {
    pub fn name(self) -> &'static str {
        match self {
            PhaseEvent::RestPhaseStart => "RestPhaseStart",
            PhaseEvent::RestPhaseStop => "RestPhaseStop",
            PhaseEvent::GetReadyStart => "GetReadyStart",
            PhaseEvent::GetReadyStop => "GetReadyStop",
            PhaseEvent::RampUpPhaseStart => "RampUpPhaseStart",
            PhaseEvent::RampUpPhaseStop => "RampUpPhaseStop",
            PhaseEvent::HoldPhaseStart => "HoldPhaseStart",
            PhaseEvent::HoldPhaseStop => "HoldPhaseStop",
            PhaseEvent::RampDownPhaseStart => "RampDownPhaseStart",
            PhaseEvent::RampDownPhaseStop => "RampDownPhaseStop",
        }
    }
}

impl fmt::Display for PhaseEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhaseBoundary {
    pub offset_secs: f64,
    pub event: PhaseEvent,
}

const fn boundary(offset_secs: f64, event: PhaseEvent) -> PhaseBoundary {
    PhaseBoundary { offset_secs, event }
}

/// All boundaries of one cycle; offsets are non-decreasing and equal
/// offsets fire in table order (a phase stops before the next starts).
pub const PHASE_BOUNDARIES: [PhaseBoundary; 10] = [
    boundary(REST_START_SECS, PhaseEvent::RestPhaseStart),
    boundary(READY_START_SECS, PhaseEvent::RestPhaseStop),
    boundary(READY_START_SECS, PhaseEvent::GetReadyStart),
    boundary(RAMP_UP_START_SECS, PhaseEvent::GetReadyStop),
    boundary(RAMP_UP_START_SECS, PhaseEvent::RampUpPhaseStart),
    boundary(HOLD_START_SECS, PhaseEvent::RampUpPhaseStop),
    boundary(HOLD_START_SECS, PhaseEvent::HoldPhaseStart),
    boundary(RAMP_DOWN_START_SECS, PhaseEvent::HoldPhaseStop),
    boundary(RAMP_DOWN_START_SECS, PhaseEvent::RampDownPhaseStart),
    boundary(CYCLE_DURATION_SECS, PhaseEvent::RampDownPhaseStop),
];

/// Per-trial record of which boundaries have fired
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PhaseTracker {
    fired: [bool; PHASE_BOUNDARIES.len()],
}

impl PhaseTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget everything fired; called at trial start
    pub fn reset(&mut self) {
        self.fired = [false; PHASE_BOUNDARIES.len()];
    }

    /// Events whose offset has been reached and which have not fired yet
    /// this trial, in ascending order. Marks them fired.
    pub fn fire_due(&mut self, cycle_time: f64) -> Vec<PhaseEvent> {
        PHASE_BOUNDARIES
            .iter()
            .zip(self.fired.iter_mut())
            .filter(|(b, fired)| !**fired && cycle_time >= b.offset_secs)
            .map(|(b, fired)| {
                *fired = true;
                b.event
            })
            .collect()
    }

    /// Fire whatever is left, used when a cycle completes
    pub fn fire_remaining(&mut self) -> Vec<PhaseEvent> {
        self.fire_due(f64::INFINITY)
    }

    pub fn has_fired(&self, event: PhaseEvent) -> bool {
        PHASE_BOUNDARIES
            .iter()
            .zip(self.fired.iter())
            .any(|(b, &fired)| fired && b.event == event)
    }

    pub fn fired_count(&self) -> usize {
        self.fired.iter().filter(|&&f| f).count()
    }
}

/// Target force (fraction of MVC) at `cycle_time` for a trial whose hold
/// level is `target_fraction`
pub fn reference_force(cycle_time: f64, target_fraction: f64) -> f64 {
    match Phase::at(cycle_time) {
        Some(Phase::RampUp) => {
            target_fraction * (cycle_time - RAMP_UP_START_SECS) / (HOLD_START_SECS - RAMP_UP_START_SECS)
        }
        Some(Phase::Hold) => target_fraction,
        Some(Phase::RampDown) => {
            target_fraction
                * (1.0 - (cycle_time - RAMP_DOWN_START_SECS) / (CYCLE_DURATION_SECS - RAMP_DOWN_START_SECS))
        }
        Some(Phase::Rest) | Some(Phase::Ready) | None => 0.0,
    }
}

/// Vertices of the static guidance trapezoid, `(seconds, fraction)`
pub fn guidance_profile(target_fraction: f64) -> [(f64, f64); 5] {
    [
        (REST_START_SECS, 0.0),
        (RAMP_UP_START_SECS, 0.0),
        (HOLD_START_SECS, target_fraction),
        (RAMP_DOWN_START_SECS, target_fraction),
        (CYCLE_DURATION_SECS, 0.0),
    ]
}

/// Operator cue for the current point of the cycle
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseCue {
    pub phase: Phase,
    pub label: &'static str,
    /// Whole seconds left until the next thing the participant must do
    pub remaining_secs: u32,
    /// The "Get Ready!" cue blinks; every other cue is always shown
    pub visible: bool,
}

impl PhaseCue {
    pub fn at(cycle_time: f64) -> Option<PhaseCue> {
        let phase = Phase::at(cycle_time)?;
        let (label, until) = match phase {
            Phase::Rest => ("Rest Phase", RAMP_UP_START_SECS),
            Phase::Ready => ("Get Ready!", RAMP_UP_START_SECS),
            Phase::RampUp => ("Ramp-Up Phase", HOLD_START_SECS),
            Phase::Hold => ("Hold Phase", RAMP_DOWN_START_SECS),
            Phase::RampDown => ("Ramp-Down Phase", CYCLE_DURATION_SECS),
        };
        let visible = match phase {
            Phase::Ready => (cycle_time * READY_BLINK_TOGGLES_PER_SEC) as u64 % 2 == 0,
            _ => true,
        };
        Some(PhaseCue {
            phase,
            label,
            remaining_secs: (until - cycle_time) as u32,
            visible,
        })
    }

    pub fn text(&self) -> String {
        if self.visible {
            format!("{}\n({}s)", self.label, self.remaining_secs)
        } else {
            String::new()
        }
    }
}
