//! Trial sequencing over the force-guidance cycle
//!
//! [`SessionState`] is the whole mutable state of an experiment session.
//! Its transition functions take the current time in seconds and return
//! the events that happened, in order; they never perform I/O. The session
//! driver stamps and persists the events.
//!
//! Two blocks run back to back: block 1 is followed by a fixed rest break,
//! block 2 by termination. Both the break and the termination are latched
//! so repeated ticks can never record them twice.

use crate::config::constants::cycle::CYCLE_DURATION_SECS;
use crate::protocol::phase::{PhaseEvent, PhaseTracker};
use crate::protocol::trial::{TrialBlock, TrialSpec};
use std::fmt;
use tracing::{debug, info};

/// What happened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    SectionStart,
    SectionStop,
    TrialStart,
    TrialEnd,
    BreakStart,
    BreakStop,
    Phase(PhaseEvent),
}

impl EventKind {
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::SectionStart => "SectionStart",
            EventKind::SectionStop => "SectionStop",
            EventKind::TrialStart => "TrialStart",
            EventKind::TrialEnd => "TrialEnd",
            EventKind::BreakStart => "BreakStart",
            EventKind::BreakStop => "BreakStop",
            EventKind::Phase(event) => event.name(),
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionEvent {
    /// 1 or 2
    pub section: u8,
    pub kind: EventKind,
    /// Set for trial and phase events
    pub trial: Option<TrialSpec>,
    /// Session clock seconds at which the transition was observed
    pub at: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SessionStatus {
    /// Constructed, waiting for the first start
    Idle,
    Running,
    OnBreak { until: f64 },
    /// Break over, block 2 loaded, waiting for the operator to start
    AwaitingResume,
    Ended,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SequencerConfig {
    pub break_duration_secs: f64,
    pub auto_resume_after_break: bool,
}

/// Explicit state of one experiment session
#[derive(Debug, Clone)]
pub struct SessionState {
    blocks: [TrialBlock; 2],
    block_index: usize,
    trial_index: usize,
    status: SessionStatus,
    section_origin: f64,
    trial_start: f64,
    tracker: PhaseTracker,
    break_entered: bool,
    ended: bool,
    completed_trials: usize,
    config: SequencerConfig,
}

impl SessionState {
    pub fn new(first: TrialBlock, second: TrialBlock, config: SequencerConfig) -> Self {
        Self {
            blocks: [first, second],
            block_index: 0,
            trial_index: 0,
            status: SessionStatus::Idle,
            section_origin: 0.0,
            trial_start: 0.0,
            tracker: PhaseTracker::new(),
            break_entered: false,
            ended: false,
            completed_trials: 0,
            config,
        }
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn is_running(&self) -> bool {
        self.status == SessionStatus::Running
    }

    pub fn is_ended(&self) -> bool {
        self.ended
    }

    /// 1-based section number
    pub fn section(&self) -> u8 {
        self.block_index as u8 + 1
    }

    pub fn blocks(&self) -> &[TrialBlock; 2] {
        &self.blocks
    }

    pub fn trial_index(&self) -> usize {
        self.trial_index
    }

    pub fn completed_trials(&self) -> usize {
        self.completed_trials
    }

    pub fn current_trial(&self) -> Option<TrialSpec> {
        self.blocks[self.block_index].get(self.trial_index)
    }

    pub fn tracker(&self) -> &PhaseTracker {
        &self.tracker
    }

    /// Seconds since the current section started
    pub fn elapsed(&self, now: f64) -> f64 {
        now - self.section_origin
    }

    /// Position inside the current trial's cycle while running
    pub fn cycle_time(&self, now: f64) -> Option<f64> {
        self.is_running()
            .then(|| self.elapsed(now) - self.trial_start)
    }

    /// Start (or resume after the break) the current section
    pub fn start(&mut self, now: f64) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        if !matches!(self.status, SessionStatus::Idle | SessionStatus::AwaitingResume) {
            return events;
        }

        self.status = SessionStatus::Running;
        self.section_origin = now;
        self.trial_start = 0.0;
        info!(section = self.section(), "section started");
        self.push(&mut events, EventKind::SectionStart, None, now);

        if self.current_trial().is_some() {
            self.begin_trial(now, &mut events);
        } else {
            self.finish_block(now, &mut events);
        }
        events
    }

    /// Advance the session to `now`
    pub fn tick(&mut self, now: f64) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        match self.status {
            SessionStatus::Running => self.tick_running(now, &mut events),
            SessionStatus::OnBreak { until } if now >= until => {
                self.push(&mut events, EventKind::BreakStop, None, now);
                self.block_index = 1;
                self.trial_index = 0;
                self.tracker.reset();
                self.status = SessionStatus::AwaitingResume;
                info!("break over, second block loaded");
                if self.config.auto_resume_after_break {
                    events.extend(self.start(now));
                }
            }
            _ => {}
        }
        events
    }

    /// Terminate the session. Only the first call on a running session
    /// produces a `SectionStop`; every later call is a no-op.
    pub fn stop(&mut self, now: f64) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        match self.status {
            SessionStatus::Running => self.terminate(now, &mut events),
            SessionStatus::Ended => {}
            _ => {
                self.ended = true;
                self.status = SessionStatus::Ended;
            }
        }
        events
    }

    fn tick_running(&mut self, now: f64, events: &mut Vec<SessionEvent>) {
        let Some(trial) = self.current_trial() else {
            return;
        };
        let cycle_time = self.elapsed(now) - self.trial_start;

        for event in self.tracker.fire_due(cycle_time) {
            self.push(events, EventKind::Phase(event), Some(trial), now);
        }
        if cycle_time < CYCLE_DURATION_SECS {
            return;
        }

        for event in self.tracker.fire_remaining() {
            self.push(events, EventKind::Phase(event), Some(trial), now);
        }
        self.push(events, EventKind::TrialEnd, Some(trial), now);
        self.completed_trials += 1;
        self.trial_index += 1;
        debug!(trial = %trial, index = self.trial_index, "trial ended");

        if self.trial_index >= self.blocks[self.block_index].len() {
            self.finish_block(now, events);
        } else {
            self.begin_trial(now, events);
        }
    }

    fn begin_trial(&mut self, now: f64, events: &mut Vec<SessionEvent>) {
        let Some(trial) = self.current_trial() else {
            return;
        };
        self.tracker.reset();
        self.trial_start = self.elapsed(now);
        self.push(events, EventKind::TrialStart, Some(trial), now);
        for event in self.tracker.fire_due(0.0) {
            self.push(events, EventKind::Phase(event), Some(trial), now);
        }
    }

    fn finish_block(&mut self, now: f64, events: &mut Vec<SessionEvent>) {
        if self.block_index == 0 {
            if self.break_entered {
                return;
            }
            self.break_entered = true;
            self.push(events, EventKind::SectionStop, None, now);
            self.push(events, EventKind::BreakStart, None, now);
            let until = now + self.config.break_duration_secs;
            self.status = SessionStatus::OnBreak { until };
            info!(until, "first block complete, break started");
        } else {
            self.terminate(now, events);
        }
    }

    fn terminate(&mut self, now: f64, events: &mut Vec<SessionEvent>) {
        if !self.ended {
            self.ended = true;
            self.push(events, EventKind::SectionStop, None, now);
            info!(completed = self.completed_trials, "session ended");
        }
        self.status = SessionStatus::Ended;
    }

    fn push(&self, events: &mut Vec<SessionEvent>, kind: EventKind, trial: Option<TrialSpec>, at: f64) {
        events.push(SessionEvent {
            section: self.section(),
            kind,
            trial,
            at,
        });
    }
}
