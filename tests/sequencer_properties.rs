// tests/sequencer_properties.rs
//! Property tests for trial sequencing
//!
//! Whatever the display tick rate, every trial must see each cycle boundary
//! exactly once and in order, the break must be entered once, and the
//! session must terminate once.

use grip_core::protocol::{
    EventKind, GripType, MvcLevel, PhaseEvent, SequencerConfig, SessionEvent, SessionState,
    SessionStatus, TrialBlock, TrialSpec, PHASE_BOUNDARIES,
};
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;

fn fixed_block(n: usize) -> TrialBlock {
    let trials = (0..n)
        .map(|i| {
            let grip = GripType::ALL[i % 3];
            let level = MvcLevel::all().nth(i % 4).expect("four levels");
            TrialSpec::new(grip, level)
        })
        .collect();
    TrialBlock::from_trials(trials)
}

fn config(break_secs: f64, auto_resume: bool) -> SequencerConfig {
    SequencerConfig {
        break_duration_secs: break_secs,
        auto_resume_after_break: auto_resume,
    }
}

/// Tick the session until it ends, resuming manually after the break.
fn run_to_end(state: &mut SessionState, tick: f64) -> Vec<SessionEvent> {
    let mut events = state.start(0.0);
    let mut now = 0.0;
    let mut guard = 0usize;
    while !state.is_ended() {
        now += tick;
        events.extend(state.tick(now));
        if state.status() == SessionStatus::AwaitingResume {
            events.extend(state.start(now));
        }
        guard += 1;
        assert!(guard < 10_000_000, "session never ended");
    }
    events
}

fn phase_events_per_trial(events: &[SessionEvent]) -> Vec<Vec<PhaseEvent>> {
    let mut trials = Vec::new();
    let mut current: Option<Vec<PhaseEvent>> = None;
    for event in events {
        match event.kind {
            EventKind::TrialStart => current = Some(Vec::new()),
            EventKind::Phase(phase) => {
                if let Some(list) = current.as_mut() {
                    list.push(phase);
                }
            }
            EventKind::TrialEnd => {
                if let Some(list) = current.take() {
                    trials.push(list);
                }
            }
            _ => {}
        }
    }
    trials
}

fn count(events: &[SessionEvent], kind: EventKind) -> usize {
    events.iter().filter(|e| e.kind == kind).count()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn test_boundaries_fire_once_in_order(tick in 0.01f64..7.5, trials in 1usize..4) {
        let mut state = SessionState::new(fixed_block(trials), fixed_block(trials), config(60.0, false));
        let events = run_to_end(&mut state, tick);

        let expected: Vec<PhaseEvent> = PHASE_BOUNDARIES.iter().map(|b| b.event).collect();
        let per_trial = phase_events_per_trial(&events);
        prop_assert_eq!(per_trial.len(), trials * 2);
        for fired in per_trial {
            prop_assert_eq!(&fired, &expected);
        }
    }

    #[test]
    fn test_event_times_never_decrease(tick in 0.05f64..3.0) {
        let mut state = SessionState::new(fixed_block(2), fixed_block(1), config(45.0, true));
        let events = run_to_end(&mut state, tick);
        prop_assert!(events.windows(2).all(|w| w[0].at <= w[1].at));
    }

    #[test]
    fn test_stop_after_any_tick_records_one_termination(ticks in 1usize..200, tick in 0.1f64..2.0) {
        let mut state = SessionState::new(fixed_block(3), fixed_block(3), config(30.0, true));
        let mut events = state.start(0.0);
        let mut now = 0.0;
        for _ in 0..ticks {
            now += tick;
            events.extend(state.tick(now));
        }
        events.extend(state.stop(now));
        events.extend(state.stop(now + 1.0));
        events.extend(state.tick(now + 2.0));

        prop_assert!(state.is_ended());
        prop_assert!(count(&events, EventKind::BreakStart) <= 1);
        let section_stops = count(&events, EventKind::SectionStop);
        let starts = count(&events, EventKind::SectionStart);
        prop_assert!(section_stops <= starts);
    }
}

#[test]
fn test_full_shuffled_session_enters_break_once() {
    let mut rng = StdRng::seed_from_u64(11);
    let first = TrialBlock::generate(5, &mut rng);
    let second = TrialBlock::generate(5, &mut rng);
    assert_eq!(first.len(), 60);
    assert_eq!(second.len(), 60);

    let mut state = SessionState::new(first, second, config(300.0, true));
    let events = run_to_end(&mut state, 0.5);

    assert_eq!(count(&events, EventKind::SectionStart), 2);
    assert_eq!(count(&events, EventKind::SectionStop), 2);
    assert_eq!(count(&events, EventKind::BreakStart), 1);
    assert_eq!(count(&events, EventKind::BreakStop), 1);
    assert_eq!(count(&events, EventKind::TrialStart), 120);
    assert_eq!(count(&events, EventKind::TrialEnd), 120);
    assert_eq!(state.completed_trials(), 120);

    let last = events.last().expect("events recorded");
    assert_eq!(last.kind, EventKind::SectionStop);
    assert_eq!(last.section, 2);

    // nothing more once ended
    assert!(state.tick(1.0e6).is_empty());
    assert!(state.stop(1.0e6).is_empty());
}

#[test]
fn test_break_lasts_configured_duration() {
    let mut state = SessionState::new(fixed_block(1), fixed_block(1), config(300.0, false));
    let events = run_to_end(&mut state, 0.25);

    let break_start = events
        .iter()
        .find(|e| e.kind == EventKind::BreakStart)
        .expect("break started");
    let break_stop = events
        .iter()
        .find(|e| e.kind == EventKind::BreakStop)
        .expect("break stopped");
    let length = break_stop.at - break_start.at;
    assert!((300.0..300.25 + 1e-9).contains(&length), "break lasted {}", length);
}

#[test]
fn test_trial_events_carry_their_trial() {
    let first = fixed_block(2);
    let second = fixed_block(2);
    let expected: Vec<TrialSpec> = first.iter().chain(second.iter()).copied().collect();

    let mut state = SessionState::new(first, second, config(10.0, true));
    let events = run_to_end(&mut state, 1.0);

    let started: Vec<TrialSpec> = events
        .iter()
        .filter(|e| e.kind == EventKind::TrialStart)
        .filter_map(|e| e.trial)
        .collect();
    assert_eq!(started, expected);

    for event in &events {
        match event.kind {
            EventKind::Phase(_) | EventKind::TrialStart | EventKind::TrialEnd => {
                assert!(event.trial.is_some())
            }
            _ => assert!(event.trial.is_none()),
        }
    }
}
