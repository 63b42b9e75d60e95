//! MVC calibration sequence
//!
//! One run measures a single motion twice:
//! pre-trial countdown → trial 1 → rest → trial 2 → post-trial countdown.
//! Each phase ends at a one-shot deadline measured from the end of the
//! previous phase, so the measurement windows sit at fixed offsets from the
//! start of the run (5–10 s and 20–25 s with default timing).

use crate::acquisition::TraceBuffer;
use crate::config::constants::calibration::{GO_BLINK_INTERVAL_MS, TRIALS_PER_MOTION};
use crate::protocol::trial::GripType;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationPhase {
    PreTrial,
    Trial1,
    Rest,
    Trial2,
    PostTrial,
    Finished,
}

impl CalibrationPhase {
    pub fn next(self) -> CalibrationPhase {
        use CalibrationPhase::*;
        match self {
            PreTrial => Trial1,
            Trial1 => Rest,
            Rest => Trial2,
            Trial2 => PostTrial,
            PostTrial | Finished => Finished,
        }
    }

    pub fn is_measuring(self) -> bool {
        matches!(self, CalibrationPhase::Trial1 | CalibrationPhase::Trial2)
    }
}

/// Phase durations in seconds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationTiming {
    pub pre_trial_secs: f64,
    pub trial_secs: f64,
    pub rest_secs: f64,
    pub post_trial_secs: f64,
}

impl CalibrationTiming {
    pub fn duration(&self, phase: CalibrationPhase) -> f64 {
        match phase {
            CalibrationPhase::PreTrial => self.pre_trial_secs,
            CalibrationPhase::Trial1 | CalibrationPhase::Trial2 => self.trial_secs,
            CalibrationPhase::Rest => self.rest_secs,
            CalibrationPhase::PostTrial => self.post_trial_secs,
            CalibrationPhase::Finished => 0.0,
        }
    }

    pub fn trial1_window(&self) -> MeasurementWindow {
        let start = self.pre_trial_secs;
        MeasurementWindow { start, end: start + self.trial_secs }
    }

    pub fn trial2_window(&self) -> MeasurementWindow {
        let start = self.pre_trial_secs + self.trial_secs + self.rest_secs;
        MeasurementWindow { start, end: start + self.trial_secs }
    }

    pub fn total_secs(&self) -> f64 {
        self.pre_trial_secs + 2.0 * self.trial_secs + self.rest_secs + self.post_trial_secs
    }
}

/// Closed interval of run time, `start <= t <= end`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeasurementWindow {
    pub start: f64,
    pub end: f64,
}

impl MeasurementWindow {
    pub fn contains(&self, t: f64) -> bool {
        t >= self.start && t <= self.end
    }
}

/// Running sum of the samples that land inside one window. Fed as samples
/// arrive, so the averages never depend on what the display trace retains.
#[derive(Debug, Clone, Copy)]
struct WindowSum {
    window: MeasurementWindow,
    sum: f64,
    count: usize,
}

impl WindowSum {
    fn new(window: MeasurementWindow) -> Self {
        Self { window, sum: 0.0, count: 0 }
    }

    fn push(&mut self, t: f64, value: f64) {
        if self.window.contains(t) {
            self.sum += value;
            self.count += 1;
        }
    }

    fn mean(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }
}

/// Per-run result
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MvcSummary {
    pub trial1: Option<f64>,
    pub trial2: Option<f64>,
    pub overall: Option<f64>,
}

impl MvcSummary {
    pub fn from_trials(trial1: Option<f64>, trial2: Option<f64>) -> Self {
        let overall = match (trial1, trial2) {
            (Some(a), Some(b)) => Some((a + b) / 2.0),
            (a, b) => a.or(b),
        };
        Self { trial1, trial2, overall }
    }

    pub fn text(&self, timing: &CalibrationTiming) -> String {
        let fmt = |v: Option<f64>| v.map(|v| format!("{:.2} N", v)).unwrap_or_else(|| "--".to_string());
        let w1 = timing.trial1_window();
        let w2 = timing.trial2_window();
        format!(
            "Final MVC Results:\nTrial 1 Average ({}-{}s): {}\nTrial 2 Average ({}-{}s): {}\nOverall Average: {}",
            w1.start, w1.end, fmt(self.trial1), w2.start, w2.end, fmt(self.trial2), fmt(self.overall)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationTransition {
    pub from: CalibrationPhase,
    pub to: CalibrationPhase,
    /// Run-relative deadline at which the transition was due
    pub at: f64,
}

/// A single calibration run for one motion
#[derive(Debug, Clone)]
pub struct CalibrationRun {
    motion: GripType,
    timing: CalibrationTiming,
    phase: CalibrationPhase,
    started_at: f64,
    /// Run-relative end of the current phase
    deadline: f64,
    /// Bounded, for display only
    trace: TraceBuffer,
    trial1: WindowSum,
    trial2: WindowSum,
}

impl CalibrationRun {
    pub fn start(motion: GripType, timing: CalibrationTiming, now: f64, max_trace_samples: usize) -> Self {
        info!(motion = motion.motion_label(), "calibration run started");
        Self {
            motion,
            timing,
            phase: CalibrationPhase::PreTrial,
            started_at: now,
            deadline: timing.duration(CalibrationPhase::PreTrial),
            trace: TraceBuffer::new(max_trace_samples),
            trial1: WindowSum::new(timing.trial1_window()),
            trial2: WindowSum::new(timing.trial2_window()),
        }
    }

    pub fn motion(&self) -> GripType {
        self.motion
    }

    pub fn phase(&self) -> CalibrationPhase {
        self.phase
    }

    pub fn timing(&self) -> &CalibrationTiming {
        &self.timing
    }

    pub fn is_finished(&self) -> bool {
        self.phase == CalibrationPhase::Finished
    }

    pub fn elapsed(&self, now: f64) -> f64 {
        now - self.started_at
    }

    pub fn trace(&self) -> &TraceBuffer {
        &self.trace
    }

    /// Fire every deadline that has passed, in order
    pub fn advance(&mut self, now: f64) -> Vec<CalibrationTransition> {
        let elapsed = self.elapsed(now);
        let mut transitions = Vec::new();
        while self.phase != CalibrationPhase::Finished && elapsed >= self.deadline {
            let from = self.phase;
            let to = from.next();
            transitions.push(CalibrationTransition { from, to, at: self.deadline });
            self.phase = to;
            self.deadline += self.timing.duration(to);
            debug!(?from, ?to, "calibration phase changed");
        }
        transitions
    }

    /// Record the force shown at `now`. Outside the measurement phases the
    /// trace is flat zero, and a measurement tick without a fresh sample
    /// also records zero.
    pub fn record(&mut self, now: f64, force: Option<f64>) {
        if self.is_finished() {
            return;
        }
        let value = if self.phase.is_measuring() { force.unwrap_or(0.0) } else { 0.0 };
        let t = self.elapsed(now);
        self.trial1.push(t, value);
        self.trial2.push(t, value);
        self.trace.push(t, value);
    }

    pub fn trial1_average(&self) -> Option<f64> {
        self.trial1.mean()
    }

    pub fn trial2_average(&self) -> Option<f64> {
        self.trial2.mean()
    }

    pub fn summary(&self) -> MvcSummary {
        MvcSummary::from_trials(self.trial1_average(), self.trial2_average())
    }

    /// Measurement trials begun so far, out of the total per motion
    pub fn trial_counter(&self) -> (usize, usize) {
        let done = match self.phase {
            CalibrationPhase::PreTrial => 0,
            CalibrationPhase::Trial1 | CalibrationPhase::Rest => 1,
            _ => TRIALS_PER_MOTION,
        };
        (done, TRIALS_PER_MOTION)
    }

    /// Operator cue text at `now`
    pub fn cue(&self, now: f64) -> String {
        let elapsed = self.elapsed(now);
        let remaining = (self.deadline - elapsed).max(0.0) as u64;
        match self.phase {
            CalibrationPhase::PreTrial => format!("Starting in {}...", remaining),
            CalibrationPhase::Trial1 | CalibrationPhase::Trial2 => {
                let phase_start = self.deadline - self.timing.duration(self.phase);
                let blinks = ((elapsed - phase_start).max(0.0) * 1000.0) as u64 / GO_BLINK_INTERVAL_MS;
                if blinks % 2 == 0 { "GO!".to_string() } else { String::new() }
            }
            CalibrationPhase::Rest => format!("Rest for {} seconds...", remaining),
            CalibrationPhase::PostTrial => format!("DONE, Now Rest! ({})", remaining),
            CalibrationPhase::Finished => String::new(),
        }
    }
}

/// One overall MVC value per motion
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionResults {
    pub full_grasp: f64,
    pub index_pinch: f64,
    pub middle_pinch: f64,
}

impl MotionResults {
    pub fn get(&self, grip: GripType) -> f64 {
        match grip {
            GripType::FullGrasp => self.full_grasp,
            GripType::IndexPinch => self.index_pinch,
            GripType::MiddlePinch => self.middle_pinch,
        }
    }
}

/// Accumulates per-motion results until all three motions are measured
#[derive(Debug, Clone, Default)]
pub struct CalibrationResults {
    values: BTreeMap<GripType, f64>,
}

impl CalibrationResults {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a motion's overall value (re-measuring overwrites). Returns the
    /// complete set and resets once all three motions are present. A run
    /// with no samples in either window is stored as 0.
    pub fn insert(&mut self, motion: GripType, overall: Option<f64>) -> Option<MotionResults> {
        let value = overall.unwrap_or_else(|| {
            warn!(motion = motion.motion_label(), "no samples in either window, storing 0");
            0.0
        });
        self.values.insert(motion, value);

        if self.values.len() < GripType::ALL.len() {
            return None;
        }
        let values = std::mem::take(&mut self.values);
        Some(MotionResults {
            full_grasp: values[&GripType::FullGrasp],
            index_pinch: values[&GripType::IndexPinch],
            middle_pinch: values[&GripType::MiddlePinch],
        })
    }

    pub fn get(&self, motion: GripType) -> Option<f64> {
        self.values.get(&motion).copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (GripType, f64)> + '_ {
        self.values.iter().map(|(&g, &v)| (g, v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TIMING: CalibrationTiming = CalibrationTiming {
        pre_trial_secs: 5.0,
        trial_secs: 5.0,
        rest_secs: 10.0,
        post_trial_secs: 5.0,
    };

    #[test]
    fn test_windows_from_timing() {
        assert_eq!(TIMING.trial1_window(), MeasurementWindow { start: 5.0, end: 10.0 });
        assert_eq!(TIMING.trial2_window(), MeasurementWindow { start: 20.0, end: 25.0 });
        assert_eq!(TIMING.total_secs(), 30.0);
    }

    #[test]
    fn test_phase_chain() {
        let mut run = CalibrationRun::start(GripType::FullGrasp, TIMING, 100.0, 1500);
        assert!(run.advance(104.9).is_empty());

        let t = run.advance(105.0);
        assert_eq!(t.len(), 1);
        assert_eq!((t[0].from, t[0].to, t[0].at), (CalibrationPhase::PreTrial, CalibrationPhase::Trial1, 5.0));

        // a stalled consumer catches up on every missed deadline in order
        let t = run.advance(126.0);
        let to: Vec<_> = t.iter().map(|x| x.to).collect();
        assert_eq!(to, vec![CalibrationPhase::Rest, CalibrationPhase::Trial2, CalibrationPhase::PostTrial]);
        assert_eq!(t[2].at, 25.0);

        let t = run.advance(130.0);
        assert_eq!(t[0].to, CalibrationPhase::Finished);
        assert!(run.is_finished());
        assert!(run.advance(200.0).is_empty());
    }

    fn window_mean(samples: &[(f64, f64)], window: MeasurementWindow) -> Option<f64> {
        let mut sum = WindowSum::new(window);
        for &(t, f) in samples {
            sum.push(t, f);
        }
        sum.mean()
    }

    #[test]
    fn test_averages_from_synthetic_samples() {
        let trace = vec![
            (4.0, 99.0),
            (5.0, 100.0),
            (7.5, 110.0),
            (10.0, 120.0),
            (15.0, 99.0),
            (20.0, 200.0),
            (25.0, 220.0),
            (26.0, 99.0),
        ];
        let t1 = window_mean(&trace, TIMING.trial1_window());
        let t2 = window_mean(&trace, TIMING.trial2_window());
        assert_eq!(t1, Some(110.0));
        assert_eq!(t2, Some(210.0));
        assert_eq!(MvcSummary::from_trials(t1, t2).overall, Some(160.0));
    }

    #[test]
    fn test_missing_window_falls_back() {
        let only_first = vec![(6.0, 50.0), (8.0, 70.0)];
        let t1 = window_mean(&only_first, TIMING.trial1_window());
        let t2 = window_mean(&only_first, TIMING.trial2_window());
        assert_eq!(t2, None);
        let summary = MvcSummary::from_trials(t1, t2);
        assert_eq!(summary.overall, Some(60.0));

        assert_eq!(MvcSummary::from_trials(None, Some(3.0)).overall, Some(3.0));
        assert_eq!(MvcSummary::from_trials(None, None).overall, None);
    }

    #[test]
    fn test_run_records_zero_outside_measurement() {
        let mut run = CalibrationRun::start(GripType::IndexPinch, TIMING, 0.0, 1500);
        let mut now = 0.0;
        while now <= 30.5 {
            run.advance(now);
            run.record(now, Some(40.0));
            now += 0.05;
        }
        assert!(run.is_finished());
        let summary = run.summary();
        // window edges at 10 s and 25 s already belong to the following phase
        let t1 = summary.trial1.unwrap();
        let t2 = summary.trial2.unwrap();
        assert!(t1 > 38.0 && t1 <= 40.0, "trial1 average {}", t1);
        assert!(t2 > 38.0 && t2 <= 40.0, "trial2 average {}", t2);
        assert!(run.trace().iter().filter(|&(t, _)| t < 5.0).all(|(_, f)| f == 0.0));
    }

    #[test]
    fn test_fast_ticks_keep_first_window() {
        // 5 ms ticks push 6000 points through a 1500-point trace
        let mut run = CalibrationRun::start(GripType::FullGrasp, TIMING, 0.0, 1500);
        let mut step = 0u32;
        while !run.is_finished() {
            let now = step as f64 * 0.005;
            let force = if now < 15.0 { 100.0 } else { 10.0 };
            run.advance(now);
            run.record(now, Some(force));
            step += 1;
            assert!(step < 10_000, "run never finished");
        }
        assert_eq!(run.trace().len(), 1500);
        assert!(run.trace().iter().all(|(t, _)| t > 20.0));

        let summary = run.summary();
        let t1 = summary.trial1.expect("first window measured");
        let t2 = summary.trial2.expect("second window measured");
        assert!(t1 > 99.0 && t1 <= 100.0, "trial1 average {}", t1);
        assert!(t2 > 9.9 && t2 <= 10.0, "trial2 average {}", t2);
        let overall = summary.overall.unwrap();
        assert!(overall > 54.5 && overall <= 55.0, "overall {}", overall);
    }

    #[test]
    fn test_trial_counter_and_cues() {
        let mut run = CalibrationRun::start(GripType::MiddlePinch, TIMING, 0.0, 100);
        assert_eq!(run.trial_counter(), (0, 2));
        assert_eq!(run.cue(1.5), "Starting in 3...");

        run.advance(5.0);
        assert_eq!(run.trial_counter(), (1, 2));
        assert_eq!(run.cue(5.1), "GO!");
        assert_eq!(run.cue(5.6), "");

        run.advance(11.0);
        assert_eq!(run.cue(11.0), "Rest for 9 seconds...");

        run.advance(26.0);
        assert_eq!(run.trial_counter(), (2, 2));
        assert_eq!(run.cue(26.0), "DONE, Now Rest! (4)");
    }

    #[test]
    fn test_results_accumulate_and_reset() {
        let mut results = CalibrationResults::new();
        assert!(results.insert(GripType::FullGrasp, Some(300.0)).is_none());
        assert!(results.insert(GripType::IndexPinch, Some(60.0)).is_none());
        // re-measure overwrites
        assert!(results.insert(GripType::FullGrasp, Some(320.0)).is_none());
        assert_eq!(results.len(), 2);

        let complete = results.insert(GripType::MiddlePinch, None).unwrap();
        assert_eq!(complete.full_grasp, 320.0);
        assert_eq!(complete.index_pinch, 60.0);
        assert_eq!(complete.middle_pinch, 0.0);
        assert!(results.is_empty());
    }

    #[test]
    fn test_summary_text() {
        let summary = MvcSummary::from_trials(Some(100.0), None);
        let text = summary.text(&TIMING);
        assert!(text.contains("Trial 1 Average (5-10s): 100.00 N"));
        assert!(text.contains("Trial 2 Average (20-25s): --"));
        assert!(text.contains("Overall Average: 100.00 N"));
    }
}
