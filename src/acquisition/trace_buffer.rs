// src/acquisition/trace_buffer.rs
//! Bounded time/value window backing the live force plots

use std::collections::VecDeque;

/// Rolling `(seconds, value)` trace; the oldest point is evicted once
/// `capacity` is reached.
#[derive(Debug, Clone)]
pub struct TraceBuffer {
    points: VecDeque<(f64, f64)>,
    capacity: usize,
}

impl TraceBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            points: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Capacity for `window_secs` of data at `rate_hz`
    pub fn for_window(window_secs: f64, rate_hz: f64) -> Self {
        Self::new((window_secs * rate_hz).ceil().max(1.0) as usize)
    }

    pub fn push(&mut self, t: f64, value: f64) {
        if self.points.len() == self.capacity {
            self.points.pop_front();
        }
        self.points.push_back((t, value));
    }

    pub fn clear(&mut self) {
        self.points.clear();
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn last(&self) -> Option<(f64, f64)> {
        self.points.back().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.points.iter().copied()
    }

    /// Points with `start <= t <= end`
    pub fn between(&self, start: f64, end: f64) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.iter().filter(move |&(t, _)| t >= start && t <= end)
    }

    /// Visible x-range of a scrolling plot `width` seconds wide: fixed at
    /// `[0, width]` until the newest point passes the midpoint, then centred
    /// on it.
    pub fn scroll_range(&self, width: f64) -> (f64, f64) {
        let half = width / 2.0;
        match self.last() {
            Some((t, _)) if t > half => (t - half, t + half),
            _ => (0.0, width),
        }
    }
}
