// src/utils/time.rs
//! Clock sources for session timing and sample timestamps

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Time provider trait for dependency injection and testing.
///
/// Session logic only ever sees seconds as `f64` on a monotonic scale; the
/// origin is arbitrary but fixed for the lifetime of the provider.
pub trait TimeProvider: Send + Sync {
    fn now_nanos(&self) -> u64;

    fn now_secs(&self) -> f64 {
        self.now_nanos() as f64 / 1e9
    }
}

/// Monotonic provider anchored at construction
pub struct MonotonicTimeProvider {
    origin: Instant,
}

impl MonotonicTimeProvider {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicTimeProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeProvider for MonotonicTimeProvider {
    fn now_nanos(&self) -> u64 {
        self.origin.elapsed().as_nanos() as u64
    }
}

/// Mock time provider for deterministic testing
pub struct MockTimeProvider {
    current_time: AtomicU64,
}

impl MockTimeProvider {
    pub fn new(initial_time_nanos: u64) -> Self {
        Self {
            current_time: AtomicU64::new(initial_time_nanos),
        }
    }

    pub fn advance_by(&self, nanos: u64) {
        self.current_time.fetch_add(nanos, Ordering::Relaxed);
    }

    pub fn advance(&self, duration: Duration) {
        self.advance_by(duration.as_nanos() as u64);
    }

    pub fn advance_secs(&self, secs: f64) {
        self.advance_by(secs_to_nanos(secs));
    }

    pub fn set_time(&self, nanos: u64) {
        self.current_time.store(nanos, Ordering::Relaxed);
    }
}

impl TimeProvider for MockTimeProvider {
    fn now_nanos(&self) -> u64 {
        self.current_time.load(Ordering::Relaxed)
    }
}

/// Negative and non-finite inputs clamp to zero.
pub fn secs_to_nanos(secs: f64) -> u64 {
    if secs.is_finite() && secs > 0.0 {
        (secs * 1e9).round() as u64
    } else {
        0
    }
}
