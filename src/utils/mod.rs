//! Common utility functions for grip-core

pub mod time;

pub use time::{
    secs_to_nanos,
    MockTimeProvider,
    MonotonicTimeProvider,
    TimeProvider,
};
