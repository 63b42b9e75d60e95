// src/logging.rs
//! Subscriber setup for the binaries

use crate::config::LoggingConfig;
use tracing_subscriber::EnvFilter;

/// `RUST_LOG` first, then the configured level, then `info`
fn build_filter(env: Option<&str>, level: &str) -> EnvFilter {
    env.and_then(|directives| EnvFilter::try_new(directives).ok())
        .or_else(|| EnvFilter::try_new(level).ok())
        .unwrap_or_else(|| EnvFilter::new("info"))
}

/// Install the global `tracing` subscriber. `RUST_LOG` overrides the
/// configured level. Returns `false` if a subscriber was already installed.
pub fn init(config: &LoggingConfig) -> bool {
    let env = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let filter = build_filter(env.as_deref(), &config.level);

    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(false);
    let installed = if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.is_ok()
}
