//! Logging setup
//!
//! Production emits one JSON object per event for the log pipeline; every other
//! environment gets coloured human-readable output.

use crate::config::AppConfig;
use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, util::TryInitError, EnvFilter,
};

/// Used when `RUST_LOG` is unset. HTTP internals are noisy at `info`.
const DEFAULT_FILTER: &str = "info,hyper=warn,reqwest=warn";

/// Install the global subscriber for the given environment.
///
/// Fails if a subscriber is already installed, which only happens when a test
/// harness or an embedding binary got there first.
pub fn try_init_logging(config: &AppConfig) -> Result<(), TryInitError> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    if config.is_production() {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(false)
                    .with_target(true)
                    .with_file(true)
                    .with_line_number(true)
                    .with_writer(std::io::stdout),
            )
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_ansi(true)
                    .with_writer(std::io::stdout),
            )
            .try_init()
    }
}

/// Like [`try_init_logging`], but a second initialisation is silently ignored.
pub fn init_logging(config: &AppConfig) {
    let _ = try_init_logging(config);
}
