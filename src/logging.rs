//! Tracing setup for the binary

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Level used when neither `RUST_LOG` nor `--log-level` is given
pub const DEFAULT_LOG_LEVEL: &str = "warn";

/// Build the filter: `RUST_LOG` wins over `level`
pub fn filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_LEVEL))
}

/// Install the global subscriber. Logs go to stderr so that table, CSV and
/// SVG output on stdout stays clean.
pub fn init_tracing(level: &str) {
    let layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false);
    // A second call (e.g. from tests) keeps the first subscriber
    let _ = tracing_subscriber::registry()
        .with(filter(level))
        .with(layer)
        .try_init();
}
