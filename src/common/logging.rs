//! Tracing subscriber setup for the command-line binary.
//!
//! `RUST_LOG` always wins. Without it, output is limited to warnings, or to
//! debug events for this crate when `--verbose` is given.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::common::error::DroverError;
use crate::common::result::DroverResult;

fn default_directive(verbose: bool) -> &'static str {
    if verbose {
        "warn,drover=debug"
    } else {
        "warn"
    }
}

/// Install the global subscriber, writing to stderr.
///
/// # Errors
/// Returns a `ConfigError` if a subscriber is already installed.
pub fn init(verbose: bool) -> DroverResult<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(verbose)
                .without_time(),
        )
        .try_init()
        .map_err(|e| DroverError::config_error(format!("Failed to initialize tracing: {}", e)))
}
