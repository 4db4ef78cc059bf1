//! Tracing subscriber setup for binaries and demos embedding the tracker.

use tracing_subscriber::EnvFilter;

use crate::{Error, Result};

/// Install a global `fmt` subscriber.
///
/// `RUST_LOG` takes precedence; `default_directive` (e.g. `"moea_tracker=info"`)
/// applies when it is unset.
///
/// # Errors
///
/// Returns [`Error::Telemetry`] if the directive does not parse or a global
/// subscriber is already installed.
pub fn init_tracing(default_directive: &str) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(default_directive).map_err(|e| Error::Telemetry(e.to_string()))?,
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .map_err(|e| Error::Telemetry(e.to_string()))
}
