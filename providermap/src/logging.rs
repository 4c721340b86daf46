//! Logging setup for hosts embedding the map view.
//!
//! The library itself only emits `tracing` events. A host that has no
//! subscriber of its own can install the default one here.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::error::MapError;

/// Default filter when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "providermap=info";

/// Install a global `fmt` subscriber filtered by `RUST_LOG`, falling back
/// to `default_filter`.
///
/// Fails if a global subscriber is already installed.
pub fn init(default_filter: &str) -> Result<(), MapError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .map_err(|e| MapError::Logging(e.to_string()))?;

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .try_init()
        .map_err(|e| MapError::Logging(e.to_string()))
}
