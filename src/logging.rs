//! Process-wide tracing setup for the `dumpbeam` binary.
//!
//! The library only emits `tracing` events; installing a subscriber is left
//! to the binary (and to child worker processes, which log to the same
//! stderr as their parent).

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Install an `fmt` subscriber filtered by `RUST_LOG`, falling back to
/// `default_level` when the variable is unset or invalid.
///
/// Calling this more than once is harmless: later calls are ignored.
pub fn init(default_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(filter)
        .try_init();
}
