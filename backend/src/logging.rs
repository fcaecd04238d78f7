//! Tracing subscriber setup.
//!
//! The library only emits `tracing` events; binaries and tests decide where
//! they go by calling one of these once.

use tracing_subscriber::{fmt, EnvFilter};

/// Install a formatting subscriber filtered by `RUST_LOG` (default: `info`).
///
/// ```no_run
/// batchload::logging::init();
/// ```
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_line_number(true)
        .init();
}

/// Debug-level subscriber writing through the test harness. Safe to call
/// from every test.
pub fn init_test() {
    let _ = fmt()
        .with_env_filter(EnvFilter::new("debug"))
        .with_test_writer()
        .try_init();
}
