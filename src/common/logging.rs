//! Logging setup for the storage engine.
//!
//! The crate logs through the `log` facade; binaries and tests call
//! [`init`] (or [`init_with_level`]) once to install an `env_logger`
//! backend. Library code never installs a logger itself.

use std::sync::Once;

static INIT: Once = Once::new();

/// Initialize logging from the `RUST_LOG` environment, defaulting to Info.
pub fn init() {
    INIT.call_once(|| {
        env_logger::Builder::from_default_env()
            .filter_level(log::LevelFilter::Info)
            .init();
    });
}

/// Initialize logging at an explicit level. Intended for tests; uses the
/// test-friendly writer so output interleaves with the harness.
pub fn init_with_level(level: log::LevelFilter) {
    INIT.call_once(|| {
        let _ = env_logger::builder()
            .filter_level(level)
            .is_test(true)
            .try_init();
    });
}
