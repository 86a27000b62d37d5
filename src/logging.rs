//! Tracing initialization for hosts that have no subscriber of their own.

use std::sync::OnceLock;

use tracing_subscriber::EnvFilter;

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();

/// Install a console `tracing` subscriber, once per process.
///
/// Honors `RUST_LOG`; defaults to `info`. Safe to call when the host test
/// harness already installed a global subscriber: the existing one wins.
pub fn init_logging() {
    LOGGER_INITIALIZED.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_test_writer()
            .try_init();
    });
}
