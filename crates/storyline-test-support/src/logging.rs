//! Test tracing initialization.

use tracing_subscriber::EnvFilter;

/// Initializes a test-writer tracing subscriber once per process.
///
/// Subsequent calls are no-ops. Honors `RUST_LOG`, defaulting to `debug`.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")),
        )
        .with_test_writer()
        .try_init();
}
