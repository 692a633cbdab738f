//! Tracing setup for tests.

use tracing_subscriber::EnvFilter;

/// Installs a test-friendly `tracing` subscriber.
///
/// The filter comes from `RUST_LOG`, falling back to `warn`. Output goes
/// through the test harness's captured writer. Calling this more than once
/// is harmless.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}
