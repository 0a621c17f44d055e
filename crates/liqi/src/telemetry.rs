//! Log output setup.

use tracing_subscriber::EnvFilter;

/// Installs a formatted subscriber filtered by `RUST_LOG` (default `info`).
///
/// # Panics
/// If a global subscriber is already set. Use [`try_init`] where that
/// can happen, as in tests.
pub fn init() {
    tracing_subscriber::fmt().with_env_filter(filter()).init();
}

/// Like [`init`], but returns `false` instead of panicking when a
/// subscriber is already installed.
pub fn try_init() -> bool {
    tracing_subscriber::fmt()
        .with_env_filter(filter())
        .with_test_writer()
        .try_init()
        .is_ok()
}

fn filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}
