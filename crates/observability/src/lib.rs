//! Process-wide logging setup.

/// Subscriber setup (filters, output format).
pub mod logging;

pub use logging::{LOG_FORMAT_ENV, LogConfig, LogFormat};

/// Initialize logging from the environment.
///
/// Safe to call multiple times; subsequent calls are no-ops.
pub fn init() {
    logging::init(&LogConfig::from_env());
}
