//! Logging setup shared by binaries and tests
//!
//! The library itself only talks to the `log` facade; installing a logger is
//! left to whoever embeds it.

pub use log::{debug, error, info, trace, warn};

/// Install `env_logger`, honouring `RUST_LOG` and falling back to `default_filter`.
///
/// Calling this more than once is harmless; later calls are ignored.
pub fn init(default_filter: &str) {
    let env = env_logger::Env::default().default_filter_or(default_filter);
    let _ = env_logger::Builder::from_env(env)
        .format_timestamp_millis()
        .try_init();
}

/// Install a logger suitable for unit tests (captured output, trace level).
pub fn init_for_tests() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("trace"))
        .is_test(true)
        .try_init();
}
