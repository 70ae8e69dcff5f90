//! Logging utilities

pub use log::{debug, error, info, trace, warn};

/// Initialize logging with `info` as the default filter
pub fn init() {
    init_with_default("info");
}

/// Initialize logging; `RUST_LOG` overrides `default_filter`.
///
/// Calling this more than once is harmless.
pub fn init_with_default(default_filter: &str) {
    let env = env_logger::Env::default().default_filter_or(default_filter);
    if env_logger::Builder::from_env(env).try_init().is_err() {
        log::debug!("Logger already initialized");
    }
}
