//! Tracing setup for applications embedding the engine.

use tracing_subscriber::EnvFilter;

/// Environment variable controlling the log filter (same syntax as
/// `RUST_LOG`).
pub const LOG_ENV: &str = "PAIRCHAT_LOG";

/// Initializes the global tracing subscriber with an env-filter.
///
/// Defaults to `info` when `PAIRCHAT_LOG` is unset. Safe to call more than
/// once; later calls are no-ops.
pub fn init() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init();
}
