//! Tracing subscriber setup for the daemons.

use tracing_subscriber::EnvFilter;

/// Install the console tracing subscriber.
///
/// Call once at startup. `RUST_LOG` overrides the configured level.
pub fn init(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
