//! Tracing setup for the scope-operator binary.
//!
//! Library code only emits events; installing a subscriber is left to the
//! binary so embedding callers keep control of their own output.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing subscriber for operator logging.
///
/// Reads `RUST_LOG` env var. Falls back to `default_filter` (the configured
/// `log.filter`) if unset or unparsable.
/// Output: stderr, compact format.
///
/// # Example
/// ```bash
/// RUST_LOG=scope_operator=debug scope-operator reconcile team-a/viewers
/// ```
pub fn init(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
