//! Structured logging with `tracing`.
//!
//! - [`init_subscriber`] installs the process-wide stderr subscriber
//! - [`capture_logs`] records events in memory for test assertions
//!
//! Operation and transport generation travel as structured fields on
//! events rather than being formatted into messages.

pub mod test_utils;

pub use test_utils::{CapturedEvent, CapturedLogs, capture_logs};

use tracing_subscriber::EnvFilter;

/// Filter used when the configured directive does not parse.
pub const FALLBACK_FILTER: &str = "info";

/// Resolve the effective filter: `RUST_LOG` first, then `level`, then
/// [`FALLBACK_FILTER`].
fn resolve_filter(env: Option<&str>, level: &str) -> EnvFilter {
    env.and_then(|directive| EnvFilter::try_new(directive).ok())
        .or_else(|| EnvFilter::try_new(level).ok())
        .unwrap_or_else(|| EnvFilter::new(FALLBACK_FILTER))
}

/// Install the global stderr subscriber.
///
/// Only the first call in a process takes effect.
pub fn init_subscriber(level: &str) {
    let env = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let result = tracing_subscriber::fmt()
        .with_env_filter(resolve_filter(env.as_deref(), level))
        .with_writer(std::io::stderr)
        .with_target(true)
        .compact()
        .try_init();
    if result.is_ok() {
        tracing::debug!(level, "logging initialized");
    }
}
