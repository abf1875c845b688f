//! Telemetry helpers for structured logging.

use tracing_subscriber::EnvFilter;

/// Install a default `RUST_LOG`-driven fmt subscriber if none is set.
pub fn init_tracing() {
    init_tracing_with_default("warn");
}

/// Like [`init_tracing`], but falls back to `directive` (for example
/// `"info,prometheus_slot_executor=debug"`) when `RUST_LOG` is unset or invalid.
pub fn init_tracing_with_default(directive: &str) {
    if tracing::dispatcher::has_been_set() {
        return;
    }
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
