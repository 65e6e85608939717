//! Structured JSON logging setup.
//!
//! Every log event is emitted as a single-line JSON object with the event
//! fields flattened to the top level, so downstream processors can index
//! on `pipeline_id`, `stage`, `duration_ms`, and the other fields the
//! metrics module attaches.

use tracing_subscriber::EnvFilter;

/// Install the global JSON subscriber with an `info` default filter.
///
/// Safe to call more than once; later calls are no-ops, which keeps
/// parallel tests from fighting over the global subscriber.
pub fn init() {
    init_with_filter("info");
}

/// Install the global JSON subscriber with a custom default filter.
/// `RUST_LOG` overrides the default when set.
pub fn init_with_filter(default_directive: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .flatten_event(true)
        .with_current_span(false)
        .try_init();
}
