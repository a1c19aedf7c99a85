//! Structured logging setup.
//!
//! Initializes a global `tracing` subscriber emitting newline-delimited
//! JSON, filterable via `RUST_LOG`. Call [`init`] once, early in `main`.

use std::sync::Once;
use tracing_subscriber::{fmt, EnvFilter};

static INIT: Once = Once::new();

/// Initialize the global tracing subscriber.
///
/// Safe to call more than once; only the first call takes effect.
pub fn init() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .with_current_span(false)
            .init();
    });
}

/// A stable identifier for this host, used to tag diagnostic events and
/// logs when the embedding process doesn't supply its own.
pub fn host_id() -> String {
    hostname_fallback()
}

fn hostname_fallback() -> String {
    std::env::var("HOSTNAME")
        .ok()
        .or_else(|| {
            std::env::var("COMPUTERNAME").ok()
        })
        .unwrap_or_else(|| "unknown-host".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_id_never_empty() {
        assert!(!host_id().is_empty());
    }

    #[test]
    fn init_is_idempotent() {
        init();
        init();
    }
}
