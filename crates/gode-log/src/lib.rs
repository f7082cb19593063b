//! Centralized logging setup for gode-core.
//!
//! Provides a single [`init`] entry point that installs a `tracing`
//! subscriber driven by `RUST_LOG` (or an explicit default filter),
//! so that embedders get consistent module-resolution, plugin-load,
//! and queue-dispatch diagnostics without configuring `tracing`
//! themselves.

use std::sync::Once;

use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

static INIT: Once = Once::new();

/// Install a process-wide `tracing` subscriber.
///
/// `default_filter` is used when `RUST_LOG` is unset (e.g. `"info"` or
/// `"gode_runtime=debug,gode_plugin=debug"`). Safe to call more than
/// once; only the first call takes effect.
pub fn init(default_filter: &str) {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(default_filter.to_string()));

        let subscriber = FmtSubscriber::builder()
            .with_env_filter(filter)
            .with_span_events(FmtSpan::CLOSE)
            .with_target(true)
            .finish();

        // Ignore failure: a subscriber may already be set by the embedder.
        let _ = tracing::subscriber::set_global_default(subscriber);
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_is_idempotent() {
        init("info");
        init("debug");
    }
}
