//! Global log setup for the relay binary and tests.
//!
//! Library code logs through the `log` facade; records are bridged into a
//! `tracing` fmt subscriber so they share output with the stage spans.

use std::sync::OnceLock;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::EnvFilter;

static INIT: OnceLock<bool> = OnceLock::new();

/// Installs the global subscriber. `RUST_LOG` takes precedence over
/// `default_filter`. Only the first call has an effect; returns whether the
/// subscriber from that call is active.
pub fn init_logging(default_filter: &str) -> bool {
    *INIT.get_or_init(|| install(default_filter, false))
}

/// Debug-level logging captured by the test harness.
pub fn init_for_tests() {
    INIT.get_or_init(|| install("usdz_relay=debug", true));
}

fn install(default_filter: &str, test_writer: bool) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let fmt_layer = tracing_subscriber::fmt::layer().with_target(true);
    let result = if test_writer {
        let subscriber = tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer.with_test_writer());
        tracing::subscriber::set_global_default(subscriber)
    } else {
        let subscriber = tracing_subscriber::registry().with(filter).with(fmt_layer);
        tracing::subscriber::set_global_default(subscriber)
    };

    if result.is_err() {
        // Another subscriber owns the process, e.g. an embedding application.
        return false;
    }

    if let Err(e) = tracing_log::LogTracer::init() {
        tracing::warn!("log records will not be bridged: {}", e);
    }
    true
}
