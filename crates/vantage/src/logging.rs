//! Tracing subscriber setup for host processes.
//!
//! The library itself logs through the `log` facade; hosts call
//! [`init`] once at startup to install a tracing subscriber with an
//! env-filter (`RUST_LOG`) and the `log` bridge (the subscriber's
//! `tracing-log` integration picks up the facade records).

use tracing_subscriber::{fmt, EnvFilter};

/// Installs the global tracing subscriber.
/// Safe to call more than once; later calls are no-ops.
pub fn init(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));

    let _ = fmt().with_env_filter(filter).with_target(true).try_init();
}
