//! Structured logging setup (C12, §4.12). The engine emits `tracing` spans and
//! events at every suspension point (durable I/O, transport send/receive, wallet
//! sign callback, name-lookup refresh) and at `apply_message`'s accept/reject/
//! duplicate outcomes; this module only wires a subscriber to receive them.
//!
//! Unlike the teacher's own `telemetry.rs`, there is no OpenTelemetry exporter
//! here: an embeddable engine has no HTTP server of its own to export spans from,
//! and a host embedding this crate is expected to install its own subscriber if
//! it wants one. `init_tracing` is a convenience for hosts (and tests) that don't.

use tracing_subscriber::EnvFilter;

/// Installs a `tracing-subscriber` fmt layer reading its level from `RUST_LOG`
/// (defaulting to `info`). Safe to call more than once; the second and later
/// calls are no-ops.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
