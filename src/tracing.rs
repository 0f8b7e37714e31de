//! Tracing subscriber setup for structured logging.
//!
//! Configures structured logging with file names, line numbers, log levels, and span
//! events. The level is controlled by `RUST_LOG`, falling back to `info` so a plain
//! `pansou` invocation is quiet enough for normal operation but `RUST_LOG=pansou=debug`
//! can be set for troubleshooting cache or plugin behavior.

use tracing_subscriber::{
    EnvFilter, fmt::format::FmtSpan, layer::SubscriberExt, util::SubscriberInitExt,
};

/// Initializes the global tracing subscriber with formatted output.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_span_events(FmtSpan::CLOSE)
                .with_file(true)
                .with_line_number(true)
                .with_level(true),
        )
        .with(filter)
        .init();
}
