//! Logging setup for the `loadgen` binary.

use std::env;

use tracing::Level;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{EnvFilter, prelude::*};

/// Installs a global subscriber writing to stderr, filtered by `RUST_LOG`.
pub fn init_tracing() {
    let (level, env_filter) = parse_rust_log();
    let format = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true);

    tracing_subscriber::registry()
        .with(format.with_filter(LevelFilter::from(level)))
        .with(env_filter)
        .init();
}

/// Reads `RUST_LOG` as either a simple level, or a full list of directives.
///
/// Defaults to `INFO` if unset.
pub fn parse_rust_log() -> (Level, EnvFilter) {
    // A bare level only limits the load generator's own output, anything else is a directive list.
    let level = match env::var(EnvFilter::DEFAULT_ENV) {
        Ok(value) => match value.parse::<Level>() {
            Ok(level) => level,
            Err(_) => return (Level::TRACE, EnvFilter::new(value)),
        },
        Err(_) => Level::INFO,
    };

    // Dependencies stay quiet; `level` caps the load generator itself.
    let env_filter = EnvFilter::new("WARN,loadgen=TRACE");

    (level, env_filter)
}
