//! Log setup.
//!
//! One `tracing` subscriber per process, filtered by [`EnvFilter`] and
//! written as plain text or JSON lines.

use crate::config::{DEFAULT_LOG_FILTER, LogFormat, VerdantConfig};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Build the filter, falling back to the default on a bad directive.
#[must_use]
pub fn build_filter(directives: &str) -> EnvFilter {
    EnvFilter::try_new(directives).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
}

/// Install the global subscriber. Call once, from `main`.
pub fn init(config: &VerdantConfig) {
    init_with(config.log_format, &config.log_filter);
}

/// Install the global subscriber with explicit settings.
pub fn init_with(format: LogFormat, directives: &str) {
    let filter = build_filter(directives);

    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}
