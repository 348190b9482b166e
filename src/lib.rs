pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod monitor;
pub mod server;
pub mod signals;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize tracing/logging
///
/// `log_format` is "json" for structured output; anything else logs text.
/// `RUST_LOG` overrides the default `info` filter.
///
/// Note: This function can only be called once.
pub fn init_tracing(log_format: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(filter);

    if log_format == "json" {
        registry
            .with(fmt::layer().json().with_target(true))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(true))
            .init();
    }
}
