// Tracing initialization with a configurable log level.
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::LoggingConfig;

/// Installs the global subscriber using the configured level.
pub fn init_tracing(logging: &LoggingConfig) {
    init_tracing_with_level(&logging.level);
}

/// Installs the global subscriber. A no-op if one is already installed.
pub fn init_tracing_with_level(level: &str) {
    // Prefer RUST_LOG from env, otherwise use provided level string.
    let filter = std::env::var("RUST_LOG")
        .ok()
        .and_then(|_| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new(level));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_tracing_is_idempotent() {
        init_tracing(&LoggingConfig::default());
        // A second install must not panic.
        init_tracing_with_level("debug");
        tracing::info!("subscriber installed");
    }
}
