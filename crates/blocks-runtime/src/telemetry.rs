//! Tracing subscriber setup.

use blocks_core::config::LoggingConfig;
use blocks_core::{BlocksError, Result};
use tracing_subscriber::EnvFilter;

/// Build the log filter: `RUST_LOG` when set, the configured level otherwise.
pub fn env_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    let filter = match std::env::var(EnvFilter::DEFAULT_ENV) {
        Ok(directives) if !directives.trim().is_empty() => EnvFilter::try_new(directives),
        _ => EnvFilter::try_new(&config.level),
    };
    filter.map_err(|e| BlocksError::Config(format!("Invalid log filter: {}", e)))
}

/// Install the global tracing subscriber.
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    let filter = env_filter(config)?;
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    let result = if config.json_format {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    result.map_err(|e| BlocksError::Config(format!("Failed to install tracing subscriber: {}", e)))
}
