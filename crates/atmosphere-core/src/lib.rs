//! Shared foundation for Atmosphere: configuration, error types and the
//! host collaborator contracts.

pub mod config;
pub mod error;
pub mod host;

pub use config::{
    ApiConfig, CacheLifetime, Config, PersistConfig, ValidationResult, WeatherConfig,
};
pub use error::{ConfigError, HostError};
pub use host::{
    EventSource, HostEvent, LogNotifier, MacroRegistry, MacroTable, NoticeLevel, Notifier,
};

use anyhow::Result;

/// Initialize logging
pub fn init() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    tracing::debug!("[Atmosphere] core initialized");
    Ok(())
}
