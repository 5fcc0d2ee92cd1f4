//! Error types shared across the Atmosphere crates.
//!
//! Each error carries a `user_message()` suitable for a notification, while
//! `Display` keeps the full context for the diagnostic log.

use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Configuration parse error: {0}")]
    ParseError(String),

    #[error("Missing required setting: {0}")]
    MissingSetting(String),
}

impl ConfigError {
    pub fn user_message(&self) -> &'static str {
        match self {
            ConfigError::NotFound(_) => "Configuration not found. Using defaults.",
            ConfigError::Invalid(_) => "Invalid configuration. Check your settings.",
            ConfigError::ParseError(_) => "Configuration file is malformed. Check your settings.",
            ConfigError::MissingSetting(_) => {
                "Set an API token and a location before fetching weather."
            }
        }
    }
}

/// Errors reported by host collaborators.
#[derive(Debug, Error)]
pub enum HostError {
    #[error("Macro already registered: {0}")]
    DuplicateMacro(String),

    #[error("Invalid macro name: {0:?}")]
    InvalidMacroName(String),

    #[error("Settings store error: {0}")]
    Store(String),
}

impl HostError {
    pub fn user_message(&self) -> &'static str {
        match self {
            HostError::DuplicateMacro(_) | HostError::InvalidMacroName(_) => {
                "Weather macros could not be registered."
            }
            HostError::Store(_) => "Settings could not be saved.",
        }
    }
}
