//! Weather-specific error types.

use atmosphere_core::ConfigError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WeatherError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid API key")]
    InvalidApiKey,

    #[error("Location not found: {0}")]
    LocationNotFound(String),

    #[error("WeatherAPI request failed with code {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Malformed weather response: {0}")]
    MalformedResponse(String),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl WeatherError {
    /// User-friendly error message for notifications.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Network(_) => "Network error. Check your connection.",
            Self::InvalidApiKey => "Weather API key is invalid. Check settings.",
            Self::LocationNotFound(_) => "Location not found. Check and try again.",
            Self::Api { status, .. } if *status >= 500 => {
                "Weather service unavailable. Please try again later."
            }
            Self::Api { .. } => "Weather service error. Please try again.",
            Self::MalformedResponse(_) => "Received unexpected weather data.",
            Self::Config(e) => e.user_message(),
        }
    }
}
