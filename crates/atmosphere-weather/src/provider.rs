//! WeatherAPI.com client for the current-conditions endpoint.

use std::time::Duration;

use atmosphere_core::ApiConfig;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::instrument;

use crate::error::WeatherError;
use crate::types::WeatherResponse;

const CURRENT_PATH: &str = "/v1/current.json";
const USER_AGENT: &str = concat!("atmosphere/", env!("CARGO_PKG_VERSION"));

/// Provider error codes, see https://www.weatherapi.com/docs/#intro-error-codes
const CODE_KEY_NOT_PROVIDED: i64 = 1002;
const CODE_NO_LOCATION_FOUND: i64 = 1006;
const CODE_KEY_INVALID: i64 = 2006;
const CODE_KEY_DISABLED: i64 = 2008;

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    code: Option<i64>,
    message: Option<String>,
}

#[derive(Debug, Clone)]
pub struct WeatherProvider {
    client: Client,
    base_url: String,
}

impl WeatherProvider {
    pub fn new(api: &ApiConfig) -> Result<Self, WeatherError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(api.timeout_secs))
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            base_url: api.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch current conditions for `location`. Air quality data is not requested.
    #[instrument(skip(self, token), level = "info")]
    pub async fn current(
        &self,
        token: &str,
        location: &str,
    ) -> Result<WeatherResponse, WeatherError> {
        let url = format!("{}{}", self.base_url, CURRENT_PATH);

        let response = self
            .client
            .get(&url)
            .query(&[("key", token), ("q", location), ("aqi", "no")])
            .send()
            .await?;

        self.handle_response(response, location).await
    }

    async fn handle_response(
        &self,
        response: reqwest::Response,
        location: &str,
    ) -> Result<WeatherResponse, WeatherError> {
        let status = response.status();
        let body = response.text().await?;

        if status.is_success() {
            return WeatherResponse::parse(&body);
        }

        let detail = serde_json::from_str::<ApiErrorBody>(&body)
            .ok()
            .map(|b| b.error);
        let code = detail.as_ref().and_then(|d| d.code);
        let message = detail
            .and_then(|d| d.message)
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("").to_string());

        tracing::debug!(
            "[Atmosphere] WeatherAPI returned {} (code {:?}): {}",
            status,
            code,
            message
        );

        match (status, code) {
            (_, Some(CODE_NO_LOCATION_FOUND)) => {
                Err(WeatherError::LocationNotFound(location.to_string()))
            }
            (_, Some(CODE_KEY_NOT_PROVIDED | CODE_KEY_INVALID | CODE_KEY_DISABLED))
            | (StatusCode::UNAUTHORIZED, _) => Err(WeatherError::InvalidApiKey),
            _ => Err(WeatherError::Api {
                status: status.as_u16(),
                message,
            }),
        }
    }
}
