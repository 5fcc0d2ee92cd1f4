//! Serve cached weather while it is fresh, otherwise fetch and re-cache.

use std::sync::Arc;

use atmosphere_core::{NoticeLevel, Notifier, WeatherConfig};
use chrono::{DateTime, Utc};

use crate::error::WeatherError;
use crate::persist::DebouncedSaver;
use crate::provider::WeatherProvider;
use crate::settings::{CacheEntry, SharedSettings};
use crate::types::WeatherResponse;

pub struct WeatherCache {
    settings: SharedSettings,
    provider: WeatherProvider,
    saver: Arc<DebouncedSaver>,
    notifier: Arc<dyn Notifier>,
}

impl std::fmt::Debug for WeatherCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeatherCache")
            .field("provider", &self.provider)
            .field("saver", &self.saver)
            .finish_non_exhaustive()
    }
}

impl WeatherCache {
    pub fn new(
        settings: SharedSettings,
        provider: WeatherProvider,
        saver: Arc<DebouncedSaver>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            settings,
            provider,
            saver,
            notifier,
        }
    }

    pub fn settings(&self) -> &SharedSettings {
        &self.settings
    }

    /// Whether the cached payload can be served right now
    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now())
    }

    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        let settings = self.settings.lock();
        settings.weather_cache.is_valid_at(
            &settings.weather.location,
            settings.weather.cache_lifetime,
            now,
        )
    }

    /// Current weather, from the cache when valid and `force_refresh` is off.
    ///
    /// A failed fetch falls back to whatever payload is cached, however old
    /// and for whichever location, with a warning. Without a cached payload the
    /// error is returned.
    pub async fn fetch(&self, force_refresh: bool) -> Result<WeatherResponse, WeatherError> {
        let now = Utc::now();
        let (weather, cached) = {
            let settings = self.settings.lock();
            let usable = !force_refresh
                && settings.weather_cache.is_valid_at(
                    &settings.weather.location,
                    settings.weather.cache_lifetime,
                    now,
                );
            let cached = if usable {
                settings.weather_cache.data.clone()
            } else {
                None
            };
            (settings.weather.clone(), cached)
        };

        if let Some(data) = cached {
            tracing::debug!("[Atmosphere] Using cached data");
            return Ok(data);
        }

        match self.request(&weather).await {
            Ok(response) => {
                if force_refresh {
                    self.notifier
                        .notify(NoticeLevel::Success, "Fresh weather data fetched!");
                }

                let snapshot = {
                    let mut settings = self.settings.lock();
                    settings.weather_cache =
                        CacheEntry::new(response.clone(), weather.location, Utc::now());
                    settings.clone()
                };
                self.saver.persist(&snapshot);

                Ok(response)
            }
            Err(e) => {
                tracing::error!("[Atmosphere] Error fetching weather: {}", e);

                let stale = self.settings.lock().weather_cache.data.clone();
                match stale {
                    Some(data) => {
                        tracing::info!("[Atmosphere] Falling back to cached data due to error");
                        self.notifier.notify(
                            NoticeLevel::Warning,
                            "Using cached weather data (API error)",
                        );
                        Ok(data)
                    }
                    None => {
                        self.notifier.notify(
                            NoticeLevel::Error,
                            &format!("Failed to fetch weather data: {}", e.user_message()),
                        );
                        Err(e)
                    }
                }
            }
        }
    }

    async fn request(&self, weather: &WeatherConfig) -> Result<WeatherResponse, WeatherError> {
        weather.require_fetchable()?;

        tracing::info!("[Atmosphere] Fetching fresh weather data from API");
        self.provider.current(&weather.token, &weather.location).await
    }
}
