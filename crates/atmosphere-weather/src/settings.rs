//! Extension settings, the cached payload and where both are persisted.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use atmosphere_core::{CacheLifetime, Config, HostError, WeatherConfig};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::types::WeatherResponse;

/// The last successful fetch
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Payload, `None` until a fetch succeeds
    #[serde(default)]
    pub data: Option<WeatherResponse>,

    /// Location query the payload was fetched for
    #[serde(default)]
    pub location: String,

    /// Fetch time in Unix milliseconds, 0 when never fetched
    #[serde(default)]
    pub timestamp_millis: i64,
}

impl CacheEntry {
    pub fn new(data: WeatherResponse, location: impl Into<String>, fetched_at: DateTime<Utc>) -> Self {
        Self {
            data: Some(data),
            location: location.into(),
            timestamp_millis: fetched_at.timestamp_millis(),
        }
    }

    pub fn fetched_at(&self) -> Option<DateTime<Utc>> {
        if self.timestamp_millis == 0 {
            return None;
        }
        DateTime::from_timestamp_millis(self.timestamp_millis)
    }

    /// Minutes elapsed between the fetch and `now`
    pub fn age_minutes(&self, now: DateTime<Utc>) -> f64 {
        (now.timestamp_millis() - self.timestamp_millis) as f64 / 60_000.0
    }

    /// Whether the payload can be served for `location` at `now`.
    ///
    /// Requires a payload, a fetch time and a location; the location must match
    /// exactly and the age must be strictly below `lifetime`.
    pub fn is_valid_at(&self, location: &str, lifetime: CacheLifetime, now: DateTime<Utc>) -> bool {
        if self.data.is_none() || self.timestamp_millis == 0 || self.location.is_empty() {
            tracing::debug!("[Atmosphere] No cached data available");
            return false;
        }

        if self.location != location {
            tracing::debug!("[Atmosphere] Location changed, cache invalid");
            return false;
        }

        if !lifetime.is_enabled() {
            tracing::debug!("[Atmosphere] Cache disabled (lifetime {} min)", lifetime);
            return false;
        }

        let age = self.age_minutes(now);
        let limit = lifetime.minutes();
        let valid = age < limit;

        if valid {
            tracing::debug!(
                "[Atmosphere] Cache valid ({:.0} min old, expires in {:.0} min)",
                age,
                limit - age
            );
        } else {
            tracing::debug!(
                "[Atmosphere] Cache expired ({:.0} min old, limit is {} min)",
                age,
                lifetime
            );
        }

        valid
    }
}

/// Everything the extension keeps between runs
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Settings {
    pub weather: WeatherConfig,
    pub weather_cache: CacheEntry,
}

/// Settings handle shared by the cache and its triggers.
/// Never hold the lock across an `.await`.
pub type SharedSettings = Arc<Mutex<Settings>>;

/// Host-side persistence for [`Settings`]
pub trait SettingsStore: Send + Sync {
    fn save(&self, settings: &Settings) -> Result<(), HostError>;
}

/// Stores user settings in `config.toml` and the payload in `weather_cache.json`.
///
/// The payload is kept as JSON because provider responses may contain nulls,
/// which TOML cannot represent.
#[derive(Debug, Clone)]
pub struct FileSettingsStore {
    config: Config,
}

impl FileSettingsStore {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn cache_path(&self) -> PathBuf {
        self.config.cache_file()
    }

    /// Read settings and the cached payload. An unreadable cache file starts
    /// the extension with an empty cache.
    pub fn load(&self) -> Settings {
        let path = self.cache_path();
        let weather_cache = if path.exists() {
            match read_cache(&path) {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!(
                        "[Atmosphere] Ignoring unreadable cache {}: {:#}",
                        path.display(),
                        e
                    );
                    CacheEntry::default()
                }
            }
        } else {
            CacheEntry::default()
        };

        Settings {
            weather: self.config.weather.clone(),
            weather_cache,
        }
    }
}

fn read_cache(path: &std::path::Path) -> Result<CacheEntry> {
    let contents = std::fs::read_to_string(path).context("Failed to read weather cache")?;
    serde_json::from_str(&contents).context("Failed to parse weather cache")
}

impl SettingsStore for FileSettingsStore {
    fn save(&self, settings: &Settings) -> Result<(), HostError> {
        self.write(settings)
            .map_err(|e| HostError::Store(format!("{:#}", e)))
    }
}

impl FileSettingsStore {
    fn write(&self, settings: &Settings) -> Result<()> {
        let mut config = self.config.clone();
        config.weather = settings.weather.clone();
        config.save()?;

        let path = self.cache_path();
        let contents = serde_json::to_string_pretty(&settings.weather_cache)
            .context("Failed to serialize weather cache")?;

        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, contents).context("Failed to write weather cache")?;
        std::fs::rename(&tmp, &path).context("Failed to replace weather cache")?;

        Ok(())
    }
}

/// Keeps saved snapshots in memory
#[derive(Debug, Default)]
pub struct MemorySettingsStore {
    saved: Mutex<Vec<Settings>>,
}

impl MemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of completed saves
    pub fn save_count(&self) -> usize {
        self.saved.lock().len()
    }

    /// Most recent snapshot
    pub fn last(&self) -> Option<Settings> {
        self.saved.lock().last().cloned()
    }
}

impl SettingsStore for MemorySettingsStore {
    fn save(&self, settings: &Settings) -> Result<(), HostError> {
        self.saved.lock().push(settings.clone());
        Ok(())
    }
}
