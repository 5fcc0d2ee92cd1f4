use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

use crate::error::ConfigError;

/// Default WeatherAPI endpoint root.
pub const DEFAULT_BASE_URL: &str = "https://api.weatherapi.com";

/// Configuration validation errors
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Result of config validation
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationResult {
    /// Returns true if there are no errors (warnings are OK)
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Add an error
    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Add a warning
    pub fn add_warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Get a user-friendly message summarizing all errors
    pub fn error_summary(&self) -> String {
        if self.errors.is_empty() {
            return String::new();
        }
        self.errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Cache lifetime in minutes.
///
/// The settings surface hands this value over as text, so it deserializes from
/// either a number or a string. Text that does not parse becomes `NaN`, which
/// never compares as "still fresh".
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "LifetimeRepr", into = "f64")]
pub struct CacheLifetime(f64);

#[derive(Deserialize)]
#[serde(untagged)]
enum LifetimeRepr {
    Number(f64),
    Text(String),
}

impl From<LifetimeRepr> for CacheLifetime {
    fn from(repr: LifetimeRepr) -> Self {
        match repr {
            LifetimeRepr::Number(n) => Self(n),
            LifetimeRepr::Text(s) => Self::parse(&s),
        }
    }
}

impl From<CacheLifetime> for f64 {
    fn from(lifetime: CacheLifetime) -> Self {
        lifetime.0
    }
}

impl CacheLifetime {
    pub fn from_minutes(minutes: f64) -> Self {
        Self(minutes)
    }

    /// Coerce user input into a lifetime. Blank or non-numeric input yields `NaN`.
    pub fn parse(input: &str) -> Self {
        Self(input.trim().parse().unwrap_or(f64::NAN))
    }

    pub fn minutes(&self) -> f64 {
        self.0
    }

    /// A lifetime of zero, a negative lifetime or `NaN` disables the cache.
    pub fn is_enabled(&self) -> bool {
        self.0 > 0.0
    }
}

impl Default for CacheLifetime {
    fn default() -> Self {
        Self(15.0)
    }
}

impl std::fmt::Display for CacheLifetime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// User-editable weather settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeatherConfig {
    /// WeatherAPI key
    #[serde(default)]
    pub token: String,

    /// Location query (city name, postcode, "lat,lon", ...)
    #[serde(default)]
    pub location: String,

    /// Imperial display preference. Both unit sentences are derived regardless.
    #[serde(default)]
    pub units_imperial: bool,

    /// Minutes a fetched payload stays usable
    #[serde(default)]
    pub cache_lifetime: CacheLifetime,
}

impl WeatherConfig {
    /// Set the token from raw input, trimming surrounding whitespace.
    pub fn set_token(&mut self, input: &str) {
        self.token = input.trim().to_string();
    }

    /// Set the location from raw input, trimming surrounding whitespace.
    pub fn set_location(&mut self, input: &str) {
        self.location = input.trim().to_string();
    }

    /// Set the cache lifetime from raw text input.
    pub fn set_cache_lifetime(&mut self, input: &str) {
        self.cache_lifetime = CacheLifetime::parse(input);
    }

    /// Whether an API token is present
    pub fn has_token(&self) -> bool {
        !self.token.is_empty()
    }

    /// Check that both settings a fetch needs are present.
    pub fn require_fetchable(&self) -> Result<(), ConfigError> {
        if self.token.is_empty() {
            return Err(ConfigError::MissingSetting("weather.token".to_string()));
        }
        if self.location.is_empty() {
            return Err(ConfigError::MissingSetting("weather.location".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Root URL of the weather provider
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// HTTP request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistConfig {
    /// Quiet period before a requested settings save is written
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

fn default_debounce_ms() -> u64 {
    1000
}

impl Default for PersistConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding config.toml and the weather cache.
    /// Derived from where the file was loaded, never stored in it.
    #[serde(skip, default = "default_config_dir")]
    pub config_dir: PathBuf,

    /// Weather settings
    #[serde(default)]
    pub weather: WeatherConfig,

    /// Provider endpoint settings
    #[serde(default)]
    pub api: ApiConfig,

    /// Settings persistence
    #[serde(default)]
    pub persist: PersistConfig,
}

fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("atmosphere")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            config_dir: default_config_dir(),
            weather: WeatherConfig::default(),
            api: ApiConfig::default(),
            persist: PersistConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from the default location, creating it if it doesn't exist
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        Self::load_from(&config_path)
    }

    /// Load configuration from an explicit file path, creating a default file if missing
    pub fn load_from(config_path: &Path) -> Result<Self> {
        let config_dir = config_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        if !config_path.exists() {
            let config = Self {
                config_dir,
                ..Self::default()
            };
            config.save()?;
            return Ok(config);
        }

        let contents = std::fs::read_to_string(config_path)
            .map_err(|e| ConfigError::NotFound(format!("{}: {}", config_path.display(), e)))?;

        let mut config: Config = toml::from_str(&contents)
            .map_err(|e| ConfigError::ParseError(format!("{}: {}", config_path.display(), e)))?;
        config.config_dir = config_dir;

        Ok(config)
    }

    /// Load configuration from `config_path` (or the default location) and
    /// validate it.
    ///
    /// Warnings are logged and returned alongside the config. Validation
    /// errors fail with [`ConfigError::Invalid`].
    pub fn load_validated(config_path: Option<&Path>) -> Result<(Self, ValidationResult)> {
        let config = match config_path {
            Some(path) => Self::load_from(path)?,
            None => Self::load()?,
        };
        let validation = config.validate();

        if !validation.is_valid() {
            return Err(ConfigError::Invalid(validation.error_summary()).into());
        }

        for warning in &validation.warnings {
            tracing::warn!("[Atmosphere] Config warning: {}", warning);
        }

        Ok((config, validation))
    }

    /// Validate the configuration
    ///
    /// Missing token or location are errors: no fetch can be attempted without them.
    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        if self.weather.token.is_empty() {
            result.add_error("weather.token", "API token is not set");
        }

        if self.weather.location.is_empty() {
            result.add_error("weather.location", "Location is not set");
        }

        let lifetime = self.weather.cache_lifetime;
        if !lifetime.is_enabled() {
            let message = if lifetime.minutes().is_nan() {
                "Cache lifetime is not a number; cache disabled"
            } else {
                "Cache disabled (lifetime is not positive)"
            };
            result.add_warning("weather.cache_lifetime", message);
        } else if lifetime.minutes() > 1440.0 {
            result.add_warning(
                "weather.cache_lifetime",
                "Cache lifetime is more than 24 hours",
            );
        }

        self.validate_url(&self.api.base_url, "api.base_url", &mut result);

        if self.api.timeout_secs == 0 {
            result.add_error("api.timeout_secs", "Timeout must be greater than 0");
        }

        result
    }

    /// Validate a URL field
    fn validate_url(&self, url_str: &str, field_name: &str, result: &mut ValidationResult) {
        match Url::parse(url_str) {
            Ok(url) => {
                if url.scheme() != "http" && url.scheme() != "https" {
                    result.add_error(
                        field_name,
                        format!("URL must use http or https scheme, got: {}", url.scheme()),
                    );
                }

                if url.host().is_none() {
                    result.add_error(field_name, "URL must have a host");
                }
            }
            Err(e) => {
                result.add_error(field_name, format!("Invalid URL: {}", e));
            }
        }
    }

    /// Save configuration to `config.toml` inside `config_dir`
    pub fn save(&self) -> Result<()> {
        std::fs::create_dir_all(&self.config_dir)
            .context("Failed to create config directory")?;

        let contents = toml::to_string_pretty(self)
            .context("Failed to serialize config")?;

        std::fs::write(self.config_file(), contents)
            .context("Failed to write config file")?;

        Ok(())
    }

    /// Path of the config file inside `config_dir`
    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join("config.toml")
    }

    /// Path of the persisted weather cache
    pub fn cache_file(&self) -> PathBuf {
        self.config_dir.join("weather_cache.json")
    }

    /// Get the path to the default configuration file
    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get config directory")?
            .join("atmosphere");

        Ok(config_dir.join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn configured() -> Config {
        let mut config = Config::default();
        config.weather.token = "key".to_string();
        config.weather.location = "Paris".to_string();
        config
    }

    #[test]
    fn test_default_config_requires_token_and_location() {
        let result = Config::default().validate();
        assert!(!result.is_valid());
        assert!(result.errors.iter().any(|e| e.field == "weather.token"));
        assert!(result.errors.iter().any(|e| e.field == "weather.location"));
    }

    #[test]
    fn test_configured_is_valid() {
        let result = configured().validate();
        assert!(result.is_valid(), "errors: {:?}", result.errors);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_invalid_base_url_scheme() {
        let mut config = configured();
        config.api.base_url = "ftp://example.com".to_string();
        let result = config.validate();
        assert!(!result.is_valid());
        assert!(result.errors.iter().any(|e| e.message.contains("http or https")));
    }

    #[test]
    fn test_zero_lifetime_is_warning() {
        let mut config = configured();
        config.weather.cache_lifetime = CacheLifetime::from_minutes(0.0);
        let result = config.validate();
        assert!(result.is_valid());
        assert!(result.warnings.iter().any(|w| w.field == "weather.cache_lifetime"));
    }

    #[test]
    fn test_lifetime_parses_from_string_or_number() {
        let config: WeatherConfig = toml::from_str("cache_lifetime = \"30\"").unwrap();
        assert_eq!(config.cache_lifetime.minutes(), 30.0);

        let config: WeatherConfig = toml::from_str("cache_lifetime = 5").unwrap();
        assert_eq!(config.cache_lifetime.minutes(), 5.0);

        let config: WeatherConfig = toml::from_str("cache_lifetime = \"soon\"").unwrap();
        assert!(config.cache_lifetime.minutes().is_nan());
        assert!(!config.cache_lifetime.is_enabled());
    }

    #[test]
    fn test_setters_trim_input() {
        let mut weather = WeatherConfig::default();
        weather.set_token("  abc  ");
        weather.set_location(" London\n");
        weather.set_cache_lifetime(" 45 ");
        assert_eq!(weather.token, "abc");
        assert_eq!(weather.location, "London");
        assert_eq!(weather.cache_lifetime.minutes(), 45.0);
    }

    #[test]
    fn test_require_fetchable() {
        let mut weather = WeatherConfig::default();
        assert!(matches!(
            weather.require_fetchable(),
            Err(ConfigError::MissingSetting(field)) if field == "weather.token"
        ));
        weather.token = "key".to_string();
        assert!(matches!(
            weather.require_fetchable(),
            Err(ConfigError::MissingSetting(field)) if field == "weather.location"
        ));
        weather.location = "Oslo".to_string();
        assert!(weather.require_fetchable().is_ok());
    }

    #[test]
    fn test_load_creates_default_file_and_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = Config::load_from(&path).unwrap();
        assert!(path.exists());
        assert_eq!(config.config_dir, dir.path());

        config.weather.set_location("Reykjavik");
        config.save().unwrap();

        let reloaded = Config::load_from(&path).unwrap();
        assert_eq!(reloaded.weather.location, "Reykjavik");
        assert_eq!(reloaded.cache_file(), dir.path().join("weather_cache.json"));
    }

    #[test]
    fn test_malformed_file_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[weather\ntoken = ").unwrap();

        let err = Config::load_from(&path).unwrap_err();
        let config_err = err.downcast_ref::<ConfigError>().unwrap();
        assert!(matches!(config_err, ConfigError::ParseError(_)));
        assert_eq!(
            config_err.user_message(),
            "Configuration file is malformed. Check your settings."
        );
    }

    #[test]
    fn test_unreadable_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::create_dir(&path).unwrap();

        let err = Config::load_from(&path).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ConfigError>(),
            Some(ConfigError::NotFound(_))
        ));
    }

    #[test]
    fn test_load_validated_rejects_missing_token() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let err = Config::load_validated(Some(&path)).unwrap_err();
        match err.downcast_ref::<ConfigError>() {
            Some(ConfigError::Invalid(summary)) => {
                assert!(summary.contains("weather.token"));
                assert!(summary.contains("weather.location"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_load_validated_returns_warnings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut config = Config::load_from(&path).unwrap();
        config.weather.set_token("key");
        config.weather.set_location("Paris");
        config.weather.set_cache_lifetime("0");
        config.save().unwrap();

        let (loaded, validation) = Config::load_validated(Some(&path)).unwrap();
        assert_eq!(loaded.weather.location, "Paris");
        assert!(validation.is_valid());
        assert_eq!(validation.warnings.len(), 1);
        assert!(validation.warnings[0].message.contains("not positive"));
    }

    #[test]
    fn test_unparseable_lifetime_is_warning() {
        let mut config = configured();
        config.weather.set_cache_lifetime("soon");
        let result = config.validate();
        assert!(result.is_valid());
        assert!(result.warnings[0].message.contains("not a number"));
    }

    #[test]
    fn test_validation_result_error_summary() {
        let mut result = ValidationResult::default();
        result.add_error("field1", "error1");
        result.add_error("field2", "error2");
        let summary = result.error_summary();
        assert!(summary.contains("field1"));
        assert!(summary.contains("field2"));
    }
}
