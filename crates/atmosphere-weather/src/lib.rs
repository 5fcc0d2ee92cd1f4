//! Weather macros for chat hosts.
//!
//! Fetches current conditions from WeatherAPI.com, caches them per location,
//! and exposes the response as `atmo_*` text macros.

pub mod cache;
pub mod error;
pub mod extension;
pub mod macros;
pub mod persist;
pub mod provider;
pub mod settings;
pub mod types;

pub use cache::WeatherCache;
pub use error::WeatherError;
pub use extension::{Atmosphere, UpdateOutcome, UpdateState, UpdateTrigger};
pub use macros::{derive_macros, DerivedMacro, MacroSet, MACRO_PREFIX};
pub use persist::DebouncedSaver;
pub use provider::WeatherProvider;
pub use settings::{
    CacheEntry, FileSettingsStore, MemorySettingsStore, Settings, SettingsStore, SharedSettings,
};
pub use types::{FieldMap, FieldValue, WeatherResponse};
