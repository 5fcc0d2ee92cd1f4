//! Wires the extension to in-process host collaborators.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use atmosphere_core::{Config, LogNotifier, MacroTable};
use atmosphere_weather::{
    Atmosphere, DebouncedSaver, FileSettingsStore, WeatherCache, WeatherProvider,
};
use parking_lot::Mutex;

pub struct Host {
    pub atmosphere: Arc<Atmosphere>,
    pub macros: Arc<MacroTable>,
    saver: Arc<DebouncedSaver>,
}

impl Host {
    /// Build the extension from `config`. Must run inside the Tokio runtime.
    pub fn start(config: &Config) -> Result<Self> {
        let store = FileSettingsStore::new(config.clone());
        let settings = Arc::new(Mutex::new(store.load()));

        let saver = Arc::new(DebouncedSaver::spawn(
            Arc::new(store),
            Duration::from_millis(config.persist.debounce_ms),
        ));
        let provider = WeatherProvider::new(&config.api)?;
        let macros = Arc::new(MacroTable::new());

        let cache = WeatherCache::new(settings, provider, saver.clone(), Arc::new(LogNotifier));
        let atmosphere = Arc::new(Atmosphere::new(cache, macros.clone()));

        Ok(Self {
            atmosphere,
            macros,
            saver,
        })
    }

    /// Flush pending settings writes.
    pub async fn shutdown(self) {
        self.saver.shutdown().await;
    }
}
