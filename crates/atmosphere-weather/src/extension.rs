//! The update pass: fetch (or reuse) weather, derive macros, register them.

use std::collections::BTreeSet;
use std::sync::Arc;

use atmosphere_core::{HostError, HostEvent, MacroRegistry};
use parking_lot::Mutex;
use tokio::sync::broadcast;

use crate::cache::WeatherCache;
use crate::macros::{derive_macros, MacroSet};

/// What started an update pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateTrigger {
    /// Extension load with a token configured
    InitialLoad,
    /// The host reported a sent message
    MessageSent,
    /// The user asked for fresh data
    ManualRefresh,
}

impl UpdateTrigger {
    fn is_initial(self) -> bool {
        matches!(self, Self::InitialLoad)
    }

    fn forces_refresh(self) -> bool {
        matches!(self, Self::ManualRefresh)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateState {
    Idle,
    Fetching,
    Registering,
    FailedNoFallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// Cache still valid, nothing to do
    Skipped,
    /// Macros were (re-)registered
    Registered { count: usize },
    /// No usable data or registration failed; existing macros left alone
    Failed,
}

pub struct Atmosphere {
    cache: WeatherCache,
    registry: Arc<dyn MacroRegistry>,
    /// Names currently registered, `None` before the first registration pass
    registered: Mutex<Option<BTreeSet<String>>>,
    state: Mutex<UpdateState>,
}

impl std::fmt::Debug for Atmosphere {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Atmosphere")
            .field("cache", &self.cache)
            .field("state", &*self.state.lock())
            .finish_non_exhaustive()
    }
}

impl Atmosphere {
    pub fn new(cache: WeatherCache, registry: Arc<dyn MacroRegistry>) -> Self {
        Self {
            cache,
            registry,
            registered: Mutex::new(None),
            state: Mutex::new(UpdateState::Idle),
        }
    }

    pub fn cache(&self) -> &WeatherCache {
        &self.cache
    }

    pub fn state(&self) -> UpdateState {
        *self.state.lock()
    }

    /// Initial registration. Skipped when no token is configured.
    pub async fn load(&self) -> Option<UpdateOutcome> {
        let has_token = self.cache.settings().lock().weather.has_token();
        if !has_token {
            tracing::info!("[Atmosphere] No API token configured, skipping initial registration");
            return None;
        }

        tracing::info!("[Atmosphere] Token is filled, trying initial macro registration");
        Some(self.update_macros(UpdateTrigger::InitialLoad).await)
    }

    /// User-initiated refresh, always fetches
    pub async fn refresh(&self) -> UpdateOutcome {
        self.update_macros(UpdateTrigger::ManualRefresh).await
    }

    /// Run one update pass for `trigger`.
    pub async fn update_macros(&self, trigger: UpdateTrigger) -> UpdateOutcome {
        if !trigger.is_initial() && !trigger.forces_refresh() && self.cache.is_valid() {
            tracing::debug!("[Atmosphere] Cache valid, macros unchanged");
            return UpdateOutcome::Skipped;
        }

        self.set_state(UpdateState::Fetching);
        let response = match self.cache.fetch(trigger.forces_refresh()).await {
            Ok(response) => response,
            Err(e) => {
                self.set_state(UpdateState::FailedNoFallback);
                tracing::error!("[Atmosphere] Failed to update macros: {}", e);
                self.set_state(UpdateState::Idle);
                return UpdateOutcome::Failed;
            }
        };

        if let Err(e) = response.validate() {
            tracing::error!("[Atmosphere] Invalid weather data structure: {}", e);
            self.set_state(UpdateState::Idle);
            return UpdateOutcome::Failed;
        }

        self.set_state(UpdateState::Registering);
        let macros = derive_macros(&response);
        let outcome = match self.register_all(&macros) {
            Ok(count) => UpdateOutcome::Registered { count },
            Err(e) => {
                tracing::error!("[Atmosphere] Failed to update macros: {}", e);
                UpdateOutcome::Failed
            }
        };
        self.set_state(UpdateState::Idle);
        outcome
    }

    /// Run an update pass for every `MessageSent` event until the bus closes.
    pub async fn listen(&self, mut events: broadcast::Receiver<HostEvent>) {
        loop {
            match events.recv().await {
                Ok(HostEvent::MessageSent) => {
                    self.update_macros(UpdateTrigger::MessageSent).await;
                }
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    tracing::debug!("[Atmosphere] Skipped {} queued events", missed);
                    self.update_macros(UpdateTrigger::MessageSent).await;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }

    /// Register `macros`, replacing the previous pass's set.
    ///
    /// The first pass registers directly. Later passes unregister each name
    /// right before registering it, and drop names the new set no longer has.
    fn register_all(&self, macros: &MacroSet) -> Result<usize, HostError> {
        let mut registered = self.registered.lock();
        let previous = registered.take();

        if let Some(previous) = &previous {
            for stale in previous.iter().filter(|name| !macros.contains(name)) {
                self.registry.unregister(stale);
            }
        }

        let mut names = BTreeSet::new();
        let mut report = Vec::with_capacity(macros.len());

        for (name, derived) in macros.iter() {
            if previous.is_some() {
                self.registry.unregister(name);
            }
            if let Err(e) = self.registry.register(name, &derived.value) {
                // Track anything that may still be registered so the next
                // pass unregisters it first.
                let mut known = previous.unwrap_or_default();
                known.extend(names);
                *registered = Some(known);
                return Err(e);
            }
            names.insert(name.to_string());
            report.push(format!("{} (from {}) = {}", name, derived.source, derived.value));
        }

        let count = names.len();
        *registered = Some(names);
        tracing::info!("[Atmosphere] Macros registered:\n{}", report.join("\n"));
        Ok(count)
    }

    fn set_state(&self, state: UpdateState) {
        let mut current = self.state.lock();
        tracing::trace!("[Atmosphere] {:?} -> {:?}", *current, state);
        *current = state;
    }
}
