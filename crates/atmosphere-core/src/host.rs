//! Host collaborators: macro registry, user notifications and the event bus.
//!
//! The traits describe what the extension consumes from its host. The concrete
//! types here back the command-line host and the tests.

use std::collections::BTreeMap;

use parking_lot::RwLock;
use tokio::sync::broadcast;

use crate::error::HostError;

/// Named text substitutions exposed to the host's templating system.
pub trait MacroRegistry: Send + Sync {
    /// Register `name` with `value`. A registry may reject a name that is
    /// already registered, so callers unregister first when replacing.
    fn register(&self, name: &str, value: &str) -> Result<(), HostError>;

    /// Remove `name`. Unknown names are ignored.
    fn unregister(&self, name: &str);
}

/// Severity of a user-visible notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Warning,
    Error,
}

/// Short user-facing notifications (toasts).
pub trait Notifier: Send + Sync {
    fn notify(&self, level: NoticeLevel, message: &str);
}

/// Notifier that writes to the diagnostic log only.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, level: NoticeLevel, message: &str) {
        match level {
            NoticeLevel::Success => tracing::info!("[Atmosphere] {}", message),
            NoticeLevel::Warning => tracing::warn!("[Atmosphere] {}", message),
            NoticeLevel::Error => tracing::error!("[Atmosphere] {}", message),
        }
    }
}

/// In-process macro registry.
///
/// Rejects duplicate registrations, which is the stricter of the two host
/// contracts the extension has to work under.
#[derive(Debug, Default)]
pub struct MacroTable {
    entries: RwLock<BTreeMap<String, String>>,
}

impl MacroTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value of a macro
    pub fn get(&self, name: &str) -> Option<String> {
        self.entries.read().get(name).cloned()
    }

    /// Copy of every registered macro, sorted by name
    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.entries.read().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Expand `{{name}}` placeholders in `template`. Unknown names are left as-is.
    pub fn substitute(&self, template: &str) -> String {
        let entries = self.entries.read();
        let mut out = String::with_capacity(template.len());
        let mut rest = template;

        while let Some(start) = rest.find("{{") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            match after.find("}}") {
                Some(end) => {
                    let name = after[..end].trim();
                    match entries.get(name) {
                        Some(value) => out.push_str(value),
                        None => out.push_str(&rest[start..start + 2 + end + 2]),
                    }
                    rest = &after[end + 2..];
                }
                None => {
                    out.push_str(&rest[start..]);
                    rest = "";
                }
            }
        }
        out.push_str(rest);
        out
    }
}

impl MacroRegistry for MacroTable {
    fn register(&self, name: &str, value: &str) -> Result<(), HostError> {
        if name.is_empty() || name.contains(char::is_whitespace) {
            return Err(HostError::InvalidMacroName(name.to_string()));
        }

        let mut entries = self.entries.write();
        if entries.contains_key(name) {
            return Err(HostError::DuplicateMacro(name.to_string()));
        }
        entries.insert(name.to_string(), value.to_string());
        Ok(())
    }

    fn unregister(&self, name: &str) {
        self.entries.write().remove(name);
    }
}

/// Events the host emits to its extensions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostEvent {
    /// The user sent a chat message
    MessageSent,
}

/// Host event bus. Extensions subscribe and receive every event emitted after
/// they subscribed.
#[derive(Debug, Clone)]
pub struct EventSource {
    tx: broadcast::Sender<HostEvent>,
}

impl EventSource {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<HostEvent> {
        self.tx.subscribe()
    }

    /// Emit an event, returning how many subscribers will see it.
    pub fn emit(&self, event: HostEvent) -> usize {
        match self.tx.send(event) {
            Ok(receivers) => receivers,
            Err(_) => {
                tracing::debug!("[Atmosphere] No subscribers for {:?}", event);
                0
            }
        }
    }
}

impl Default for EventSource {
    fn default() -> Self {
        Self::new(16)
    }
}
