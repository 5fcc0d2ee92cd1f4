//! Debounced, fire-and-forget settings persistence.
//!
//! `persist` queues a snapshot and returns immediately. A background task
//! writes the newest snapshot once no further requests have arrived for the
//! debounce delay. Write failures are logged and otherwise ignored.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::settings::{Settings, SettingsStore};

pub struct DebouncedSaver {
    tx: Mutex<Option<mpsc::UnboundedSender<Settings>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for DebouncedSaver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DebouncedSaver")
            .field("open", &self.tx.lock().is_some())
            .finish()
    }
}

impl DebouncedSaver {
    /// Start the background writer. Must be called from within a Tokio runtime.
    pub fn spawn(store: Arc<dyn SettingsStore>, delay: Duration) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let worker = tokio::spawn(run(store, delay, rx));

        Self {
            tx: Mutex::new(Some(tx)),
            worker: Mutex::new(Some(worker)),
        }
    }

    /// Queue a save of `settings`. Returns before anything is written.
    pub fn persist(&self, settings: &Settings) {
        let guard = self.tx.lock();
        match guard.as_ref() {
            Some(tx) => {
                if tx.send(settings.clone()).is_err() {
                    tracing::warn!("[Atmosphere] Settings writer stopped, save dropped");
                }
            }
            None => tracing::warn!("[Atmosphere] Settings saver shut down, save dropped"),
        }
    }

    /// Write any pending snapshot and stop the writer.
    pub async fn shutdown(&self) {
        self.tx.lock().take();
        let worker = self.worker.lock().take();

        if let Some(worker) = worker {
            if let Err(e) = worker.await {
                tracing::warn!("[Atmosphere] Settings writer failed: {}", e);
            }
        }
    }
}

async fn run(
    store: Arc<dyn SettingsStore>,
    delay: Duration,
    mut rx: mpsc::UnboundedReceiver<Settings>,
) {
    while let Some(mut pending) = rx.recv().await {
        loop {
            tokio::select! {
                next = rx.recv() => match next {
                    Some(newer) => pending = newer,
                    None => break,
                },
                _ = tokio::time::sleep(delay) => break,
            }
        }

        let store = store.clone();
        let result = tokio::task::spawn_blocking(move || store.save(&pending)).await;
        match result {
            Ok(Ok(())) => tracing::debug!("[Atmosphere] Settings saved"),
            Ok(Err(e)) => tracing::warn!("[Atmosphere] Failed to save settings: {:#}", e),
            Err(e) => tracing::warn!("[Atmosphere] Settings save task failed: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::MemorySettingsStore;
    use atmosphere_core::HostError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct FullDiskStore {
        attempts: AtomicUsize,
    }

    impl SettingsStore for FullDiskStore {
        fn save(&self, _settings: &Settings) -> Result<(), HostError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            Err(HostError::Store("disk full".into()))
        }
    }

    fn with_location(location: &str) -> Settings {
        let mut settings = Settings::default();
        settings.weather.set_location(location);
        settings
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_is_coalesced_into_one_write() {
        let store = Arc::new(MemorySettingsStore::new());
        let saver = DebouncedSaver::spawn(store.clone(), Duration::from_millis(500));

        saver.persist(&with_location("Paris"));
        saver.persist(&with_location("Lyon"));
        saver.persist(&with_location("Nice"));
        assert_eq!(store.save_count(), 0);

        saver.shutdown().await;
        assert_eq!(store.save_count(), 1);
        assert_eq!(store.last().unwrap().weather.location, "Nice");
    }

    #[tokio::test(start_paused = true)]
    async fn test_writes_after_quiet_period() {
        let store = Arc::new(MemorySettingsStore::new());
        let saver = DebouncedSaver::spawn(store.clone(), Duration::from_millis(100));

        saver.persist(&with_location("Paris"));
        tokio::time::sleep(Duration::from_millis(150)).await;
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        saver.persist(&with_location("Oslo"));
        saver.shutdown().await;

        assert_eq!(store.save_count(), 2);
        assert_eq!(store.last().unwrap().weather.location, "Oslo");
    }

    #[tokio::test]
    async fn test_persist_after_shutdown_is_dropped() {
        let store = Arc::new(MemorySettingsStore::new());
        let saver = DebouncedSaver::spawn(store.clone(), Duration::from_millis(10));
        saver.shutdown().await;

        saver.persist(&with_location("Paris"));
        assert_eq!(store.save_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_write_keeps_writer_running() {
        let store = Arc::new(FullDiskStore::default());
        let saver = DebouncedSaver::spawn(store.clone(), Duration::from_millis(100));

        saver.persist(&with_location("Paris"));
        tokio::time::sleep(Duration::from_millis(150)).await;
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        saver.persist(&with_location("Oslo"));
        saver.shutdown().await;

        assert_eq!(store.attempts.load(Ordering::SeqCst), 2);
    }
}
