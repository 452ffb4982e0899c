//! Periodic incremental sync scheduling (spec §4.5).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use catalog_sync_core::{Clock, SyncError};
use parking_lot::Mutex;
use tokio::task::JoinHandle;

use super::sync_engine::SyncEngine;

/// Fires `engine.perform_sync()` on a timer while `enabled` and `started`.
/// `enabled` is independent of whether the timer is armed: a caller can
/// leave the scheduler started but temporarily disabled, which also cancels
/// any sync already in flight.
pub struct Scheduler<C: Clock + 'static> {
    engine: Arc<SyncEngine<C>>,
    interval: Duration,
    enabled: Arc<AtomicBool>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl<C: Clock + 'static> Scheduler<C> {
    #[must_use]
    pub fn new(engine: Arc<SyncEngine<C>>, interval: Duration) -> Self {
        Self {
            engine,
            interval,
            enabled: Arc::new(AtomicBool::new(true)),
            handle: Mutex::new(None),
        }
    }

    /// Arms the repeating timer. A second call while already started is a
    /// no-op (the prior timer keeps running).
    pub fn start(&self) {
        let mut handle = self.handle.lock();
        if handle.is_some() {
            return;
        }

        let engine = self.engine.clone();
        let enabled = self.enabled.clone();
        let interval = self.interval;

        *handle = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await; // first tick fires immediately; skip it
            loop {
                ticker.tick().await;
                if !enabled.load(Ordering::SeqCst) {
                    continue;
                }
                match engine.perform_sync().await {
                    Ok(_) | Err(SyncError::InProgress) => {}
                    Err(err) => tracing::warn!(error = %err, "scheduled sync failed"),
                }
            }
        }));
    }

    /// Disarms the timer and cancels any sync currently in flight.
    pub fn stop(&self) {
        if let Some(handle) = self.handle.lock().take() {
            handle.abort();
        }
        self.engine.cancel();
    }

    /// Toggles whether ticks are acted on. Disabling cancels any in-flight
    /// sync immediately, independent of whether the timer is armed.
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
        if !enabled {
            self.engine.cancel();
        }
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn is_started(&self) -> bool {
        self.handle.lock().is_some()
    }
}

impl<C: Clock + 'static> Drop for Scheduler<C> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.lock().take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use catalog_sync_core::{
        AuthProvider, CatalogObject, Kind, Page, RemoteCatalog, SyncConfig, SystemClock, Token,
        UuidIdGen,
    };

    use crate::engine::sync_engine::TokioSleeper;
    use crate::store::CatalogStore;

    struct AlwaysAuthed;
    #[async_trait]
    impl AuthProvider for AlwaysAuthed {
        async fn is_authenticated(&self) -> bool {
            true
        }
        async fn token(&self) -> Option<Token> {
            Some(Token("t".into()))
        }
        async fn ensure_valid_token(&self) -> Option<Token> {
            Some(Token("t".into()))
        }
        async fn sign_out(&self) {}
    }

    struct EmptyRemote;
    #[async_trait]
    impl RemoteCatalog for EmptyRemote {
        async fn list(
            &self,
            _kinds: &[Kind],
            _cursor: Option<&str>,
            _limit: u32,
        ) -> anyhow::Result<Page<CatalogObject>> {
            Ok(Page {
                items: vec![],
                cursor: None,
            })
        }
        async fn search(
            &self,
            _begin_time: Option<&str>,
            _cursor: Option<&str>,
        ) -> anyhow::Result<Page<CatalogObject>> {
            Ok(Page {
                items: vec![],
                cursor: None,
            })
        }
        async fn retrieve(&self, _id: &str, _include_related: bool) -> anyhow::Result<Option<CatalogObject>> {
            Ok(None)
        }
        async fn upsert(&self, object: &CatalogObject, _idempotency_key: &str) -> anyhow::Result<CatalogObject> {
            Ok(object.clone())
        }
        async fn delete(&self, _id: &str) -> anyhow::Result<()> {
            Ok(())
        }
    }

    async fn build_scheduler() -> Scheduler<SystemClock> {
        let store = CatalogStore::open("sqlite::memory:").await.unwrap();
        let (engine, _rx) = SyncEngine::new(
            store,
            Arc::new(EmptyRemote),
            Arc::new(AlwaysAuthed),
            SystemClock,
            Arc::new(UuidIdGen),
            Arc::new(TokioSleeper),
            SyncConfig::default(),
        );
        Scheduler::new(Arc::new(engine), Duration::from_millis(20))
    }

    #[tokio::test]
    async fn enabled_is_independent_of_started() {
        let scheduler = build_scheduler().await;
        assert!(scheduler.is_enabled());
        assert!(!scheduler.is_started());

        scheduler.set_enabled(false);
        assert!(!scheduler.is_enabled());
        assert!(!scheduler.is_started());
    }

    #[tokio::test]
    async fn start_then_stop_disarms_the_timer() {
        let scheduler = build_scheduler().await;
        scheduler.start();
        assert!(scheduler.is_started());

        scheduler.stop();
        assert!(!scheduler.is_started());
    }

    #[tokio::test]
    async fn double_start_is_a_no_op() {
        let scheduler = build_scheduler().await;
        scheduler.start();
        scheduler.start();
        assert!(scheduler.is_started());
        scheduler.stop();
    }
}
