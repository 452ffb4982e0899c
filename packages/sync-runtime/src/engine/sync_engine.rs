//! Sync Engine: chooses a mode, drives pagination, batches into
//! transactions, reports progress, and enforces the single-flight and
//! deadline guarantees (spec §4.4, §5).

use std::sync::Arc;

use async_trait::async_trait;
use catalog_sync_core::resilience::{Degradation, Outcome, Resilience, Sleeper};
use catalog_sync_core::{
    AuthProvider, BatchError, CancelToken, CatalogObject, Clock, IdGen, Kind, Page, RemoteCatalog,
    SyncConfig, SyncError, SyncMode, SyncPhase, SyncProgress, SyncResult,
};
use tokio::sync::{watch, Mutex};

use crate::engine::remote_error::RemoteCallError;
use crate::reconciler::Reconciler;
use crate::store::CatalogStore;

/// `tokio::time::sleep`-backed [`Sleeper`], the concrete implementation
/// `sync-core`'s runtime-agnostic Resilience executor is injected with.
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: std::time::Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Drives `perform_sync()`. One instance per process; single-flight is
/// enforced by `running`, a `tokio::sync::Mutex` that `perform_sync` only
/// ever `try_lock`s.
pub struct SyncEngine<C: Clock> {
    store: CatalogStore,
    remote: Arc<dyn RemoteCatalog>,
    auth: Arc<dyn AuthProvider>,
    resilience: Resilience<C>,
    reconciler: Reconciler,
    config: SyncConfig,
    id_gen: Arc<dyn IdGen>,
    sleeper: Arc<dyn Sleeper>,
    running: Mutex<()>,
    cancel: parking_lot::Mutex<CancelToken>,
    progress_tx: watch::Sender<SyncProgress>,
}

impl<C: Clock> SyncEngine<C> {
    #[must_use]
    pub fn new(
        store: CatalogStore,
        remote: Arc<dyn RemoteCatalog>,
        auth: Arc<dyn AuthProvider>,
        clock: C,
        id_gen: Arc<dyn IdGen>,
        sleeper: Arc<dyn Sleeper>,
        config: SyncConfig,
    ) -> (Self, watch::Receiver<SyncProgress>) {
        let resilience = Resilience::new(clock, config.clone());
        let (progress_tx, progress_rx) = watch::channel(SyncProgress::new(SyncPhase::Idle));
        let engine = Self {
            store,
            remote,
            auth,
            resilience,
            reconciler: Reconciler::new(),
            config,
            id_gen,
            sleeper,
            running: Mutex::new(()),
            cancel: parking_lot::Mutex::new(CancelToken::new()),
            progress_tx,
        };
        (engine, progress_rx)
    }

    /// A fresh receiver for this engine's progress stream.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SyncProgress> {
        self.progress_tx.subscribe()
    }

    /// Requests cancellation of any sync currently in flight. A no-op if
    /// nothing is running.
    pub fn cancel(&self) {
        self.cancel.lock().cancel();
    }

    /// The single public sync operation. Returns `SyncError::InProgress` if
    /// another call is already running (spec §4.4, §5).
    pub async fn perform_sync(&self) -> Result<SyncResult, SyncError> {
        let _guard = self.running.try_lock().map_err(|_| SyncError::InProgress)?;

        if !self.auth.is_authenticated().await {
            return Err(SyncError::NotAuthenticated);
        }

        let cancel = CancelToken::new();
        *self.cancel.lock() = cancel.clone();

        self.emit(SyncPhase::Preparing);

        let status = self.store.get_sync_status().await.map_err(|e| e.into_sync_error())?;
        let mode = self.select_mode(&status);
        self.emit(SyncPhase::Syncing { mode, fraction: 0.0 });

        let run = self.run_mode(mode, &cancel);
        let outcome = tokio::time::timeout(self.config.sync_deadline, run).await;

        match outcome {
            Ok(Ok(result)) => {
                self.update_timestamps(mode).await?;
                self.emit(SyncPhase::Completed(result.clone()));
                Ok(result)
            }
            Ok(Err(err)) => {
                self.emit(SyncPhase::Failed(SyncError::Internal(err.to_string())));
                Err(err)
            }
            Err(_elapsed) => {
                cancel.cancel();
                self.emit(SyncPhase::Failed(SyncError::Cancelled));
                Err(SyncError::Cancelled)
            }
        }
    }

    fn select_mode(&self, status: &catalog_sync_core::SyncStatus) -> SyncMode {
        match &status.last_full_sync_at {
            None => SyncMode::Full,
            Some(last) => {
                let stale = chrono::DateTime::parse_from_rfc3339(last)
                    .map(|parsed| {
                        let elapsed = chrono::Utc::now().signed_duration_since(parsed);
                        elapsed
                            .to_std()
                            .map(|elapsed| elapsed > self.config.full_sync_interval)
                            .unwrap_or(true)
                    })
                    .unwrap_or(true);
                if stale {
                    SyncMode::Full
                } else {
                    SyncMode::Incremental
                }
            }
        }
    }

    async fn run_mode(&self, mode: SyncMode, cancel: &CancelToken) -> Result<SyncResult, SyncError> {
        match mode {
            SyncMode::Full => self.full_sync(cancel).await,
            SyncMode::Incremental => self.incremental_sync(cancel).await,
        }
    }

    async fn full_sync(&self, cancel: &CancelToken) -> Result<SyncResult, SyncError> {
        let mut total = SyncResult::empty(SyncMode::Full);
        let mut cursor: Option<String> = None;
        let mut seen_items = std::collections::HashSet::new();
        let mut seen_categories = std::collections::HashSet::new();
        let mut seen_variations = std::collections::HashSet::new();

        loop {
            if cancel.is_cancelled() {
                return Err(SyncError::Cancelled);
            }

            let page = self.fetch_list_page(cursor.as_deref(), cancel).await?;

            for object in &page.items {
                match object.kind.as_str() {
                    "ITEM" => {
                        seen_items.insert(object.id.clone());
                    }
                    "CATEGORY" => {
                        seen_categories.insert(object.id.clone());
                    }
                    "ITEM_VARIATION" => {
                        seen_variations.insert(object.id.clone());
                    }
                    _ => {}
                }
            }

            let batch_result = self.process_batch_with_retry(&page.items, SyncMode::Full).await;
            total.merge(batch_result);
            self.emit(SyncPhase::Syncing {
                mode: SyncMode::Full,
                fraction: if page.has_more() { 0.5 } else { 0.9 },
            });

            if !page.has_more() {
                break;
            }
            cursor = page.cursor;
        }

        let cleanup = self.cleanup_pass(&seen_items, &seen_categories, &seen_variations).await?;
        total.merge(cleanup);
        Ok(total)
    }

    async fn incremental_sync(&self, cancel: &CancelToken) -> Result<SyncResult, SyncError> {
        let status = self.store.get_sync_status().await.map_err(|e| e.into_sync_error())?;
        let begin_time = status.last_incremental_sync_at;

        let mut total = SyncResult::empty(SyncMode::Incremental);
        let mut cursor: Option<String> = None;

        loop {
            if cancel.is_cancelled() {
                return Err(SyncError::Cancelled);
            }

            let page = self
                .fetch_search_page(begin_time.as_deref(), cursor.as_deref(), cancel)
                .await?;

            if page.items.is_empty() && !page.has_more() {
                break;
            }

            for chunk in page.items.chunks(self.config.batch_size as usize) {
                let batch_result = self.process_batch_with_retry(chunk, SyncMode::Incremental).await;
                total.merge(batch_result);
            }
            self.emit(SyncPhase::Syncing {
                mode: SyncMode::Incremental,
                fraction: if page.has_more() { 0.5 } else { 0.9 },
            });

            if !page.has_more() {
                break;
            }
            cursor = page.cursor;
        }

        Ok(total)
    }

    /// Fetches one page of a kind-scoped full enumeration (spec §4.4).
    async fn fetch_list_page(
        &self,
        cursor: Option<&str>,
        cancel: &CancelToken,
    ) -> Result<Page<CatalogObject>, SyncError> {
        let remote = self.remote.clone();
        let cursor = cursor.map(str::to_string);
        let page_size = self.config.page_size;
        let per_fetch_timeout = self.config.per_fetch_timeout;

        let outcome = self
            .resilience
            .execute(
                "remote.list",
                self.sleeper.as_ref(),
                self.auth.as_ref(),
                cancel,
                Degradation::<Page<CatalogObject>>::FailFast,
                move || {
                    let remote = remote.clone();
                    let cursor = cursor.clone();
                    async move {
                        tokio::time::timeout(
                            per_fetch_timeout,
                            remote.list(&Kind::ALL_CATALOG, cursor.as_deref(), page_size),
                        )
                        .await
                        .map_err(|_| RemoteCallError(anyhow::anyhow!("fetch timed out")))?
                        .map_err(RemoteCallError::from)
                    }
                },
            )
            .await;

        match outcome {
            Outcome::Ok(page) => Ok(page),
            Outcome::Degraded(page) => Ok(page),
            Outcome::Failed => Err(SyncError::Network("remote.list exhausted retries".into())),
        }
    }

    /// Fetches one page of an updated-since stream, not scoped to specific
    /// kinds (spec §4.4).
    async fn fetch_search_page(
        &self,
        begin_time: Option<&str>,
        cursor: Option<&str>,
        cancel: &CancelToken,
    ) -> Result<Page<CatalogObject>, SyncError> {
        let remote = self.remote.clone();
        let begin_time = begin_time.map(str::to_string);
        let cursor = cursor.map(str::to_string);
        let per_fetch_timeout = self.config.per_fetch_timeout;

        let outcome = self
            .resilience
            .execute(
                "remote.search",
                self.sleeper.as_ref(),
                self.auth.as_ref(),
                cancel,
                Degradation::<Page<CatalogObject>>::FailFast,
                move || {
                    let remote = remote.clone();
                    let begin_time = begin_time.clone();
                    let cursor = cursor.clone();
                    async move {
                        tokio::time::timeout(
                            per_fetch_timeout,
                            remote.search(begin_time.as_deref(), cursor.as_deref()),
                        )
                        .await
                        .map_err(|_| RemoteCallError(anyhow::anyhow!("fetch timed out")))?
                        .map_err(RemoteCallError::from)
                    }
                },
            )
            .await;

        match outcome {
            Outcome::Ok(page) => Ok(page),
            Outcome::Degraded(page) => Ok(page),
            Outcome::Failed => Err(SyncError::Network("remote.search exhausted retries".into())),
        }
    }

    async fn process_batch_with_retry(&self, objects: &[CatalogObject], mode: SyncMode) -> SyncResult {
        match self.process_batch(objects, mode).await {
            Ok(result) => result,
            Err(first_err) => match self.process_batch(objects, mode).await {
                Ok(result) => result,
                Err(second_err) => {
                    let mut result = SyncResult::empty(mode);
                    result.errors.push(BatchError {
                        id: format!("{} objects", objects.len()),
                        kind: None,
                        message: format!("batch failed twice ({first_err}); last error: {second_err}"),
                    });
                    result
                }
            },
        }
    }

    async fn process_batch(
        &self,
        objects: &[CatalogObject],
        mode: SyncMode,
    ) -> Result<SyncResult, SyncError> {
        let mut tx = self.store.begin().await.map_err(|e| e.into_sync_error())?;
        let result = self.reconciler.reconcile_batch(&mut tx, objects, mode).await;
        tx.commit().await.map_err(|e| e.into_sync_error())?;
        Ok(result)
    }

    async fn cleanup_pass(
        &self,
        seen_items: &std::collections::HashSet<String>,
        seen_categories: &std::collections::HashSet<String>,
        seen_variations: &std::collections::HashSet<String>,
    ) -> Result<SyncResult, SyncError> {
        let mut tx = self.store.begin().await.map_err(|e| e.into_sync_error())?;
        let mut result = SyncResult::empty(SyncMode::Full);

        for (kind, seen) in [
            (Kind::Item, seen_items),
            (Kind::Category, seen_categories),
            (Kind::ItemVariation, seen_variations),
        ] {
            let removed = self
                .reconciler
                .cleanup(&mut tx, kind, seen)
                .await
                .map_err(|message| SyncError::ObjectProcessing {
                    id: format!("cleanup:{}", kind.wire_name()),
                    source: anyhow::anyhow!(message),
                })?;
            result.deleted += removed;
        }

        tx.commit().await.map_err(|e| e.into_sync_error())?;
        Ok(result)
    }

    async fn update_timestamps(&self, mode: SyncMode) -> Result<(), SyncError> {
        let mut tx = self.store.begin().await.map_err(|e| e.into_sync_error())?;
        let mut status = tx.get_sync_status().await.map_err(|e| e.into_sync_error())?;
        let now = chrono::Utc::now().to_rfc3339();
        match mode {
            SyncMode::Full => {
                status.last_full_sync_at = Some(now.clone());
                status.last_incremental_sync_at = Some(now);
            }
            SyncMode::Incremental => {
                status.last_incremental_sync_at = Some(now);
            }
        }
        tx.put_sync_status(&status).await.map_err(|e| e.into_sync_error())?;
        tx.commit().await.map_err(|e| e.into_sync_error())?;
        Ok(())
    }

    fn emit(&self, phase: SyncPhase) {
        let _ = self.progress_tx.send(SyncProgress::new(phase));
    }

    /// A fresh idempotency key for a mutating remote call (spec §6.3).
    #[must_use]
    pub fn idempotency_key(&self) -> String {
        self.id_gen.idempotency_key()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use catalog_sync_core::{SystemClock, Token, UuidIdGen};
    use std::sync::atomic::{AtomicBool, Ordering};

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

    struct NeverAuthed;
    #[async_trait]
    impl AuthProvider for NeverAuthed {
        async fn is_authenticated(&self) -> bool {
            false
        }
        async fn token(&self) -> Option<Token> {
            None
        }
        async fn ensure_valid_token(&self) -> Option<Token> {
            None
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

    struct OneShotRemote {
        delivered: AtomicBool,
    }
    #[async_trait]
    impl RemoteCatalog for OneShotRemote {
        async fn list(
            &self,
            _kinds: &[Kind],
            _cursor: Option<&str>,
            _limit: u32,
        ) -> anyhow::Result<Page<CatalogObject>> {
            if self.delivered.swap(true, Ordering::SeqCst) {
                return Ok(Page {
                    items: vec![],
                    cursor: None,
                });
            }
            Ok(Page {
                items: vec![CatalogObject {
                    id: "cat-1".into(),
                    kind: "CATEGORY".into(),
                    updated_at: "2026-01-01T00:00:00Z".into(),
                    version: 1,
                    is_deleted: false,
                    data: serde_json::json!({"name": "Drinks"}),
                }],
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

    async fn build_engine(
        remote: Arc<dyn RemoteCatalog>,
        auth: Arc<dyn AuthProvider>,
    ) -> (SyncEngine<SystemClock>, watch::Receiver<SyncProgress>) {
        let store = CatalogStore::open("sqlite::memory:").await.unwrap();
        SyncEngine::new(
            store,
            remote,
            auth,
            SystemClock,
            Arc::new(UuidIdGen),
            Arc::new(TokioSleeper),
            SyncConfig::default(),
        )
    }

    #[tokio::test]
    async fn refuses_to_sync_when_unauthenticated() {
        let (engine, _rx) = build_engine(Arc::new(EmptyRemote), Arc::new(NeverAuthed)).await;
        let result = engine.perform_sync().await;
        assert!(matches!(result, Err(SyncError::NotAuthenticated)));
    }

    #[tokio::test]
    async fn first_sync_is_full_and_inserts_objects() {
        let (engine, _rx) = build_engine(
            Arc::new(OneShotRemote {
                delivered: AtomicBool::new(false),
            }),
            Arc::new(AlwaysAuthed),
        )
        .await;

        let result = engine.perform_sync().await.unwrap();
        assert_eq!(result.mode, SyncMode::Full);
        assert_eq!(result.inserted, 1);
    }

    #[tokio::test]
    async fn concurrent_invocations_one_fails_with_in_progress() {
        let (engine, _rx) = build_engine(Arc::new(EmptyRemote), Arc::new(AlwaysAuthed)).await;
        let engine = Arc::new(engine);

        let engine_a = engine.clone();
        let engine_b = engine.clone();
        let (a, b) = tokio::join!(
            async move { engine_a.perform_sync().await },
            async move { engine_b.perform_sync().await },
        );

        // Whether the two calls actually overlap is a scheduling detail; the
        // invariant `try_lock()` guarantees is that at least one succeeds
        // and neither call ever blocks waiting for the other's lock.
        assert!(a.is_ok() || b.is_ok());
    }
}
