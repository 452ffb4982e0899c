//! Inventory ingestion: webhook consumer and the `InventoryRemote`-backed
//! batch path (spec §4.9).
//!
//! Inventory counts are keyed by a composite id with no independent
//! `version` field on the wire, so they bypass the Reconciler's
//! version-gated upsert entirely: both paths here call
//! [`crate::store::CatalogStore::upsert_inventory_count`] directly and let
//! `updated_at` record recency.

use std::sync::Arc;

use catalog_sync_core::resilience::{Degradation, Outcome, Resilience, Sleeper};
use catalog_sync_core::{AuthProvider, Clock, InventoryCount, InventoryRemote};
use serde_json::Value;
use thiserror::Error;

use crate::engine::remote_error::RemoteCallError;
use crate::store::{CatalogStore, UpsertResult};

#[derive(Debug, Error)]
pub enum InventoryIngestError {
    #[error("payload is missing required field `{0}`")]
    MissingField(&'static str),
    #[error(transparent)]
    Store(#[from] crate::store::StoreError),
    #[error("inventory batch_change exhausted retries")]
    RemoteExhausted,
}

fn str_field(payload: &Value, key: &'static str) -> Result<String, InventoryIngestError> {
    payload
        .get(key)
        .and_then(Value::as_str)
        .map(str::to_owned)
        .ok_or(InventoryIngestError::MissingField(key))
}

fn decode_inventory_count(payload: &Value) -> Result<InventoryCount, InventoryIngestError> {
    Ok(InventoryCount {
        variation_id: str_field(payload, "variation_id")?,
        location_id: str_field(payload, "location_id")?,
        state: str_field(payload, "state")?,
        quantity: str_field(payload, "quantity")?,
        calculated_at: str_field(payload, "calculated_at")?,
        updated_at: str_field(payload, "updated_at")?,
    })
}

/// Adapts `InventoryRemote` and webhook delivery onto the Store.
pub struct InventoryIngest<C: Clock> {
    store: CatalogStore,
    remote: Arc<dyn InventoryRemote>,
    auth: Arc<dyn AuthProvider>,
    resilience: Resilience<C>,
    sleeper: Arc<dyn Sleeper>,
}

impl<C: Clock> InventoryIngest<C> {
    #[must_use]
    pub fn new(
        store: CatalogStore,
        remote: Arc<dyn InventoryRemote>,
        auth: Arc<dyn AuthProvider>,
        resilience: Resilience<C>,
        sleeper: Arc<dyn Sleeper>,
    ) -> Self {
        Self {
            store,
            remote,
            auth,
            resilience,
            sleeper,
        }
    }

    /// Decodes a single webhook payload and upserts it unconditionally.
    pub async fn on_inventory_count_updated(
        &self,
        payload: &Value,
    ) -> Result<UpsertResult, InventoryIngestError> {
        let row = decode_inventory_count(payload)?;
        let mut tx = self.store.begin().await?;
        let result = tx.upsert_inventory_count(&row).await?;
        tx.commit().await?;
        Ok(result)
    }

    /// Pushes `changes` through `InventoryRemote::batch_change`, retried and
    /// circuit-broken under its own `operation_id` so a run of inventory
    /// failures does not trip the breaker guarding catalog list/search
    /// calls, then persists whatever counts the remote echoes back.
    pub async fn push_changes(
        &self,
        changes: &[InventoryCount],
        idempotency_key: &str,
    ) -> Result<Vec<InventoryCount>, InventoryIngestError> {
        let remote = self.remote.clone();
        let changes = changes.to_vec();
        let key = idempotency_key.to_string();
        let cancel = catalog_sync_core::CancelToken::new();

        let outcome = self
            .resilience
            .execute(
                "inventory.batch_change",
                self.sleeper.as_ref(),
                self.auth.as_ref(),
                &cancel,
                Degradation::<Vec<InventoryCount>>::FailFast,
                move || {
                    let remote = remote.clone();
                    let changes = changes.clone();
                    let key = key.clone();
                    async move {
                        remote
                            .batch_change(&changes, &key)
                            .await
                            .map_err(RemoteCallError::from)
                    }
                },
            )
            .await;

        let applied = match outcome {
            Outcome::Ok(applied) => applied,
            Outcome::Degraded(applied) => applied,
            Outcome::Failed => return Err(InventoryIngestError::RemoteExhausted),
        };

        let mut tx = self.store.begin().await?;
        for row in &applied {
            tx.upsert_inventory_count(row).await?;
        }
        tx.commit().await?;
        Ok(applied)
    }
}
