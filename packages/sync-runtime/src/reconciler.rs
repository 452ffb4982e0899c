//! Version-aware reconciliation of a batch of remote catalog objects into
//! the Store (spec §4.3).

use catalog_sync_core::{decode, BatchError, CatalogObject, DecodedObject, Kind, SyncMode, SyncResult};

use crate::store::{Tx, UpsertResult};

/// Stateless: every call takes the transaction and batch it operates on, so
/// the Sync Engine controls exactly which objects share a commit.
pub struct Reconciler;

impl Default for Reconciler {
    fn default() -> Self {
        Self::new()
    }
}

impl Reconciler {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Applies one heterogeneous batch inside `tx`, returning per-batch
    /// counters. Never fails the whole batch for a single bad object --
    /// unrecognized kinds and missing required payloads are recorded as
    /// [`BatchError`]s and the rest of the batch proceeds.
    pub async fn reconcile_batch(
        &self,
        tx: &mut Tx,
        objects: &[CatalogObject],
        mode: SyncMode,
    ) -> SyncResult {
        let mut result = SyncResult::empty(mode);

        for object in objects {
            result.processed += 1;

            if object.is_deleted {
                match self.delete_by_wire_kind(tx, &object.kind, &object.id).await {
                    Ok(true) => result.deleted += 1,
                    Ok(false) => {}
                    Err(message) => result.errors.push(BatchError {
                        id: object.id.clone(),
                        kind: Kind::from_wire_name(&object.kind),
                        message,
                    }),
                }
                continue;
            }

            match self.upsert_one(tx, object).await {
                Ok(Some(UpsertResult::Inserted)) => result.inserted += 1,
                Ok(Some(UpsertResult::Updated)) => result.updated += 1,
                Ok(None) => {}
                Err(message) => result.errors.push(BatchError {
                    id: object.id.clone(),
                    kind: Kind::from_wire_name(&object.kind),
                    message,
                }),
            }
        }

        result
    }

    /// Decodes `object` and upserts it, gated by version: a present row is
    /// only replaced if the incoming version is strictly greater, or if
    /// either version is missing/unparseable (last-writer-wins). Returns
    /// `Ok(None)` for a version-gated skip.
    async fn upsert_one(
        &self,
        tx: &mut Tx,
        object: &CatalogObject,
    ) -> Result<Option<UpsertResult>, String> {
        let decoded = decode(object).map_err(|err| err.to_string())?;

        let existing_version = self.existing_version(tx, &decoded).await?;
        if let (Some(existing), incoming) = (existing_version, decoded.version()) {
            if incoming <= existing {
                return Ok(None);
            }
        }

        let outcome = match decoded {
            DecodedObject::Category(row) => tx.upsert_category(&row).await,
            DecodedObject::Item(row) => tx.upsert_item(&row).await,
            DecodedObject::ItemVariation(row) => tx.upsert_item_variation(&row).await,
            DecodedObject::Tax(row) => tx.upsert_tax(&row).await,
            DecodedObject::Discount(row) => tx.upsert_discount(&row).await,
            DecodedObject::ModifierList(row) => tx.upsert_modifier_list(&row).await,
            DecodedObject::Modifier(row) => tx.upsert_modifier(&row).await,
            DecodedObject::Image(row) => tx.upsert_image(&row).await,
        }
        .map_err(|err| err.to_string())?;

        Ok(Some(outcome))
    }

    async fn existing_version(
        &self,
        tx: &mut Tx,
        decoded: &DecodedObject,
    ) -> Result<Option<i64>, String> {
        let version = match decoded {
            DecodedObject::Category(row) => {
                tx.get_category(&row.id).await.map_err(|e| e.to_string())?.map(|r| r.version)
            }
            DecodedObject::Item(row) => {
                tx.get_item(&row.id).await.map_err(|e| e.to_string())?.map(|r| r.version)
            }
            DecodedObject::ItemVariation(row) => tx
                .get_item_variation(&row.id)
                .await
                .map_err(|e| e.to_string())?
                .map(|r| r.version),
            DecodedObject::Tax(row) => {
                tx.get_tax(&row.id).await.map_err(|e| e.to_string())?.map(|r| r.version)
            }
            DecodedObject::Discount(row) => {
                tx.get_discount(&row.id).await.map_err(|e| e.to_string())?.map(|r| r.version)
            }
            DecodedObject::ModifierList(row) => tx
                .get_modifier_list(&row.id)
                .await
                .map_err(|e| e.to_string())?
                .map(|r| r.version),
            DecodedObject::Modifier(row) => {
                tx.get_modifier(&row.id).await.map_err(|e| e.to_string())?.map(|r| r.version)
            }
            DecodedObject::Image(row) => {
                tx.get_image(&row.id).await.map_err(|e| e.to_string())?.map(|r| r.version)
            }
        };
        Ok(version)
    }

    async fn delete_by_wire_kind(
        &self,
        tx: &mut Tx,
        wire_kind: &str,
        id: &str,
    ) -> Result<bool, String> {
        let kind = Kind::from_wire_name(wire_kind)
            .ok_or_else(|| format!("unrecognized kind on delete: {wire_kind}"))?;
        let result = match kind {
            Kind::Category => tx.delete_category(id).await,
            Kind::Item => tx.delete_item(id).await,
            Kind::ItemVariation => tx.delete_item_variation(id).await,
            Kind::Tax => tx.delete_tax(id).await,
            Kind::Discount => tx.delete_discount(id).await,
            Kind::ModifierList => tx.delete_modifier_list(id).await,
            Kind::Modifier => tx.delete_modifier(id).await,
            Kind::Image => tx.delete_image(id).await,
            Kind::InventoryCount => return Err("inventory counts are never deleted by id".into()),
        };
        result.map_err(|err| err.to_string())
    }

    /// Cleanup pass run once per full sync (never for incremental): any id
    /// present in the store but absent from `seen_ids` for `kind` is
    /// tombstoned via `delete`. Returns the number of rows removed.
    pub async fn cleanup(
        &self,
        tx: &mut Tx,
        kind: Kind,
        seen_ids: &std::collections::HashSet<String>,
    ) -> Result<u64, String> {
        let stored = tx.all_ids_of_kind(kind).await.map_err(|e| e.to_string())?;
        let mut removed = 0;
        for id in stored.difference(seen_ids) {
            let deleted = match kind {
                Kind::Category => tx.delete_category(id).await,
                Kind::Item => tx.delete_item(id).await,
                Kind::ItemVariation => tx.delete_item_variation(id).await,
                Kind::Tax => tx.delete_tax(id).await,
                Kind::Discount => tx.delete_discount(id).await,
                Kind::ModifierList => tx.delete_modifier_list(id).await,
                Kind::Modifier => tx.delete_modifier(id).await,
                Kind::Image => tx.delete_image(id).await,
                Kind::InventoryCount => continue,
            }
            .map_err(|e| e.to_string())?;
            if deleted {
                removed += 1;
            }
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::CatalogStore;

    fn category_object(id: &str, version: i64) -> CatalogObject {
        CatalogObject {
            id: id.into(),
            kind: "CATEGORY".into(),
            updated_at: "2026-01-01T00:00:00Z".into(),
            version,
            is_deleted: false,
            data: serde_json::json!({"name": "Drinks"}),
        }
    }

    async fn open_test_store() -> CatalogStore {
        CatalogStore::open("sqlite::memory:").await.unwrap()
    }

    #[tokio::test]
    async fn inserts_new_object() {
        let store = open_test_store().await;
        let mut tx = store.begin().await.unwrap();
        let reconciler = Reconciler::new();

        let result = reconciler
            .reconcile_batch(&mut tx, &[category_object("c1", 1)], SyncMode::Full)
            .await;
        assert_eq!(result.inserted, 1);
        assert_eq!(result.processed, 1);
        tx.commit().await.unwrap();
    }

    #[tokio::test]
    async fn skips_lower_or_equal_version() {
        let store = open_test_store().await;
        let mut tx = store.begin().await.unwrap();
        let reconciler = Reconciler::new();

        reconciler
            .reconcile_batch(&mut tx, &[category_object("c1", 5)], SyncMode::Full)
            .await;
        let result = reconciler
            .reconcile_batch(&mut tx, &[category_object("c1", 5)], SyncMode::Incremental)
            .await;
        assert_eq!(result.updated, 0);
        assert_eq!(result.inserted, 0);

        let result = reconciler
            .reconcile_batch(&mut tx, &[category_object("c1", 6)], SyncMode::Incremental)
            .await;
        assert_eq!(result.updated, 1);
        tx.commit().await.unwrap();
    }

    #[tokio::test]
    async fn deletes_when_is_deleted_flag_set() {
        let store = open_test_store().await;
        let mut tx = store.begin().await.unwrap();
        let reconciler = Reconciler::new();

        reconciler
            .reconcile_batch(&mut tx, &[category_object("c1", 1)], SyncMode::Full)
            .await;

        let mut tombstone = category_object("c1", 2);
        tombstone.is_deleted = true;
        let result = reconciler.reconcile_batch(&mut tx, &[tombstone], SyncMode::Full).await;
        assert_eq!(result.deleted, 1);

        let found = tx.get_category("c1").await.unwrap();
        assert!(found.is_none());
        tx.commit().await.unwrap();
    }

    #[tokio::test]
    async fn unrecognized_kind_is_counted_as_error_not_fatal() {
        let store = open_test_store().await;
        let mut tx = store.begin().await.unwrap();
        let reconciler = Reconciler::new();

        let mut bad = category_object("c1", 1);
        bad.kind = "FROBNICATOR".into();
        let result = reconciler
            .reconcile_batch(&mut tx, &[bad, category_object("c2", 1)], SyncMode::Full)
            .await;
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.inserted, 1);
        tx.commit().await.unwrap();
    }

    #[tokio::test]
    async fn cleanup_tombstones_ids_absent_from_full_listing() {
        let store = open_test_store().await;
        let mut tx = store.begin().await.unwrap();
        let reconciler = Reconciler::new();

        reconciler
            .reconcile_batch(
                &mut tx,
                &[category_object("keep", 1), category_object("drop", 1)],
                SyncMode::Full,
            )
            .await;

        let seen: std::collections::HashSet<String> = ["keep".to_string()].into_iter().collect();
        let removed = reconciler.cleanup(&mut tx, Kind::Category, &seen).await.unwrap();
        assert_eq!(removed, 1);
        assert!(tx.get_category("drop").await.unwrap().is_none());
        assert!(tx.get_category("keep").await.unwrap().is_some());
        tx.commit().await.unwrap();
    }
}
