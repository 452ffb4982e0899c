//! Collaborator traits the sync engine depends on (spec §4, §6).
//!
//! `sync-runtime` provides the concrete implementations (an HTTP client for
//! [`RemoteCatalog`], a token store for [`AuthProvider`]); `sync-core` only
//! needs the contracts so its orchestration logic stays testable with fakes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::model::{InventoryCount, Kind};

/// An authentication token handed to [`RemoteCatalog`] calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token(pub String);

/// Supplies and refreshes the credential the sync engine authenticates with.
///
/// Implementations own token refresh and expiry; the sync engine only asks
/// "am I authenticated" and "give me a token", never manages the token
/// lifecycle itself (spec §4.4: `AuthProvider::is_authenticated()` gates
/// every `perform_sync()` call).
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Whether a sync attempt should proceed at all.
    async fn is_authenticated(&self) -> bool;

    /// The token to present to the remote. Returns `None` if unauthenticated.
    async fn token(&self) -> Option<Token>;

    /// Attempts a single credential refresh, returning the refreshed token
    /// or `None` if the refresh itself failed. This is what the
    /// `AuthRequired`/`TokenExpired` recovery strategy calls before its one
    /// retry (spec §4.1's classification table).
    async fn ensure_valid_token(&self) -> Option<Token>;

    /// Drops any cached credential. Called when a refresh attempt fails, so
    /// the next `is_authenticated()` check reflects reality instead of a
    /// stale token.
    async fn sign_out(&self);
}

/// The wire shape of one catalog object as returned by `RemoteCatalog::list`,
/// `RemoteCatalog::search`, or `RemoteCatalog::retrieve` (spec §6.2). Carries
/// the raw, un-decoded payload
/// so the Decoder (see [`crate::decode`]) can extract a typed row while the
/// Store still persists `data_json` verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogObject {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub updated_at: String,
    pub version: i64,
    #[serde(default)]
    pub is_deleted: bool,
    /// The full, untouched JSON body as received from the remote.
    pub data: serde_json::Value,
}

/// One page of a paginated `list()` response.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub cursor: Option<String>,
}

impl<T> Page<T> {
    /// Whether the remote indicated more pages follow.
    #[must_use]
    pub fn has_more(&self) -> bool {
        self.cursor.is_some()
    }
}

impl<T> Default for Page<T> {
    /// An empty, terminal page. Lets `Page<T>` stand in as the `T: Default`
    /// degradation value for [`crate::resilience::Resilience::execute`]
    /// without requiring `T` itself to be `Default`.
    fn default() -> Self {
        Self {
            items: Vec::new(),
            cursor: None,
        }
    }
}

/// The remote catalog collaborator: list, search, fetch, and mutate catalog
/// objects (spec §6.1).
///
/// Every method is retried by the Resilience layer per its
/// [`crate::resilience::classify`] outcome; implementations should surface
/// the underlying transport error untouched rather than pre-classify it.
#[async_trait]
pub trait RemoteCatalog: Send + Sync {
    /// Full enumeration of the given kinds, following `cursor` for
    /// subsequent pages. Drives a full sync (spec §4.4).
    async fn list(
        &self,
        kinds: &[Kind],
        cursor: Option<&str>,
        limit: u32,
    ) -> anyhow::Result<Page<CatalogObject>>;

    /// Objects updated since `begin_time` (RFC 3339), following `cursor` for
    /// subsequent pages. Drives an incremental sync (spec §4.4); unlike
    /// [`Self::list`] it is not scoped to specific kinds, since the remote
    /// reports every kind's changes in one updated-since stream.
    async fn search(
        &self,
        begin_time: Option<&str>,
        cursor: Option<&str>,
    ) -> anyhow::Result<Page<CatalogObject>>;

    /// Fetches a single object by id, used when reconciling a webhook
    /// notification that only carries an id (spec §4.3). `include_related`
    /// asks the remote to inline referenced objects (e.g. an item's
    /// variations) in the same response.
    async fn retrieve(&self, id: &str, include_related: bool) -> anyhow::Result<Option<CatalogObject>>;

    /// Upserts one locally-authored object with an idempotency key (spec
    /// §6.1). Not exercised by the read-path sync flows this crate
    /// implements today, but part of the remote's contract.
    async fn upsert(&self, object: &CatalogObject, idempotency_key: &str) -> anyhow::Result<CatalogObject>;

    /// Deletes a remote object by id. Like [`Self::upsert`], part of the
    /// locally-authored write path this crate does not yet drive.
    async fn delete(&self, id: &str) -> anyhow::Result<()>;
}

/// The inventory-specific remote collaborator (spec §4.9). Kept separate
/// from [`RemoteCatalog`] because inventory counts are never paginated
/// through `list()`: they arrive via webhook push or an explicit batch pull.
#[async_trait]
pub trait InventoryRemote: Send + Sync {
    /// Pulls current counts for the given variation/location pairs.
    async fn batch_retrieve(
        &self,
        variation_ids: &[String],
        location_ids: &[String],
    ) -> anyhow::Result<Vec<InventoryCount>>;

    /// Applies inventory adjustments, returning the resulting counts.
    async fn batch_change(
        &self,
        changes: &[InventoryCount],
        idempotency_key: &str,
    ) -> anyhow::Result<Vec<InventoryCount>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_has_more_reflects_cursor() {
        let with_cursor: Page<u32> = Page {
            items: vec![1, 2],
            cursor: Some("next".into()),
        };
        assert!(with_cursor.has_more());

        let last_page: Page<u32> = Page {
            items: vec![3],
            cursor: None,
        };
        assert!(!last_page.has_more());
    }

    #[test]
    fn catalog_object_deserializes_wire_shape() {
        let json = serde_json::json!({
            "id": "cat-1",
            "type": "CATEGORY",
            "updated_at": "2026-01-01T00:00:00Z",
            "version": 3,
            "data": {"name": "Drinks"}
        });
        let obj: CatalogObject = serde_json::from_value(json).unwrap();
        assert_eq!(obj.id, "cat-1");
        assert_eq!(obj.kind, "CATEGORY");
        assert!(!obj.is_deleted);
    }
}
