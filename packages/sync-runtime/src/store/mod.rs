//! Catalog Store: embedded, transactional, per-kind row storage (spec §4.2).

mod schema;
pub mod search;
mod sqlite;

pub use search::{Filters, MatchRow, MatchType};
pub use sqlite::{CatalogStore, Tx, UpsertResult};

use thiserror::Error;

/// The Store's own error type. Lives here (not in `catalog-sync-core`)
/// because it names `sqlx::Error`, an I/O-bearing dependency that crate
/// deliberately does not carry. Converts into `catalog_sync_core::SyncError`
/// at the boundary via [`StoreError::into_sync_error`].
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("failed to encode/decode JSON column: {0}")]
    Json(#[from] serde_json::Error),
}

impl StoreError {
    #[must_use]
    pub fn into_sync_error(self) -> catalog_sync_core::SyncError {
        catalog_sync_core::SyncError::store(self)
    }
}
