//! Domain error taxonomy for the sync engine (spec §4.8).

use thiserror::Error;

/// Errors surfaced by `perform_sync()` and the components it orchestrates.
///
/// Classified by the Resilience layer ([`crate::resilience`]) before reaching
/// the caller: transient causes are retried internally and only terminal
/// failures (or exhausted retries) end up wrapped in one of these variants.
#[derive(Debug, Error)]
pub enum SyncError {
    /// A sync was already running when `perform_sync()` was called.
    #[error("a sync is already in progress")]
    InProgress,

    /// `AuthProvider::is_authenticated()` returned `false`.
    #[error("not authenticated")]
    NotAuthenticated,

    /// The sync was cancelled via its cancel token, or its deadline expired.
    #[error("sync cancelled")]
    Cancelled,

    /// A network-layer failure from the remote collaborator.
    #[error("network error: {0}")]
    Network(String),

    /// The remote returned a non-2xx status not otherwise classified.
    #[error("server error: status {0}")]
    Server(u16),

    /// An object with the given id could not be reconciled (e.g. row lookup
    /// failure inside the Store).
    #[error("failed to process object {id}: {source}")]
    ObjectProcessing {
        id: String,
        #[source]
        source: anyhow::Error,
    },

    /// An object with the given id could not be decoded into a typed row.
    #[error("failed to transform object {id}: {source}")]
    Transformation {
        id: String,
        #[source]
        source: anyhow::Error,
    },

    /// The Catalog Store reported a failure (open, transaction, or query).
    /// The Store's own error type lives in `catalog-sync-runtime` (it names
    /// `sqlx::Error`, an I/O-bearing dependency this crate deliberately does
    /// not carry); this variant wraps it as `anyhow::Error` at the boundary.
    #[error("store error: {0}")]
    Store(#[source] anyhow::Error),

    /// Anything else, with a human-readable message. Used sparingly; prefer
    /// a named variant when the failure mode recurs.
    #[error("internal error: {0}")]
    Internal(String),
}

impl SyncError {
    /// Wraps a store-layer failure. Kept as a constructor (rather than a
    /// blanket `From` impl) so call sites stay explicit about which boundary
    /// produced the error.
    pub fn store(source: impl Into<anyhow::Error>) -> Self {
        SyncError::Store(source.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sync_error_display_is_stable() {
        assert_eq!(SyncError::InProgress.to_string(), "a sync is already in progress");
        assert_eq!(SyncError::NotAuthenticated.to_string(), "not authenticated");
        assert_eq!(SyncError::Cancelled.to_string(), "sync cancelled");
        assert_eq!(SyncError::Server(503).to_string(), "server error: status 503");
    }

    #[test]
    fn store_constructor_wraps_any_error() {
        let err = SyncError::store(anyhow::anyhow!("disk full"));
        assert!(matches!(err, SyncError::Store(_)));
        assert!(err.to_string().contains("disk full"));
    }

    #[test]
    fn object_processing_carries_id_and_source() {
        let err = SyncError::ObjectProcessing {
            id: "item-1".into(),
            source: anyhow::anyhow!("missing nested payload"),
        };
        assert!(err.to_string().contains("item-1"));
        assert!(err.to_string().contains("missing nested payload"));
    }
}
