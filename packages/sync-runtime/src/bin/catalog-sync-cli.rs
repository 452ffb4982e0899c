//! Manual smoke-test harness for the sync runtime: drives a store and
//! engine against a local SQLite file without needing a real remote
//! backend wired up. Not a deployment artifact.

use std::sync::Arc;

use async_trait::async_trait;
use catalog_sync_core::{
    AuthProvider, CatalogObject, Kind, Page, RemoteCatalog, SyncConfig, SystemClock, Token,
    UuidIdGen,
};
use catalog_sync_runtime::store::Filters;
use catalog_sync_runtime::{CatalogStore, SyncEngine, TokioSleeper};
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "catalog-sync-cli", about = "Smoke-test harness for the catalog sync runtime")]
struct Cli {
    /// Path to the SQLite database file (created if absent).
    #[arg(long, default_value = "catalog-sync.db", env = "CATALOG_SYNC_DB")]
    db: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Runs one `perform_sync()` against a remote that reports no objects.
    /// Exercises mode selection, transaction commit, and progress emission
    /// without requiring a live backend.
    Sync,
    /// Looks up rows by name, SKU, UPC, or category substring.
    Search {
        term: String,
        #[arg(long)]
        category: Option<String>,
        #[arg(long, default_value_t = 20)]
        limit: u32,
    },
}

struct AlwaysAuthed;
#[async_trait]
impl AuthProvider for AlwaysAuthed {
    async fn is_authenticated(&self) -> bool {
        true
    }
    async fn token(&self) -> Option<Token> {
        Some(Token("demo".into()))
    }
    async fn ensure_valid_token(&self) -> Option<Token> {
        Some(Token("demo".into()))
    }
    async fn sign_out(&self) {}
}

/// Reports an empty catalog on every page; a stand-in until a real HTTP
/// client implements `RemoteCatalog`.
struct NoRemote;
#[async_trait]
impl RemoteCatalog for NoRemote {
    async fn list(&self, _kinds: &[Kind], _cursor: Option<&str>, _limit: u32) -> anyhow::Result<Page<CatalogObject>> {
        Ok(Page::default())
    }

    async fn search(
        &self,
        _begin_time: Option<&str>,
        _cursor: Option<&str>,
    ) -> anyhow::Result<Page<CatalogObject>> {
        Ok(Page::default())
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

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let cli = Cli::parse();
    let store = CatalogStore::open(&cli.db).await?;

    match cli.command {
        Command::Sync => {
            let (engine, mut progress) = SyncEngine::new(
                store,
                Arc::new(NoRemote),
                Arc::new(AlwaysAuthed),
                SystemClock,
                Arc::new(UuidIdGen),
                Arc::new(TokioSleeper),
                SyncConfig::default(),
            );

            tokio::spawn(async move {
                while progress.changed().await.is_ok() {
                    let snapshot = progress.borrow();
                    tracing::info!(phase = ?snapshot.phase, "sync progress");
                }
            });

            let result = engine.perform_sync().await?;
            tracing::info!(?result, "sync finished");
        }
        Command::Search { term, category, limit } => {
            let filters = Filters {
                category,
                ..Filters::default()
            };
            let rows = store.search(&term, &filters, limit).await?;
            for row in rows {
                println!("{} ({:?}) {}", row.name, row.match_type, row.match_context);
            }
        }
    }

    Ok(())
}
