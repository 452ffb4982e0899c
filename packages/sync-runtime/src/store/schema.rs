//! Embedded database schema (spec §4.2.1, §6.3).
//!
//! One idempotent `CREATE TABLE IF NOT EXISTS` migration, no forward/backward
//! migration framework -- schema migration across incompatible versions is
//! explicitly out of scope, so the store only ever applies this one schema.
//! Array-valued fields that the model calls out as "no FK, to tolerate
//! out-of-order arrival" are `TEXT` columns holding `serde_json`-encoded
//! arrays, not join tables (§3.1).

use sqlx::sqlite::SqlitePool;

/// Runs the pragma sequence `open()` requires, in order: WAL journaling,
/// `synchronous=NORMAL`, foreign key enforcement on, and a 30s busy timeout.
pub async fn apply_pragmas(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query("PRAGMA journal_mode=WAL").execute(pool).await?;
    sqlx::query("PRAGMA synchronous=NORMAL").execute(pool).await?;
    sqlx::query("PRAGMA foreign_keys=ON").execute(pool).await?;
    sqlx::query("PRAGMA busy_timeout=30000").execute(pool).await?;
    Ok(())
}

/// Creates all ten tables if they do not already exist.
pub async fn migrate(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r"
        CREATE TABLE IF NOT EXISTS categories (
            id TEXT PRIMARY KEY,
            updated_at TEXT NOT NULL,
            version INTEGER NOT NULL,
            is_deleted INTEGER NOT NULL DEFAULT 0,
            data_json TEXT NOT NULL,
            name TEXT NOT NULL,
            image_url TEXT,
            parent_category_id TEXT,
            is_top_level INTEGER,
            path_to_root TEXT NOT NULL DEFAULT '[]'
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r"
        CREATE TABLE IF NOT EXISTS items (
            id TEXT PRIMARY KEY,
            updated_at TEXT NOT NULL,
            version INTEGER NOT NULL,
            is_deleted INTEGER NOT NULL DEFAULT 0,
            data_json TEXT NOT NULL,
            name TEXT NOT NULL,
            description TEXT,
            abbreviation TEXT,
            label_color TEXT,
            category_id TEXT REFERENCES categories(id) ON DELETE SET NULL,
            reporting_category_id TEXT,
            present_at_all_locations INTEGER NOT NULL DEFAULT 0,
            available_online INTEGER,
            available_for_pickup INTEGER,
            available_electronically INTEGER,
            tax_ids TEXT NOT NULL DEFAULT '[]',
            modifier_list_ids TEXT NOT NULL DEFAULT '[]',
            image_ids TEXT NOT NULL DEFAULT '[]'
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r"
        CREATE TABLE IF NOT EXISTS item_variations (
            id TEXT PRIMARY KEY,
            updated_at TEXT NOT NULL,
            version INTEGER NOT NULL,
            is_deleted INTEGER NOT NULL DEFAULT 0,
            data_json TEXT NOT NULL,
            item_id TEXT NOT NULL,
            name TEXT,
            sku TEXT,
            upc TEXT,
            ordinal INTEGER,
            pricing_type TEXT,
            price_amount INTEGER,
            price_currency TEXT,
            measurement_unit_id TEXT,
            sellable INTEGER,
            stockable INTEGER,
            location_overrides TEXT NOT NULL DEFAULT '[]'
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r"
        CREATE TABLE IF NOT EXISTS taxes (
            id TEXT PRIMARY KEY,
            updated_at TEXT NOT NULL,
            version INTEGER NOT NULL,
            is_deleted INTEGER NOT NULL DEFAULT 0,
            data_json TEXT NOT NULL,
            name TEXT NOT NULL,
            calculation_phase TEXT,
            inclusion_type TEXT,
            percentage TEXT,
            enabled INTEGER NOT NULL DEFAULT 0,
            applies_to_custom_amounts INTEGER NOT NULL DEFAULT 0
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r"
        CREATE TABLE IF NOT EXISTS discounts (
            id TEXT PRIMARY KEY,
            updated_at TEXT NOT NULL,
            version INTEGER NOT NULL,
            is_deleted INTEGER NOT NULL DEFAULT 0,
            data_json TEXT NOT NULL,
            name TEXT NOT NULL,
            discount_type TEXT,
            percentage TEXT,
            amount_amount INTEGER,
            amount_currency TEXT
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r"
        CREATE TABLE IF NOT EXISTS modifier_lists (
            id TEXT PRIMARY KEY,
            updated_at TEXT NOT NULL,
            version INTEGER NOT NULL,
            is_deleted INTEGER NOT NULL DEFAULT 0,
            data_json TEXT NOT NULL,
            name TEXT NOT NULL,
            selection_type TEXT NOT NULL,
            ordinal INTEGER,
            modifier_ids TEXT NOT NULL DEFAULT '[]'
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r"
        CREATE TABLE IF NOT EXISTS modifiers (
            id TEXT PRIMARY KEY,
            updated_at TEXT NOT NULL,
            version INTEGER NOT NULL,
            is_deleted INTEGER NOT NULL DEFAULT 0,
            data_json TEXT NOT NULL,
            modifier_list_id TEXT NOT NULL REFERENCES modifier_lists(id) ON DELETE CASCADE,
            name TEXT NOT NULL,
            price_amount INTEGER,
            price_currency TEXT,
            ordinal INTEGER,
            on_by_default INTEGER NOT NULL DEFAULT 0
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r"
        CREATE TABLE IF NOT EXISTS images (
            id TEXT PRIMARY KEY,
            updated_at TEXT NOT NULL,
            version INTEGER NOT NULL,
            is_deleted INTEGER NOT NULL DEFAULT 0,
            data_json TEXT NOT NULL,
            name TEXT,
            url TEXT,
            caption TEXT
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r"
        CREATE TABLE IF NOT EXISTS inventory_counts (
            composite_id TEXT PRIMARY KEY,
            variation_id TEXT NOT NULL,
            location_id TEXT NOT NULL,
            state TEXT NOT NULL,
            quantity TEXT NOT NULL,
            calculated_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r"
        CREATE TABLE IF NOT EXISTS sync_status (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            last_full_sync_at TEXT,
            last_incremental_sync_at TEXT,
            in_flight INTEGER NOT NULL DEFAULT 0,
            last_cursor TEXT,
            attempt_count INTEGER NOT NULL DEFAULT 0,
            last_error TEXT,
            progress_current INTEGER NOT NULL DEFAULT 0,
            progress_total INTEGER NOT NULL DEFAULT 0
        )",
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_items_category_id ON items(category_id)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_item_variations_item_id ON item_variations(item_id)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_modifiers_modifier_list_id ON modifiers(modifier_list_id)")
        .execute(pool)
        .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_inventory_counts_variation_location ON inventory_counts(variation_id, location_id)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
