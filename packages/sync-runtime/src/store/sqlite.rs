//! SQLite-backed implementation of the Catalog Store (spec §4.2, §4.2.1).

use std::collections::HashSet;
use std::str::FromStr;

use catalog_sync_core::{
    Category, CategoryRef, Discount, Image, InventoryCount, Item, ItemVariation, Kind,
    LocationOverride, Modifier, ModifierList, Money, SelectionType, SyncStatus, Tax,
};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, Transaction};

use super::schema;
use super::search::{self, Filters, MatchRow};
use super::StoreError;

/// Outcome of a single-row upsert. The Store itself is not version-aware
/// (it never returns `Skipped`): whether to call `upsert` at all -- i.e.
/// whether an incoming version supersedes the stored one -- is the
/// Reconciler's decision (§4.3). The Store only ever reports whether the
/// row was freshly created or replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertResult {
    Inserted,
    Updated,
}

/// The embedded, durable, transactional row store.
pub struct CatalogStore {
    pool: SqlitePool,
}

impl CatalogStore {
    /// Opens (and, if needed, creates) the database file at `path`, applies
    /// pragmas, and runs the one idempotent schema migration.
    pub async fn open(path: &str) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(path)
            .map_err(StoreError::Database)?
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(StoreError::Database)?;

        schema::apply_pragmas(&pool).await.map_err(StoreError::Database)?;
        schema::migrate(&pool).await.map_err(StoreError::Database)?;

        Ok(Self { pool })
    }

    /// Begins a new transaction. Every mutation goes through a [`Tx`].
    pub async fn begin(&self) -> Result<Tx, StoreError> {
        let inner = self.pool.begin().await.map_err(StoreError::Database)?;
        Ok(Tx { inner })
    }

    /// Reads the singleton sync status row, defaulting to an idle status if
    /// the row has never been written.
    pub async fn get_sync_status(&self) -> Result<SyncStatus, StoreError> {
        let row = sqlx::query("SELECT * FROM sync_status WHERE id = 1")
            .fetch_optional(&self.pool)
            .await
            .map_err(StoreError::Database)?;
        match row {
            Some(row) => sync_status_from_row(&row),
            None => Ok(SyncStatus::default()),
        }
    }

    /// Items whose variation carries `upc` as a case code (a second,
    /// non-sellable UPC used by the barcode search filter).
    pub async fn items_by_case_upc(&self, upc: &str) -> Result<Vec<Item>, StoreError> {
        let rows = sqlx::query(
            r"
            SELECT DISTINCT items.* FROM items
            JOIN item_variations ON item_variations.item_id = items.id
            WHERE item_variations.upc = ?
            ",
        )
        .bind(upc)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::Database)?;

        rows.iter().map(item_from_row).collect()
    }

    /// Free-text and filtered search over item names and variation
    /// SKU/UPC (§4.2). Read-only: runs directly against the pool rather
    /// than requiring a [`Tx`], since SQLite readers see a consistent
    /// snapshot without blocking the writer.
    pub async fn search(
        &self,
        term: &str,
        filters: &Filters,
        limit: u32,
    ) -> Result<Vec<MatchRow>, StoreError> {
        search::search(&self.pool, term, filters, limit).await
    }
}

/// An open transaction. All per-kind reads and writes happen through this
/// handle so the Reconciler and Sync Engine can span a whole batch inside
/// one atomic unit. Dropping a `Tx` without calling `commit` rolls it back
/// (the underlying `sqlx::Transaction`'s own `Drop` impl), so a cancellation
/// or panic mid-batch always leaves the database consistent.
pub struct Tx {
    inner: Transaction<'static, sqlx::Sqlite>,
}

impl Tx {
    pub async fn commit(self) -> Result<(), StoreError> {
        self.inner.commit().await.map_err(StoreError::Database)
    }

    pub async fn rollback(self) -> Result<(), StoreError> {
        self.inner.rollback().await.map_err(StoreError::Database)
    }

    // ---- Category ----------------------------------------------------

    pub async fn get_category(&mut self, id: &str) -> Result<Option<Category>, StoreError> {
        let row = sqlx::query("SELECT * FROM categories WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *self.inner)
            .await
            .map_err(StoreError::Database)?;
        row.as_ref().map(category_from_row).transpose()
    }

    pub async fn upsert_category(&mut self, row: &Category) -> Result<UpsertResult, StoreError> {
        let existed = self.get_category(&row.id).await?.is_some();
        let path_to_root = serde_json::to_string(&row.path_to_root)?;
        sqlx::query(
            r"
            INSERT INTO categories (id, updated_at, version, is_deleted, data_json, name, image_url, parent_category_id, is_top_level, path_to_root)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                updated_at = excluded.updated_at,
                version = excluded.version,
                is_deleted = excluded.is_deleted,
                data_json = excluded.data_json,
                name = excluded.name,
                image_url = excluded.image_url,
                parent_category_id = excluded.parent_category_id,
                is_top_level = excluded.is_top_level,
                path_to_root = excluded.path_to_root
            ",
        )
        .bind(&row.id)
        .bind(&row.updated_at)
        .bind(row.version)
        .bind(row.is_deleted)
        .bind(&row.data_json)
        .bind(&row.name)
        .bind(&row.image_url)
        .bind(&row.parent_category_id)
        .bind(row.is_top_level)
        .bind(path_to_root)
        .execute(&mut *self.inner)
        .await
        .map_err(StoreError::Database)?;

        Ok(if existed { UpsertResult::Updated } else { UpsertResult::Inserted })
    }

    pub async fn delete_category(&mut self, id: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM categories WHERE id = ?")
            .bind(id)
            .execute(&mut *self.inner)
            .await
            .map_err(StoreError::Database)?;
        Ok(result.rows_affected() > 0)
    }

    // ---- Item ----------------------------------------------------------

    pub async fn get_item(&mut self, id: &str) -> Result<Option<Item>, StoreError> {
        let row = sqlx::query("SELECT * FROM items WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *self.inner)
            .await
            .map_err(StoreError::Database)?;
        row.as_ref().map(item_from_row).transpose()
    }

    pub async fn upsert_item(&mut self, row: &Item) -> Result<UpsertResult, StoreError> {
        let existed = self.get_item(&row.id).await?.is_some();
        let tax_ids = serde_json::to_string(&row.tax_ids)?;
        let modifier_list_ids = serde_json::to_string(&row.modifier_list_ids)?;
        let image_ids = serde_json::to_string(&row.image_ids)?;

        sqlx::query(
            r"
            INSERT INTO items (
                id, updated_at, version, is_deleted, data_json, name, description, abbreviation,
                label_color, category_id, reporting_category_id, present_at_all_locations,
                available_online, available_for_pickup, available_electronically,
                tax_ids, modifier_list_ids, image_ids
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                updated_at = excluded.updated_at,
                version = excluded.version,
                is_deleted = excluded.is_deleted,
                data_json = excluded.data_json,
                name = excluded.name,
                description = excluded.description,
                abbreviation = excluded.abbreviation,
                label_color = excluded.label_color,
                category_id = excluded.category_id,
                reporting_category_id = excluded.reporting_category_id,
                present_at_all_locations = excluded.present_at_all_locations,
                available_online = excluded.available_online,
                available_for_pickup = excluded.available_for_pickup,
                available_electronically = excluded.available_electronically,
                tax_ids = excluded.tax_ids,
                modifier_list_ids = excluded.modifier_list_ids,
                image_ids = excluded.image_ids
            ",
        )
        .bind(&row.id)
        .bind(&row.updated_at)
        .bind(row.version)
        .bind(row.is_deleted)
        .bind(&row.data_json)
        .bind(&row.name)
        .bind(&row.description)
        .bind(&row.abbreviation)
        .bind(&row.label_color)
        .bind(&row.category_id)
        .bind(&row.reporting_category_id)
        .bind(row.present_at_all_locations)
        .bind(row.available_online)
        .bind(row.available_for_pickup)
        .bind(row.available_electronically)
        .bind(tax_ids)
        .bind(modifier_list_ids)
        .bind(image_ids)
        .execute(&mut *self.inner)
        .await
        .map_err(StoreError::Database)?;

        Ok(if existed { UpsertResult::Updated } else { UpsertResult::Inserted })
    }

    pub async fn delete_item(&mut self, id: &str) -> Result<bool, StoreError> {
        sqlx::query("DELETE FROM item_variations WHERE item_id = ?")
            .bind(id)
            .execute(&mut *self.inner)
            .await
            .map_err(StoreError::Database)?;
        let result = sqlx::query("DELETE FROM items WHERE id = ?")
            .bind(id)
            .execute(&mut *self.inner)
            .await
            .map_err(StoreError::Database)?;
        Ok(result.rows_affected() > 0)
    }

    // ---- ItemVariation ---------------------------------------------------

    pub async fn get_item_variation(&mut self, id: &str) -> Result<Option<ItemVariation>, StoreError> {
        let row = sqlx::query("SELECT * FROM item_variations WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *self.inner)
            .await
            .map_err(StoreError::Database)?;
        row.as_ref().map(item_variation_from_row).transpose()
    }

    pub async fn upsert_item_variation(
        &mut self,
        row: &ItemVariation,
    ) -> Result<UpsertResult, StoreError> {
        let existed = self.get_item_variation(&row.id).await?.is_some();
        let overrides = serde_json::to_string(&row.location_overrides)?;

        sqlx::query(
            r"
            INSERT INTO item_variations (
                id, updated_at, version, is_deleted, data_json, item_id, name, sku, upc, ordinal,
                pricing_type, price_amount, price_currency, measurement_unit_id, sellable,
                stockable, location_overrides
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                updated_at = excluded.updated_at,
                version = excluded.version,
                is_deleted = excluded.is_deleted,
                data_json = excluded.data_json,
                item_id = excluded.item_id,
                name = excluded.name,
                sku = excluded.sku,
                upc = excluded.upc,
                ordinal = excluded.ordinal,
                pricing_type = excluded.pricing_type,
                price_amount = excluded.price_amount,
                price_currency = excluded.price_currency,
                measurement_unit_id = excluded.measurement_unit_id,
                sellable = excluded.sellable,
                stockable = excluded.stockable,
                location_overrides = excluded.location_overrides
            ",
        )
        .bind(&row.id)
        .bind(&row.updated_at)
        .bind(row.version)
        .bind(row.is_deleted)
        .bind(&row.data_json)
        .bind(&row.item_id)
        .bind(&row.name)
        .bind(&row.sku)
        .bind(&row.upc)
        .bind(row.ordinal)
        .bind(&row.pricing_type)
        .bind(row.price_amount)
        .bind(&row.price_currency)
        .bind(&row.measurement_unit_id)
        .bind(row.sellable)
        .bind(row.stockable)
        .bind(overrides)
        .execute(&mut *self.inner)
        .await
        .map_err(StoreError::Database)?;

        Ok(if existed { UpsertResult::Updated } else { UpsertResult::Inserted })
    }

    pub async fn delete_item_variation(&mut self, id: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM item_variations WHERE id = ?")
            .bind(id)
            .execute(&mut *self.inner)
            .await
            .map_err(StoreError::Database)?;
        Ok(result.rows_affected() > 0)
    }

    // ---- Tax -------------------------------------------------------------

    pub async fn get_tax(&mut self, id: &str) -> Result<Option<Tax>, StoreError> {
        let row = sqlx::query("SELECT * FROM taxes WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *self.inner)
            .await
            .map_err(StoreError::Database)?;
        row.as_ref().map(tax_from_row).transpose()
    }

    pub async fn upsert_tax(&mut self, row: &Tax) -> Result<UpsertResult, StoreError> {
        let existed = self.get_tax(&row.id).await?.is_some();
        sqlx::query(
            r"
            INSERT INTO taxes (id, updated_at, version, is_deleted, data_json, name, calculation_phase, inclusion_type, percentage, enabled, applies_to_custom_amounts)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                updated_at = excluded.updated_at, version = excluded.version, is_deleted = excluded.is_deleted,
                data_json = excluded.data_json, name = excluded.name, calculation_phase = excluded.calculation_phase,
                inclusion_type = excluded.inclusion_type, percentage = excluded.percentage,
                enabled = excluded.enabled, applies_to_custom_amounts = excluded.applies_to_custom_amounts
            ",
        )
        .bind(&row.id)
        .bind(&row.updated_at)
        .bind(row.version)
        .bind(row.is_deleted)
        .bind(&row.data_json)
        .bind(&row.name)
        .bind(&row.calculation_phase)
        .bind(&row.inclusion_type)
        .bind(&row.percentage)
        .bind(row.enabled)
        .bind(row.applies_to_custom_amounts)
        .execute(&mut *self.inner)
        .await
        .map_err(StoreError::Database)?;

        Ok(if existed { UpsertResult::Updated } else { UpsertResult::Inserted })
    }

    pub async fn delete_tax(&mut self, id: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM taxes WHERE id = ?")
            .bind(id)
            .execute(&mut *self.inner)
            .await
            .map_err(StoreError::Database)?;
        Ok(result.rows_affected() > 0)
    }

    // ---- Discount ----------------------------------------------------------

    pub async fn get_discount(&mut self, id: &str) -> Result<Option<Discount>, StoreError> {
        let row = sqlx::query("SELECT * FROM discounts WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *self.inner)
            .await
            .map_err(StoreError::Database)?;
        row.as_ref().map(discount_from_row).transpose()
    }

    pub async fn upsert_discount(&mut self, row: &Discount) -> Result<UpsertResult, StoreError> {
        let existed = self.get_discount(&row.id).await?.is_some();
        let (amount_amount, amount_currency) = match &row.amount {
            Some(money) => (Some(money.amount), Some(money.currency.clone())),
            None => (None, None),
        };

        sqlx::query(
            r"
            INSERT INTO discounts (id, updated_at, version, is_deleted, data_json, name, discount_type, percentage, amount_amount, amount_currency)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                updated_at = excluded.updated_at, version = excluded.version, is_deleted = excluded.is_deleted,
                data_json = excluded.data_json, name = excluded.name, discount_type = excluded.discount_type,
                percentage = excluded.percentage, amount_amount = excluded.amount_amount, amount_currency = excluded.amount_currency
            ",
        )
        .bind(&row.id)
        .bind(&row.updated_at)
        .bind(row.version)
        .bind(row.is_deleted)
        .bind(&row.data_json)
        .bind(&row.name)
        .bind(&row.discount_type)
        .bind(&row.percentage)
        .bind(amount_amount)
        .bind(amount_currency)
        .execute(&mut *self.inner)
        .await
        .map_err(StoreError::Database)?;

        Ok(if existed { UpsertResult::Updated } else { UpsertResult::Inserted })
    }

    pub async fn delete_discount(&mut self, id: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM discounts WHERE id = ?")
            .bind(id)
            .execute(&mut *self.inner)
            .await
            .map_err(StoreError::Database)?;
        Ok(result.rows_affected() > 0)
    }

    // ---- ModifierList ----------------------------------------------------

    pub async fn get_modifier_list(&mut self, id: &str) -> Result<Option<ModifierList>, StoreError> {
        let row = sqlx::query("SELECT * FROM modifier_lists WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *self.inner)
            .await
            .map_err(StoreError::Database)?;
        row.as_ref().map(modifier_list_from_row).transpose()
    }

    pub async fn upsert_modifier_list(
        &mut self,
        row: &ModifierList,
    ) -> Result<UpsertResult, StoreError> {
        let existed = self.get_modifier_list(&row.id).await?.is_some();
        let modifier_ids = serde_json::to_string(&row.modifier_ids)?;
        let selection_type = match row.selection_type {
            SelectionType::Single => "SINGLE",
            SelectionType::Multiple => "MULTIPLE",
        };

        sqlx::query(
            r"
            INSERT INTO modifier_lists (id, updated_at, version, is_deleted, data_json, name, selection_type, ordinal, modifier_ids)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                updated_at = excluded.updated_at, version = excluded.version, is_deleted = excluded.is_deleted,
                data_json = excluded.data_json, name = excluded.name, selection_type = excluded.selection_type,
                ordinal = excluded.ordinal, modifier_ids = excluded.modifier_ids
            ",
        )
        .bind(&row.id)
        .bind(&row.updated_at)
        .bind(row.version)
        .bind(row.is_deleted)
        .bind(&row.data_json)
        .bind(&row.name)
        .bind(selection_type)
        .bind(row.ordinal)
        .bind(modifier_ids)
        .execute(&mut *self.inner)
        .await
        .map_err(StoreError::Database)?;

        Ok(if existed { UpsertResult::Updated } else { UpsertResult::Inserted })
    }

    pub async fn delete_modifier_list(&mut self, id: &str) -> Result<bool, StoreError> {
        sqlx::query("DELETE FROM modifiers WHERE modifier_list_id = ?")
            .bind(id)
            .execute(&mut *self.inner)
            .await
            .map_err(StoreError::Database)?;
        let result = sqlx::query("DELETE FROM modifier_lists WHERE id = ?")
            .bind(id)
            .execute(&mut *self.inner)
            .await
            .map_err(StoreError::Database)?;
        Ok(result.rows_affected() > 0)
    }

    // ---- Modifier ----------------------------------------------------------

    pub async fn get_modifier(&mut self, id: &str) -> Result<Option<Modifier>, StoreError> {
        let row = sqlx::query("SELECT * FROM modifiers WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *self.inner)
            .await
            .map_err(StoreError::Database)?;
        row.as_ref().map(modifier_from_row).transpose()
    }

    pub async fn upsert_modifier(&mut self, row: &Modifier) -> Result<UpsertResult, StoreError> {
        let existed = self.get_modifier(&row.id).await?.is_some();
        sqlx::query(
            r"
            INSERT INTO modifiers (id, updated_at, version, is_deleted, data_json, modifier_list_id, name, price_amount, price_currency, ordinal, on_by_default)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                updated_at = excluded.updated_at, version = excluded.version, is_deleted = excluded.is_deleted,
                data_json = excluded.data_json, modifier_list_id = excluded.modifier_list_id, name = excluded.name,
                price_amount = excluded.price_amount, price_currency = excluded.price_currency,
                ordinal = excluded.ordinal, on_by_default = excluded.on_by_default
            ",
        )
        .bind(&row.id)
        .bind(&row.updated_at)
        .bind(row.version)
        .bind(row.is_deleted)
        .bind(&row.data_json)
        .bind(&row.modifier_list_id)
        .bind(&row.name)
        .bind(row.price_amount)
        .bind(&row.price_currency)
        .bind(row.ordinal)
        .bind(row.on_by_default)
        .execute(&mut *self.inner)
        .await
        .map_err(StoreError::Database)?;

        Ok(if existed { UpsertResult::Updated } else { UpsertResult::Inserted })
    }

    pub async fn delete_modifier(&mut self, id: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM modifiers WHERE id = ?")
            .bind(id)
            .execute(&mut *self.inner)
            .await
            .map_err(StoreError::Database)?;
        Ok(result.rows_affected() > 0)
    }

    // ---- Image -------------------------------------------------------------

    pub async fn get_image(&mut self, id: &str) -> Result<Option<Image>, StoreError> {
        let row = sqlx::query("SELECT * FROM images WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *self.inner)
            .await
            .map_err(StoreError::Database)?;
        row.as_ref().map(image_from_row).transpose()
    }

    pub async fn upsert_image(&mut self, row: &Image) -> Result<UpsertResult, StoreError> {
        let existed = self.get_image(&row.id).await?.is_some();
        sqlx::query(
            r"
            INSERT INTO images (id, updated_at, version, is_deleted, data_json, name, url, caption)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                updated_at = excluded.updated_at, version = excluded.version, is_deleted = excluded.is_deleted,
                data_json = excluded.data_json, name = excluded.name, url = excluded.url, caption = excluded.caption
            ",
        )
        .bind(&row.id)
        .bind(&row.updated_at)
        .bind(row.version)
        .bind(row.is_deleted)
        .bind(&row.data_json)
        .bind(&row.name)
        .bind(&row.url)
        .bind(&row.caption)
        .execute(&mut *self.inner)
        .await
        .map_err(StoreError::Database)?;

        Ok(if existed { UpsertResult::Updated } else { UpsertResult::Inserted })
    }

    pub async fn delete_image(&mut self, id: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM images WHERE id = ?")
            .bind(id)
            .execute(&mut *self.inner)
            .await
            .map_err(StoreError::Database)?;
        Ok(result.rows_affected() > 0)
    }

    // ---- InventoryCount ----------------------------------------------------

    /// Unconditional upsert, keyed by the composite id. Inventory counts
    /// have no independent `version` field on the wire (§4.9), so there is
    /// no version gate here: `updated_at` records recency.
    pub async fn upsert_inventory_count(
        &mut self,
        row: &InventoryCount,
    ) -> Result<UpsertResult, StoreError> {
        let composite_id = row.composite_id();
        let existing = sqlx::query("SELECT 1 FROM inventory_counts WHERE composite_id = ?")
            .bind(&composite_id)
            .fetch_optional(&mut *self.inner)
            .await
            .map_err(StoreError::Database)?
            .is_some();

        sqlx::query(
            r"
            INSERT INTO inventory_counts (composite_id, variation_id, location_id, state, quantity, calculated_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(composite_id) DO UPDATE SET
                quantity = excluded.quantity,
                calculated_at = excluded.calculated_at,
                updated_at = excluded.updated_at
            ",
        )
        .bind(&composite_id)
        .bind(&row.variation_id)
        .bind(&row.location_id)
        .bind(&row.state)
        .bind(&row.quantity)
        .bind(&row.calculated_at)
        .bind(&row.updated_at)
        .execute(&mut *self.inner)
        .await
        .map_err(StoreError::Database)?;

        Ok(if existing { UpsertResult::Updated } else { UpsertResult::Inserted })
    }

    // ---- Cross-kind operations ----------------------------------------------

    /// All ids currently stored for `kind`, used by cleanup (§4.3) to find
    /// ids absent from a full listing.
    pub async fn all_ids_of_kind(&mut self, kind: Kind) -> Result<HashSet<String>, StoreError> {
        let table = table_name(kind);
        let query = format!("SELECT id FROM {table}");
        let rows = sqlx::query(&query)
            .fetch_all(&mut *self.inner)
            .await
            .map_err(StoreError::Database)?;
        rows.iter()
            .map(|row| row.try_get::<String, _>("id").map_err(StoreError::Database))
            .collect()
    }

    /// Destructive reset: deletes every row in reverse dependency order.
    /// Post-condition: `count(items) == 0` (and likewise for every table).
    pub async fn clear_all(&mut self) -> Result<(), StoreError> {
        for table in [
            "modifiers",
            "modifier_lists",
            "item_variations",
            "items",
            "categories",
            "taxes",
            "discounts",
            "images",
            "inventory_counts",
        ] {
            sqlx::query(&format!("DELETE FROM {table}"))
                .execute(&mut *self.inner)
                .await
                .map_err(StoreError::Database)?;
        }
        Ok(())
    }

    pub async fn get_sync_status(&mut self) -> Result<SyncStatus, StoreError> {
        let row = sqlx::query("SELECT * FROM sync_status WHERE id = 1")
            .fetch_optional(&mut *self.inner)
            .await
            .map_err(StoreError::Database)?;
        match row {
            Some(row) => sync_status_from_row(&row),
            None => Ok(SyncStatus::default()),
        }
    }

    pub async fn put_sync_status(&mut self, status: &SyncStatus) -> Result<(), StoreError> {
        sqlx::query(
            r"
            INSERT INTO sync_status (id, last_full_sync_at, last_incremental_sync_at, in_flight, last_cursor, attempt_count, last_error, progress_current, progress_total)
            VALUES (1, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                last_full_sync_at = excluded.last_full_sync_at,
                last_incremental_sync_at = excluded.last_incremental_sync_at,
                in_flight = excluded.in_flight,
                last_cursor = excluded.last_cursor,
                attempt_count = excluded.attempt_count,
                last_error = excluded.last_error,
                progress_current = excluded.progress_current,
                progress_total = excluded.progress_total
            ",
        )
        .bind(&status.last_full_sync_at)
        .bind(&status.last_incremental_sync_at)
        .bind(status.in_flight)
        .bind(&status.last_cursor)
        .bind(status.attempt_count)
        .bind(&status.last_error)
        .bind(status.progress_current)
        .bind(status.progress_total)
        .execute(&mut *self.inner)
        .await
        .map_err(StoreError::Database)?;
        Ok(())
    }
}

fn table_name(kind: Kind) -> &'static str {
    match kind {
        Kind::Category => "categories",
        Kind::Item => "items",
        Kind::ItemVariation => "item_variations",
        Kind::Tax => "taxes",
        Kind::Discount => "discounts",
        Kind::ModifierList => "modifier_lists",
        Kind::Modifier => "modifiers",
        Kind::Image => "images",
        Kind::InventoryCount => "inventory_counts",
    }
}

fn category_from_row(row: &SqliteRow) -> Result<Category, StoreError> {
    let path_to_root: String = row.try_get("path_to_root")?;
    Ok(Category {
        id: row.try_get("id")?,
        updated_at: row.try_get("updated_at")?,
        version: row.try_get("version")?,
        is_deleted: row.try_get("is_deleted")?,
        data_json: row.try_get("data_json")?,
        name: row.try_get("name")?,
        image_url: row.try_get("image_url")?,
        parent_category_id: row.try_get("parent_category_id")?,
        is_top_level: row.try_get("is_top_level")?,
        path_to_root: serde_json::from_str::<Vec<CategoryRef>>(&path_to_root)?,
    })
}

fn item_from_row(row: &SqliteRow) -> Result<Item, StoreError> {
    let tax_ids: String = row.try_get("tax_ids")?;
    let modifier_list_ids: String = row.try_get("modifier_list_ids")?;
    let image_ids: String = row.try_get("image_ids")?;
    Ok(Item {
        id: row.try_get("id")?,
        updated_at: row.try_get("updated_at")?,
        version: row.try_get("version")?,
        is_deleted: row.try_get("is_deleted")?,
        data_json: row.try_get("data_json")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        abbreviation: row.try_get("abbreviation")?,
        label_color: row.try_get("label_color")?,
        category_id: row.try_get("category_id")?,
        reporting_category_id: row.try_get("reporting_category_id")?,
        present_at_all_locations: row.try_get("present_at_all_locations")?,
        available_online: row.try_get("available_online")?,
        available_for_pickup: row.try_get("available_for_pickup")?,
        available_electronically: row.try_get("available_electronically")?,
        tax_ids: serde_json::from_str(&tax_ids)?,
        modifier_list_ids: serde_json::from_str(&modifier_list_ids)?,
        image_ids: serde_json::from_str(&image_ids)?,
    })
}

fn item_variation_from_row(row: &SqliteRow) -> Result<ItemVariation, StoreError> {
    let overrides: String = row.try_get("location_overrides")?;
    Ok(ItemVariation {
        id: row.try_get("id")?,
        updated_at: row.try_get("updated_at")?,
        version: row.try_get("version")?,
        is_deleted: row.try_get("is_deleted")?,
        data_json: row.try_get("data_json")?,
        item_id: row.try_get("item_id")?,
        name: row.try_get("name")?,
        sku: row.try_get("sku")?,
        upc: row.try_get("upc")?,
        ordinal: row.try_get("ordinal")?,
        pricing_type: row.try_get("pricing_type")?,
        price_amount: row.try_get("price_amount")?,
        price_currency: row.try_get("price_currency")?,
        measurement_unit_id: row.try_get("measurement_unit_id")?,
        sellable: row.try_get("sellable")?,
        stockable: row.try_get("stockable")?,
        location_overrides: serde_json::from_str::<Vec<LocationOverride>>(&overrides)?,
    })
}

fn tax_from_row(row: &SqliteRow) -> Result<Tax, StoreError> {
    Ok(Tax {
        id: row.try_get("id")?,
        updated_at: row.try_get("updated_at")?,
        version: row.try_get("version")?,
        is_deleted: row.try_get("is_deleted")?,
        data_json: row.try_get("data_json")?,
        name: row.try_get("name")?,
        calculation_phase: row.try_get("calculation_phase")?,
        inclusion_type: row.try_get("inclusion_type")?,
        percentage: row.try_get("percentage")?,
        enabled: row.try_get("enabled")?,
        applies_to_custom_amounts: row.try_get("applies_to_custom_amounts")?,
    })
}

fn discount_from_row(row: &SqliteRow) -> Result<Discount, StoreError> {
    let amount_amount: Option<i64> = row.try_get("amount_amount")?;
    let amount_currency: Option<String> = row.try_get("amount_currency")?;
    let amount = match (amount_amount, amount_currency) {
        (Some(amount), Some(currency)) => Some(Money { amount, currency }),
        _ => None,
    };

    Ok(Discount {
        id: row.try_get("id")?,
        updated_at: row.try_get("updated_at")?,
        version: row.try_get("version")?,
        is_deleted: row.try_get("is_deleted")?,
        data_json: row.try_get("data_json")?,
        name: row.try_get("name")?,
        discount_type: row.try_get("discount_type")?,
        percentage: row.try_get("percentage")?,
        amount,
    })
}

fn modifier_list_from_row(row: &SqliteRow) -> Result<ModifierList, StoreError> {
    let modifier_ids: String = row.try_get("modifier_ids")?;
    let selection_type: String = row.try_get("selection_type")?;
    Ok(ModifierList {
        id: row.try_get("id")?,
        updated_at: row.try_get("updated_at")?,
        version: row.try_get("version")?,
        is_deleted: row.try_get("is_deleted")?,
        data_json: row.try_get("data_json")?,
        name: row.try_get("name")?,
        selection_type: if selection_type == "MULTIPLE" {
            SelectionType::Multiple
        } else {
            SelectionType::Single
        },
        ordinal: row.try_get("ordinal")?,
        modifier_ids: serde_json::from_str(&modifier_ids)?,
    })
}

fn modifier_from_row(row: &SqliteRow) -> Result<Modifier, StoreError> {
    Ok(Modifier {
        id: row.try_get("id")?,
        updated_at: row.try_get("updated_at")?,
        version: row.try_get("version")?,
        is_deleted: row.try_get("is_deleted")?,
        data_json: row.try_get("data_json")?,
        modifier_list_id: row.try_get("modifier_list_id")?,
        name: row.try_get("name")?,
        price_amount: row.try_get("price_amount")?,
        price_currency: row.try_get("price_currency")?,
        ordinal: row.try_get("ordinal")?,
        on_by_default: row.try_get("on_by_default")?,
    })
}

fn image_from_row(row: &SqliteRow) -> Result<Image, StoreError> {
    Ok(Image {
        id: row.try_get("id")?,
        updated_at: row.try_get("updated_at")?,
        version: row.try_get("version")?,
        is_deleted: row.try_get("is_deleted")?,
        data_json: row.try_get("data_json")?,
        name: row.try_get("name")?,
        url: row.try_get("url")?,
        caption: row.try_get("caption")?,
    })
}

fn sync_status_from_row(row: &SqliteRow) -> Result<SyncStatus, StoreError> {
    Ok(SyncStatus {
        last_full_sync_at: row.try_get("last_full_sync_at")?,
        last_incremental_sync_at: row.try_get("last_incremental_sync_at")?,
        in_flight: row.try_get("in_flight")?,
        last_cursor: row.try_get("last_cursor")?,
        attempt_count: row.try_get("attempt_count")?,
        last_error: row.try_get("last_error")?,
        progress_current: row.try_get("progress_current")?,
        progress_total: row.try_get("progress_total")?,
    })
}
