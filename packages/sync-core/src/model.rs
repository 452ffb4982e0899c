//! Catalog data model (spec §3).
//!
//! Every entity carries `id`, `updated_at`, `version`, `is_deleted`, and the
//! raw `data_json` payload for forward compatibility. Array-valued
//! relationships that the spec calls out as "no FK, to tolerate out-of-order
//! arrival" (`tax_ids`, `modifier_list_ids`, `image_ids`, `modifier_ids`,
//! `path_to_root`, `location_overrides`) are plain `Vec`s here; the Store
//! serializes them to JSON text columns rather than join tables (§3.1).

use serde::{Deserialize, Serialize};

/// Discriminates the eight catalog object kinds the remote can send, plus
/// inventory counts which arrive through a separate channel (§4.9).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Kind {
    Category,
    Item,
    ItemVariation,
    Tax,
    Discount,
    ModifierList,
    Modifier,
    Image,
    InventoryCount,
}

impl Kind {
    /// All catalog kinds fetched by a full sync's `list(types=ALL, ...)`.
    /// `InventoryCount` is excluded: it is never listed, only pushed via
    /// webhook or `InventoryRemote::batch_change` (§4.9).
    pub const ALL_CATALOG: [Kind; 8] = [
        Kind::Category,
        Kind::Item,
        Kind::ItemVariation,
        Kind::Tax,
        Kind::Discount,
        Kind::ModifierList,
        Kind::Modifier,
        Kind::Image,
    ];

    /// The wire-shape `type` discriminant string (spec §6.2).
    #[must_use]
    pub fn wire_name(self) -> &'static str {
        match self {
            Kind::Category => "CATEGORY",
            Kind::Item => "ITEM",
            Kind::ItemVariation => "ITEM_VARIATION",
            Kind::Tax => "TAX",
            Kind::Discount => "DISCOUNT",
            Kind::ModifierList => "MODIFIER_LIST",
            Kind::Modifier => "MODIFIER",
            Kind::Image => "IMAGE",
            Kind::InventoryCount => "INVENTORY_COUNT",
        }
    }

    /// Parses a wire-shape `type` string. Returns `None` for unrecognized
    /// kinds (spec §4.3: "object whose kind is unrecognized: logged, counted
    /// as error, not fatal" -- the caller decides what to do with `None`).
    #[must_use]
    pub fn from_wire_name(name: &str) -> Option<Kind> {
        Some(match name {
            "CATEGORY" => Kind::Category,
            "ITEM" => Kind::Item,
            "ITEM_VARIATION" => Kind::ItemVariation,
            "TAX" => Kind::Tax,
            "DISCOUNT" => Kind::Discount,
            "MODIFIER_LIST" => Kind::ModifierList,
            "MODIFIER" => Kind::Modifier,
            "IMAGE" => Kind::Image,
            "INVENTORY_COUNT" => Kind::InventoryCount,
            _ => return None,
        })
    }
}

/// A `{id, name}` breadcrumb entry in [`Category::path_to_root`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRef {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub updated_at: String,
    pub version: i64,
    pub is_deleted: bool,
    pub data_json: String,

    pub name: String,
    pub image_url: Option<String>,
    pub parent_category_id: Option<String>,
    pub is_top_level: Option<bool>,
    pub path_to_root: Vec<CategoryRef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: String,
    pub updated_at: String,
    pub version: i64,
    pub is_deleted: bool,
    pub data_json: String,

    pub name: String,
    pub description: Option<String>,
    pub abbreviation: Option<String>,
    pub label_color: Option<String>,
    pub category_id: Option<String>,
    pub reporting_category_id: Option<String>,
    pub present_at_all_locations: bool,
    pub available_online: Option<bool>,
    pub available_for_pickup: Option<bool>,
    pub available_electronically: Option<bool>,
    pub tax_ids: Vec<String>,
    pub modifier_list_ids: Vec<String>,
    pub image_ids: Vec<String>,
}

/// A per-location price override on an [`ItemVariation`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationOverride {
    pub location_id: String,
    pub price_amount: Option<i64>,
    pub currency: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemVariation {
    pub id: String,
    pub updated_at: String,
    pub version: i64,
    pub is_deleted: bool,
    pub data_json: String,

    pub item_id: String,
    pub name: Option<String>,
    pub sku: Option<String>,
    pub upc: Option<String>,
    pub ordinal: Option<i64>,
    pub pricing_type: Option<String>,
    pub price_amount: Option<i64>,
    pub price_currency: Option<String>,
    pub measurement_unit_id: Option<String>,
    pub sellable: Option<bool>,
    pub stockable: Option<bool>,
    pub location_overrides: Vec<LocationOverride>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tax {
    pub id: String,
    pub updated_at: String,
    pub version: i64,
    pub is_deleted: bool,
    pub data_json: String,

    pub name: String,
    pub calculation_phase: Option<String>,
    pub inclusion_type: Option<String>,
    pub percentage: Option<String>,
    pub enabled: bool,
    pub applies_to_custom_amounts: bool,
}

/// A fixed-amount discount's `{amount, currency}` pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Money {
    pub amount: i64,
    pub currency: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Discount {
    pub id: String,
    pub updated_at: String,
    pub version: i64,
    pub is_deleted: bool,
    pub data_json: String,

    pub name: String,
    pub discount_type: Option<String>,
    pub percentage: Option<String>,
    pub amount: Option<Money>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SelectionType {
    Single,
    Multiple,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModifierList {
    pub id: String,
    pub updated_at: String,
    pub version: i64,
    pub is_deleted: bool,
    pub data_json: String,

    pub name: String,
    pub selection_type: SelectionType,
    pub ordinal: Option<i64>,
    pub modifier_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Modifier {
    pub id: String,
    pub updated_at: String,
    pub version: i64,
    pub is_deleted: bool,
    pub data_json: String,

    pub modifier_list_id: String,
    pub name: String,
    pub price_amount: Option<i64>,
    pub price_currency: Option<String>,
    pub ordinal: Option<i64>,
    pub on_by_default: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Image {
    pub id: String,
    pub updated_at: String,
    pub version: i64,
    pub is_deleted: bool,
    pub data_json: String,

    pub name: Option<String>,
    pub url: Option<String>,
    pub caption: Option<String>,
}

/// Inventory state discriminant for the `(variation_id, location_id, state)`
/// composite key (e.g. `IN_STOCK`, `SOLD`, `WASTE`). Treated as an opaque
/// string: the remote defines the vocabulary, the store only needs it for
/// uniqueness and lookups.
pub type InventoryState = String;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryCount {
    pub variation_id: String,
    pub location_id: String,
    pub state: InventoryState,
    pub quantity: String,
    pub calculated_at: String,
    pub updated_at: String,
}

impl InventoryCount {
    /// The composite id, per spec §3's invariant:
    /// `variation_id + "_" + location_id + "_" + state`.
    #[must_use]
    pub fn composite_id(&self) -> String {
        composite_inventory_id(&self.variation_id, &self.location_id, &self.state)
    }
}

/// Builds the composite id for an inventory count without needing a full
/// [`InventoryCount`] value (used by lookups that only have the key parts).
#[must_use]
pub fn composite_inventory_id(variation_id: &str, location_id: &str, state: &str) -> String {
    format!("{variation_id}_{location_id}_{state}")
}

/// Singleton row tracking sync progress and timestamps (spec §3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncStatus {
    pub last_full_sync_at: Option<String>,
    pub last_incremental_sync_at: Option<String>,
    pub in_flight: bool,
    pub last_cursor: Option<String>,
    pub attempt_count: i64,
    pub last_error: Option<String>,
    pub progress_current: i64,
    pub progress_total: i64,
}

impl Default for SyncStatus {
    fn default() -> Self {
        Self {
            last_full_sync_at: None,
            last_incremental_sync_at: None,
            in_flight: false,
            last_cursor: None,
            attempt_count: 0,
            last_error: None,
            progress_current: 0,
            progress_total: 0,
        }
    }
}
