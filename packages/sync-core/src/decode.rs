//! Decoder/Extractor: turns a wire-shape [`CatalogObject`] into a typed,
//! kind-tagged row (spec §4.6, §3.1).
//!
//! Tolerant of unknown fields by construction (`serde_json::Value` access,
//! never `deny_unknown_fields`); the only explicit failures are a missing
//! top-level `id`, `type`, or `version`, or a required nested payload that
//! a given kind cannot do without (§4.3's "required nested payload absent").

use serde_json::Value;
use thiserror::Error;

use crate::model::{
    Category, CategoryRef, Discount, Image, Item, ItemVariation, Kind, LocationOverride, Modifier,
    ModifierList, Money, SelectionType, Tax,
};
use crate::traits::CatalogObject;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("object is missing required field `{0}`")]
    MissingField(&'static str),
    #[error("object has unrecognized type `{0}`")]
    UnrecognizedKind(String),
    #[error("required nested payload `{0}` is absent")]
    MissingPayload(&'static str),
}

/// A decoded catalog object, tagged by kind. This is the Reconciler's input
/// type: one variant per [`Kind`], each carrying the kind's typed row.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedObject {
    Category(Category),
    Item(Item),
    ItemVariation(ItemVariation),
    Tax(Tax),
    Discount(Discount),
    ModifierList(ModifierList),
    Modifier(Modifier),
    Image(Image),
}

impl DecodedObject {
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            DecodedObject::Category(row) => &row.id,
            DecodedObject::Item(row) => &row.id,
            DecodedObject::ItemVariation(row) => &row.id,
            DecodedObject::Tax(row) => &row.id,
            DecodedObject::Discount(row) => &row.id,
            DecodedObject::ModifierList(row) => &row.id,
            DecodedObject::Modifier(row) => &row.id,
            DecodedObject::Image(row) => &row.id,
        }
    }

    #[must_use]
    pub fn version(&self) -> i64 {
        match self {
            DecodedObject::Category(row) => row.version,
            DecodedObject::Item(row) => row.version,
            DecodedObject::ItemVariation(row) => row.version,
            DecodedObject::Tax(row) => row.version,
            DecodedObject::Discount(row) => row.version,
            DecodedObject::ModifierList(row) => row.version,
            DecodedObject::Modifier(row) => row.version,
            DecodedObject::Image(row) => row.version,
        }
    }

    #[must_use]
    pub fn kind(&self) -> Kind {
        match self {
            DecodedObject::Category(_) => Kind::Category,
            DecodedObject::Item(_) => Kind::Item,
            DecodedObject::ItemVariation(_) => Kind::ItemVariation,
            DecodedObject::Tax(_) => Kind::Tax,
            DecodedObject::Discount(_) => Kind::Discount,
            DecodedObject::ModifierList(_) => Kind::ModifierList,
            DecodedObject::Modifier(_) => Kind::Modifier,
            DecodedObject::Image(_) => Kind::Image,
        }
    }
}

fn str_field(data: &Value, key: &str) -> Option<String> {
    data.get(key)?.as_str().map(str::to_owned)
}

fn bool_field(data: &Value, key: &str) -> Option<bool> {
    data.get(key)?.as_bool()
}

fn i64_field(data: &Value, key: &str) -> Option<i64> {
    data.get(key)?.as_i64()
}

fn string_array_field(data: &Value, key: &str) -> Vec<String> {
    data.get(key)
        .and_then(Value::as_array)
        .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_owned)).collect())
        .unwrap_or_default()
}

/// Decodes one wire-shape [`CatalogObject`] into its typed row.
///
/// `obj.data` is expected to hold the kind-specific nested payload the wire
/// shape names `<type>_data` (spec §6.2); we already receive it unwrapped as
/// `obj.data` since the transport layer strips that nesting when it builds
/// [`CatalogObject`] (see `sync-runtime`'s remote client).
pub fn decode(obj: &CatalogObject) -> Result<DecodedObject, DecodeError> {
    if obj.id.is_empty() {
        return Err(DecodeError::MissingField("id"));
    }
    if obj.kind.is_empty() {
        return Err(DecodeError::MissingField("type"));
    }

    let kind = Kind::from_wire_name(&obj.kind)
        .ok_or_else(|| DecodeError::UnrecognizedKind(obj.kind.clone()))?;

    let data_json = obj.data.to_string();

    Ok(match kind {
        Kind::Category => DecodedObject::Category(decode_category(obj, &data_json)?),
        Kind::Item => DecodedObject::Item(decode_item(obj, &data_json)?),
        Kind::ItemVariation => DecodedObject::ItemVariation(decode_item_variation(obj, &data_json)?),
        Kind::Tax => DecodedObject::Tax(decode_tax(obj, &data_json)?),
        Kind::Discount => DecodedObject::Discount(decode_discount(obj, &data_json)?),
        Kind::ModifierList => DecodedObject::ModifierList(decode_modifier_list(obj, &data_json)?),
        Kind::Modifier => DecodedObject::Modifier(decode_modifier(obj, &data_json)?),
        Kind::Image => DecodedObject::Image(decode_image(obj, &data_json)?),
        Kind::InventoryCount => {
            return Err(DecodeError::UnrecognizedKind(
                "INVENTORY_COUNT arrives through the inventory channel, not the catalog decoder"
                    .to_string(),
            ))
        }
    })
}

fn decode_category(obj: &CatalogObject, data_json: &str) -> Result<Category, DecodeError> {
    let data = &obj.data;
    let name = str_field(data, "name").ok_or(DecodeError::MissingPayload("name"))?;
    let path_to_root = data
        .get("path_to_root")
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(|entry| {
                    Some(CategoryRef {
                        id: str_field(entry, "id")?,
                        name: str_field(entry, "name")?,
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    Ok(Category {
        id: obj.id.clone(),
        updated_at: obj.updated_at.clone(),
        version: obj.version,
        is_deleted: obj.is_deleted,
        data_json: data_json.to_string(),
        name,
        image_url: str_field(data, "image_url"),
        parent_category_id: str_field(data, "parent_category_id"),
        is_top_level: bool_field(data, "is_top_level"),
        path_to_root,
    })
}

fn decode_item(obj: &CatalogObject, data_json: &str) -> Result<Item, DecodeError> {
    let data = &obj.data;
    let name = str_field(data, "name").ok_or(DecodeError::MissingPayload("name"))?;

    Ok(Item {
        id: obj.id.clone(),
        updated_at: obj.updated_at.clone(),
        version: obj.version,
        is_deleted: obj.is_deleted,
        data_json: data_json.to_string(),
        name,
        description: str_field(data, "description"),
        abbreviation: str_field(data, "abbreviation"),
        label_color: str_field(data, "label_color"),
        category_id: str_field(data, "category_id"),
        reporting_category_id: str_field(data, "reporting_category_id"),
        present_at_all_locations: bool_field(data, "present_at_all_locations").unwrap_or(false),
        available_online: bool_field(data, "available_online"),
        available_for_pickup: bool_field(data, "available_for_pickup"),
        available_electronically: bool_field(data, "available_electronically"),
        tax_ids: string_array_field(data, "tax_ids"),
        modifier_list_ids: string_array_field(data, "modifier_list_ids"),
        image_ids: string_array_field(data, "image_ids"),
    })
}

fn decode_item_variation(
    obj: &CatalogObject,
    data_json: &str,
) -> Result<ItemVariation, DecodeError> {
    let data = &obj.data;
    let item_id = str_field(data, "item_id").ok_or(DecodeError::MissingPayload("item_id"))?;

    // Invalid price encoding: upsert with price fields null rather than fail.
    let price_amount = data.get("price_amount").and_then(|v| v.as_i64());
    let price_currency = data.get("price_currency").and_then(|v| v.as_str().map(str::to_owned));

    let location_overrides = data
        .get("location_overrides")
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(|entry| {
                    Some(LocationOverride {
                        location_id: str_field(entry, "location_id")?,
                        price_amount: i64_field(entry, "price_amount"),
                        currency: str_field(entry, "currency"),
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    Ok(ItemVariation {
        id: obj.id.clone(),
        updated_at: obj.updated_at.clone(),
        version: obj.version,
        is_deleted: obj.is_deleted,
        data_json: data_json.to_string(),
        item_id,
        name: str_field(data, "name"),
        sku: str_field(data, "sku"),
        upc: str_field(data, "upc"),
        ordinal: i64_field(data, "ordinal"),
        pricing_type: str_field(data, "pricing_type"),
        price_amount,
        price_currency,
        measurement_unit_id: str_field(data, "measurement_unit_id"),
        sellable: bool_field(data, "sellable"),
        stockable: bool_field(data, "stockable"),
        location_overrides,
    })
}

fn decode_tax(obj: &CatalogObject, data_json: &str) -> Result<Tax, DecodeError> {
    let data = &obj.data;
    let name = str_field(data, "name").ok_or(DecodeError::MissingPayload("name"))?;

    Ok(Tax {
        id: obj.id.clone(),
        updated_at: obj.updated_at.clone(),
        version: obj.version,
        is_deleted: obj.is_deleted,
        data_json: data_json.to_string(),
        name,
        calculation_phase: str_field(data, "calculation_phase"),
        inclusion_type: str_field(data, "inclusion_type"),
        percentage: str_field(data, "percentage"),
        enabled: bool_field(data, "enabled").unwrap_or(false),
        applies_to_custom_amounts: bool_field(data, "applies_to_custom_amounts").unwrap_or(false),
    })
}

fn decode_discount(obj: &CatalogObject, data_json: &str) -> Result<Discount, DecodeError> {
    let data = &obj.data;
    let name = str_field(data, "name").ok_or(DecodeError::MissingPayload("name"))?;

    let amount = data.get("amount").and_then(|v| {
        Some(Money {
            amount: i64_field(v, "amount")?,
            currency: str_field(v, "currency")?,
        })
    });

    Ok(Discount {
        id: obj.id.clone(),
        updated_at: obj.updated_at.clone(),
        version: obj.version,
        is_deleted: obj.is_deleted,
        data_json: data_json.to_string(),
        name,
        discount_type: str_field(data, "discount_type"),
        percentage: str_field(data, "percentage"),
        amount,
    })
}

fn decode_modifier_list(obj: &CatalogObject, data_json: &str) -> Result<ModifierList, DecodeError> {
    let data = &obj.data;
    let name = str_field(data, "name").ok_or(DecodeError::MissingPayload("name"))?;
    let selection_type = match str_field(data, "selection_type").as_deref() {
        Some("MULTIPLE") => SelectionType::Multiple,
        _ => SelectionType::Single,
    };

    Ok(ModifierList {
        id: obj.id.clone(),
        updated_at: obj.updated_at.clone(),
        version: obj.version,
        is_deleted: obj.is_deleted,
        data_json: data_json.to_string(),
        name,
        selection_type,
        ordinal: i64_field(data, "ordinal"),
        modifier_ids: string_array_field(data, "modifier_ids"),
    })
}

fn decode_modifier(obj: &CatalogObject, data_json: &str) -> Result<Modifier, DecodeError> {
    let data = &obj.data;
    let modifier_list_id =
        str_field(data, "modifier_list_id").ok_or(DecodeError::MissingPayload("modifier_list_id"))?;
    let name = str_field(data, "name").ok_or(DecodeError::MissingPayload("name"))?;

    Ok(Modifier {
        id: obj.id.clone(),
        updated_at: obj.updated_at.clone(),
        version: obj.version,
        is_deleted: obj.is_deleted,
        data_json: data_json.to_string(),
        modifier_list_id,
        name,
        price_amount: i64_field(data, "price_amount"),
        price_currency: str_field(data, "price_currency"),
        ordinal: i64_field(data, "ordinal"),
        on_by_default: bool_field(data, "on_by_default").unwrap_or(false),
    })
}

fn decode_image(obj: &CatalogObject, data_json: &str) -> Result<Image, DecodeError> {
    let data = &obj.data;
    Ok(Image {
        id: obj.id.clone(),
        updated_at: obj.updated_at.clone(),
        version: obj.version,
        is_deleted: obj.is_deleted,
        data_json: data_json.to_string(),
        name: str_field(data, "name"),
        url: str_field(data, "url"),
        caption: str_field(data, "caption"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(kind: &str, data: Value) -> CatalogObject {
        CatalogObject {
            id: "obj-1".into(),
            kind: kind.into(),
            updated_at: "2026-01-01T00:00:00Z".into(),
            version: 1,
            is_deleted: false,
            data,
        }
    }

    #[test]
    fn decodes_item_with_all_array_fields() {
        let obj = object(
            "ITEM",
            json!({
                "name": "Latte",
                "category_id": "cat-1",
                "present_at_all_locations": true,
                "tax_ids": ["tax-1", "tax-2"],
                "modifier_list_ids": ["ml-1"],
                "image_ids": []
            }),
        );
        let decoded = decode(&obj).unwrap();
        match decoded {
            DecodedObject::Item(item) => {
                assert_eq!(item.name, "Latte");
                assert_eq!(item.tax_ids, vec!["tax-1", "tax-2"]);
                assert_eq!(item.modifier_list_ids, vec!["ml-1"]);
                assert!(item.present_at_all_locations);
            }
            _ => panic!("expected Item"),
        }
    }

    #[test]
    fn decodes_category_with_path_to_root() {
        let obj = object(
            "CATEGORY",
            json!({
                "name": "Drinks",
                "path_to_root": [{"id": "root", "name": "All"}, {"id": "cat-1", "name": "Drinks"}]
            }),
        );
        let decoded = decode(&obj).unwrap();
        match decoded {
            DecodedObject::Category(cat) => {
                assert_eq!(cat.path_to_root.len(), 2);
                assert_eq!(cat.path_to_root[1].name, "Drinks");
            }
            _ => panic!("expected Category"),
        }
    }

    #[test]
    fn invalid_price_encoding_upserts_with_null_price() {
        let obj = object(
            "ITEM_VARIATION",
            json!({
                "item_id": "item-1",
                "price_amount": "not-a-number",
            }),
        );
        let decoded = decode(&obj).unwrap();
        match decoded {
            DecodedObject::ItemVariation(variation) => {
                assert_eq!(variation.item_id, "item-1");
                assert!(variation.price_amount.is_none());
            }
            _ => panic!("expected ItemVariation"),
        }
    }

    #[test]
    fn missing_required_nested_payload_is_an_error() {
        let obj = object("ITEM", json!({}));
        let err = decode(&obj).unwrap_err();
        assert!(matches!(err, DecodeError::MissingPayload("name")));
    }

    #[test]
    fn missing_top_level_id_is_an_error() {
        let mut obj = object("ITEM", json!({"name": "x"}));
        obj.id = String::new();
        let err = decode(&obj).unwrap_err();
        assert!(matches!(err, DecodeError::MissingField("id")));
    }

    #[test]
    fn unrecognized_kind_is_an_error() {
        let obj = object("FROBNICATOR", json!({}));
        let err = decode(&obj).unwrap_err();
        assert!(matches!(err, DecodeError::UnrecognizedKind(_)));
    }

    #[test]
    fn unknown_fields_are_tolerated() {
        let obj = object(
            "TAX",
            json!({
                "name": "VAT",
                "enabled": true,
                "applies_to_custom_amounts": false,
                "some_future_field": {"nested": true}
            }),
        );
        assert!(decode(&obj).is_ok());
    }
}
