//! Catalog free-text and filtered search (spec §4.2).

use sqlx::sqlite::SqlitePool;
use sqlx::Row;

use super::StoreError;

/// Narrows a search to an exact field, independent of the free-text `term`.
/// Each field present in `Filters` is applied as its own exact or substring
/// constraint; a query can supply filters with an empty `term` to browse.
#[derive(Debug, Clone, Default)]
pub struct Filters {
    pub name: Option<String>,
    pub sku: Option<String>,
    pub upc: Option<String>,
    pub category: Option<String>,
    pub case_upc: Option<String>,
}

/// Which field produced a [`MatchRow`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchType {
    Name,
    Sku,
    Barcode,
    Category,
}

/// One hit: the item it resolves to, the variation if the match was on a
/// variation-scoped field, and the text that matched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchRow {
    pub item_id: String,
    pub variation_id: Option<String>,
    pub name: String,
    pub match_type: MatchType,
    pub match_context: String,
}

/// Lowercases `term`, splits on whitespace and `-_,.:/\`, drops empty
/// tokens, and dedupes while preserving first-seen order.
#[must_use]
pub fn tokenize(term: &str) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    term.to_lowercase()
        .split(|c: char| c.is_whitespace() || "-_,.:/\\".contains(c))
        .filter(|token| !token.is_empty())
        .filter(|token| seen.insert((*token).to_string()))
        .map(str::to_string)
        .collect()
}

/// A multi-token query matches only if every token is a substring of
/// `haystack` (order-independent); a single-token query is a plain
/// substring match -- the same rule, since `all()` over one token reduces
/// to it.
fn tokens_match(tokens: &[String], haystack: &str) -> bool {
    if tokens.is_empty() {
        return false;
    }
    let haystack = haystack.to_lowercase();
    tokens.iter().all(|token| haystack.contains(token.as_str()))
}

/// Searches items by name and variations by SKU/UPC, applying `filters` and
/// capping at `limit` results. Name matches are returned first, then
/// SKU/barcode matches, then exact case-UPC matches.
pub async fn search(
    pool: &SqlitePool,
    term: &str,
    filters: &Filters,
    limit: u32,
) -> Result<Vec<MatchRow>, StoreError> {
    let tokens = tokenize(term);
    let mut matches = Vec::new();
    let limit = limit as usize;

    let mut query = String::from("SELECT id, name, category_id FROM items WHERE is_deleted = 0");
    if filters.category.is_some() {
        query.push_str(" AND category_id = ?");
    }
    if let Some(name_filter) = &filters.name {
        query.push_str(" AND name LIKE '%' || ? || '%'");
        let _ = name_filter;
    }
    let mut built = sqlx::query(&query);
    if let Some(category) = &filters.category {
        built = built.bind(category);
    }
    if let Some(name_filter) = &filters.name {
        built = built.bind(name_filter);
    }

    if !tokens.is_empty() || filters.name.is_some() {
        let rows = built.fetch_all(pool).await.map_err(StoreError::Database)?;
        for row in &rows {
            let id: String = row.try_get("id").map_err(StoreError::Database)?;
            let name: String = row.try_get("name").map_err(StoreError::Database)?;
            if tokens_match(&tokens, &name) || tokens.is_empty() {
                // With no free-text term the category filter alone drove
                // this row into the result set, so the match reason is the
                // category, not the (untested) name.
                let (match_type, match_context) = if tokens.is_empty() && filters.category.is_some() {
                    (MatchType::Category, filters.category.clone().unwrap_or_default())
                } else {
                    (MatchType::Name, name.clone())
                };
                matches.push(MatchRow {
                    item_id: id,
                    variation_id: None,
                    name,
                    match_type,
                    match_context,
                });
                if matches.len() >= limit {
                    return Ok(matches);
                }
            }
        }
    }

    if !tokens.is_empty() || filters.sku.is_some() || filters.upc.is_some() {
        let rows = sqlx::query(
            r"
            SELECT item_variations.id AS variation_id, item_variations.sku, item_variations.upc,
                   items.id AS item_id, items.name
            FROM item_variations
            JOIN items ON items.id = item_variations.item_id
            WHERE item_variations.is_deleted = 0 AND items.is_deleted = 0
            ",
        )
        .fetch_all(pool)
        .await
        .map_err(StoreError::Database)?;

        for row in &rows {
            let variation_id: String = row.try_get("variation_id").map_err(StoreError::Database)?;
            let item_id: String = row.try_get("item_id").map_err(StoreError::Database)?;
            let name: String = row.try_get("name").map_err(StoreError::Database)?;
            let sku: Option<String> = row.try_get("sku").map_err(StoreError::Database)?;
            let upc: Option<String> = row.try_get("upc").map_err(StoreError::Database)?;

            if let Some(sku) = &sku {
                let filter_hits = filters.sku.as_deref().is_some_and(|f| f == sku);
                if tokens_match(&tokens, sku) || filter_hits {
                    matches.push(MatchRow {
                        item_id: item_id.clone(),
                        variation_id: Some(variation_id.clone()),
                        name: name.clone(),
                        match_type: MatchType::Sku,
                        match_context: sku.clone(),
                    });
                    if matches.len() >= limit {
                        return Ok(matches);
                    }
                }
            }

            if let Some(upc) = &upc {
                let filter_hits = filters.upc.as_deref().is_some_and(|f| f == upc);
                if tokens_match(&tokens, upc) || filter_hits {
                    matches.push(MatchRow {
                        item_id,
                        variation_id: Some(variation_id),
                        name,
                        match_type: MatchType::Barcode,
                        match_context: upc.clone(),
                    });
                    if matches.len() >= limit {
                        return Ok(matches);
                    }
                }
            }
        }
    }

    if let Some(case_upc) = &filters.case_upc {
        let rows = sqlx::query(
            r"
            SELECT DISTINCT items.id, items.name
            FROM items
            JOIN item_variations ON item_variations.item_id = items.id
            WHERE item_variations.upc = ?
            ",
        )
        .bind(case_upc)
        .fetch_all(pool)
        .await
        .map_err(StoreError::Database)?;

        for row in &rows {
            let id: String = row.try_get("id").map_err(StoreError::Database)?;
            let name: String = row.try_get("name").map_err(StoreError::Database)?;
            matches.push(MatchRow {
                item_id: id,
                variation_id: None,
                name,
                match_type: MatchType::Barcode,
                match_context: case_upc.clone(),
            });
            if matches.len() >= limit {
                return Ok(matches);
            }
        }
    }

    matches.truncate(limit);
    Ok(matches)
}
