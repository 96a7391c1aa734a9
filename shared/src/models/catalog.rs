//! Product catalog models

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::{deserialize_some, BatchId, Pagination};

/// One purchased lot of a named product; the central stock pool
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProductBatch {
    pub id: BatchId,
    pub name: String,
    pub description: Option<String>,
    pub color: Option<String>,
    /// Serial number or IMEI, unique across the catalog when present
    pub serial_number: Option<String>,
    pub barcode: Option<String>,
    pub unit_cost_usd: Decimal,
    pub exchange_rate: Decimal,
    pub unit_price: Decimal,
    /// Units still in the central pool, not yet distributed
    pub quantity_remaining: i32,
    /// Quantity registered at purchase time; never changes afterwards
    pub quantity_original: i32,
    pub supplier: Option<String>,
    pub category_id: Option<i64>,
    pub purchased_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A batch together with the active allocations drawn from it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchDetail {
    #[serde(flatten)]
    pub batch: ProductBatch,
    pub allocations: Vec<crate::models::Allocation>,
}

/// How a batch is identified at the point of sale
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum IdentificationKind {
    Serial,
    Barcode,
    Both,
    #[default]
    None,
}

impl IdentificationKind {
    pub fn keeps_serial(&self) -> bool {
        matches!(self, IdentificationKind::Serial | IdentificationKind::Both)
    }

    pub fn keeps_barcode(&self) -> bool {
        matches!(self, IdentificationKind::Barcode | IdentificationKind::Both)
    }
}

/// Input for registering a purchased batch
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterBatchInput {
    pub name: String,
    pub description: Option<String>,
    pub color: Option<String>,
    pub serial_number: Option<String>,
    pub barcode: Option<String>,
    pub unit_cost_usd: Decimal,
    pub exchange_rate: Decimal,
    pub quantity: i32,
    #[serde(default)]
    pub identification: IdentificationKind,
    pub supplier: Option<String>,
    pub category_id: Option<i64>,
}

/// Values for a new catalog row, after validation and pricing
#[derive(Debug, Clone, PartialEq)]
pub struct NewProductBatch {
    pub name: String,
    pub description: Option<String>,
    pub color: Option<String>,
    pub serial_number: Option<String>,
    pub barcode: Option<String>,
    pub unit_cost_usd: Decimal,
    pub exchange_rate: Decimal,
    pub unit_price: Decimal,
    pub quantity: i32,
    pub supplier: Option<String>,
    pub category_id: Option<i64>,
    pub purchased_at: DateTime<Utc>,
}

/// Partial update of a batch
///
/// `None` leaves a field untouched. For nullable columns the inner option
/// distinguishes setting a value from clearing it (`null` in JSON).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BatchUpdate {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub color: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub serial_number: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub barcode: Option<Option<String>>,
    pub unit_cost_usd: Option<Decimal>,
    pub exchange_rate: Option<Decimal>,
    pub unit_price: Option<Decimal>,
    pub quantity_remaining: Option<i32>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub supplier: Option<Option<String>>,
    pub purchased_on: Option<NaiveDate>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub category_id: Option<Option<i64>>,
}

impl BatchUpdate {
    /// Apply the update onto a copy of `batch`. Empty strings clear nullable fields.
    pub fn apply(&self, batch: &ProductBatch) -> ProductBatch {
        let mut next = batch.clone();

        if let Some(name) = self.name.as_ref().filter(|n| !n.trim().is_empty()) {
            next.name = name.trim().to_string();
        }
        if let Some(v) = &self.description {
            next.description = non_blank(v);
        }
        if let Some(v) = &self.color {
            next.color = non_blank(v);
        }
        if let Some(v) = &self.serial_number {
            next.serial_number = non_blank(v);
        }
        if let Some(v) = &self.barcode {
            next.barcode = non_blank(v);
        }
        if let Some(cost) = self.unit_cost_usd {
            next.unit_cost_usd = cost;
        }
        if let Some(rate) = self.exchange_rate {
            next.exchange_rate = rate;
        }
        if let Some(price) = self.unit_price {
            next.unit_price = price;
        }
        if let Some(quantity) = self.quantity_remaining {
            next.quantity_remaining = quantity;
        }
        if let Some(v) = &self.supplier {
            next.supplier = non_blank(v);
        }
        if let Some(date) = self.purchased_on {
            if let Some(at) = date.and_hms_opt(0, 0, 0) {
                next.purchased_at = at.and_utc();
            }
        }
        if let Some(category) = self.category_id {
            next.category_id = category;
        }

        next
    }
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Filters for listing the catalog
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BatchQuery {
    /// Substring match on name, serial number or barcode
    pub search: Option<String>,
    pub purchased_from: Option<NaiveDate>,
    pub purchased_to: Option<NaiveDate>,
    pub category_id: Option<i64>,
    #[serde(default)]
    pub hide_empty: bool,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl BatchQuery {
    /// Requested page, falling back to `default_per_page` and capped at `max_per_page`
    pub fn pagination(&self, default_per_page: u32, max_per_page: u32) -> Pagination {
        Pagination::new(
            self.page.unwrap_or(1),
            self.per_page.unwrap_or(default_per_page).min(max_per_page),
        )
    }

    pub fn matches(&self, batch: &ProductBatch) -> bool {
        if let Some(search) = self.search.as_deref().filter(|s| !s.is_empty()) {
            let needle = search.to_lowercase();
            let hit = batch.name.to_lowercase().contains(&needle)
                || batch
                    .serial_number
                    .as_deref()
                    .is_some_and(|s| s.to_lowercase().contains(&needle))
                || batch
                    .barcode
                    .as_deref()
                    .is_some_and(|b| b.to_lowercase().contains(&needle));
            if !hit {
                return false;
            }
        }

        let purchased_on = batch.purchased_at.date_naive();
        if self.purchased_from.is_some_and(|from| purchased_on < from) {
            return false;
        }
        if self.purchased_to.is_some_and(|to| purchased_on > to) {
            return false;
        }
        if self.category_id.is_some() && batch.category_id != self.category_id {
            return false;
        }
        if self.hide_empty && batch.quantity_remaining <= 0 {
            return false;
        }

        true
    }
}
