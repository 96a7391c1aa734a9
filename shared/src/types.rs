//! Common types used across the platform

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};

pub type AgentId = i64;
pub type BatchId = i64;
pub type AllocationId = i64;
pub type SaleLineId = i64;

/// A number supplied by a client either as a JSON number or as a string
///
/// Point-of-sale clients send quantities and prices typed into text fields,
/// so both forms are accepted and parsed by [`crate::validation`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum LooseNumber {
    Integer(i64),
    Float(f64),
    Text(String),
}

impl From<i64> for LooseNumber {
    fn from(value: i64) -> Self {
        LooseNumber::Integer(value)
    }
}

impl From<&str> for LooseNumber {
    fn from(value: &str) -> Self {
        LooseNumber::Text(value.to_string())
    }
}

/// Pagination parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pagination {
    pub page: u32,
    pub per_page: u32,
}

impl Pagination {
    pub fn new(page: u32, per_page: u32) -> Self {
        Self {
            page: page.max(1),
            per_page: per_page.max(1),
        }
    }

    /// Number of items skipped before this page
    pub fn offset(&self) -> usize {
        (self.page.max(1) as usize - 1) * self.per_page as usize
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: 10,
        }
    }
}

/// Paginated response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginatedResponse<T> {
    pub data: Vec<T>,
    pub pagination: PaginationMeta,
}

/// Pagination metadata
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PaginationMeta {
    pub page: u32,
    pub per_page: u32,
    pub total_items: u64,
    pub total_pages: u32,
}

impl PaginationMeta {
    pub fn new(pagination: &Pagination, total_items: u64) -> Self {
        let per_page = pagination.per_page.max(1) as u64;
        Self {
            page: pagination.page,
            per_page: pagination.per_page,
            total_items,
            total_pages: total_items.div_ceil(per_page) as u32,
        }
    }
}

/// Slice one page out of an already ordered list
pub fn paginate<T>(items: Vec<T>, pagination: &Pagination) -> PaginatedResponse<T> {
    let meta = PaginationMeta::new(pagination, items.len() as u64);
    let data = items
        .into_iter()
        .skip(pagination.offset())
        .take(pagination.per_page as usize)
        .collect();

    PaginatedResponse {
        data,
        pagination: meta,
    }
}

/// Inclusive date range for queries; either end may be open
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateRange {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start.map_or(true, |s| date >= s) && self.end.map_or(true, |e| date <= e)
    }
}

/// Deserialize a present field into `Some`, so that `Option<Option<T>>`
/// can tell "absent" (no change) from `null` (clear the value).
pub fn deserialize_some<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Deserialize::deserialize(deserializer).map(Some)
}
