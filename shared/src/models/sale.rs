//! Sale line and sale group models

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::{AgentId, AllocationId, BatchId, LooseNumber, SaleLineId};

/// One line of a sale, tied to the allocation it was sold from
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SaleLine {
    pub id: SaleLineId,
    /// Shared by every line of one checkout; legacy rows may lack it
    pub sale_group_id: Option<String>,
    pub customer_name: String,
    pub phone: String,
    pub address: String,
    pub customer_type: Option<String>,
    pub notes: Option<String>,
    /// Product name as it was at the time of sale
    pub product_name: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub line_total: Decimal,
    /// Total of the whole checkout, repeated on every line of the group
    pub sale_total: Decimal,
    pub seller_id: AgentId,
    pub seller_name: String,
    pub seller_email: String,
    pub payment_method: String,
    pub pix_amount: Option<Decimal>,
    pub card_amount: Option<Decimal>,
    pub cash_amount: Option<Decimal>,
    pub photo_path: Option<String>,
    pub allocation_id: AllocationId,
    pub transferred: bool,
    pub original_seller: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Customer details captured at checkout
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CustomerInfo {
    pub name: String,
    pub phone: String,
    pub address: String,
    pub customer_type: Option<String>,
    pub notes: Option<String>,
}

/// Payment breakdown captured at checkout
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PaymentInfo {
    #[serde(default)]
    pub method: String,
    pub pix: Option<Decimal>,
    pub card: Option<Decimal>,
    pub cash: Option<Decimal>,
    /// Path of the receipt photo returned by the upload service
    pub photo_path: Option<String>,
}

/// One requested line of a checkout
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaleLineRequest {
    pub allocation_id: AllocationId,
    /// Display name used in error messages
    pub name: Option<String>,
    pub quantity: LooseNumber,
    /// Overrides the batch price when present
    pub custom_price: Option<LooseNumber>,
}

/// Input for recording a checkout
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordSaleInput {
    pub customer: CustomerInfo,
    pub lines: Vec<SaleLineRequest>,
    pub seller_id: AgentId,
    #[serde(default)]
    pub payment: PaymentInfo,
}

/// A validated and priced line, ready to be written
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PricedLine {
    pub allocation_id: AllocationId,
    pub product_name: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub line_total: Decimal,
}

/// Values for a new sale line row
#[derive(Debug, Clone, PartialEq)]
pub struct NewSaleLine {
    pub sale_group_id: String,
    pub customer: CustomerInfo,
    pub payment: PaymentInfo,
    pub line: PricedLine,
    pub sale_total: Decimal,
    pub seller_id: AgentId,
    pub seller_name: String,
    pub seller_email: String,
}

/// Result of recording a checkout
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaleGroupResult {
    pub sale_group_id: String,
    pub customer_name: String,
    pub lines: Vec<RecordedLine>,
    pub sale_total: Decimal,
}

/// A priced line echoed back with the id it was stored under
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordedLine {
    pub sale_line_id: SaleLineId,
    #[serde(flatten)]
    pub line: PricedLine,
}

/// A sale line joined with the identity fields of its batch
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SaleRow {
    pub line: SaleLine,
    pub batch_id: Option<BatchId>,
    pub serial_number: Option<String>,
    pub barcode: Option<String>,
    pub color: Option<String>,
    pub description: Option<String>,
}

/// Filters for the sale history
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SaleFilters {
    pub seller_id: Option<AgentId>,
    /// Substring of the customer name, case-insensitive
    pub customer: Option<String>,
    /// Substring of a serial number or barcode of any line
    pub identity_code: Option<String>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

/// Ordering of sale groups
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SaleSortKey {
    #[default]
    Newest,
    Oldest,
    HighestValue,
    LowestValue,
    Seller,
}

/// All lines of one checkout, as displayed in the history
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SaleGroup {
    pub sale_group_id: String,
    pub customer_name: String,
    pub phone: String,
    pub address: String,
    pub customer_type: Option<String>,
    pub notes: Option<String>,
    pub seller_id: AgentId,
    pub seller_name: String,
    pub seller_email: String,
    pub payment_method: String,
    pub pix_amount: Option<Decimal>,
    pub card_amount: Option<Decimal>,
    pub cash_amount: Option<Decimal>,
    pub photo_path: Option<String>,
    pub transferred: bool,
    pub original_seller: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Sum of the line totals currently in the group
    pub total: Decimal,
    pub lines: Vec<SaleGroupLine>,
}

/// A line inside a [`SaleGroup`]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SaleGroupLine {
    pub id: SaleLineId,
    pub allocation_id: AllocationId,
    pub batch_id: Option<BatchId>,
    pub product_name: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub line_total: Decimal,
    pub serial_number: Option<String>,
    pub barcode: Option<String>,
    pub color: Option<String>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Sales totals for one seller
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SellerSummary {
    pub seller_name: String,
    pub seller_email: String,
    pub sale_count: usize,
    pub total_value: Decimal,
    pub units_sold: i64,
    pub distinct_products: usize,
}

/// Input for replacing the product behind a sale line
#[derive(Debug, Clone, Deserialize)]
pub struct ExchangeInput {
    pub sale_line_id: SaleLineId,
    pub new_allocation_id: AllocationId,
    pub unit_price: Option<Decimal>,
}

/// Result of an exchange
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeOutcome {
    pub sale_line: SaleLine,
    pub previous_product: String,
    pub new_product: String,
    pub quantity: i32,
}

/// Input for reassigning the seller of a sale
#[derive(Debug, Clone, Deserialize)]
pub struct TransferAttributionInput {
    pub new_seller_id: AgentId,
}

/// Result of deleting one line or a whole sale group
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SaleDeletionOutcome {
    pub deleted_line_ids: Vec<SaleLineId>,
    /// Units returned to allocations
    pub restored_units: i64,
    /// Total of the lines left in the group, if any remain
    pub remaining_total: Option<Decimal>,
}
