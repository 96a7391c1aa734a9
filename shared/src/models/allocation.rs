//! Per-agent stock allocation models

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::{AgentId, AllocationId, BatchId};
use crate::Agent;

/// A quantity of one batch held by one agent
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Allocation {
    pub id: AllocationId,
    pub batch_id: BatchId,
    pub agent_id: Option<AgentId>,
    pub quantity: i32,
    /// Inactive allocations are hidden from stock and never decremented again
    pub active: bool,
    /// Agent name as it was when the stock was handed over
    pub agent_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An allocation joined with the batch fields needed to sell from it
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AllocationDetail {
    #[serde(flatten)]
    pub allocation: Allocation,
    pub product_name: String,
    pub unit_price: Decimal,
    pub description: Option<String>,
    pub color: Option<String>,
    pub serial_number: Option<String>,
    pub barcode: Option<String>,
}

impl AllocationDetail {
    pub fn id(&self) -> AllocationId {
        self.allocation.id
    }

    pub fn quantity(&self) -> i32 {
        self.allocation.quantity
    }

    pub fn is_owned_by(&self, agent_id: AgentId) -> bool {
        self.allocation.agent_id == Some(agent_id)
    }
}

/// Code used to look a product up in an agent's stock
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityCode {
    Barcode(String),
    Serial(String),
}

impl IdentityCode {
    pub fn matches(&self, detail: &AllocationDetail) -> bool {
        match self {
            IdentityCode::Barcode(code) => detail.barcode.as_deref() == Some(code.as_str()),
            IdentityCode::Serial(code) => detail.serial_number.as_deref() == Some(code.as_str()),
        }
    }
}

/// Query for finding a product in an agent's stock
#[derive(Debug, Clone, Deserialize)]
pub struct StockLookupQuery {
    pub agent_id: AgentId,
    pub barcode: Option<String>,
    pub serial_number: Option<String>,
}

impl StockLookupQuery {
    /// The code to search by; a serial number wins over a barcode
    pub fn code(&self) -> Option<IdentityCode> {
        let clean = |v: &Option<String>| {
            v.as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };
        clean(&self.serial_number)
            .map(IdentityCode::Serial)
            .or_else(|| clean(&self.barcode).map(IdentityCode::Barcode))
    }
}

/// Stock overview for a single agent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentStock {
    pub agent: Agent,
    pub item_count: usize,
    pub total_quantity: i64,
    pub items: Vec<AllocationDetail>,
}

impl AgentStock {
    pub fn new(agent: Agent, items: Vec<AllocationDetail>) -> Self {
        let total_quantity = items.iter().map(|i| i64::from(i.quantity())).sum();
        Self {
            agent,
            item_count: items.len(),
            total_quantity,
            items,
        }
    }
}
