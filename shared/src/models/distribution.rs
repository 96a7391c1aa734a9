//! Distribution history models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{AgentId, AllocationId, BatchId};

/// Audit row written each time stock leaves the central pool for an agent
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DistributionHistoryEntry {
    pub id: i64,
    pub batch_id: BatchId,
    pub agent_id: AgentId,
    pub quantity: i32,
    pub distributed_at: DateTime<Utc>,
}

/// History row joined with product and agent details for display
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistributionHistoryView {
    pub id: i64,
    pub batch_id: BatchId,
    pub product_name: String,
    pub color: Option<String>,
    pub serial_number: Option<String>,
    pub barcode: Option<String>,
    pub agent_id: AgentId,
    pub agent_name: String,
    pub quantity: i32,
    pub distributed_at: DateTime<Utc>,
}

/// Input for moving stock from a batch to an agent
#[derive(Debug, Clone, Deserialize)]
pub struct DistributeInput {
    pub batch_id: BatchId,
    pub agent_id: AgentId,
    pub quantity: i32,
}

/// Input for moving stock between two agents
///
/// `key` is resolved against the source agent's active allocations, first as
/// an allocation id and then as a batch id.
#[derive(Debug, Clone, Deserialize)]
pub struct RedistributeInput {
    pub key: i64,
    pub source_agent_id: AgentId,
    pub destination_agent_id: AgentId,
    pub quantity: i32,
}

/// Result of a redistribution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedistributionOutcome {
    pub batch_id: BatchId,
    pub product_name: String,
    pub source_allocation_id: AllocationId,
    pub destination_allocation_id: AllocationId,
    pub destination_agent_name: String,
    pub quantity: i32,
    /// True when the destination had no active allocation of the batch
    pub created_destination: bool,
}
