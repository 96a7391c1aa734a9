//! Distribution engine: moves stock from the central pool to agents and
//! between agents

use std::sync::Arc;

use shared::{checked_deposit, checked_withdraw};

use crate::error::{AppError, AppResult};
use crate::models::{
    AgentId, Allocation, AllocationDetail, DateRange, DistributeInput, DistributionHistoryView,
    RedistributeInput, RedistributionOutcome,
};
use crate::store::{StockStore, StockTx};

/// Distribution service for batch and agent-to-agent transfers
#[derive(Clone)]
pub struct DistributionService {
    store: Arc<dyn StockStore>,
}

impl DistributionService {
    pub fn new(store: Arc<dyn StockStore>) -> Self {
        Self { store }
    }

    /// Hand `quantity` units of a batch to an agent as a new allocation
    ///
    /// A new allocation is created on every call, even when the agent already
    /// holds the batch.
    pub async fn distribute(&self, input: DistributeInput) -> AppResult<Allocation> {
        require_positive(input.quantity)?;

        let mut tx = self.store.begin().await?;

        let batch = tx
            .lock_batch(input.batch_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Batch {}", input.batch_id)))?;
        let agent = tx
            .find_agent(input.agent_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Agent {}", input.agent_id)))?;

        let remaining = checked_withdraw(batch.quantity_remaining, input.quantity)
            .map_err(|e| AppError::from_quantity(&format!("Batch {}", batch.name), e))?;

        let allocation = tx.insert_allocation(batch.id, &agent, input.quantity).await?;
        tx.set_batch_remaining(batch.id, remaining).await?;
        tx.insert_distribution(batch.id, agent.id, input.quantity)
            .await?;

        tx.commit().await?;

        tracing::info!(
            batch_id = batch.id,
            agent_id = agent.id,
            allocation_id = allocation.id,
            quantity = input.quantity,
            "Stock distributed"
        );

        Ok(allocation)
    }

    /// Move stock from one agent to another
    ///
    /// The destination's active allocation of the same batch is topped up, or
    /// a new one is created. No distribution history entry is written, since
    /// the central pool is untouched.
    pub async fn redistribute(&self, input: RedistributeInput) -> AppResult<RedistributionOutcome> {
        require_positive(input.quantity)?;
        if input.source_agent_id == input.destination_agent_id {
            return Err(AppError::invalid(
                "destination_agent_id",
                "Source and destination agents must differ",
                "O agente de origem e o de destino devem ser diferentes",
            ));
        }

        let mut tx = self.store.begin().await?;

        let destination_agent = tx
            .find_agent(input.destination_agent_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("Agent {}", input.destination_agent_id))
            })?;

        let source = resolve_source(tx.as_mut(), input.key, input.source_agent_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!(
                    "Allocation {} of agent {}",
                    input.key, input.source_agent_id
                ))
            })?;
        let destination = tx
            .find_active_allocation_for(source.allocation.batch_id, destination_agent.id)
            .await?;

        // Lock both ends in ascending id order, then re-read the locked state
        let mut ids = vec![source.id()];
        if let Some(dest) = &destination {
            ids.push(dest.id());
        }
        ids.sort_unstable();
        let mut source_locked = None;
        let mut destination_locked = None;
        for id in ids {
            let locked = tx.lock_allocation(id).await?;
            if id == source.id() {
                source_locked = locked;
            } else {
                destination_locked = locked;
            }
        }

        let source = source_locked
            .filter(|s| s.allocation.active && s.is_owned_by(input.source_agent_id))
            .ok_or_else(|| AppError::NotFound(format!("Allocation {}", source.id())))?;
        let destination = destination_locked
            .filter(|d| d.allocation.active && d.is_owned_by(destination_agent.id));

        let source_left = checked_withdraw(source.quantity(), input.quantity)
            .map_err(|e| AppError::from_quantity(&format!("Allocation {}", source.id()), e))?;
        tx.set_allocation_quantity(source.id(), source_left).await?;

        let (destination_allocation_id, created_destination) = match destination {
            Some(dest) => {
                let topped_up = checked_deposit(dest.quantity(), input.quantity).map_err(|e| {
                    AppError::from_quantity(&format!("Allocation {}", dest.id()), e)
                })?;
                tx.set_allocation_quantity(dest.id(), topped_up).await?;
                (dest.id(), false)
            }
            None => {
                let created = tx
                    .insert_allocation(source.allocation.batch_id, &destination_agent, input.quantity)
                    .await?;
                (created.id, true)
            }
        };

        tx.commit().await?;

        tracing::info!(
            source_allocation_id = source.id(),
            destination_allocation_id,
            destination_agent_id = destination_agent.id,
            quantity = input.quantity,
            "Stock redistributed"
        );

        Ok(RedistributionOutcome {
            batch_id: source.allocation.batch_id,
            product_name: source.product_name,
            source_allocation_id: source.allocation.id,
            destination_allocation_id,
            destination_agent_name: destination_agent.name,
            quantity: input.quantity,
            created_destination,
        })
    }

    /// Distribution log, newest first
    pub async fn history(&self, range: DateRange) -> AppResult<Vec<DistributionHistoryView>> {
        self.store.list_distribution_history(&range).await
    }
}

/// Resolve a redistribution key against the source agent's active stock:
/// first as an allocation id, then as a batch id.
async fn resolve_source(
    tx: &mut dyn StockTx,
    key: i64,
    agent_id: AgentId,
) -> AppResult<Option<AllocationDetail>> {
    if let Some(allocation) = tx.find_allocation(key).await? {
        if allocation.allocation.active && allocation.is_owned_by(agent_id) {
            return Ok(Some(allocation));
        }
    }
    tx.find_active_allocation_for(key, agent_id).await
}

fn require_positive(quantity: i32) -> AppResult<()> {
    if quantity <= 0 {
        return Err(AppError::invalid(
            "quantity",
            "Quantity must be greater than zero",
            "A quantidade deve ser maior que zero",
        ));
    }
    Ok(())
}
