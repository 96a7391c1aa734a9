//! Agent stock queries and allocation removal

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::{AppError, AppResult};
use crate::models::{AgentId, AgentStock, AllocationDetail, AllocationId, IdentityCode};
use crate::store::StockStore;

/// Stock service for per-agent views of the allocations
#[derive(Clone)]
pub struct StockService {
    store: Arc<dyn StockStore>,
}

impl StockService {
    pub fn new(store: Arc<dyn StockStore>) -> Self {
        Self { store }
    }

    /// Active stock held by one agent
    pub async fn agent_stock(&self, agent_id: AgentId, hide_empty: bool) -> AppResult<AgentStock> {
        let agent = self
            .store
            .get_agent(agent_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Agent {}", agent_id)))?;
        let items = self.store.list_agent_stock(agent_id, hide_empty).await?;

        Ok(AgentStock::new(agent, items))
    }

    /// Find a product in an agent's active stock by barcode or serial number
    pub async fn lookup(&self, agent_id: AgentId, code: IdentityCode) -> AppResult<AllocationDetail> {
        self.store
            .find_agent_stock_by_code(agent_id, &code)
            .await?
            .ok_or_else(|| {
                let code = match &code {
                    IdentityCode::Barcode(c) | IdentityCode::Serial(c) => c.clone(),
                };
                AppError::NotFound(format!("Product {} in the agent's stock", code))
            })
    }

    /// Stock of every agent, including agents holding nothing
    pub async fn overview(&self) -> AppResult<Vec<AgentStock>> {
        let agents = self.store.list_agents().await?;
        let mut by_agent: BTreeMap<AgentId, Vec<AllocationDetail>> = BTreeMap::new();
        for item in self.store.list_active_allocations().await? {
            if let Some(agent_id) = item.allocation.agent_id {
                by_agent.entry(agent_id).or_default().push(item);
            }
        }

        Ok(agents
            .into_iter()
            .map(|agent| {
                let items = by_agent.remove(&agent.id).unwrap_or_default();
                AgentStock::new(agent, items)
            })
            .collect())
    }

    /// Soft-remove an allocation from the agent's stock
    ///
    /// The row stays for history joins; its quantity is not returned to the
    /// central pool.
    pub async fn remove_allocation(&self, id: AllocationId) -> AppResult<()> {
        let mut tx = self.store.begin().await?;

        let allocation = tx
            .lock_allocation(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Allocation {}", id)))?;
        if allocation.allocation.active {
            tx.set_allocation_active(id, false).await?;
        }
        tx.commit().await?;

        tracing::info!(allocation_id = id, "Allocation removed from stock");
        Ok(())
    }
}
