//! In-process store
//!
//! All state sits behind one async mutex. A transaction holds the lock for
//! its whole lifetime and works on a copy of the state, which replaces the
//! shared state on commit. Transactions are therefore fully serialized, and
//! a dropped transaction leaves no trace.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::{StockStore, StockTx};
use crate::error::{AppError, AppResult};
use crate::models::{
    Agent, AgentId, Allocation, AllocationDetail, AllocationId, BatchId, BatchQuery, DateRange,
    DistributionHistoryEntry, DistributionHistoryView, IdentityCode, NewProductBatch,
    NewSaleLine, ProductBatch, RegisterAgentInput, SaleLine, SaleLineId, SaleRow,
};

#[derive(Debug, Clone, Default)]
struct Sequences {
    agent: i64,
    batch: i64,
    allocation: i64,
    sale_line: i64,
    distribution: i64,
}

fn next_id(seq: &mut i64) -> i64 {
    *seq += 1;
    *seq
}

#[derive(Debug, Clone, Default)]
struct MemoryState {
    seq: Sequences,
    agents: BTreeMap<AgentId, Agent>,
    batches: BTreeMap<BatchId, ProductBatch>,
    allocations: BTreeMap<AllocationId, Allocation>,
    sale_lines: BTreeMap<SaleLineId, SaleLine>,
    distributions: BTreeMap<i64, DistributionHistoryEntry>,
}

impl MemoryState {
    fn detail(&self, allocation: &Allocation) -> Option<AllocationDetail> {
        let batch = self.batches.get(&allocation.batch_id)?;
        Some(AllocationDetail {
            allocation: allocation.clone(),
            product_name: batch.name.clone(),
            unit_price: batch.unit_price,
            description: batch.description.clone(),
            color: batch.color.clone(),
            serial_number: batch.serial_number.clone(),
            barcode: batch.barcode.clone(),
        })
    }

    fn sale_row(&self, line: &SaleLine) -> SaleRow {
        let batch = self
            .allocations
            .get(&line.allocation_id)
            .and_then(|a| self.batches.get(&a.batch_id));
        SaleRow {
            line: line.clone(),
            batch_id: batch.map(|b| b.id),
            serial_number: batch.and_then(|b| b.serial_number.clone()),
            barcode: batch.and_then(|b| b.barcode.clone()),
            color: batch.and_then(|b| b.color.clone()),
            description: batch.and_then(|b| b.description.clone()),
        }
    }

    fn group_of(&self, line_id: SaleLineId) -> Vec<SaleLine> {
        let Some(line) = self.sale_lines.get(&line_id) else {
            return Vec::new();
        };
        match line.sale_group_id.as_deref().filter(|g| !g.is_empty()) {
            Some(group) => self
                .sale_lines
                .values()
                .filter(|l| l.sale_group_id.as_deref() == Some(group))
                .cloned()
                .collect(),
            None => vec![line.clone()],
        }
    }

    fn allocation_mut(&mut self, id: AllocationId) -> AppResult<&mut Allocation> {
        self.allocations
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("Allocation {}", id)))
    }

    fn sale_line_mut(&mut self, id: SaleLineId) -> AppResult<&mut SaleLine> {
        self.sale_lines
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("Sale line {}", id)))
    }
}

/// Store keeping everything in process memory
#[derive(Clone, Default)]
pub struct MemoryStockStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStockStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StockStore for MemoryStockStore {
    async fn begin(&self) -> AppResult<Box<dyn StockTx>> {
        let guard = self.state.clone().lock_owned().await;
        let work = guard.clone();
        Ok(Box::new(MemoryStockTx { guard, work }))
    }

    async fn ping(&self) -> AppResult<()> {
        Ok(())
    }

    async fn get_batch(&self, id: BatchId) -> AppResult<Option<ProductBatch>> {
        Ok(self.state.lock().await.batches.get(&id).cloned())
    }

    async fn list_batches(
        &self,
        query: &BatchQuery,
        offset: usize,
        limit: usize,
    ) -> AppResult<(Vec<ProductBatch>, u64)> {
        let state = self.state.lock().await;
        let mut matching: Vec<&ProductBatch> =
            state.batches.values().filter(|b| query.matches(b)).collect();
        matching.sort_by(|a, b| {
            b.purchased_at
                .cmp(&a.purchased_at)
                .then_with(|| b.id.cmp(&a.id))
        });

        let total = matching.len() as u64;
        let page = matching
            .into_iter()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect();
        Ok((page, total))
    }

    async fn list_batch_allocations(&self, batch_id: BatchId) -> AppResult<Vec<Allocation>> {
        let state = self.state.lock().await;
        Ok(state
            .allocations
            .values()
            .filter(|a| a.batch_id == batch_id && a.active)
            .cloned()
            .collect())
    }

    async fn list_agent_stock(
        &self,
        agent_id: AgentId,
        hide_empty: bool,
    ) -> AppResult<Vec<AllocationDetail>> {
        let state = self.state.lock().await;
        let mut items: Vec<AllocationDetail> = state
            .allocations
            .values()
            .filter(|a| a.active && a.agent_id == Some(agent_id))
            .filter(|a| !hide_empty || a.quantity > 0)
            .filter_map(|a| state.detail(a))
            .collect();
        items.sort_by(|a, b| {
            a.product_name
                .cmp(&b.product_name)
                .then_with(|| a.id().cmp(&b.id()))
        });
        Ok(items)
    }

    async fn find_agent_stock_by_code(
        &self,
        agent_id: AgentId,
        code: &IdentityCode,
    ) -> AppResult<Option<AllocationDetail>> {
        let state = self.state.lock().await;
        Ok(state
            .allocations
            .values()
            .filter(|a| a.active && a.agent_id == Some(agent_id))
            .filter_map(|a| state.detail(a))
            .find(|d| code.matches(d)))
    }

    async fn get_agent(&self, id: AgentId) -> AppResult<Option<Agent>> {
        Ok(self.state.lock().await.agents.get(&id).cloned())
    }

    async fn list_agents(&self) -> AppResult<Vec<Agent>> {
        let state = self.state.lock().await;
        let mut agents: Vec<Agent> = state.agents.values().cloned().collect();
        agents.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        Ok(agents)
    }

    async fn insert_agent(&self, input: &RegisterAgentInput) -> AppResult<Agent> {
        let mut state = self.state.lock().await;
        if state
            .agents
            .values()
            .any(|a| a.email.eq_ignore_ascii_case(&input.email))
        {
            return Err(AppError::DuplicateEntry("email".to_string()));
        }

        let agent = Agent {
            id: next_id(&mut state.seq.agent),
            name: input.name.clone(),
            email: input.email.clone(),
            is_admin: input.is_admin,
        };
        state.agents.insert(agent.id, agent.clone());
        Ok(agent)
    }

    async fn list_active_allocations(&self) -> AppResult<Vec<AllocationDetail>> {
        let state = self.state.lock().await;
        Ok(state
            .allocations
            .values()
            .filter(|a| a.active && a.agent_id.is_some())
            .filter_map(|a| state.detail(a))
            .collect())
    }

    async fn list_distribution_history(
        &self,
        range: &DateRange,
    ) -> AppResult<Vec<DistributionHistoryView>> {
        let state = self.state.lock().await;
        let mut rows: Vec<DistributionHistoryView> = state
            .distributions
            .values()
            .filter(|e| range.contains(e.distributed_at.date_naive()))
            .filter_map(|e| {
                let batch = state.batches.get(&e.batch_id)?;
                let agent = state.agents.get(&e.agent_id)?;
                Some(DistributionHistoryView {
                    id: e.id,
                    batch_id: e.batch_id,
                    product_name: batch.name.clone(),
                    color: batch.color.clone(),
                    serial_number: batch.serial_number.clone(),
                    barcode: batch.barcode.clone(),
                    agent_id: agent.id,
                    agent_name: agent.name.clone(),
                    quantity: e.quantity,
                    distributed_at: e.distributed_at,
                })
            })
            .collect();
        rows.sort_by(|a, b| {
            b.distributed_at
                .cmp(&a.distributed_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(rows)
    }

    async fn list_sale_rows(
        &self,
        seller_id: Option<AgentId>,
        range: &DateRange,
    ) -> AppResult<Vec<SaleRow>> {
        let state = self.state.lock().await;
        Ok(state
            .sale_lines
            .values()
            .filter(|l| seller_id.map_or(true, |s| l.seller_id == s))
            .filter(|l| range.contains(l.created_at.date_naive()))
            .map(|l| state.sale_row(l))
            .collect())
    }

    async fn sale_rows_for_line(&self, line_id: SaleLineId) -> AppResult<Vec<SaleRow>> {
        let state = self.state.lock().await;
        Ok(state
            .group_of(line_id)
            .iter()
            .map(|l| state.sale_row(l))
            .collect())
    }
}

/// Transaction over a private copy of the state
pub struct MemoryStockTx {
    guard: OwnedMutexGuard<MemoryState>,
    work: MemoryState,
}

#[async_trait]
impl StockTx for MemoryStockTx {
    async fn find_agent(&mut self, id: AgentId) -> AppResult<Option<Agent>> {
        Ok(self.work.agents.get(&id).cloned())
    }

    async fn lock_batch(&mut self, id: BatchId) -> AppResult<Option<ProductBatch>> {
        Ok(self.work.batches.get(&id).cloned())
    }

    async fn insert_batch(&mut self, batch: &NewProductBatch) -> AppResult<ProductBatch> {
        let now = Utc::now();
        let row = ProductBatch {
            id: next_id(&mut self.work.seq.batch),
            name: batch.name.clone(),
            description: batch.description.clone(),
            color: batch.color.clone(),
            serial_number: batch.serial_number.clone(),
            barcode: batch.barcode.clone(),
            unit_cost_usd: batch.unit_cost_usd,
            exchange_rate: batch.exchange_rate,
            unit_price: batch.unit_price,
            quantity_remaining: batch.quantity,
            quantity_original: batch.quantity,
            supplier: batch.supplier.clone(),
            category_id: batch.category_id,
            purchased_at: batch.purchased_at,
            created_at: now,
            updated_at: now,
        };
        self.work.batches.insert(row.id, row.clone());
        Ok(row)
    }

    async fn serial_in_use(&mut self, serial: &str, exclude: Option<BatchId>) -> AppResult<bool> {
        Ok(self
            .work
            .batches
            .values()
            .any(|b| Some(b.id) != exclude && b.serial_number.as_deref() == Some(serial)))
    }

    async fn save_batch(&mut self, batch: &ProductBatch) -> AppResult<ProductBatch> {
        let stored = self
            .work
            .batches
            .get_mut(&batch.id)
            .ok_or_else(|| AppError::NotFound(format!("Batch {}", batch.id)))?;
        let quantity_original = stored.quantity_original;
        let created_at = stored.created_at;

        *stored = ProductBatch {
            quantity_original,
            created_at,
            updated_at: Utc::now(),
            ..batch.clone()
        };
        Ok(stored.clone())
    }

    async fn set_batch_remaining(&mut self, id: BatchId, quantity: i32) -> AppResult<()> {
        let batch = self
            .work
            .batches
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("Batch {}", id)))?;
        batch.quantity_remaining = quantity;
        batch.updated_at = Utc::now();
        Ok(())
    }

    async fn batch_has_sales(&mut self, id: BatchId) -> AppResult<bool> {
        let work = &self.work;
        Ok(work.sale_lines.values().any(|l| {
            work.allocations
                .get(&l.allocation_id)
                .is_some_and(|a| a.batch_id == id)
        }))
    }

    async fn delete_batch(&mut self, id: BatchId) -> AppResult<()> {
        self.work.allocations.retain(|_, a| a.batch_id != id);
        self.work.distributions.retain(|_, e| e.batch_id != id);
        self.work.batches.remove(&id);
        Ok(())
    }

    async fn lock_allocation(&mut self, id: AllocationId) -> AppResult<Option<AllocationDetail>> {
        Ok(self
            .work
            .allocations
            .get(&id)
            .and_then(|a| self.work.detail(a)))
    }

    async fn find_allocation(&mut self, id: AllocationId) -> AppResult<Option<AllocationDetail>> {
        self.lock_allocation(id).await
    }

    async fn find_active_allocation_for(
        &mut self,
        batch_id: BatchId,
        agent_id: AgentId,
    ) -> AppResult<Option<AllocationDetail>> {
        Ok(self
            .work
            .allocations
            .values()
            .find(|a| a.active && a.batch_id == batch_id && a.agent_id == Some(agent_id))
            .and_then(|a| self.work.detail(a)))
    }

    async fn insert_allocation(
        &mut self,
        batch_id: BatchId,
        agent: &Agent,
        quantity: i32,
    ) -> AppResult<Allocation> {
        if !self.work.batches.contains_key(&batch_id) {
            return Err(AppError::NotFound(format!("Batch {}", batch_id)));
        }
        let now = Utc::now();
        let allocation = Allocation {
            id: next_id(&mut self.work.seq.allocation),
            batch_id,
            agent_id: Some(agent.id),
            quantity,
            active: true,
            agent_name: Some(agent.name.clone()),
            created_at: now,
            updated_at: now,
        };
        self.work
            .allocations
            .insert(allocation.id, allocation.clone());
        Ok(allocation)
    }

    async fn set_allocation_quantity(&mut self, id: AllocationId, quantity: i32) -> AppResult<()> {
        let allocation = self.work.allocation_mut(id)?;
        allocation.quantity = quantity;
        allocation.updated_at = Utc::now();
        Ok(())
    }

    async fn set_allocation_active(&mut self, id: AllocationId, active: bool) -> AppResult<()> {
        let allocation = self.work.allocation_mut(id)?;
        allocation.active = active;
        allocation.updated_at = Utc::now();
        Ok(())
    }

    async fn insert_distribution(
        &mut self,
        batch_id: BatchId,
        agent_id: AgentId,
        quantity: i32,
    ) -> AppResult<DistributionHistoryEntry> {
        let entry = DistributionHistoryEntry {
            id: next_id(&mut self.work.seq.distribution),
            batch_id,
            agent_id,
            quantity,
            distributed_at: Utc::now(),
        };
        self.work.distributions.insert(entry.id, entry.clone());
        Ok(entry)
    }

    async fn insert_sale_line(&mut self, new: &NewSaleLine) -> AppResult<SaleLine> {
        if !self.work.allocations.contains_key(&new.line.allocation_id) {
            return Err(AppError::NotFound(format!(
                "Allocation {}",
                new.line.allocation_id
            )));
        }
        let line = SaleLine {
            id: next_id(&mut self.work.seq.sale_line),
            sale_group_id: Some(new.sale_group_id.clone()),
            customer_name: new.customer.name.clone(),
            phone: new.customer.phone.clone(),
            address: new.customer.address.clone(),
            customer_type: new.customer.customer_type.clone(),
            notes: new.customer.notes.clone(),
            product_name: new.line.product_name.clone(),
            quantity: new.line.quantity,
            unit_price: new.line.unit_price,
            line_total: new.line.line_total,
            sale_total: new.sale_total,
            seller_id: new.seller_id,
            seller_name: new.seller_name.clone(),
            seller_email: new.seller_email.clone(),
            payment_method: new.payment.method.clone(),
            pix_amount: new.payment.pix,
            card_amount: new.payment.card,
            cash_amount: new.payment.cash,
            photo_path: new.payment.photo_path.clone(),
            allocation_id: new.line.allocation_id,
            transferred: false,
            original_seller: None,
            created_at: Utc::now(),
        };
        self.work.sale_lines.insert(line.id, line.clone());
        Ok(line)
    }

    async fn lock_sale_group(&mut self, line_id: SaleLineId) -> AppResult<Vec<SaleLine>> {
        Ok(self.work.group_of(line_id))
    }

    async fn update_sale_line_product(
        &mut self,
        id: SaleLineId,
        allocation_id: AllocationId,
        product_name: &str,
        unit_price: Decimal,
        line_total: Decimal,
    ) -> AppResult<SaleLine> {
        let line = self.work.sale_line_mut(id)?;
        line.allocation_id = allocation_id;
        line.product_name = product_name.to_string();
        line.unit_price = unit_price;
        line.line_total = line_total;
        Ok(line.clone())
    }

    async fn set_sale_total(&mut self, line_ids: &[SaleLineId], total: Decimal) -> AppResult<()> {
        for id in line_ids {
            self.work.sale_line_mut(*id)?.sale_total = total;
        }
        Ok(())
    }

    async fn reassign_seller(
        &mut self,
        line_ids: &[SaleLineId],
        seller: &Agent,
    ) -> AppResult<Vec<SaleLine>> {
        let mut updated = Vec::with_capacity(line_ids.len());
        for id in line_ids {
            let line = self.work.sale_line_mut(*id)?;
            if line.seller_id == seller.id {
                continue;
            }
            if line.original_seller.is_none() {
                line.original_seller = Some(line.seller_name.clone());
            }
            line.seller_id = seller.id;
            line.seller_name = seller.name.clone();
            line.seller_email = seller.email.clone();
            line.transferred = true;
            updated.push(line.clone());
        }
        Ok(updated)
    }

    async fn delete_sale_line(&mut self, id: SaleLineId) -> AppResult<()> {
        self.work
            .sale_lines
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| AppError::NotFound(format!("Sale line {}", id)))
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        let MemoryStockTx { mut guard, work } = *self;
        *guard = work;
        Ok(())
    }
}
