//! Storage layer for the stock engine
//!
//! Services are written once against [`StockStore`] and [`StockTx`]. Every
//! mutating operation opens one transaction, locks the rows it will change,
//! checks its invariants on the locked values and commits. Dropping a
//! [`StockTx`] without calling [`StockTx::commit`] rolls it back.

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::error::AppResult;
use crate::models::{
    Agent, AgentId, Allocation, AllocationDetail, AllocationId, BatchId, BatchQuery, DateRange,
    DistributionHistoryEntry, DistributionHistoryView, IdentityCode, NewProductBatch,
    NewSaleLine, ProductBatch, RegisterAgentInput, SaleLine, SaleLineId, SaleRow,
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStockStore;
pub use postgres::PgStockStore;

/// Read side of the store plus the entry point for transactions
#[async_trait]
pub trait StockStore: Send + Sync {
    async fn begin(&self) -> AppResult<Box<dyn StockTx>>;

    /// Connectivity check for the health endpoint
    async fn ping(&self) -> AppResult<()>;

    async fn get_batch(&self, id: BatchId) -> AppResult<Option<ProductBatch>>;

    /// Filtered page of batches, newest purchase first, with the total match count
    async fn list_batches(
        &self,
        query: &BatchQuery,
        offset: usize,
        limit: usize,
    ) -> AppResult<(Vec<ProductBatch>, u64)>;

    /// Active allocations of one batch
    async fn list_batch_allocations(&self, batch_id: BatchId) -> AppResult<Vec<Allocation>>;

    /// Active allocations held by an agent, ordered by product name
    async fn list_agent_stock(
        &self,
        agent_id: AgentId,
        hide_empty: bool,
    ) -> AppResult<Vec<AllocationDetail>>;

    async fn find_agent_stock_by_code(
        &self,
        agent_id: AgentId,
        code: &IdentityCode,
    ) -> AppResult<Option<AllocationDetail>>;

    async fn get_agent(&self, id: AgentId) -> AppResult<Option<Agent>>;

    async fn list_agents(&self) -> AppResult<Vec<Agent>>;

    async fn insert_agent(&self, input: &RegisterAgentInput) -> AppResult<Agent>;

    /// Every active allocation with a holder, for the stock overview
    async fn list_active_allocations(&self) -> AppResult<Vec<AllocationDetail>>;

    /// Distribution log, newest first
    async fn list_distribution_history(
        &self,
        range: &DateRange,
    ) -> AppResult<Vec<DistributionHistoryView>>;

    /// Sale lines joined with batch identity fields
    async fn list_sale_rows(
        &self,
        seller_id: Option<AgentId>,
        range: &DateRange,
    ) -> AppResult<Vec<SaleRow>>;

    /// Rows of the sale group containing `line_id`
    async fn sale_rows_for_line(&self, line_id: SaleLineId) -> AppResult<Vec<SaleRow>>;
}

/// One open storage transaction
///
/// `lock_*` methods take a row lock that is held until commit or rollback.
/// Callers locking several allocations lock them in ascending id order.
#[async_trait]
pub trait StockTx: Send {
    async fn find_agent(&mut self, id: AgentId) -> AppResult<Option<Agent>>;

    // Catalog

    async fn lock_batch(&mut self, id: BatchId) -> AppResult<Option<ProductBatch>>;

    async fn insert_batch(&mut self, batch: &NewProductBatch) -> AppResult<ProductBatch>;

    /// Whether another batch already uses `serial`
    async fn serial_in_use(&mut self, serial: &str, exclude: Option<BatchId>) -> AppResult<bool>;

    async fn save_batch(&mut self, batch: &ProductBatch) -> AppResult<ProductBatch>;

    async fn set_batch_remaining(&mut self, id: BatchId, quantity: i32) -> AppResult<()>;

    async fn batch_has_sales(&mut self, id: BatchId) -> AppResult<bool>;

    /// Delete a batch with its allocations and distribution history
    async fn delete_batch(&mut self, id: BatchId) -> AppResult<()>;

    // Allocations

    /// Any allocation, active or not
    async fn lock_allocation(&mut self, id: AllocationId) -> AppResult<Option<AllocationDetail>>;

    /// Unlocked read, used to resolve ids before locking them in order
    async fn find_allocation(&mut self, id: AllocationId) -> AppResult<Option<AllocationDetail>>;

    /// Unlocked read of the oldest active allocation of `batch_id` held by `agent_id`
    async fn find_active_allocation_for(
        &mut self,
        batch_id: BatchId,
        agent_id: AgentId,
    ) -> AppResult<Option<AllocationDetail>>;

    async fn insert_allocation(
        &mut self,
        batch_id: BatchId,
        agent: &Agent,
        quantity: i32,
    ) -> AppResult<Allocation>;

    async fn set_allocation_quantity(&mut self, id: AllocationId, quantity: i32) -> AppResult<()>;

    async fn set_allocation_active(&mut self, id: AllocationId, active: bool) -> AppResult<()>;

    async fn insert_distribution(
        &mut self,
        batch_id: BatchId,
        agent_id: AgentId,
        quantity: i32,
    ) -> AppResult<DistributionHistoryEntry>;

    // Sales

    async fn insert_sale_line(&mut self, line: &NewSaleLine) -> AppResult<SaleLine>;

    /// Every line of the group containing `line_id`, ordered by id. A line
    /// without a group id is returned alone.
    async fn lock_sale_group(&mut self, line_id: SaleLineId) -> AppResult<Vec<SaleLine>>;

    async fn update_sale_line_product(
        &mut self,
        id: SaleLineId,
        allocation_id: AllocationId,
        product_name: &str,
        unit_price: Decimal,
        line_total: Decimal,
    ) -> AppResult<SaleLine>;

    async fn set_sale_total(&mut self, line_ids: &[SaleLineId], total: Decimal) -> AppResult<()>;

    /// Attribute lines to `seller`, keeping the first original seller name.
    /// Lines already owned by `seller` are left untouched and not returned.
    async fn reassign_seller(
        &mut self,
        line_ids: &[SaleLineId],
        seller: &Agent,
    ) -> AppResult<Vec<SaleLine>>;

    async fn delete_sale_line(&mut self, id: SaleLineId) -> AppResult<()>;

    async fn commit(self: Box<Self>) -> AppResult<()>;
}
