//! PostgreSQL store
//!
//! Hot rows are taken with `SELECT ... FOR UPDATE` inside the transaction
//! before any check-and-write, so concurrent requests on the same batch or
//! allocation queue up instead of overwriting each other.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgPool, Postgres, Transaction};

use super::{StockStore, StockTx};
use crate::error::{AppError, AppResult};
use crate::models::{
    Agent, AgentId, Allocation, AllocationDetail, AllocationId, BatchId, BatchQuery, DateRange,
    DistributionHistoryEntry, DistributionHistoryView, IdentityCode, NewProductBatch,
    NewSaleLine, ProductBatch, RegisterAgentInput, SaleLine, SaleLineId, SaleRow,
};

const BATCH_COLUMNS: &str = r#"
    id, name, description, color, serial_number, barcode, unit_cost_usd, exchange_rate,
    unit_price, quantity_remaining, quantity_original, supplier, category_id, purchased_at,
    created_at, updated_at
"#;

const ALLOCATION_COLUMNS: &str =
    "id, batch_id, agent_id, quantity, active, agent_name, created_at, updated_at";

const ALLOCATION_DETAIL_SELECT: &str = r#"
    SELECT a.id, a.batch_id, a.agent_id, a.quantity, a.active, a.agent_name,
           a.created_at, a.updated_at,
           b.name AS product_name, b.unit_price, b.description, b.color,
           b.serial_number, b.barcode
    FROM allocations a
    JOIN product_batches b ON b.id = a.batch_id
"#;

const SALE_LINE_COLUMNS: &str = r#"
    id, sale_group_id, customer_name, phone, address, customer_type, notes, product_name,
    quantity, unit_price, line_total, sale_total, seller_id, seller_name, seller_email,
    payment_method, pix_amount, card_amount, cash_amount, photo_path, allocation_id,
    transferred, original_seller, created_at
"#;

const SALE_ROW_SELECT: &str = r#"
    SELECT s.id, s.sale_group_id, s.customer_name, s.phone, s.address, s.customer_type,
           s.notes, s.product_name, s.quantity, s.unit_price, s.line_total, s.sale_total,
           s.seller_id, s.seller_name, s.seller_email, s.payment_method, s.pix_amount,
           s.card_amount, s.cash_amount, s.photo_path, s.allocation_id, s.transferred,
           s.original_seller, s.created_at,
           b.id AS batch_id, b.serial_number, b.barcode, b.color, b.description
    FROM sale_lines s
    LEFT JOIN allocations a ON a.id = s.allocation_id
    LEFT JOIN product_batches b ON b.id = a.batch_id
"#;

const BATCH_FILTER: &str = r#"
    WHERE ($1::text IS NULL OR name ILIKE $1 OR serial_number ILIKE $1 OR barcode ILIKE $1)
      AND ($2::date IS NULL OR (purchased_at AT TIME ZONE 'UTC')::date >= $2)
      AND ($3::date IS NULL OR (purchased_at AT TIME ZONE 'UTC')::date <= $3)
      AND ($4::bigint IS NULL OR category_id = $4)
      AND (NOT $5 OR quantity_remaining > 0)
"#;

// ============================================================================
// Row types
// ============================================================================

#[derive(Debug, FromRow)]
struct AgentRow {
    id: i64,
    name: String,
    email: String,
    is_admin: bool,
}

impl From<AgentRow> for Agent {
    fn from(row: AgentRow) -> Self {
        Agent {
            id: row.id,
            name: row.name,
            email: row.email,
            is_admin: row.is_admin,
        }
    }
}

#[derive(Debug, FromRow)]
struct BatchRow {
    id: i64,
    name: String,
    description: Option<String>,
    color: Option<String>,
    serial_number: Option<String>,
    barcode: Option<String>,
    unit_cost_usd: Decimal,
    exchange_rate: Decimal,
    unit_price: Decimal,
    quantity_remaining: i32,
    quantity_original: i32,
    supplier: Option<String>,
    category_id: Option<i64>,
    purchased_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<BatchRow> for ProductBatch {
    fn from(row: BatchRow) -> Self {
        ProductBatch {
            id: row.id,
            name: row.name,
            description: row.description,
            color: row.color,
            serial_number: row.serial_number,
            barcode: row.barcode,
            unit_cost_usd: row.unit_cost_usd,
            exchange_rate: row.exchange_rate,
            unit_price: row.unit_price,
            quantity_remaining: row.quantity_remaining,
            quantity_original: row.quantity_original,
            supplier: row.supplier,
            category_id: row.category_id,
            purchased_at: row.purchased_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct AllocationRow {
    id: i64,
    batch_id: i64,
    agent_id: Option<i64>,
    quantity: i32,
    active: bool,
    agent_name: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<AllocationRow> for Allocation {
    fn from(row: AllocationRow) -> Self {
        Allocation {
            id: row.id,
            batch_id: row.batch_id,
            agent_id: row.agent_id,
            quantity: row.quantity,
            active: row.active,
            agent_name: row.agent_name,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct AllocationDetailRow {
    #[sqlx(flatten)]
    allocation: AllocationRow,
    product_name: String,
    unit_price: Decimal,
    description: Option<String>,
    color: Option<String>,
    serial_number: Option<String>,
    barcode: Option<String>,
}

impl From<AllocationDetailRow> for AllocationDetail {
    fn from(row: AllocationDetailRow) -> Self {
        AllocationDetail {
            allocation: row.allocation.into(),
            product_name: row.product_name,
            unit_price: row.unit_price,
            description: row.description,
            color: row.color,
            serial_number: row.serial_number,
            barcode: row.barcode,
        }
    }
}

#[derive(Debug, FromRow)]
struct DistributionRow {
    id: i64,
    batch_id: i64,
    agent_id: i64,
    quantity: i32,
    distributed_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct DistributionViewRow {
    id: i64,
    batch_id: i64,
    product_name: String,
    color: Option<String>,
    serial_number: Option<String>,
    barcode: Option<String>,
    agent_id: i64,
    agent_name: String,
    quantity: i32,
    distributed_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct SaleLineRow {
    id: i64,
    sale_group_id: Option<String>,
    customer_name: String,
    phone: String,
    address: String,
    customer_type: Option<String>,
    notes: Option<String>,
    product_name: String,
    quantity: i32,
    unit_price: Decimal,
    line_total: Decimal,
    sale_total: Decimal,
    seller_id: i64,
    seller_name: String,
    seller_email: String,
    payment_method: String,
    pix_amount: Option<Decimal>,
    card_amount: Option<Decimal>,
    cash_amount: Option<Decimal>,
    photo_path: Option<String>,
    allocation_id: i64,
    transferred: bool,
    original_seller: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<SaleLineRow> for SaleLine {
    fn from(row: SaleLineRow) -> Self {
        SaleLine {
            id: row.id,
            sale_group_id: row.sale_group_id,
            customer_name: row.customer_name,
            phone: row.phone,
            address: row.address,
            customer_type: row.customer_type,
            notes: row.notes,
            product_name: row.product_name,
            quantity: row.quantity,
            unit_price: row.unit_price,
            line_total: row.line_total,
            sale_total: row.sale_total,
            seller_id: row.seller_id,
            seller_name: row.seller_name,
            seller_email: row.seller_email,
            payment_method: row.payment_method,
            pix_amount: row.pix_amount,
            card_amount: row.card_amount,
            cash_amount: row.cash_amount,
            photo_path: row.photo_path,
            allocation_id: row.allocation_id,
            transferred: row.transferred,
            original_seller: row.original_seller,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct SaleRowRow {
    #[sqlx(flatten)]
    line: SaleLineRow,
    batch_id: Option<i64>,
    serial_number: Option<String>,
    barcode: Option<String>,
    color: Option<String>,
    description: Option<String>,
}

impl From<SaleRowRow> for SaleRow {
    fn from(row: SaleRowRow) -> Self {
        SaleRow {
            line: row.line.into(),
            batch_id: row.batch_id,
            serial_number: row.serial_number,
            barcode: row.barcode,
            color: row.color,
            description: row.description,
        }
    }
}

/// Map constraint violations raised by a write onto domain errors
fn map_write_error(err: sqlx::Error, unique_field: &str) -> AppError {
    if let sqlx::Error::Database(db) = &err {
        if db.is_unique_violation() {
            return AppError::DuplicateEntry(unique_field.to_string());
        }
        if db.is_check_violation() {
            return AppError::InsufficientStock("quantity would become negative".to_string());
        }
    }
    AppError::DatabaseError(err)
}

fn search_pattern(search: Option<&str>) -> Option<String> {
    search
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            let escaped = s.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_");
            format!("%{}%", escaped)
        })
}

// ============================================================================
// Store
// ============================================================================

/// Store backed by a PostgreSQL pool
#[derive(Clone)]
pub struct PgStockStore {
    db: PgPool,
}

impl PgStockStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl StockStore for PgStockStore {
    async fn begin(&self) -> AppResult<Box<dyn StockTx>> {
        let tx = self.db.begin().await?;
        Ok(Box::new(PgStockTx { tx }))
    }

    async fn ping(&self) -> AppResult<()> {
        sqlx::query("SELECT 1").execute(&self.db).await?;
        Ok(())
    }

    async fn get_batch(&self, id: BatchId) -> AppResult<Option<ProductBatch>> {
        let row = sqlx::query_as::<_, BatchRow>(&format!(
            "SELECT {} FROM product_batches WHERE id = $1",
            BATCH_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn list_batches(
        &self,
        query: &BatchQuery,
        offset: usize,
        limit: usize,
    ) -> AppResult<(Vec<ProductBatch>, u64)> {
        let pattern = search_pattern(query.search.as_deref());

        let total = sqlx::query_scalar::<_, i64>(&format!(
            "SELECT COUNT(*) FROM product_batches {}",
            BATCH_FILTER
        ))
        .bind(&pattern)
        .bind(query.purchased_from)
        .bind(query.purchased_to)
        .bind(query.category_id)
        .bind(query.hide_empty)
        .fetch_one(&self.db)
        .await?;

        let rows = sqlx::query_as::<_, BatchRow>(&format!(
            "SELECT {} FROM product_batches {} ORDER BY purchased_at DESC, id DESC LIMIT $6 OFFSET $7",
            BATCH_COLUMNS, BATCH_FILTER
        ))
        .bind(&pattern)
        .bind(query.purchased_from)
        .bind(query.purchased_to)
        .bind(query.category_id)
        .bind(query.hide_empty)
        .bind(limit as i64)
        .bind(offset as i64)
        .fetch_all(&self.db)
        .await?;

        Ok((rows.into_iter().map(Into::into).collect(), total.max(0) as u64))
    }

    async fn list_batch_allocations(&self, batch_id: BatchId) -> AppResult<Vec<Allocation>> {
        let rows = sqlx::query_as::<_, AllocationRow>(&format!(
            "SELECT {} FROM allocations WHERE batch_id = $1 AND active ORDER BY id",
            ALLOCATION_COLUMNS
        ))
        .bind(batch_id)
        .fetch_all(&self.db)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn list_agent_stock(
        &self,
        agent_id: AgentId,
        hide_empty: bool,
    ) -> AppResult<Vec<AllocationDetail>> {
        let rows = sqlx::query_as::<_, AllocationDetailRow>(&format!(
            r#"{}
            WHERE a.agent_id = $1 AND a.active AND (NOT $2 OR a.quantity > 0)
            ORDER BY b.name, a.id"#,
            ALLOCATION_DETAIL_SELECT
        ))
        .bind(agent_id)
        .bind(hide_empty)
        .fetch_all(&self.db)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn find_agent_stock_by_code(
        &self,
        agent_id: AgentId,
        code: &IdentityCode,
    ) -> AppResult<Option<AllocationDetail>> {
        let (column, value) = match code {
            IdentityCode::Barcode(v) => ("b.barcode", v),
            IdentityCode::Serial(v) => ("b.serial_number", v),
        };
        let row = sqlx::query_as::<_, AllocationDetailRow>(&format!(
            "{} WHERE a.agent_id = $1 AND a.active AND {} = $2 ORDER BY a.id LIMIT 1",
            ALLOCATION_DETAIL_SELECT, column
        ))
        .bind(agent_id)
        .bind(value)
        .fetch_optional(&self.db)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn get_agent(&self, id: AgentId) -> AppResult<Option<Agent>> {
        let row = sqlx::query_as::<_, AgentRow>(
            "SELECT id, name, email, is_admin FROM agents WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn list_agents(&self) -> AppResult<Vec<Agent>> {
        let rows = sqlx::query_as::<_, AgentRow>(
            "SELECT id, name, email, is_admin FROM agents ORDER BY name, id",
        )
        .fetch_all(&self.db)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn insert_agent(&self, input: &RegisterAgentInput) -> AppResult<Agent> {
        let row = sqlx::query_as::<_, AgentRow>(
            r#"
            INSERT INTO agents (name, email, is_admin)
            VALUES ($1, $2, $3)
            RETURNING id, name, email, is_admin
            "#,
        )
        .bind(&input.name)
        .bind(&input.email)
        .bind(input.is_admin)
        .fetch_one(&self.db)
        .await
        .map_err(|e| map_write_error(e, "email"))?;
        Ok(row.into())
    }

    async fn list_active_allocations(&self) -> AppResult<Vec<AllocationDetail>> {
        let rows = sqlx::query_as::<_, AllocationDetailRow>(&format!(
            "{} WHERE a.active AND a.agent_id IS NOT NULL ORDER BY a.agent_id, b.name, a.id",
            ALLOCATION_DETAIL_SELECT
        ))
        .fetch_all(&self.db)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn list_distribution_history(
        &self,
        range: &DateRange,
    ) -> AppResult<Vec<DistributionHistoryView>> {
        let rows = sqlx::query_as::<_, DistributionViewRow>(
            r#"
            SELECT h.id, h.batch_id, b.name AS product_name, b.color, b.serial_number,
                   b.barcode, h.agent_id, u.name AS agent_name, h.quantity, h.distributed_at
            FROM distribution_history h
            JOIN product_batches b ON b.id = h.batch_id
            JOIN agents u ON u.id = h.agent_id
            WHERE ($1::date IS NULL OR (h.distributed_at AT TIME ZONE 'UTC')::date >= $1)
              AND ($2::date IS NULL OR (h.distributed_at AT TIME ZONE 'UTC')::date <= $2)
            ORDER BY h.distributed_at DESC, h.id DESC
            "#,
        )
        .bind(range.start)
        .bind(range.end)
        .fetch_all(&self.db)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| DistributionHistoryView {
                id: r.id,
                batch_id: r.batch_id,
                product_name: r.product_name,
                color: r.color,
                serial_number: r.serial_number,
                barcode: r.barcode,
                agent_id: r.agent_id,
                agent_name: r.agent_name,
                quantity: r.quantity,
                distributed_at: r.distributed_at,
            })
            .collect())
    }

    async fn list_sale_rows(
        &self,
        seller_id: Option<AgentId>,
        range: &DateRange,
    ) -> AppResult<Vec<SaleRow>> {
        let rows = sqlx::query_as::<_, SaleRowRow>(&format!(
            r#"{}
            WHERE ($1::bigint IS NULL OR s.seller_id = $1)
              AND ($2::date IS NULL OR (s.created_at AT TIME ZONE 'UTC')::date >= $2)
              AND ($3::date IS NULL OR (s.created_at AT TIME ZONE 'UTC')::date <= $3)
            ORDER BY s.id"#,
            SALE_ROW_SELECT
        ))
        .bind(seller_id)
        .bind(range.start)
        .bind(range.end)
        .fetch_all(&self.db)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn sale_rows_for_line(&self, line_id: SaleLineId) -> AppResult<Vec<SaleRow>> {
        let rows = sqlx::query_as::<_, SaleRowRow>(&format!(
            r#"{}
            WHERE s.id = $1
               OR (COALESCE(s.sale_group_id, '') <> ''
                   AND s.sale_group_id = (SELECT sale_group_id FROM sale_lines WHERE id = $1))
            ORDER BY s.id"#,
            SALE_ROW_SELECT
        ))
        .bind(line_id)
        .fetch_all(&self.db)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }
}

// ============================================================================
// Transaction
// ============================================================================

pub struct PgStockTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StockTx for PgStockTx {
    async fn find_agent(&mut self, id: AgentId) -> AppResult<Option<Agent>> {
        let row = sqlx::query_as::<_, AgentRow>(
            "SELECT id, name, email, is_admin FROM agents WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn lock_batch(&mut self, id: BatchId) -> AppResult<Option<ProductBatch>> {
        let row = sqlx::query_as::<_, BatchRow>(&format!(
            "SELECT {} FROM product_batches WHERE id = $1 FOR UPDATE",
            BATCH_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn insert_batch(&mut self, batch: &NewProductBatch) -> AppResult<ProductBatch> {
        let row = sqlx::query_as::<_, BatchRow>(&format!(
            r#"
            INSERT INTO product_batches (name, description, color, serial_number, barcode,
                                         unit_cost_usd, exchange_rate, unit_price,
                                         quantity_remaining, quantity_original, supplier,
                                         category_id, purchased_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $9, $10, $11, $12)
            RETURNING {}
            "#,
            BATCH_COLUMNS
        ))
        .bind(&batch.name)
        .bind(&batch.description)
        .bind(&batch.color)
        .bind(&batch.serial_number)
        .bind(&batch.barcode)
        .bind(batch.unit_cost_usd)
        .bind(batch.exchange_rate)
        .bind(batch.unit_price)
        .bind(batch.quantity)
        .bind(&batch.supplier)
        .bind(batch.category_id)
        .bind(batch.purchased_at)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| map_write_error(e, "serial_number"))?;
        Ok(row.into())
    }

    async fn serial_in_use(&mut self, serial: &str, exclude: Option<BatchId>) -> AppResult<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM product_batches
                WHERE serial_number = $1 AND ($2::bigint IS NULL OR id <> $2)
            )
            "#,
        )
        .bind(serial)
        .bind(exclude)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(exists)
    }

    async fn save_batch(&mut self, batch: &ProductBatch) -> AppResult<ProductBatch> {
        let row = sqlx::query_as::<_, BatchRow>(&format!(
            r#"
            UPDATE product_batches
            SET name = $2, description = $3, color = $4, serial_number = $5, barcode = $6,
                unit_cost_usd = $7, exchange_rate = $8, unit_price = $9,
                quantity_remaining = $10, supplier = $11, category_id = $12,
                purchased_at = $13, updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            BATCH_COLUMNS
        ))
        .bind(batch.id)
        .bind(&batch.name)
        .bind(&batch.description)
        .bind(&batch.color)
        .bind(&batch.serial_number)
        .bind(&batch.barcode)
        .bind(batch.unit_cost_usd)
        .bind(batch.exchange_rate)
        .bind(batch.unit_price)
        .bind(batch.quantity_remaining)
        .bind(&batch.supplier)
        .bind(batch.category_id)
        .bind(batch.purchased_at)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_write_error(e, "serial_number"))?
        .ok_or_else(|| AppError::NotFound(format!("Batch {}", batch.id)))?;
        Ok(row.into())
    }

    async fn set_batch_remaining(&mut self, id: BatchId, quantity: i32) -> AppResult<()> {
        sqlx::query(
            "UPDATE product_batches SET quantity_remaining = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(quantity)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_write_error(e, "id"))?;
        Ok(())
    }

    async fn batch_has_sales(&mut self, id: BatchId) -> AppResult<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM sale_lines s
                JOIN allocations a ON a.id = s.allocation_id
                WHERE a.batch_id = $1
            )
            "#,
        )
        .bind(id)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(exists)
    }

    async fn delete_batch(&mut self, id: BatchId) -> AppResult<()> {
        sqlx::query("DELETE FROM distribution_history WHERE batch_id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await?;
        sqlx::query("DELETE FROM allocations WHERE batch_id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await?;
        sqlx::query("DELETE FROM product_batches WHERE id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn lock_allocation(&mut self, id: AllocationId) -> AppResult<Option<AllocationDetail>> {
        let row = sqlx::query_as::<_, AllocationDetailRow>(&format!(
            "{} WHERE a.id = $1 FOR UPDATE OF a",
            ALLOCATION_DETAIL_SELECT
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn find_allocation(&mut self, id: AllocationId) -> AppResult<Option<AllocationDetail>> {
        let row = sqlx::query_as::<_, AllocationDetailRow>(&format!(
            "{} WHERE a.id = $1",
            ALLOCATION_DETAIL_SELECT
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn find_active_allocation_for(
        &mut self,
        batch_id: BatchId,
        agent_id: AgentId,
    ) -> AppResult<Option<AllocationDetail>> {
        let row = sqlx::query_as::<_, AllocationDetailRow>(&format!(
            r#"{}
            WHERE a.batch_id = $1 AND a.agent_id = $2 AND a.active
            ORDER BY a.id
            LIMIT 1"#,
            ALLOCATION_DETAIL_SELECT
        ))
        .bind(batch_id)
        .bind(agent_id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn insert_allocation(
        &mut self,
        batch_id: BatchId,
        agent: &Agent,
        quantity: i32,
    ) -> AppResult<Allocation> {
        let row = sqlx::query_as::<_, AllocationRow>(&format!(
            r#"
            INSERT INTO allocations (batch_id, agent_id, quantity, active, agent_name)
            VALUES ($1, $2, $3, TRUE, $4)
            RETURNING {}
            "#,
            ALLOCATION_COLUMNS
        ))
        .bind(batch_id)
        .bind(agent.id)
        .bind(quantity)
        .bind(&agent.name)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| map_write_error(e, "id"))?;
        Ok(row.into())
    }

    async fn set_allocation_quantity(&mut self, id: AllocationId, quantity: i32) -> AppResult<()> {
        sqlx::query("UPDATE allocations SET quantity = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(quantity)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_write_error(e, "id"))?;
        Ok(())
    }

    async fn set_allocation_active(&mut self, id: AllocationId, active: bool) -> AppResult<()> {
        sqlx::query("UPDATE allocations SET active = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(active)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn insert_distribution(
        &mut self,
        batch_id: BatchId,
        agent_id: AgentId,
        quantity: i32,
    ) -> AppResult<DistributionHistoryEntry> {
        let row = sqlx::query_as::<_, DistributionRow>(
            r#"
            INSERT INTO distribution_history (batch_id, agent_id, quantity)
            VALUES ($1, $2, $3)
            RETURNING id, batch_id, agent_id, quantity, distributed_at
            "#,
        )
        .bind(batch_id)
        .bind(agent_id)
        .bind(quantity)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(DistributionHistoryEntry {
            id: row.id,
            batch_id: row.batch_id,
            agent_id: row.agent_id,
            quantity: row.quantity,
            distributed_at: row.distributed_at,
        })
    }

    async fn insert_sale_line(&mut self, new: &NewSaleLine) -> AppResult<SaleLine> {
        let row = sqlx::query_as::<_, SaleLineRow>(&format!(
            r#"
            INSERT INTO sale_lines (sale_group_id, customer_name, phone, address, customer_type,
                                    notes, product_name, quantity, unit_price, line_total,
                                    sale_total, seller_id, seller_name, seller_email,
                                    payment_method, pix_amount, card_amount, cash_amount,
                                    photo_path, allocation_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16,
                    $17, $18, $19, $20)
            RETURNING {}
            "#,
            SALE_LINE_COLUMNS
        ))
        .bind(&new.sale_group_id)
        .bind(&new.customer.name)
        .bind(&new.customer.phone)
        .bind(&new.customer.address)
        .bind(&new.customer.customer_type)
        .bind(&new.customer.notes)
        .bind(&new.line.product_name)
        .bind(new.line.quantity)
        .bind(new.line.unit_price)
        .bind(new.line.line_total)
        .bind(new.sale_total)
        .bind(new.seller_id)
        .bind(&new.seller_name)
        .bind(&new.seller_email)
        .bind(&new.payment.method)
        .bind(new.payment.pix)
        .bind(new.payment.card)
        .bind(new.payment.cash)
        .bind(&new.payment.photo_path)
        .bind(new.line.allocation_id)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(row.into())
    }

    async fn lock_sale_group(&mut self, line_id: SaleLineId) -> AppResult<Vec<SaleLine>> {
        let rows = sqlx::query_as::<_, SaleLineRow>(&format!(
            r#"
            SELECT {} FROM sale_lines
            WHERE id = $1
               OR (COALESCE(sale_group_id, '') <> ''
                   AND sale_group_id = (SELECT sale_group_id FROM sale_lines WHERE id = $1))
            ORDER BY id
            FOR UPDATE
            "#,
            SALE_LINE_COLUMNS
        ))
        .bind(line_id)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn update_sale_line_product(
        &mut self,
        id: SaleLineId,
        allocation_id: AllocationId,
        product_name: &str,
        unit_price: Decimal,
        line_total: Decimal,
    ) -> AppResult<SaleLine> {
        let row = sqlx::query_as::<_, SaleLineRow>(&format!(
            r#"
            UPDATE sale_lines
            SET allocation_id = $2, product_name = $3, unit_price = $4, line_total = $5
            WHERE id = $1
            RETURNING {}
            "#,
            SALE_LINE_COLUMNS
        ))
        .bind(id)
        .bind(allocation_id)
        .bind(product_name)
        .bind(unit_price)
        .bind(line_total)
        .fetch_optional(&mut *self.tx)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Sale line {}", id)))?;
        Ok(row.into())
    }

    async fn set_sale_total(&mut self, line_ids: &[SaleLineId], total: Decimal) -> AppResult<()> {
        sqlx::query("UPDATE sale_lines SET sale_total = $2 WHERE id = ANY($1)")
            .bind(line_ids)
            .bind(total)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn reassign_seller(
        &mut self,
        line_ids: &[SaleLineId],
        seller: &Agent,
    ) -> AppResult<Vec<SaleLine>> {
        let rows = sqlx::query_as::<_, SaleLineRow>(&format!(
            r#"
            UPDATE sale_lines
            SET original_seller = COALESCE(original_seller, seller_name),
                seller_id = $2, seller_name = $3, seller_email = $4, transferred = TRUE
            WHERE id = ANY($1) AND seller_id <> $2
            RETURNING {}
            "#,
            SALE_LINE_COLUMNS
        ))
        .bind(line_ids)
        .bind(seller.id)
        .bind(&seller.name)
        .bind(&seller.email)
        .fetch_all(&mut *self.tx)
        .await?;

        let mut lines: Vec<SaleLine> = rows.into_iter().map(Into::into).collect();
        lines.sort_by_key(|l| l.id);
        Ok(lines)
    }

    async fn delete_sale_line(&mut self, id: SaleLineId) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM sale_lines WHERE id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Sale line {}", id)));
        }
        Ok(())
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        self.tx.commit().await?;
        Ok(())
    }
}
