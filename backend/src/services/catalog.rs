//! Product catalog service: registration and maintenance of purchased batches

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use shared::{
    batch_unit_price, bounded_amount, validate_batch_input, validate_serial_number,
    MAX_EXCHANGE_RATE,
};

use crate::error::{AppError, AppResult};
use crate::models::{
    BatchDetail, BatchId, BatchQuery, BatchUpdate, IdentificationKind, NewProductBatch,
    PaginatedResponse, PaginationMeta, ProductBatch, RegisterBatchInput,
};
use crate::store::{StockStore, StockTx};

/// Catalog service for product batches
#[derive(Clone)]
pub struct CatalogService {
    store: Arc<dyn StockStore>,
}

impl CatalogService {
    pub fn new(store: Arc<dyn StockStore>) -> Self {
        Self { store }
    }

    /// Register a purchased batch; its whole quantity starts in the central pool
    pub async fn register(&self, input: RegisterBatchInput) -> AppResult<ProductBatch> {
        validate_batch_input(&input).map_err(|msg| {
            AppError::invalid("batch", msg, format!("Produto inválido: {}", msg))
        })?;
        let unit_price = batch_unit_price(input.unit_cost_usd, input.exchange_rate)
            .map_err(|e| AppError::from_quantity("Batch price", e))?;

        // Only the codes matching the identification mode are kept
        let kind = input.identification;
        let keep_all = kind == IdentificationKind::None;
        let serial_number =
            non_blank(input.serial_number).filter(|_| keep_all || kind.keeps_serial());
        let barcode = non_blank(input.barcode).filter(|_| keep_all || kind.keeps_barcode());

        let mut tx = self.store.begin().await?;
        if let Some(serial) = &serial_number {
            ensure_serial_available(tx.as_mut(), serial, None).await?;
        }

        let batch = tx
            .insert_batch(&NewProductBatch {
                name: input.name.trim().to_string(),
                description: non_blank(input.description),
                color: non_blank(input.color),
                serial_number,
                barcode,
                unit_cost_usd: input.unit_cost_usd,
                exchange_rate: input.exchange_rate,
                unit_price,
                quantity: input.quantity,
                supplier: non_blank(input.supplier),
                category_id: input.category_id,
                purchased_at: Utc::now(),
            })
            .await?;
        tx.commit().await?;

        tracing::info!(
            batch_id = batch.id,
            quantity = batch.quantity_original,
            "Product batch registered"
        );

        Ok(batch)
    }

    /// A batch with its active allocations
    pub async fn get(&self, id: BatchId) -> AppResult<BatchDetail> {
        let batch = self
            .store
            .get_batch(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Batch {}", id)))?;
        let allocations = self.store.list_batch_allocations(id).await?;

        Ok(BatchDetail { batch, allocations })
    }

    pub async fn list(
        &self,
        query: BatchQuery,
        default_page_size: u32,
        max_page_size: u32,
    ) -> AppResult<PaginatedResponse<ProductBatch>> {
        let pagination = query.pagination(default_page_size, max_page_size);
        let (data, total) = self
            .store
            .list_batches(&query, pagination.offset(), pagination.per_page as usize)
            .await?;

        Ok(PaginatedResponse {
            data,
            pagination: PaginationMeta::new(&pagination, total),
        })
    }

    /// Apply a partial update
    ///
    /// Changing the cost or the exchange rate reprices the batch unless an
    /// explicit price is part of the same update.
    pub async fn update(&self, id: BatchId, update: BatchUpdate) -> AppResult<ProductBatch> {
        let mut tx = self.store.begin().await?;

        let current = tx
            .lock_batch(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Batch {}", id)))?;
        let mut next = update.apply(&current);

        if next.exchange_rate <= Decimal::ZERO {
            return Err(AppError::invalid(
                "exchange_rate",
                "Exchange rate must be greater than zero",
                "A taxa de câmbio deve ser maior que zero",
            ));
        }
        if next.exchange_rate > MAX_EXCHANGE_RATE {
            return Err(AppError::invalid(
                "exchange_rate",
                "Exchange rate is too large",
                "A taxa de câmbio é grande demais",
            ));
        }
        if next.unit_cost_usd < Decimal::ZERO || next.unit_price < Decimal::ZERO {
            return Err(AppError::invalid(
                "unit_price",
                "Price cannot be negative",
                "O preço não pode ser negativo",
            ));
        }
        bounded_amount(next.unit_cost_usd)
            .and_then(|_| bounded_amount(next.unit_price))
            .map_err(|e| AppError::from_quantity("Batch price", e))?;

        if update.unit_price.is_none()
            && (update.unit_cost_usd.is_some() || update.exchange_rate.is_some())
        {
            next.unit_price = batch_unit_price(next.unit_cost_usd, next.exchange_rate)
                .map_err(|e| AppError::from_quantity("Batch price", e))?;
        }
        if next.quantity_remaining < 0 {
            return Err(AppError::invalid(
                "quantity_remaining",
                "Quantity cannot be negative",
                "A quantidade não pode ser negativa",
            ));
        }
        if next.serial_number != current.serial_number {
            if let Some(serial) = &next.serial_number {
                ensure_serial_available(tx.as_mut(), serial, Some(id)).await?;
            }
        }

        let saved = tx.save_batch(&next).await?;
        tx.commit().await?;

        tracing::info!(batch_id = id, "Product batch updated");
        Ok(saved)
    }

    /// Delete a batch with its allocations and distribution history
    ///
    /// Batches already sold from cannot be deleted.
    pub async fn delete(&self, id: BatchId) -> AppResult<()> {
        let mut tx = self.store.begin().await?;

        tx.lock_batch(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Batch {}", id)))?;

        if tx.batch_has_sales(id).await? {
            return Err(AppError::Conflict {
                resource: "batch".to_string(),
                message: "The batch has recorded sales and cannot be deleted".to_string(),
                message_pt: "O produto possui vendas registradas e não pode ser excluído"
                    .to_string(),
            });
        }

        tx.delete_batch(id).await?;
        tx.commit().await?;

        tracing::info!(batch_id = id, "Product batch deleted");
        Ok(())
    }
}

async fn ensure_serial_available(
    tx: &mut dyn StockTx,
    serial: &str,
    exclude: Option<BatchId>,
) -> AppResult<()> {
    validate_serial_number(serial).map_err(|msg| {
        AppError::invalid("serial_number", msg, "Número de série ou IMEI inválido")
    })?;

    if tx.serial_in_use(serial, exclude).await? {
        return Err(AppError::Conflict {
            resource: "serial_number".to_string(),
            message: format!("Serial number {} is already registered", serial),
            message_pt: format!("O número de série {} já está cadastrado", serial),
        });
    }
    Ok(())
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
