//! Sale mutation engine: product exchange, seller attribution transfer and
//! administrative deletion
//!
//! Every operation locks the sale group's lines first and the allocations
//! second, each in ascending id order.

use std::sync::Arc;

use rust_decimal::Decimal;
use shared::{
    checked_deposit, checked_total, checked_withdraw, line_total, requested_per_allocation,
    MAX_AMOUNT,
};

use crate::error::{AppError, AppResult};
use crate::models::{
    AgentId, AllocationId, ExchangeInput, ExchangeOutcome, SaleDeletionOutcome, SaleLine,
    SaleLineId,
};
use crate::store::{StockStore, StockTx};

/// Service for changing recorded sales
#[derive(Clone)]
pub struct SaleMutationService {
    store: Arc<dyn StockStore>,
}

impl SaleMutationService {
    pub fn new(store: Arc<dyn StockStore>) -> Self {
        Self { store }
    }

    /// Replace the allocation behind a sale line, moving its quantity back to
    /// the old allocation and out of the new one
    ///
    /// Without an explicit price the new batch price is used. The quantity
    /// of the line never changes.
    pub async fn exchange_product(&self, input: ExchangeInput) -> AppResult<ExchangeOutcome> {
        if input.unit_price.is_some_and(|p| p <= Decimal::ZERO) {
            return Err(AppError::invalid(
                "unit_price",
                "Unit price must be greater than zero",
                "O preço unitário deve ser maior que zero",
            ));
        }
        if input.unit_price.is_some_and(|p| p > MAX_AMOUNT) {
            return Err(AppError::invalid(
                "unit_price",
                "Unit price is too large",
                "O preço unitário é grande demais",
            ));
        }

        let mut tx = self.store.begin().await?;

        let group = lock_group(tx.as_mut(), input.sale_line_id).await?;
        let line = group
            .iter()
            .find(|l| l.id == input.sale_line_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Sale line {}", input.sale_line_id)))?;

        if line.allocation_id == input.new_allocation_id {
            return Err(AppError::invalid(
                "new_allocation_id",
                "The new product must differ from the current one",
                "O novo produto deve ser diferente do atual",
            ));
        }

        let (first, second) = if line.allocation_id < input.new_allocation_id {
            (line.allocation_id, input.new_allocation_id)
        } else {
            (input.new_allocation_id, line.allocation_id)
        };
        let first_locked = tx.lock_allocation(first).await?;
        let second_locked = tx.lock_allocation(second).await?;
        let (old, new) = if first == line.allocation_id {
            (first_locked, second_locked)
        } else {
            (second_locked, first_locked)
        };

        let old = old
            .ok_or_else(|| AppError::NotFound(format!("Allocation {}", line.allocation_id)))?;
        let new = new
            .filter(|n| n.allocation.active)
            .ok_or_else(|| AppError::NotFound(format!("Allocation {}", input.new_allocation_id)))?;

        let new_left = checked_withdraw(new.quantity(), line.quantity)
            .map_err(|e| AppError::from_quantity(&new.product_name, e))?;
        let old_restored = checked_deposit(old.quantity(), line.quantity)
            .map_err(|e| AppError::from_quantity(&old.product_name, e))?;

        let unit_price = input.unit_price.unwrap_or(new.unit_price);
        let new_line_total = line_total(unit_price, line.quantity)
            .map_err(|e| AppError::from_quantity(&new.product_name, e))?;

        tx.set_allocation_quantity(old.id(), old_restored).await?;
        tx.set_allocation_quantity(new.id(), new_left).await?;
        let mut updated = tx
            .update_sale_line_product(
                line.id,
                new.id(),
                &new.product_name,
                unit_price,
                new_line_total,
            )
            .await?;

        let group_total = checked_total(group.iter().map(|l| {
            if l.id == line.id {
                new_line_total
            } else {
                l.line_total
            }
        }))
        .map_err(|e| AppError::from_quantity("Sale", e))?;
        let ids: Vec<SaleLineId> = group.iter().map(|l| l.id).collect();
        tx.set_sale_total(&ids, group_total).await?;
        updated.sale_total = group_total;

        tx.commit().await?;

        tracing::info!(
            sale_line_id = line.id,
            from_allocation = old.id(),
            to_allocation = new.id(),
            quantity = line.quantity,
            "Sale product exchanged"
        );

        Ok(ExchangeOutcome {
            sale_line: updated,
            previous_product: line.product_name,
            new_product: new.product_name,
            quantity: line.quantity,
        })
    }

    /// Attribute the whole sale group containing a line to another seller
    pub async fn transfer_attribution(
        &self,
        line_id: SaleLineId,
        new_seller_id: AgentId,
    ) -> AppResult<Vec<SaleLine>> {
        let mut tx = self.store.begin().await?;

        let group = lock_group(tx.as_mut(), line_id).await?;
        let seller = tx
            .find_agent(new_seller_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Agent {}", new_seller_id)))?;

        if group.iter().all(|l| l.seller_id == seller.id) {
            return Err(AppError::invalid(
                "new_seller_id",
                "The sale already belongs to this seller",
                "A venda já pertence a este vendedor",
            ));
        }

        let ids: Vec<SaleLineId> = group
            .iter()
            .filter(|l| l.seller_id != seller.id)
            .map(|l| l.id)
            .collect();
        let reassigned = tx.reassign_seller(&ids, &seller).await?;

        tx.commit().await?;

        tracing::info!(
            sale_line_id = line_id,
            new_seller_id = seller.id,
            lines = reassigned.len(),
            "Sale attribution transferred"
        );

        let lines: Vec<SaleLine> = group
            .into_iter()
            .map(|l| {
                reassigned
                    .iter()
                    .find(|r| r.id == l.id)
                    .cloned()
                    .unwrap_or(l)
            })
            .collect();

        Ok(lines)
    }

    /// Delete one line, returning its quantity to its allocation
    pub async fn delete_sale_line(&self, line_id: SaleLineId) -> AppResult<SaleDeletionOutcome> {
        let mut tx = self.store.begin().await?;

        let group = lock_group(tx.as_mut(), line_id).await?;
        let (removed, kept): (Vec<SaleLine>, Vec<SaleLine>) =
            group.into_iter().partition(|l| l.id == line_id);

        let outcome = delete_lines(tx.as_mut(), &removed, &kept).await?;
        tx.commit().await?;

        tracing::info!(sale_line_id = line_id, "Sale line deleted");
        Ok(outcome)
    }

    /// Delete every line of the sale group containing a line
    pub async fn delete_sale(&self, line_id: SaleLineId) -> AppResult<SaleDeletionOutcome> {
        let mut tx = self.store.begin().await?;

        let group = lock_group(tx.as_mut(), line_id).await?;
        let outcome = delete_lines(tx.as_mut(), &group, &[]).await?;
        tx.commit().await?;

        tracing::info!(
            sale_line_id = line_id,
            lines = outcome.deleted_line_ids.len(),
            "Sale deleted"
        );
        Ok(outcome)
    }
}

async fn lock_group(tx: &mut dyn StockTx, line_id: SaleLineId) -> AppResult<Vec<SaleLine>> {
    let group = tx.lock_sale_group(line_id).await?;
    if group.is_empty() {
        return Err(AppError::NotFound(format!("Sale line {}", line_id)));
    }
    Ok(group)
}

/// Restore stock for `removed`, delete those lines and refresh the total of `kept`
async fn delete_lines(
    tx: &mut dyn StockTx,
    removed: &[SaleLine],
    kept: &[SaleLine],
) -> AppResult<SaleDeletionOutcome> {
    let returns: Vec<(AllocationId, i32)> = removed
        .iter()
        .map(|l| (l.allocation_id, l.quantity))
        .collect();
    let per_allocation =
        requested_per_allocation(&returns).map_err(|e| AppError::from_quantity("Sale", e))?;

    let mut restored_units = 0i64;
    for (allocation_id, quantity) in per_allocation {
        let allocation = tx
            .lock_allocation(allocation_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Allocation {}", allocation_id)))?;
        let restored = checked_deposit(allocation.quantity(), quantity)
            .map_err(|e| AppError::from_quantity(&allocation.product_name, e))?;
        tx.set_allocation_quantity(allocation_id, restored).await?;
        restored_units += i64::from(quantity);
    }

    for line in removed {
        tx.delete_sale_line(line.id).await?;
    }

    let remaining_total = if kept.is_empty() {
        None
    } else {
        let total = checked_total(kept.iter().map(|l| l.line_total))
            .map_err(|e| AppError::from_quantity("Sale", e))?;
        let ids: Vec<SaleLineId> = kept.iter().map(|l| l.id).collect();
        tx.set_sale_total(&ids, total).await?;
        Some(total)
    };

    Ok(SaleDeletionOutcome {
        deleted_line_ids: removed.iter().map(|l| l.id).collect(),
        restored_units,
        remaining_total,
    })
}
