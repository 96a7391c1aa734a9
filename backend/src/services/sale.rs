//! Sale transaction processor and sale history queries

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use shared::{
    checked_withdraw, filter_sale_groups, generate_sale_group_id, group_sale_rows, paginate,
    parse_price, parse_quantity, price_line, requested_per_allocation, sale_total,
    sort_sale_groups, summarize_sellers, validate_customer,
};

use crate::error::{AppError, AppResult};
use crate::models::{
    AllocationDetail, AllocationId, DateRange, NewSaleLine, PaginatedResponse, Pagination,
    PricedLine, RecordSaleInput, RecordedLine, SaleFilters, SaleGroup, SaleGroupResult,
    SaleLineId, SaleSortKey, SellerSummary,
};
use crate::store::StockStore;

/// A requested line after its numbers were parsed
struct ParsedLine {
    allocation_id: AllocationId,
    label: String,
    quantity: i32,
    custom_price: Option<Decimal>,
}

/// Sale service for checkouts and the sale history
#[derive(Clone)]
pub struct SaleService {
    store: Arc<dyn StockStore>,
}

impl SaleService {
    pub fn new(store: Arc<dyn StockStore>) -> Self {
        Self { store }
    }

    /// Record a checkout of one or more lines as a single sale group
    ///
    /// Every line is validated against the locked allocations before anything
    /// is written; any failure aborts the whole sale.
    pub async fn record_sale(&self, input: RecordSaleInput) -> AppResult<SaleGroupResult> {
        validate_customer(&input.customer).map_err(|msg| {
            AppError::invalid("customer", msg, format!("Dados do cliente inválidos: {}", msg))
        })?;
        let parsed = parse_lines(&input)?;

        let requested: Vec<(AllocationId, i32)> = parsed
            .iter()
            .map(|l| (l.allocation_id, l.quantity))
            .collect();
        let per_allocation = requested_per_allocation(&requested)
            .map_err(|e| AppError::from_quantity("Sale", e))?;

        let mut tx = self.store.begin().await?;

        let seller = tx
            .find_agent(input.seller_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Agent {}", input.seller_id)))?;

        // BTreeMap iteration keeps the lock order ascending by allocation id
        let mut locked: BTreeMap<AllocationId, (AllocationDetail, i32)> = BTreeMap::new();
        for (&allocation_id, &total_requested) in &per_allocation {
            let label = parsed
                .iter()
                .find(|l| l.allocation_id == allocation_id)
                .map(|l| l.label.clone())
                .unwrap_or_else(|| format!("Allocation {}", allocation_id));

            let detail = tx
                .lock_allocation(allocation_id)
                .await?
                .filter(|d| d.allocation.active)
                .ok_or_else(|| AppError::NotFound(label.clone()))?;

            let left = checked_withdraw(detail.quantity(), total_requested)
                .map_err(|e| AppError::from_quantity(&label, e))?;
            locked.insert(allocation_id, (detail, left));
        }

        let mut priced: Vec<PricedLine> = Vec::with_capacity(parsed.len());
        for line in &parsed {
            let (detail, _) = locked
                .get(&line.allocation_id)
                .ok_or_else(|| AppError::Internal("allocation was not locked".to_string()))?;
            let priced_line = price_line(detail, line.quantity, line.custom_price)
                .map_err(|e| AppError::from_quantity(&line.label, e))?;
            priced.push(priced_line);
        }
        let total = sale_total(&priced).map_err(|e| AppError::from_quantity("Sale", e))?;
        let sale_group_id = generate_sale_group_id(Utc::now());

        for (allocation_id, (_, left)) in &locked {
            tx.set_allocation_quantity(*allocation_id, *left).await?;
        }

        let mut recorded = Vec::with_capacity(priced.len());
        for line in priced {
            let stored = tx
                .insert_sale_line(&NewSaleLine {
                    sale_group_id: sale_group_id.clone(),
                    customer: input.customer.clone(),
                    payment: input.payment.clone(),
                    line: line.clone(),
                    sale_total: total,
                    seller_id: seller.id,
                    seller_name: seller.name.clone(),
                    seller_email: seller.email.clone(),
                })
                .await?;
            recorded.push(RecordedLine {
                sale_line_id: stored.id,
                line,
            });
        }

        tx.commit().await?;

        tracing::info!(
            sale_group_id = %sale_group_id,
            seller_id = seller.id,
            lines = recorded.len(),
            total = %total,
            "Sale recorded"
        );

        Ok(SaleGroupResult {
            sale_group_id,
            customer_name: input.customer.name,
            lines: recorded,
            sale_total: total,
        })
    }

    /// Sale history grouped by checkout
    pub async fn list_sales(
        &self,
        filters: SaleFilters,
        pagination: Pagination,
        sort: SaleSortKey,
    ) -> AppResult<PaginatedResponse<SaleGroup>> {
        let rows = self
            .store
            .list_sale_rows(filters.seller_id, &filters.date_range())
            .await?;

        let mut groups = filter_sale_groups(group_sale_rows(rows), &filters);
        sort_sale_groups(&mut groups, sort);

        Ok(paginate(groups, &pagination))
    }

    /// The whole sale group containing a line
    pub async fn get_sale(&self, line_id: SaleLineId) -> AppResult<SaleGroup> {
        let rows = self.store.sale_rows_for_line(line_id).await?;
        group_sale_rows(rows)
            .into_iter()
            .next()
            .ok_or_else(|| AppError::NotFound(format!("Sale line {}", line_id)))
    }

    /// Per-seller totals over an optional date range
    pub async fn seller_summary(&self, range: DateRange) -> AppResult<Vec<SellerSummary>> {
        let rows = self.store.list_sale_rows(None, &range).await?;
        let lines: Vec<_> = rows.into_iter().map(|r| r.line).collect();
        Ok(summarize_sellers(&lines))
    }
}

fn parse_lines(input: &RecordSaleInput) -> AppResult<Vec<ParsedLine>> {
    if input.lines.is_empty() {
        return Err(AppError::invalid(
            "lines",
            "A sale needs at least one product",
            "A venda precisa de pelo menos um produto",
        ));
    }

    input
        .lines
        .iter()
        .enumerate()
        .map(|(i, line)| {
            let label = line
                .name
                .clone()
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| format!("Allocation {}", line.allocation_id));

            let quantity = parse_quantity(&line.quantity).map_err(|msg| {
                AppError::invalid(
                    &format!("lines[{}].quantity", i),
                    format!("{}: {}", label, msg),
                    format!("{}: quantidade inválida", label),
                )
            })?;

            let custom_price = match &line.custom_price {
                Some(raw) => parse_price(raw).map_err(|msg| {
                    AppError::invalid(
                        &format!("lines[{}].custom_price", i),
                        format!("{}: {}", label, msg),
                        format!("{}: preço inválido", label),
                    )
                })?,
                None => None,
            };

            Ok(ParsedLine {
                allocation_id: line.allocation_id,
                label,
                quantity,
                custom_price,
            })
        })
        .collect()
}
