//! HTTP handlers for sales

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::NaiveDate;
use serde::Deserialize;

use crate::error::AppResult;
use crate::models::{
    AgentId, DateRange, ExchangeInput, ExchangeOutcome, PaginatedResponse, Pagination,
    RecordSaleInput, SaleDeletionOutcome, SaleFilters, SaleGroup, SaleGroupResult, SaleLine,
    SaleLineId, SaleSortKey, SellerSummary, TransferAttributionInput,
};
use crate::services::{SaleMutationService, SaleService};
use crate::AppState;

/// Query string of the sale history
#[derive(Debug, Default, Deserialize)]
pub struct SaleListQuery {
    pub seller_id: Option<AgentId>,
    pub customer: Option<String>,
    pub identity_code: Option<String>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    #[serde(default)]
    pub sort: SaleSortKey,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

/// Record a checkout
pub async fn record_sale(
    State(state): State<AppState>,
    Json(input): Json<RecordSaleInput>,
) -> AppResult<(StatusCode, Json<SaleGroupResult>)> {
    let service = SaleService::new(state.store);
    let result = service.record_sale(input).await?;
    Ok((StatusCode::CREATED, Json(result)))
}

/// Sale history grouped by checkout
pub async fn list_sales(
    State(state): State<AppState>,
    Query(query): Query<SaleListQuery>,
) -> AppResult<Json<PaginatedResponse<SaleGroup>>> {
    let sales = &state.config.sales;
    let pagination = Pagination::new(
        query.page.unwrap_or(1),
        query
            .per_page
            .unwrap_or(sales.default_page_size)
            .min(sales.max_page_size),
    );
    let filters = SaleFilters {
        seller_id: query.seller_id,
        customer: query.customer,
        identity_code: query.identity_code,
        from: query.from,
        to: query.to,
    };

    let service = SaleService::new(state.store);
    let page = service.list_sales(filters, pagination, query.sort).await?;
    Ok(Json(page))
}

/// The sale group containing a line
pub async fn get_sale(
    State(state): State<AppState>,
    Path(line_id): Path<SaleLineId>,
) -> AppResult<Json<SaleGroup>> {
    let service = SaleService::new(state.store);
    let group = service.get_sale(line_id).await?;
    Ok(Json(group))
}

/// Totals per seller
pub async fn seller_summary(
    State(state): State<AppState>,
    Query(range): Query<DateRange>,
) -> AppResult<Json<Vec<SellerSummary>>> {
    let service = SaleService::new(state.store);
    let summary = service.seller_summary(range).await?;
    Ok(Json(summary))
}

/// Swap the product behind a sale line
pub async fn exchange_product(
    State(state): State<AppState>,
    Json(input): Json<ExchangeInput>,
) -> AppResult<Json<ExchangeOutcome>> {
    let service = SaleMutationService::new(state.store);
    let outcome = service.exchange_product(input).await?;
    Ok(Json(outcome))
}

/// Attribute a sale to another seller
pub async fn transfer_attribution(
    State(state): State<AppState>,
    Path(line_id): Path<SaleLineId>,
    Json(input): Json<TransferAttributionInput>,
) -> AppResult<Json<Vec<SaleLine>>> {
    let service = SaleMutationService::new(state.store);
    let lines = service
        .transfer_attribution(line_id, input.new_seller_id)
        .await?;
    Ok(Json(lines))
}

/// Delete one sale line
pub async fn delete_sale_line(
    State(state): State<AppState>,
    Path(line_id): Path<SaleLineId>,
) -> AppResult<Json<SaleDeletionOutcome>> {
    let service = SaleMutationService::new(state.store);
    let outcome = service.delete_sale_line(line_id).await?;
    Ok(Json(outcome))
}

/// Delete the whole sale group containing a line
pub async fn delete_sale(
    State(state): State<AppState>,
    Path(line_id): Path<SaleLineId>,
) -> AppResult<Json<SaleDeletionOutcome>> {
    let service = SaleMutationService::new(state.store);
    let outcome = service.delete_sale(line_id).await?;
    Ok(Json(outcome))
}
