//! HTTP handlers for agent stock

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::models::{AgentId, AgentStock, AllocationDetail, AllocationId, StockLookupQuery};
use crate::services::StockService;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct AgentStockQuery {
    pub agent_id: AgentId,
    #[serde(default)]
    pub hide_empty: bool,
}

/// Active stock of one agent
pub async fn get_agent_stock(
    State(state): State<AppState>,
    Query(query): Query<AgentStockQuery>,
) -> AppResult<Json<AgentStock>> {
    let service = StockService::new(state.store);
    let stock = service.agent_stock(query.agent_id, query.hide_empty).await?;
    Ok(Json(stock))
}

/// Find a product in an agent's stock by barcode or serial number
pub async fn lookup_stock(
    State(state): State<AppState>,
    Query(query): Query<StockLookupQuery>,
) -> AppResult<Json<AllocationDetail>> {
    let code = query.code().ok_or_else(|| {
        AppError::invalid(
            "barcode",
            "A barcode or serial number is required",
            "Informe o código de barras ou o número de série",
        )
    })?;

    let service = StockService::new(state.store);
    let item = service.lookup(query.agent_id, code).await?;
    Ok(Json(item))
}

/// Stock of every agent
pub async fn get_stock_overview(
    State(state): State<AppState>,
) -> AppResult<Json<Vec<AgentStock>>> {
    let service = StockService::new(state.store);
    let overview = service.overview().await?;
    Ok(Json(overview))
}

/// Soft-remove an allocation
pub async fn remove_allocation(
    State(state): State<AppState>,
    Path(allocation_id): Path<AllocationId>,
) -> AppResult<StatusCode> {
    let service = StockService::new(state.store);
    service.remove_allocation(allocation_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
