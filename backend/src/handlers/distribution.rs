//! HTTP handlers for stock distribution

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};

use crate::error::AppResult;
use crate::models::{
    Allocation, DateRange, DistributeInput, DistributionHistoryView, RedistributeInput,
    RedistributionOutcome,
};
use crate::services::DistributionService;
use crate::AppState;

/// Distribute stock from a batch to an agent
pub async fn distribute(
    State(state): State<AppState>,
    Json(input): Json<DistributeInput>,
) -> AppResult<(StatusCode, Json<Allocation>)> {
    let service = DistributionService::new(state.store);
    let allocation = service.distribute(input).await?;
    Ok((StatusCode::CREATED, Json(allocation)))
}

/// Move stock between agents
pub async fn redistribute(
    State(state): State<AppState>,
    Json(input): Json<RedistributeInput>,
) -> AppResult<Json<RedistributionOutcome>> {
    let service = DistributionService::new(state.store);
    let outcome = service.redistribute(input).await?;
    Ok(Json(outcome))
}

/// Distribution log within an optional date range
pub async fn list_distribution_history(
    State(state): State<AppState>,
    Query(range): Query<DateRange>,
) -> AppResult<Json<Vec<DistributionHistoryView>>> {
    let service = DistributionService::new(state.store);
    let history = service.history(range).await?;
    Ok(Json(history))
}
