//! HTTP handlers for the product catalog

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use crate::error::AppResult;
use crate::models::{
    BatchDetail, BatchId, BatchQuery, BatchUpdate, PaginatedResponse, ProductBatch,
    RegisterBatchInput,
};
use crate::services::CatalogService;
use crate::AppState;

/// Register a purchased batch
pub async fn register_batch(
    State(state): State<AppState>,
    Json(input): Json<RegisterBatchInput>,
) -> AppResult<(StatusCode, Json<ProductBatch>)> {
    let service = CatalogService::new(state.store);
    let batch = service.register(input).await?;
    Ok((StatusCode::CREATED, Json(batch)))
}

/// List batches with filters and paging
pub async fn list_batches(
    State(state): State<AppState>,
    Query(query): Query<BatchQuery>,
) -> AppResult<Json<PaginatedResponse<ProductBatch>>> {
    let service = CatalogService::new(state.store);
    let page = service
        .list(
            query,
            state.config.sales.default_page_size,
            state.config.sales.max_page_size,
        )
        .await?;
    Ok(Json(page))
}

/// Get a batch with its active allocations
pub async fn get_batch(
    State(state): State<AppState>,
    Path(batch_id): Path<BatchId>,
) -> AppResult<Json<BatchDetail>> {
    let service = CatalogService::new(state.store);
    let batch = service.get(batch_id).await?;
    Ok(Json(batch))
}

/// Partially update a batch
pub async fn update_batch(
    State(state): State<AppState>,
    Path(batch_id): Path<BatchId>,
    Json(update): Json<BatchUpdate>,
) -> AppResult<Json<ProductBatch>> {
    let service = CatalogService::new(state.store);
    let batch = service.update(batch_id, update).await?;
    Ok(Json(batch))
}

/// Delete a batch that has no sales
pub async fn delete_batch(
    State(state): State<AppState>,
    Path(batch_id): Path<BatchId>,
) -> AppResult<StatusCode> {
    let service = CatalogService::new(state.store);
    service.delete(batch_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
