//! Route definitions for the resale stock server

use axum::{
    routing::{delete, get, post, put},
    Router,
};

use crate::{handlers, AppState};

/// Create API routes
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(handlers::health_check))
        .nest("/agents", agent_routes())
        .nest("/catalog", catalog_routes())
        .nest("/stock", stock_routes())
        .nest("/distributions", distribution_routes())
        .nest("/sales", sale_routes())
}

fn agent_routes() -> Router<AppState> {
    Router::new().route(
        "/",
        get(handlers::list_agents).post(handlers::register_agent),
    )
}

fn catalog_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/batches",
            get(handlers::list_batches).post(handlers::register_batch),
        )
        .route(
            "/batches/:id",
            get(handlers::get_batch)
                .patch(handlers::update_batch)
                .delete(handlers::delete_batch),
        )
}

fn stock_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::get_agent_stock))
        .route("/lookup", get(handlers::lookup_stock))
        .route("/agents", get(handlers::get_stock_overview))
        .route("/allocations/:id", delete(handlers::remove_allocation))
}

fn distribution_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_distribution_history).post(handlers::distribute),
        )
        .route("/redistribute", post(handlers::redistribute))
}

fn sale_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_sales).post(handlers::record_sale))
        .route("/summary", get(handlers::seller_summary))
        .route("/exchange", post(handlers::exchange_product))
        .route(
            "/lines/:id",
            get(handlers::get_sale).delete(handlers::delete_sale_line),
        )
        .route("/lines/:id/group", delete(handlers::delete_sale))
        .route("/lines/:id/transfer", put(handlers::transfer_attribution))
}
