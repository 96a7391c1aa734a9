//! Concurrent access tests against PostgreSQL
//!
//! These exercise the row locks taken by `PgStockStore`. They need a
//! database reachable through `DATABASE_URL` and are skipped without one.

mod common;

use std::sync::Arc;

use common::*;
use sqlx::postgres::PgPoolOptions;
use stock_server::error::ErrorKind;
use stock_server::models::{Agent, RedistributeInput, RegisterAgentInput};
use stock_server::services::{AgentService, DistributionService, SaleService};
use stock_server::store::{PgStockStore, StockStore};
use uuid::Uuid;

async fn pg_store() -> Option<Arc<dyn StockStore>> {
    let Ok(url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL is not set, skipping");
        return None;
    };
    let pool = PgPoolOptions::new()
        .max_connections(8)
        .connect(&url)
        .await
        .unwrap();
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();
    Some(Arc::new(PgStockStore::new(pool)))
}

/// Agent with an email unique to this run, so the database can be reused
async fn unique_agent(store: &Arc<dyn StockStore>, name: &str) -> Agent {
    let suffix = Uuid::new_v4().simple().to_string();
    AgentService::new(store.clone())
        .register(RegisterAgentInput {
            name: name.to_string(),
            email: format!("{}-{}@example.com", name.to_lowercase(), suffix),
            is_admin: false,
        })
        .await
        .unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_pg_two_sales_of_three_from_five_exactly_one_succeeds() {
    let Some(store) = pg_store().await else {
        return;
    };
    let ana = unique_agent(&store, "Ana").await;
    let phone = batch(&store, "iPhone 13", 5, "3000").await;
    let stock = distribute(&store, &phone, &ana, 5).await;
    let service = SaleService::new(store.clone());

    let first = tokio::spawn({
        let service = service.clone();
        let input = sale(&ana, vec![line(stock.id, 3)]);
        async move { service.record_sale(input).await }
    });
    let second = tokio::spawn({
        let service = service.clone();
        let input = sale(&ana, vec![line(stock.id, 3)]);
        async move { service.record_sale(input).await }
    });

    let results = [first.await.unwrap(), second.await.unwrap()];
    let succeeded = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(succeeded, 1);

    let failure = results.iter().find_map(|r| r.as_ref().err()).unwrap();
    assert_eq!(failure.kind(), ErrorKind::InsufficientStock);
    assert_eq!(allocation_quantity(&store, phone.id, stock.id).await, 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_pg_opposite_redistributions_do_not_lose_units() {
    let Some(store) = pg_store().await else {
        return;
    };
    let ana = unique_agent(&store, "Ana").await;
    let bruno = unique_agent(&store, "Bruno").await;
    let phone = batch(&store, "iPhone 13", 20, "3000").await;
    let from_ana = distribute(&store, &phone, &ana, 10).await;
    let from_bruno = distribute(&store, &phone, &bruno, 10).await;
    let service = DistributionService::new(store.clone());

    let mut handles = Vec::new();
    for i in 0..20 {
        let service = service.clone();
        let (key, source, destination) = if i % 2 == 0 {
            (from_ana.id, ana.id, bruno.id)
        } else {
            (from_bruno.id, bruno.id, ana.id)
        };
        handles.push(tokio::spawn(async move {
            service
                .redistribute(RedistributeInput {
                    key,
                    source_agent_id: source,
                    destination_agent_id: destination,
                    quantity: 1,
                })
                .await
        }));
    }

    let mut succeeded = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => succeeded += 1,
            // A deadlock would surface here as an internal error
            Err(err) => assert_ne!(err.kind(), ErrorKind::Internal, "{err}"),
        }
    }
    assert_eq!(succeeded, 20);

    let allocations = store.list_batch_allocations(phone.id).await.unwrap();
    let total: i32 = allocations.iter().map(|a| a.quantity).sum();
    assert_eq!(total, 20);
    assert!(allocations.iter().all(|a| a.quantity >= 0));
    assert_eq!(allocation_quantity(&store, phone.id, from_ana.id).await, 10);
    assert_eq!(allocation_quantity(&store, phone.id, from_bruno.id).await, 10);
}
