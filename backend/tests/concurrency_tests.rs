//! Concurrent access tests
//!
//! Requests race on a multi-threaded runtime; quantities must neither go
//! negative nor be lost.

mod common;

use common::*;
use stock_server::error::ErrorKind;
use stock_server::models::{DistributeInput, RedistributeInput};
use stock_server::services::{DistributionService, SaleService};
use stock_server::store::StockStore;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_two_sales_of_three_from_five_exactly_one_succeeds() {
    let store = store();
    let ana = agent(&store, "Ana").await;
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
async fn test_concurrent_distributions_conserve_stock() {
    let store = store();
    let ana = agent(&store, "Ana").await;
    let bruno = agent(&store, "Bruno").await;
    let phone = batch(&store, "iPhone 13", 20, "3000").await;
    let service = DistributionService::new(store.clone());
    let batch_id = phone.id;

    let mut handles = Vec::new();
    for i in 0..30 {
        let service = service.clone();
        let agent_id = if i % 2 == 0 { ana.id } else { bruno.id };
        handles.push(tokio::spawn(async move {
            service
                .distribute(DistributeInput {
                    batch_id,
                    agent_id,
                    quantity: 1,
                })
                .await
        }));
    }

    let mut succeeded = 0;
    for handle in handles {
        if handle.await.unwrap().is_ok() {
            succeeded += 1;
        }
    }

    assert_eq!(succeeded, 20);
    assert_eq!(remaining(&store, phone.id).await, 0);
    let allocated: i32 = store
        .list_batch_allocations(phone.id)
        .await
        .unwrap()
        .iter()
        .map(|a| a.quantity)
        .sum();
    assert_eq!(allocated, 20);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_opposite_redistributions_do_not_lose_units() {
    let store = store();
    let ana = agent(&store, "Ana").await;
    let bruno = agent(&store, "Bruno").await;
    let phone = batch(&store, "iPhone 13", 20, "3000").await;
    distribute(&store, &phone, &ana, 10).await;
    distribute(&store, &phone, &bruno, 10).await;
    let service = DistributionService::new(store.clone());
    let batch_id = phone.id;

    let mut handles = Vec::new();
    for i in 0..20 {
        let service = service.clone();
        let (source, destination) = if i % 2 == 0 {
            (ana.id, bruno.id)
        } else {
            (bruno.id, ana.id)
        };
        handles.push(tokio::spawn(async move {
            service
                .redistribute(RedistributeInput {
                    key: batch_id,
                    source_agent_id: source,
                    destination_agent_id: destination,
                    quantity: 1,
                })
                .await
        }));
    }
    for handle in handles {
        let _ = handle.await.unwrap();
    }

    let allocations = store.list_batch_allocations(phone.id).await.unwrap();
    let total: i32 = allocations.iter().map(|a| a.quantity).sum();
    assert_eq!(total, 20);
    assert!(allocations.iter().all(|a| a.quantity >= 0));
}
