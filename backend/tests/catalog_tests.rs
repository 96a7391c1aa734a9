//! Product catalog and stock query tests

mod common;

use common::*;
use stock_server::error::ErrorKind;
use stock_server::models::{
    BatchQuery, BatchUpdate, DateRange, IdentificationKind, IdentityCode, RegisterAgentInput,
};
use stock_server::store::StockStore;
use stock_server::services::{
    AgentService, CatalogService, DistributionService, SaleService, StockService,
};

// ============================================================================
// Registration
// ============================================================================

#[tokio::test]
async fn test_register_batch_prices_from_cost_and_rate() {
    let store = store();
    let mut input = batch_input("Galaxy S23", 3, "400");
    input.exchange_rate = dec("5.1037");

    let batch = CatalogService::new(store.clone())
        .register(input)
        .await
        .unwrap();

    assert_eq!(batch.unit_price, dec("2041.48"));
    assert_eq!(batch.quantity_remaining, 3);
    assert_eq!(batch.quantity_original, 3);
}

#[tokio::test]
async fn test_register_duplicate_serial_is_conflict() {
    let store = store();
    let service = CatalogService::new(store.clone());

    let mut input = batch_input("iPhone 13", 1, "3000");
    input.identification = IdentificationKind::Serial;
    input.serial_number = Some("356938035643809".to_string());
    service.register(input.clone()).await.unwrap();

    let err = service.register(input).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
}

#[tokio::test]
async fn test_register_identification_requires_matching_code() {
    let store = store();
    let service = CatalogService::new(store.clone());

    let mut input = batch_input("iPhone 13", 1, "3000");
    input.identification = IdentificationKind::Serial;
    input.barcode = Some("7891234567890".to_string());
    let err = service.register(input).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);

    let mut input = batch_input("iPhone 13", 1, "3000");
    input.identification = IdentificationKind::Serial;
    input.serial_number = Some("12-34".to_string());
    let err = service.register(input).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
}

#[tokio::test]
async fn test_register_keeps_only_codes_of_the_mode() {
    let store = store();
    let mut input = batch_input("Carregador USB-C", 10, "89.90");
    input.identification = IdentificationKind::Barcode;
    input.barcode = Some("7891234567890".to_string());
    input.serial_number = Some("ABCDEFGH1234".to_string());

    let batch = CatalogService::new(store.clone())
        .register(input)
        .await
        .unwrap();
    assert_eq!(batch.barcode.as_deref(), Some("7891234567890"));
    assert_eq!(batch.serial_number, None);
}

// ============================================================================
// Queries
// ============================================================================

#[tokio::test]
async fn test_get_batch_with_active_allocations() {
    let store = store();
    let ana = agent(&store, "Ana").await;
    let phone = batch(&store, "iPhone 13", 10, "3000").await;
    let kept = distribute(&store, &phone, &ana, 2).await;
    let removed = distribute(&store, &phone, &ana, 3).await;
    StockService::new(store.clone())
        .remove_allocation(removed.id)
        .await
        .unwrap();

    let detail = CatalogService::new(store.clone()).get(phone.id).await.unwrap();
    assert_eq!(detail.batch.quantity_remaining, 5);
    assert_eq!(detail.allocations.len(), 1);
    assert_eq!(detail.allocations[0].id, kept.id);

    let err = CatalogService::new(store.clone()).get(999).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_list_batches_search_and_paging() {
    let store = store();
    let ana = agent(&store, "Ana").await;
    let first = batch(&store, "iPhone 13", 2, "3000").await;
    batch(&store, "iPhone 14", 2, "4000").await;
    batch(&store, "Carregador USB-C", 2, "89.90").await;
    distribute(&store, &first, &ana, 2).await;
    let service = CatalogService::new(store.clone());

    let page = service
        .list(
            BatchQuery {
                search: Some("iphone".to_string()),
                ..Default::default()
            },
            10,
            100,
        )
        .await
        .unwrap();
    assert_eq!(page.pagination.total_items, 2);

    let non_empty = service
        .list(
            BatchQuery {
                hide_empty: true,
                ..Default::default()
            },
            10,
            100,
        )
        .await
        .unwrap();
    assert_eq!(non_empty.pagination.total_items, 2);
    assert!(non_empty.data.iter().all(|b| b.id != first.id));

    // The page size is capped
    let capped = service
        .list(
            BatchQuery {
                per_page: Some(500),
                ..Default::default()
            },
            10,
            2,
        )
        .await
        .unwrap();
    assert_eq!(capped.data.len(), 2);
    assert_eq!(capped.pagination.total_pages, 2);
}

// ============================================================================
// Update & Delete
// ============================================================================

#[tokio::test]
async fn test_update_partial_fields() {
    let store = store();
    let mut input = batch_input("iPhone 13", 4, "3000");
    input.color = Some("Azul".to_string());
    input.description = Some("128GB".to_string());
    let phone = CatalogService::new(store.clone())
        .register(input)
        .await
        .unwrap();

    let update: BatchUpdate =
        serde_json::from_str(r#"{"description": null, "quantity_remaining": 6}"#).unwrap();
    let updated = CatalogService::new(store.clone())
        .update(phone.id, update)
        .await
        .unwrap();

    assert_eq!(updated.description, None);
    assert_eq!(updated.color.as_deref(), Some("Azul"));
    assert_eq!(updated.quantity_remaining, 6);
    assert_eq!(updated.quantity_original, 4);
    assert_eq!(updated.unit_price, dec("3000"));
}

#[tokio::test]
async fn test_update_rate_reprices_unless_price_given() {
    let store = store();
    let phone = batch(&store, "iPhone 13", 4, "500").await;
    let service = CatalogService::new(store.clone());

    let repriced = service
        .update(
            phone.id,
            BatchUpdate {
                exchange_rate: Some(dec("5.5")),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(repriced.unit_price, dec("2750.00"));

    let explicit = service
        .update(
            phone.id,
            BatchUpdate {
                unit_cost_usd: Some(dec("600")),
                unit_price: Some(dec("2999.90")),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(explicit.unit_price, dec("2999.90"));
}

#[tokio::test]
async fn test_prices_beyond_money_column_are_invalid() {
    let store = store();
    let service = CatalogService::new(store.clone());

    let mut input = batch_input("MacBook Pro", 1, "999999999999");
    input.exchange_rate = dec("5.25");
    let err = service.register(input).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);

    let phone = batch(&store, "iPhone 13", 4, "500").await;
    let err = service
        .update(
            phone.id,
            BatchUpdate {
                unit_cost_usd: Some(dec("999999999999")),
                exchange_rate: Some(dec("2")),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);

    let err = service
        .update(
            phone.id,
            BatchUpdate {
                unit_price: Some(dec("79228162514264337593543950335")),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);

    let err = service
        .update(
            phone.id,
            BatchUpdate {
                exchange_rate: Some(dec("10000000000")),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);

    let unchanged = service.get(phone.id).await.unwrap().batch;
    assert_eq!(unchanged.unit_price, dec("500"));
    assert_eq!(unchanged.exchange_rate, dec("1"));
}

#[tokio::test]
async fn test_update_rejects_negative_quantity() {
    let store = store();
    let phone = batch(&store, "iPhone 13", 4, "500").await;

    let err = CatalogService::new(store.clone())
        .update(
            phone.id,
            BatchUpdate {
                quantity_remaining: Some(-1),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
    assert_eq!(remaining(&store, phone.id).await, 4);
}

#[tokio::test]
async fn test_delete_batch_removes_allocations_and_history() {
    let store = store();
    let ana = agent(&store, "Ana").await;
    let phone = batch(&store, "iPhone 13", 4, "3000").await;
    distribute(&store, &phone, &ana, 2).await;

    CatalogService::new(store.clone())
        .delete(phone.id)
        .await
        .unwrap();

    assert!(store.get_batch(phone.id).await.unwrap().is_none());
    assert!(store.list_batch_allocations(phone.id).await.unwrap().is_empty());
    let history = DistributionService::new(store.clone())
        .history(DateRange::default())
        .await
        .unwrap();
    assert!(history.is_empty());
}

#[tokio::test]
async fn test_delete_batch_with_sales_is_conflict() {
    let store = store();
    let ana = agent(&store, "Ana").await;
    let phone = batch(&store, "iPhone 13", 4, "3000").await;
    let stock = distribute(&store, &phone, &ana, 2).await;
    SaleService::new(store.clone())
        .record_sale(sale(&ana, vec![line(stock.id, 1)]))
        .await
        .unwrap();

    let err = CatalogService::new(store.clone())
        .delete(phone.id)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert!(store.get_batch(phone.id).await.unwrap().is_some());
}

// ============================================================================
// Stock Queries & Agents
// ============================================================================

#[tokio::test]
async fn test_agent_stock_and_lookup() {
    let store = store();
    let ana = agent(&store, "Ana").await;
    let bruno = agent(&store, "Bruno").await;
    let mut input = batch_input("Carregador USB-C", 10, "89.90");
    input.identification = IdentificationKind::Barcode;
    input.barcode = Some("7891234567890".to_string());
    let charger = CatalogService::new(store.clone())
        .register(input)
        .await
        .unwrap();
    let phone = batch(&store, "iPhone 13", 1, "3000").await;
    let chargers = distribute(&store, &charger, &ana, 3).await;
    let phones = distribute(&store, &phone, &ana, 1).await;
    SaleService::new(store.clone())
        .record_sale(sale(&ana, vec![line(phones.id, 1)]))
        .await
        .unwrap();
    let service = StockService::new(store.clone());

    let all = service.agent_stock(ana.id, false).await.unwrap();
    assert_eq!(all.item_count, 2);
    assert_eq!(all.total_quantity, 3);

    let non_empty = service.agent_stock(ana.id, true).await.unwrap();
    assert_eq!(non_empty.item_count, 1);

    let found = service
        .lookup(ana.id, IdentityCode::Barcode("7891234567890".to_string()))
        .await
        .unwrap();
    assert_eq!(found.id(), chargers.id);

    let err = service
        .lookup(bruno.id, IdentityCode::Barcode("7891234567890".to_string()))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let overview = service.overview().await.unwrap();
    assert_eq!(overview.len(), 2);
    let bruno_stock = overview.iter().find(|s| s.agent.id == bruno.id).unwrap();
    assert_eq!(bruno_stock.item_count, 0);
}

#[tokio::test]
async fn test_remove_allocation_is_idempotent_and_keeps_pool() {
    let store = store();
    let ana = agent(&store, "Ana").await;
    let phone = batch(&store, "iPhone 13", 5, "3000").await;
    let stock = distribute(&store, &phone, &ana, 2).await;
    let service = StockService::new(store.clone());

    service.remove_allocation(stock.id).await.unwrap();
    service.remove_allocation(stock.id).await.unwrap();

    assert_eq!(service.agent_stock(ana.id, false).await.unwrap().item_count, 0);
    assert_eq!(remaining(&store, phone.id).await, 3);

    let err = service.remove_allocation(999).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_register_agent_duplicate_email() {
    let store = store();
    let service = AgentService::new(store.clone());
    agent(&store, "Ana").await;

    let err = service
        .register(RegisterAgentInput {
            name: "Ana Clara".to_string(),
            email: "ANA@example.com".to_string(),
            is_admin: false,
        })
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    let err = service
        .register(RegisterAgentInput {
            name: "Sem Email".to_string(),
            email: "invalid".to_string(),
            is_admin: false,
        })
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);
    assert_eq!(service.list().await.unwrap().len(), 1);
}
