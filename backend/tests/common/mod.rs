//! Fixtures shared by the integration tests

#![allow(dead_code)]

use std::str::FromStr;
use std::sync::Arc;

use rust_decimal::Decimal;
use stock_server::models::{
    Agent, Allocation, AllocationId, CustomerInfo, DistributeInput, IdentificationKind,
    LooseNumber, PaymentInfo, ProductBatch, RecordSaleInput, RegisterAgentInput,
    RegisterBatchInput, SaleLineRequest,
};
use stock_server::services::{AgentService, CatalogService, DistributionService};
use stock_server::store::{MemoryStockStore, StockStore};

pub fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

pub fn store() -> Arc<dyn StockStore> {
    Arc::new(MemoryStockStore::new())
}

pub async fn agent(store: &Arc<dyn StockStore>, name: &str) -> Agent {
    AgentService::new(store.clone())
        .register(RegisterAgentInput {
            name: name.to_string(),
            email: format!("{}@example.com", name.to_lowercase()),
            is_admin: false,
        })
        .await
        .unwrap()
}

pub fn batch_input(name: &str, quantity: i32, price: &str) -> RegisterBatchInput {
    RegisterBatchInput {
        name: name.to_string(),
        description: None,
        color: None,
        serial_number: None,
        barcode: None,
        unit_cost_usd: dec(price),
        exchange_rate: dec("1"),
        quantity,
        identification: IdentificationKind::None,
        supplier: None,
        category_id: None,
    }
}

/// Register a batch whose unit price is `price`
pub async fn batch(
    store: &Arc<dyn StockStore>,
    name: &str,
    quantity: i32,
    price: &str,
) -> ProductBatch {
    CatalogService::new(store.clone())
        .register(batch_input(name, quantity, price))
        .await
        .unwrap()
}

pub async fn distribute(
    store: &Arc<dyn StockStore>,
    batch: &ProductBatch,
    agent: &Agent,
    quantity: i32,
) -> Allocation {
    DistributionService::new(store.clone())
        .distribute(DistributeInput {
            batch_id: batch.id,
            agent_id: agent.id,
            quantity,
        })
        .await
        .unwrap()
}

pub fn customer() -> CustomerInfo {
    CustomerInfo {
        name: "Maria Souza".to_string(),
        phone: "11999990000".to_string(),
        address: "Rua das Flores, 42".to_string(),
        customer_type: Some("retail".to_string()),
        notes: None,
    }
}

pub fn line(allocation_id: AllocationId, quantity: i64) -> SaleLineRequest {
    SaleLineRequest {
        allocation_id,
        name: None,
        quantity: LooseNumber::Integer(quantity),
        custom_price: None,
    }
}

pub fn sale(seller: &Agent, lines: Vec<SaleLineRequest>) -> RecordSaleInput {
    RecordSaleInput {
        customer: customer(),
        lines,
        seller_id: seller.id,
        payment: PaymentInfo {
            method: "pix".to_string(),
            ..Default::default()
        },
    }
}

/// Current quantity of an allocation, read outside any transaction
pub async fn allocation_quantity(store: &Arc<dyn StockStore>, batch_id: i64, id: AllocationId) -> i32 {
    store
        .list_batch_allocations(batch_id)
        .await
        .unwrap()
        .into_iter()
        .find(|a| a.id == id)
        .map(|a| a.quantity)
        .unwrap()
}

pub async fn remaining(store: &Arc<dyn StockStore>, batch_id: i64) -> i32 {
    store
        .get_batch(batch_id)
        .await
        .unwrap()
        .unwrap()
        .quantity_remaining
}
