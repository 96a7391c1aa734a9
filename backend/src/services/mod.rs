//! Business logic services for the resale stock platform

pub mod agent;
pub mod catalog;
pub mod distribution;
pub mod sale;
pub mod sale_mutation;
pub mod stock;

pub use agent::AgentService;
pub use catalog::CatalogService;
pub use distribution::DistributionService;
pub use sale::SaleService;
pub use sale_mutation::SaleMutationService;
pub use stock::StockService;
