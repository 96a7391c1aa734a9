//! HTTP handlers
//!
//! Handlers stay thin: they decode the request, build the service from the
//! shared state and encode the result.

pub mod agent;
pub mod catalog;
pub mod distribution;
pub mod health;
pub mod sale;
pub mod stock;

pub use agent::*;
pub use catalog::*;
pub use distribution::*;
pub use health::*;
pub use sale::*;
pub use stock::*;
