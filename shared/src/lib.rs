//! Shared types and models for the resale stock platform
//!
//! This crate contains the domain records, input types and the pure quantity,
//! pricing and validation helpers used by the backend engine. Nothing in here
//! performs I/O.

pub mod history;
pub mod models;
pub mod stock;
pub mod types;
pub mod validation;

pub use history::*;
pub use models::*;
pub use stock::*;
pub use types::*;
pub use validation::*;
