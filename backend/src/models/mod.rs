//! Domain models
//!
//! Re-exports models and common types from the shared crate

pub use shared::models::*;
pub use shared::types::*;
