//! Domain models for the resale stock platform

mod agent;
mod allocation;
mod catalog;
mod distribution;
mod sale;

pub use agent::*;
pub use allocation::*;
pub use catalog::*;
pub use distribution::*;
pub use sale::*;
