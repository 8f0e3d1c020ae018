//! Ports (Interfaces)
//!
//! Abstract interfaces that define how the simulation
//! interacts with external systems (LLM oracle, snapshot storage).
//!
//! Implementations of these traits live in `adapters/` or downstream crates.

pub mod repositories;
pub mod services;

// Re-exports
pub use repositories::*;
pub use services::*;
