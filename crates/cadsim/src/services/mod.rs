//! Application Services
//!
//! Orchestration on top of the domain: LLM-backed assessment, event
//! generation, the final analysis and the day-by-day driver.

mod analysis;
mod assessor;
mod generator;
mod simulation;

pub use analysis::*;
pub use assessor::*;
pub use generator::*;
pub use simulation::*;
