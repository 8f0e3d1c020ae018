//! Domain Services
//!
//! Pure update logic: rules, stochastic variation, fusion, conditions and
//! report readings. Nothing here performs I/O.

mod condition;
mod fusion;
mod report;
mod rules;
mod stochastic;

pub use condition::*;
pub use fusion::*;
pub use report::*;
pub use rules::*;
pub use stochastic::*;
