//! Domain Entities
//!
//! Core business objects of the simulation.

mod character;
mod delta;
mod life_event;
mod mental_state;
mod scenario;
mod snapshot;

pub use character::*;
pub use delta::*;
pub use life_event::*;
pub use mental_state::*;
pub use scenario::*;
pub use snapshot::*;
