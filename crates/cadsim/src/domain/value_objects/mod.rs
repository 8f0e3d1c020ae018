//! Value Objects
//!
//! Immutable objects defined by their attributes rather than identity.

mod depression_level;
mod emotion;
mod event_type;
mod sentiment;

pub use depression_level::*;
pub use emotion::*;
pub use event_type::*;
pub use sentiment::*;
