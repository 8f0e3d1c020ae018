//! Repository Ports
//!
//! Abstract interfaces for run persistence.

mod snapshot_repository;

pub use snapshot_repository::*;
