//! Adapters
//!
//! Concrete implementations of the ports: snapshot storage on disk and in
//! memory, and transcript-backed oracles for reproducible runs.

mod file_snapshot_repository;
mod memory_snapshot_repository;
mod replay_oracle;

pub use file_snapshot_repository::*;
pub use memory_snapshot_repository::*;
pub use replay_oracle::*;
