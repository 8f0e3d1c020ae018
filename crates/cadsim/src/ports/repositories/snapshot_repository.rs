//! Snapshot Repository Port
//!
//! Append-only storage for a run's daily snapshots and final report.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::{errors::DomainError, DailySnapshot, FinalReport};

/// Repository interface for run artifacts
#[async_trait]
pub trait SnapshotRepository: Send + Sync {
    /// Prepare storage for a new run; failure aborts the run
    async fn create_run(&self, run_id: Uuid) -> Result<(), DomainError>;

    /// Persist one day's snapshot; a day is never overwritten
    async fn save_snapshot(&self, run_id: Uuid, snapshot: &DailySnapshot)
        -> Result<(), DomainError>;

    /// Load a day's snapshot
    async fn load_snapshot(&self, run_id: Uuid, day: u32)
        -> Result<Option<DailySnapshot>, DomainError>;

    /// Days persisted for a run, ascending
    async fn list_days(&self, run_id: Uuid) -> Result<Vec<u32>, DomainError>;

    async fn save_final_report(&self, run_id: Uuid, report: &FinalReport)
        -> Result<(), DomainError>;

    async fn load_final_report(&self, run_id: Uuid) -> Result<Option<FinalReport>, DomainError>;

    /// Most recent persisted snapshot (the recovery point of a run)
    async fn latest_snapshot(&self, run_id: Uuid) -> Result<Option<DailySnapshot>, DomainError> {
        match self.list_days(run_id).await?.last() {
            Some(day) => self.load_snapshot(run_id, *day).await,
            None => Ok(None),
        }
    }
}
