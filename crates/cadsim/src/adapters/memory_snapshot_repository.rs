//! In-memory snapshot repository (tests and embedding)

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::{errors::DomainError, DailySnapshot, FinalReport};
use crate::ports::SnapshotRepository;

#[derive(Debug, Default)]
struct RunArtifacts {
    days: BTreeMap<u32, DailySnapshot>,
    final_report: Option<FinalReport>,
}

#[derive(Debug, Default)]
pub struct MemorySnapshotRepository {
    runs: RwLock<HashMap<Uuid, RunArtifacts>>,
    /// Day whose save fails, for exercising I/O failure handling
    fail_on_day: Option<u32>,
}

impl MemorySnapshotRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on_day(day: u32) -> Self {
        Self {
            fail_on_day: Some(day),
            ..Self::default()
        }
    }

    /// All snapshots of a run, in day order
    pub async fn snapshots(&self, run_id: Uuid) -> Vec<DailySnapshot> {
        self.runs
            .read()
            .await
            .get(&run_id)
            .map(|run| run.days.values().cloned().collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl SnapshotRepository for MemorySnapshotRepository {
    async fn create_run(&self, run_id: Uuid) -> Result<(), DomainError> {
        self.runs.write().await.entry(run_id).or_default();
        Ok(())
    }

    async fn save_snapshot(
        &self,
        run_id: Uuid,
        snapshot: &DailySnapshot,
    ) -> Result<(), DomainError> {
        if self.fail_on_day == Some(snapshot.day) {
            return Err(DomainError::Repository(format!(
                "simulated write failure on day {}",
                snapshot.day
            )));
        }
        let mut runs = self.runs.write().await;
        let run = runs
            .get_mut(&run_id)
            .ok_or_else(|| DomainError::Repository(format!("unknown run {}", run_id)))?;
        if run.days.contains_key(&snapshot.day) {
            return Err(DomainError::Repository(format!(
                "day {} already persisted",
                snapshot.day
            )));
        }
        run.days.insert(snapshot.day, snapshot.clone());
        Ok(())
    }

    async fn load_snapshot(
        &self,
        run_id: Uuid,
        day: u32,
    ) -> Result<Option<DailySnapshot>, DomainError> {
        Ok(self
            .runs
            .read()
            .await
            .get(&run_id)
            .and_then(|run| run.days.get(&day).cloned()))
    }

    async fn list_days(&self, run_id: Uuid) -> Result<Vec<u32>, DomainError> {
        Ok(self
            .runs
            .read()
            .await
            .get(&run_id)
            .map(|run| run.days.keys().copied().collect())
            .unwrap_or_default())
    }

    async fn save_final_report(
        &self,
        run_id: Uuid,
        report: &FinalReport,
    ) -> Result<(), DomainError> {
        let mut runs = self.runs.write().await;
        let run = runs
            .get_mut(&run_id)
            .ok_or_else(|| DomainError::Repository(format!("unknown run {}", run_id)))?;
        run.final_report = Some(report.clone());
        Ok(())
    }

    async fn load_final_report(&self, run_id: Uuid) -> Result<Option<FinalReport>, DomainError> {
        Ok(self
            .runs
            .read()
            .await
            .get(&run_id)
            .and_then(|run| run.final_report.clone()))
    }
}
