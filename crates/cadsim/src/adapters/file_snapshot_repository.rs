//! File-system snapshot repository
//!
//! Layout: `<root>/<run_id>/day_<N>.json` and `<root>/<run_id>/final_report.json`.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::domain::{errors::DomainError, DailySnapshot, FinalReport};
use crate::ports::SnapshotRepository;

pub const FINAL_REPORT_FILE: &str = "final_report.json";

#[derive(Debug, Clone)]
pub struct FileSnapshotRepository {
    root: PathBuf,
}

impl FileSnapshotRepository {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn run_dir(&self, run_id: Uuid) -> PathBuf {
        self.root.join(run_id.to_string())
    }

    pub fn day_path(&self, run_id: Uuid, day: u32) -> PathBuf {
        self.run_dir(run_id).join(format!("day_{}.json", day))
    }

    /// Create-new write; an existing file is an error
    async fn write_new(path: &Path, contents: &str) -> Result<(), DomainError> {
        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .await?;
        file.write_all(contents.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }

    async fn read_optional(path: &Path) -> Result<Option<String>, DomainError> {
        match tokio::fs::read_to_string(path).await {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

fn parse_day(file_name: &str) -> Option<u32> {
    file_name
        .strip_prefix("day_")?
        .strip_suffix(".json")?
        .parse()
        .ok()
}

#[async_trait]
impl SnapshotRepository for FileSnapshotRepository {
    async fn create_run(&self, run_id: Uuid) -> Result<(), DomainError> {
        let dir = self.run_dir(run_id);
        tokio::fs::create_dir_all(&dir).await?;
        tracing::info!("📁 Run directory ready: {}", dir.display());
        Ok(())
    }

    async fn save_snapshot(
        &self,
        run_id: Uuid,
        snapshot: &DailySnapshot,
    ) -> Result<(), DomainError> {
        let path = self.day_path(run_id, snapshot.day);
        let json = snapshot.to_json_pretty()?;
        Self::write_new(&path, &json).await?;
        tracing::debug!("💾 Saved {}", path.display());
        Ok(())
    }

    async fn load_snapshot(
        &self,
        run_id: Uuid,
        day: u32,
    ) -> Result<Option<DailySnapshot>, DomainError> {
        let path = self.day_path(run_id, day);
        match Self::read_optional(&path).await? {
            Some(json) => DailySnapshot::from_json_str(&json)
                .map(Some)
                .map_err(|e| DomainError::Validation(format!("{}: {}", path.display(), e))),
            None => Ok(None),
        }
    }

    async fn list_days(&self, run_id: Uuid) -> Result<Vec<u32>, DomainError> {
        let dir = self.run_dir(run_id);
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut days = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if let Some(day) = entry.file_name().to_str().and_then(parse_day) {
                days.push(day);
            }
        }
        days.sort_unstable();
        Ok(days)
    }

    async fn save_final_report(
        &self,
        run_id: Uuid,
        report: &FinalReport,
    ) -> Result<(), DomainError> {
        let path = self.run_dir(run_id).join(FINAL_REPORT_FILE);
        let json = serde_json::to_string_pretty(report)?;
        Self::write_new(&path, &json).await?;
        tracing::info!("📄 Final report written to {}", path.display());
        Ok(())
    }

    async fn load_final_report(&self, run_id: Uuid) -> Result<Option<FinalReport>, DomainError> {
        let path = self.run_dir(run_id).join(FINAL_REPORT_FILE);
        match Self::read_optional(&path).await? {
            Some(json) => serde_json::from_str(&json)
                .map(Some)
                .map_err(|e| DomainError::Validation(format!("{}: {}", path.display(), e))),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        relationship_views, MentalState, MentalStateView, ProtagonistView,
    };

    fn temp_root() -> PathBuf {
        std::env::temp_dir().join(format!("cadsim-test-{}", Uuid::new_v4()))
    }

    fn snapshot(day: u32) -> DailySnapshot {
        DailySnapshot {
            day,
            stage: "early".to_string(),
            events: Vec::new(),
            protagonist: ProtagonistView {
                name: "李明".to_string(),
                age: 15,
                current_mental_state: MentalStateView::from(&MentalState::default()),
                symptoms: Vec::new(),
                risk_factors: Vec::new(),
            },
            relationships: relationship_views("李明", &[]),
        }
    }

    #[test]
    fn test_parse_day() {
        assert_eq!(parse_day("day_12.json"), Some(12));
        assert_eq!(parse_day("final_report.json"), None);
        assert_eq!(parse_day("day_x.json"), None);
    }

    #[tokio::test]
    async fn test_save_load_and_list() {
        let root = temp_root();
        let repo = FileSnapshotRepository::new(&root);
        let run_id = Uuid::new_v4();
        repo.create_run(run_id).await.unwrap();

        for day in [2, 1, 10] {
            repo.save_snapshot(run_id, &snapshot(day)).await.unwrap();
        }
        assert_eq!(repo.list_days(run_id).await.unwrap(), vec![1, 2, 10]);
        assert_eq!(
            repo.load_snapshot(run_id, 2).await.unwrap(),
            Some(snapshot(2))
        );
        assert_eq!(repo.load_snapshot(run_id, 3).await.unwrap(), None);
        assert_eq!(repo.latest_snapshot(run_id).await.unwrap().unwrap().day, 10);

        tokio::fs::remove_dir_all(&root).await.unwrap();
    }

    #[tokio::test]
    async fn test_days_are_append_only() {
        let root = temp_root();
        let repo = FileSnapshotRepository::new(&root);
        let run_id = Uuid::new_v4();
        repo.create_run(run_id).await.unwrap();

        repo.save_snapshot(run_id, &snapshot(1)).await.unwrap();
        let err = repo.save_snapshot(run_id, &snapshot(1)).await.unwrap_err();
        assert!(matches!(err, DomainError::Io(_)));

        tokio::fs::remove_dir_all(&root).await.unwrap();
    }

    #[tokio::test]
    async fn test_unknown_run_is_empty() {
        let repo = FileSnapshotRepository::new(temp_root());
        let run_id = Uuid::new_v4();
        assert!(repo.list_days(run_id).await.unwrap().is_empty());
        assert!(repo.latest_snapshot(run_id).await.unwrap().is_none());
        assert!(repo.load_final_report(run_id).await.unwrap().is_none());
    }
}
