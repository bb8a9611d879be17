//! Read-side projection of the registry for the dashboard.

use serde::{Deserialize, Serialize};

use crate::download_manager::format_size;
use crate::downloads::registry::TaskRegistry;
use crate::downloads::task::{DownloadStatus, DownloadTask};
use crate::types::{TaskId, Timestamp};

/// Serialisable view of one task as shown in the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadSnapshot {
    pub id: TaskId,
    pub model_name: String,
    pub revision: String,
    pub status: DownloadStatus,
    pub progress: String,
    pub downloaded_bytes: u64,
    pub downloaded_size_human: String,
    pub elapsed_seconds: u64,
    pub error: Option<String>,
    pub started_at: Timestamp,
    pub finished_at: Option<Timestamp>,
}

impl From<&DownloadTask> for DownloadSnapshot {
    fn from(task: &DownloadTask) -> Self {
        Self {
            id: task.id,
            model_name: task.model_name.clone(),
            revision: task.revision.clone(),
            status: task.status,
            progress: task.progress.clone(),
            downloaded_bytes: task.downloaded_bytes,
            downloaded_size_human: format_size(task.downloaded_bytes),
            elapsed_seconds: task.elapsed_seconds(),
            error: task.error.clone(),
            started_at: task.started_at,
            finished_at: task.finished_at,
        }
    }
}

/// Builds [`DownloadSnapshot`] lists from the registry.
///
/// Holds only a reference; snapshots are computed on demand and never
/// cached, so `elapsed_seconds` is always fresh.
pub struct StatusReporter<'a> {
    registry: &'a TaskRegistry,
}

impl<'a> StatusReporter<'a> {
    pub fn new(registry: &'a TaskRegistry) -> Self {
        Self { registry }
    }

    /// Snapshots of every active task, in registration order.
    pub async fn active(&self) -> Vec<DownloadSnapshot> {
        self.registry
            .list_active()
            .await
            .iter()
            .map(DownloadSnapshot::from)
            .collect()
    }

    /// Snapshots of every tracked task, terminal ones included.
    pub async fn all(&self) -> Vec<DownloadSnapshot> {
        self.registry
            .list_all()
            .await
            .iter()
            .map(DownloadSnapshot::from)
            .collect()
    }

    pub async fn get(&self, task_id: TaskId) -> Option<DownloadSnapshot> {
        self.registry
            .get(task_id)
            .await
            .as_ref()
            .map(DownloadSnapshot::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::downloads::task::TaskUpdate;

    #[tokio::test]
    async fn snapshot_formats_size_and_status() {
        let registry = TaskRegistry::new();
        let task = registry.register("acme/model-a", "main").await.unwrap();
        registry
            .update(task.id, TaskUpdate::started("Downloading", None))
            .await
            .unwrap();
        registry
            .update(task.id, TaskUpdate::progress(1536, "weights.bin"))
            .await
            .unwrap();

        let snapshot = StatusReporter::new(&registry).get(task.id).await.unwrap();
        assert_eq!(snapshot.id, task.id);
        assert_eq!(snapshot.status, DownloadStatus::Downloading);
        assert_eq!(snapshot.downloaded_size_human, "1.50 KB");
        assert_eq!(snapshot.progress, "weights.bin");
    }

    #[tokio::test]
    async fn active_excludes_finished_tasks() {
        let registry = TaskRegistry::new();
        let a = registry.register("acme/a", "main").await.unwrap();
        registry.register("acme/b", "main").await.unwrap();
        registry.update(a.id, TaskUpdate::cancelled()).await.unwrap();

        let reporter = StatusReporter::new(&registry);
        assert_eq!(reporter.active().await.len(), 1);
        assert_eq!(reporter.all().await.len(), 2);
    }

    #[test]
    fn snapshot_serializes_status_as_string() {
        let task = DownloadTask::new("acme/a", "main");
        let json = serde_json::to_value(DownloadSnapshot::from(&task)).unwrap();
        assert_eq!(json["status"], "pending");
        assert_eq!(json["downloaded_size_human"], "0 B");
        assert_eq!(json["model_name"], "acme/a");
    }
}
