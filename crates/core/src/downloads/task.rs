//! Download task value object and its state machine.

use serde::{Deserialize, Serialize};

use crate::error::TrackerError;
use crate::types::{TaskId, Timestamp};

/// Message stored when a failure is reported without any detail.
const UNKNOWN_ERROR: &str = "unknown error";

/// Lifecycle status of a download task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DownloadStatus {
    /// Registered, executor not yet transferring.
    Pending,
    /// Executor is transferring files.
    Downloading,
    /// All files are materialised locally.
    Completed,
    /// The executor hit an unrecoverable error.
    Failed,
    /// Aborted on request; partial output removed.
    Cancelled,
}

impl DownloadStatus {
    /// `completed`, `failed`, or `cancelled`.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DownloadStatus::Completed | DownloadStatus::Failed | DownloadStatus::Cancelled
        )
    }

    /// `pending` or `downloading`.
    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DownloadStatus::Pending => "pending",
            DownloadStatus::Downloading => "downloading",
            DownloadStatus::Completed => "completed",
            DownloadStatus::Failed => "failed",
            DownloadStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for DownloadStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One tracked attempt to download a model's files into local storage.
///
/// Fields are public for reading; every mutation goes through the
/// transition methods below so the state machine invariants hold:
/// terminal states are frozen, `downloaded_bytes` never rewinds, and
/// `error` is set exactly when the status is `failed`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadTask {
    pub id: TaskId,
    pub model_name: String,
    pub revision: String,
    pub status: DownloadStatus,
    pub progress: String,
    pub downloaded_bytes: u64,
    pub error: Option<String>,
    pub started_at: Timestamp,
    pub finished_at: Option<Timestamp>,
    pub download_path: Option<String>,
    /// A cancellation signal was delivered; waiting for the executor's ack.
    #[serde(default)]
    pub cancel_requested: bool,
    /// Removal was requested while downloading; the task is dropped from the
    /// registry as soon as it is finalised.
    #[serde(default)]
    pub remove_when_finished: bool,
}

/// Partial mutation applied by [`DownloadTask::apply`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskUpdate {
    pub status: Option<DownloadStatus>,
    pub progress: Option<String>,
    pub downloaded_bytes: Option<u64>,
    pub error: Option<String>,
    pub download_path: Option<String>,
}

impl TaskUpdate {
    /// Progress/byte update for a running transfer.
    pub fn progress(bytes: u64, message: impl Into<String>) -> Self {
        Self {
            progress: Some(message.into()),
            downloaded_bytes: Some(bytes),
            ..Self::default()
        }
    }

    /// `pending -> downloading`.
    pub fn started(message: impl Into<String>, download_path: Option<String>) -> Self {
        Self {
            status: Some(DownloadStatus::Downloading),
            progress: Some(message.into()),
            download_path,
            ..Self::default()
        }
    }

    /// `downloading -> completed` with the final byte total.
    pub fn completed(total_bytes: u64, message: impl Into<String>) -> Self {
        Self {
            status: Some(DownloadStatus::Completed),
            progress: Some(message.into()),
            downloaded_bytes: Some(total_bytes),
            ..Self::default()
        }
    }

    /// any non-terminal state `-> failed`.
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            status: Some(DownloadStatus::Failed),
            error: Some(error.into()),
            ..Self::default()
        }
    }

    /// `pending|downloading -> cancelled`.
    pub fn cancelled() -> Self {
        Self {
            status: Some(DownloadStatus::Cancelled),
            progress: Some("Download cancelled".to_string()),
            ..Self::default()
        }
    }
}

impl DownloadTask {
    /// Create a task in `pending`.
    pub fn new(model_name: impl Into<String>, revision: impl Into<String>) -> Self {
        Self {
            id: TaskId::new_v4(),
            model_name: model_name.into(),
            revision: revision.into(),
            status: DownloadStatus::Pending,
            progress: "Queued".to_string(),
            downloaded_bytes: 0,
            error: None,
            started_at: chrono::Utc::now(),
            finished_at: None,
            download_path: None,
            cancel_requested: false,
            remove_when_finished: false,
        }
    }

    /// Seconds since the task was created, computed at read time.
    pub fn elapsed_seconds(&self) -> u64 {
        let elapsed = chrono::Utc::now() - self.started_at;
        elapsed.num_seconds().max(0) as u64
    }

    /// Whether a status change from the current status to `next` is allowed.
    fn can_transition_to(&self, next: DownloadStatus) -> bool {
        use DownloadStatus::*;
        match (self.status, next) {
            (from, to) if from == to => !from.is_terminal(),
            (Pending, Downloading) => true,
            (Downloading, Completed) => true,
            (Pending | Downloading, Failed | Cancelled) => true,
            _ => false,
        }
    }

    /// Apply a partial update, enforcing the state machine.
    ///
    /// Fails with [`TrackerError::TerminalTaskImmutable`] once the task is
    /// terminal and with [`TrackerError::InvalidTransition`] for transitions
    /// the state machine does not allow (e.g. `pending -> completed`),
    /// leaving the task untouched in both cases.
    pub fn apply(&mut self, update: TaskUpdate) -> Result<(), TrackerError> {
        if self.status.is_terminal() {
            return Err(TrackerError::TerminalTaskImmutable(self.id));
        }
        if let Some(next) = update.status {
            if !self.can_transition_to(next) {
                return Err(TrackerError::InvalidTransition {
                    id: self.id,
                    from: self.status,
                    to: next,
                });
            }
        }

        if let Some(bytes) = update.downloaded_bytes {
            if bytes < self.downloaded_bytes {
                tracing::debug!(
                    task_id = %self.id,
                    current = self.downloaded_bytes,
                    reported = bytes,
                    "Ignoring byte count that would rewind progress",
                );
            } else {
                self.downloaded_bytes = bytes;
            }
        }
        if let Some(progress) = update.progress {
            self.progress = progress;
        }
        if let Some(path) = update.download_path {
            self.download_path = Some(path);
        }

        if let Some(next) = update.status {
            self.status = next;
            if next == DownloadStatus::Failed {
                let message = update
                    .error
                    .filter(|e| !e.trim().is_empty())
                    .unwrap_or_else(|| UNKNOWN_ERROR.to_string());
                self.progress = format!("Download failed: {message}");
                self.error = Some(message);
            }
            if next.is_terminal() {
                self.finished_at = Some(chrono::Utc::now());
                self.cancel_requested = false;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn new_task_is_pending() {
        let task = DownloadTask::new("acme/model-a", "main");
        assert_eq!(task.status, DownloadStatus::Pending);
        assert_eq!(task.downloaded_bytes, 0);
        assert!(task.error.is_none());
        assert!(task.finished_at.is_none());
    }

    #[test]
    fn status_classification() {
        assert!(DownloadStatus::Completed.is_terminal());
        assert!(DownloadStatus::Failed.is_terminal());
        assert!(DownloadStatus::Cancelled.is_terminal());
        assert!(DownloadStatus::Pending.is_active());
        assert!(DownloadStatus::Downloading.is_active());
    }

    #[test]
    fn status_serializes_lowercase() {
        let json = serde_json::to_string(&DownloadStatus::Downloading).unwrap();
        assert_eq!(json, "\"downloading\"");
    }

    #[test]
    fn happy_path_transitions() {
        let mut task = DownloadTask::new("acme/model-a", "main");
        task.apply(TaskUpdate::started("Starting download...", None))
            .unwrap();
        assert_eq!(task.status, DownloadStatus::Downloading);

        task.apply(TaskUpdate::progress(1024, "config.json")).unwrap();
        assert_eq!(task.downloaded_bytes, 1024);

        task.apply(TaskUpdate::completed(2048, "done")).unwrap();
        assert_eq!(task.status, DownloadStatus::Completed);
        assert_eq!(task.downloaded_bytes, 2048);
        assert!(task.finished_at.is_some());
    }

    #[test]
    fn bytes_never_rewind() {
        let mut task = DownloadTask::new("acme/model-a", "main");
        task.apply(TaskUpdate::started("start", None)).unwrap();
        task.apply(TaskUpdate::progress(4096, "a")).unwrap();
        task.apply(TaskUpdate::progress(100, "b")).unwrap();
        assert_eq!(task.downloaded_bytes, 4096);
        assert_eq!(task.progress, "b");
    }

    #[test]
    fn failure_without_message_gets_placeholder() {
        let mut task = DownloadTask::new("acme/model-a", "main");
        task.apply(TaskUpdate::failed("  ")).unwrap();
        assert_eq!(task.status, DownloadStatus::Failed);
        assert_eq!(task.error.as_deref(), Some(UNKNOWN_ERROR));
    }

    #[test]
    fn terminal_task_is_frozen() {
        let mut task = DownloadTask::new("acme/model-a", "main");
        task.apply(TaskUpdate::failed("network unreachable"))
            .unwrap();
        let frozen = task.clone();

        assert_matches!(
            task.apply(TaskUpdate::progress(10, "late")),
            Err(TrackerError::TerminalTaskImmutable(_))
        );
        assert_matches!(
            task.apply(TaskUpdate::cancelled()),
            Err(TrackerError::TerminalTaskImmutable(_))
        );
        assert_eq!(task, frozen);
    }

    #[test]
    fn pending_cannot_complete_directly() {
        let mut task = DownloadTask::new("acme/model-a", "main");
        assert_matches!(
            task.apply(TaskUpdate::completed(1, "done")),
            Err(TrackerError::InvalidTransition {
                from: DownloadStatus::Pending,
                to: DownloadStatus::Completed,
                ..
            })
        );
        assert_eq!(task.status, DownloadStatus::Pending);
    }

    #[test]
    fn downloading_cannot_go_back_to_pending() {
        let mut task = DownloadTask::new("acme/model-a", "main");
        task.apply(TaskUpdate::started("start", None)).unwrap();
        let update = TaskUpdate {
            status: Some(DownloadStatus::Pending),
            ..TaskUpdate::default()
        };
        assert!(task.apply(update).is_err());
    }

    #[test]
    fn cancelled_clears_error_free() {
        let mut task = DownloadTask::new("acme/model-a", "main");
        task.apply(TaskUpdate::cancelled()).unwrap();
        assert_eq!(task.status, DownloadStatus::Cancelled);
        assert!(task.error.is_none());
    }
}
