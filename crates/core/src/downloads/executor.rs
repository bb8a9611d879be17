//! Seam between the tracker and whatever actually moves the bytes.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::downloads::registry::TaskRegistry;
use crate::downloads::task::TaskUpdate;
use crate::error::TrackerError;
use crate::types::TaskId;

/// What the executor is asked to download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadJob {
    pub task_id: TaskId,
    pub model_name: String,
    pub revision: String,
}

/// Terminal callback of one execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionOutcome {
    /// Every file is present locally.
    Completed { total_bytes: u64 },
    /// Unrecoverable error; the message is stored on the task.
    Failed(String),
    /// The cancellation token was observed and partial output removed.
    Aborted,
}

/// Performs the transfer for a single task.
///
/// Implementations must check `cancel` at least between chunks, delete any
/// partial output they created before returning [`ExecutionOutcome::Aborted`],
/// and stop writing once [`ProgressHandle::begin`] or
/// [`ProgressHandle::report`] returns an error.
#[async_trait]
pub trait DownloadExecutor: Send + Sync {
    async fn execute(
        &self,
        job: DownloadJob,
        progress: ProgressHandle,
        cancel: CancellationToken,
    ) -> ExecutionOutcome;
}

/// Progress callback bound to one task.
#[derive(Debug, Clone)]
pub struct ProgressHandle {
    registry: Arc<TaskRegistry>,
    task_id: TaskId,
}

impl ProgressHandle {
    pub fn new(registry: Arc<TaskRegistry>, task_id: TaskId) -> Self {
        Self { registry, task_id }
    }

    /// Move the task to `downloading`.
    ///
    /// Rejected once the task has been cancelled; the executor must then
    /// return without writing anything.
    pub async fn begin(
        &self,
        message: impl Into<String>,
        download_path: Option<&Path>,
    ) -> Result<(), TrackerError> {
        let path = download_path.map(|p| p.display().to_string());
        self.registry
            .update(self.task_id, TaskUpdate::started(message, path))
            .await
            .map(|_| ())
    }

    /// Record cumulative bytes and a human-readable progress message.
    pub async fn report(
        &self,
        bytes_so_far: u64,
        message: impl Into<String>,
    ) -> Result<(), TrackerError> {
        self.registry
            .update(self.task_id, TaskUpdate::progress(bytes_so_far, message))
            .await
            .map(|_| ())
    }
}
