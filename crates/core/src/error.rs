use crate::downloads::DownloadStatus;
use crate::types::TaskId;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),
}

/// Errors returned synchronously by the download tracker.
///
/// Transfer failures are not represented here: they are recorded on the
/// task itself (`status = failed`) and only observed through polling.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TrackerError {
    /// An active (pending or downloading) task already exists for the model.
    #[error("Model {model_name} is already being downloaded (task {task_id})")]
    DuplicateActiveDownload { model_name: String, task_id: TaskId },

    /// The task id is not (or no longer) tracked.
    #[error("Unknown download task: {0}")]
    UnknownTask(TaskId),

    /// Cancellation requested for a task that can no longer be cancelled.
    #[error("Download task {0} is already finished or being cancelled")]
    AlreadyTerminal(TaskId),

    /// A mutation was attempted on a task in a terminal state.
    #[error("Download task {0} is in a terminal state and cannot be updated")]
    TerminalTaskImmutable(TaskId),

    /// The state machine does not allow moving from `from` to `to`.
    #[error("Download task {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: TaskId,
        from: DownloadStatus,
        to: DownloadStatus,
    },

    /// The tracker has been shut down and accepts no new downloads.
    #[error("Download tracker is shutting down")]
    ShuttingDown,

    /// The request was rejected before a task was created.
    #[error("Invalid download request: {0}")]
    InvalidRequest(String),
}

impl From<CoreError> for TrackerError {
    fn from(err: CoreError) -> Self {
        TrackerError::InvalidRequest(err.to_string())
    }
}
