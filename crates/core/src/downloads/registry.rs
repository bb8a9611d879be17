//! Concurrent-safe registry of download tasks.
//!
//! The registry is the single source of truth for which downloads are in
//! flight. All structural mutations take the write lock, so registration is
//! atomic with respect to the duplicate-model check and no reader ever sees
//! a partially applied update. Readers receive clones, never references to
//! the live entries.

use std::time::Duration;

use indexmap::IndexMap;
use tokio::sync::{Notify, RwLock};

use crate::downloads::task::{DownloadStatus, DownloadTask, TaskUpdate};
use crate::error::TrackerError;
use crate::types::TaskId;

/// What the caller must do after a cancellation request was accepted.
#[derive(Debug, Clone, PartialEq)]
pub enum CancelDecision {
    /// The task was still `pending` and is now `cancelled`.
    Cancelled(DownloadTask),
    /// The task is `downloading`; the executor must be signalled and the
    /// task finalised once it acknowledges the abort.
    SignalExecutor,
}

/// Result of a removal request.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoveDecision {
    /// The task was not running and is gone from the registry.
    Removed(DownloadTask),
    /// The task is `downloading`. It stays registered, and keeps blocking a
    /// new download of the same model, until its executor acknowledges the
    /// cancellation; it is then dropped instead of being kept as `cancelled`.
    Deferred(DownloadTask),
}

/// Registration-ordered map of task id to [`DownloadTask`].
#[derive(Debug, Default)]
pub struct TaskRegistry {
    tasks: RwLock<IndexMap<TaskId, DownloadTask>>,
    /// Woken after every mutation; backs [`TaskRegistry::wait_for_terminal`].
    changed: Notify,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a `pending` task for `model_name`.
    ///
    /// Fails with [`TrackerError::DuplicateActiveDownload`] if a pending or
    /// downloading task already exists for the same model.
    pub async fn register(
        &self,
        model_name: impl Into<String>,
        revision: impl Into<String>,
    ) -> Result<DownloadTask, TrackerError> {
        let model_name = model_name.into();
        let mut tasks = self.tasks.write().await;

        if let Some(existing) = tasks
            .values()
            .find(|t| t.model_name == model_name && t.status.is_active())
        {
            return Err(TrackerError::DuplicateActiveDownload {
                model_name,
                task_id: existing.id,
            });
        }

        let task = DownloadTask::new(model_name, revision);
        tasks.insert(task.id, task.clone());
        drop(tasks);

        self.changed.notify_waiters();
        Ok(task)
    }

    /// Apply a progress or status mutation and return the updated snapshot.
    pub async fn update(
        &self,
        task_id: TaskId,
        update: TaskUpdate,
    ) -> Result<DownloadTask, TrackerError> {
        let mut tasks = self.tasks.write().await;
        let task = tasks
            .get_mut(&task_id)
            .ok_or(TrackerError::UnknownTask(task_id))?;
        task.apply(update)?;
        let snapshot = task.clone();
        drop(tasks);

        self.changed.notify_waiters();
        Ok(snapshot)
    }

    /// Check and record a cancellation request in one step.
    ///
    /// A second request for the same task, whether it is already terminal or
    /// still waiting for the executor's acknowledgement, fails with
    /// [`TrackerError::AlreadyTerminal`].
    pub async fn request_cancel(&self, task_id: TaskId) -> Result<CancelDecision, TrackerError> {
        let mut tasks = self.tasks.write().await;
        let task = tasks
            .get_mut(&task_id)
            .ok_or(TrackerError::UnknownTask(task_id))?;

        if task.status.is_terminal() || task.cancel_requested {
            return Err(TrackerError::AlreadyTerminal(task_id));
        }

        let decision = match task.status {
            DownloadStatus::Pending => {
                task.apply(TaskUpdate::cancelled())?;
                CancelDecision::Cancelled(task.clone())
            }
            _ => {
                task.cancel_requested = true;
                task.progress = "Cancelling...".to_string();
                CancelDecision::SignalExecutor
            }
        };
        drop(tasks);

        self.changed.notify_waiters();
        Ok(decision)
    }

    /// Snapshot of one task.
    pub async fn get(&self, task_id: TaskId) -> Option<DownloadTask> {
        self.tasks.read().await.get(&task_id).cloned()
    }

    /// Point-in-time copy of all `pending` and `downloading` tasks.
    pub async fn list_active(&self) -> Vec<DownloadTask> {
        self.tasks
            .read()
            .await
            .values()
            .filter(|t| t.status.is_active())
            .cloned()
            .collect()
    }

    /// Point-in-time copy of every tracked task, in registration order.
    pub async fn list_all(&self) -> Vec<DownloadTask> {
        self.tasks.read().await.values().cloned().collect()
    }

    /// Record the executor's terminal outcome.
    ///
    /// Decided under the write lock: if a cancellation was accepted for the
    /// task, it ends `cancelled` whatever `update` says. A task marked by
    /// [`TaskRegistry::request_remove`] is dropped once finalised.
    pub async fn finalize(
        &self,
        task_id: TaskId,
        update: TaskUpdate,
    ) -> Result<DownloadTask, TrackerError> {
        let mut tasks = self.tasks.write().await;
        let task = tasks
            .get_mut(&task_id)
            .ok_or(TrackerError::UnknownTask(task_id))?;

        let update = if task.cancel_requested && update.status != Some(DownloadStatus::Cancelled) {
            tracing::warn!(
                task_id = %task_id,
                reported = ?update.status,
                "Executor outcome arrived after cancellation was accepted; recording cancelled",
            );
            TaskUpdate::cancelled()
        } else {
            update
        };
        task.apply(update)?;
        let snapshot = task.clone();
        if snapshot.remove_when_finished {
            tasks.shift_remove(&task_id);
        }
        drop(tasks);

        self.changed.notify_waiters();
        Ok(snapshot)
    }

    /// Remove a task, or schedule its removal if it is still downloading.
    ///
    /// Terminal and `pending` tasks are dropped at once; a `pending` task's
    /// executor has not written anything and its `begin` call will be
    /// rejected. A `downloading` task is flagged for cancellation and removal
    /// (see [`RemoveDecision::Deferred`]).
    pub async fn request_remove(&self, task_id: TaskId) -> Result<RemoveDecision, TrackerError> {
        let mut tasks = self.tasks.write().await;
        let task = tasks
            .get_mut(&task_id)
            .ok_or(TrackerError::UnknownTask(task_id))?;

        let decision = if task.status == DownloadStatus::Downloading {
            task.cancel_requested = true;
            task.remove_when_finished = true;
            task.progress = "Cancelling...".to_string();
            RemoveDecision::Deferred(task.clone())
        } else {
            match tasks.shift_remove(&task_id) {
                Some(removed) => RemoveDecision::Removed(removed),
                None => return Err(TrackerError::UnknownTask(task_id)),
            }
        };
        drop(tasks);

        self.changed.notify_waiters();
        Ok(decision)
    }

    /// Evict terminal tasks that finished more than `max_age` ago.
    ///
    /// Returns the number of evicted tasks.
    pub async fn prune_terminal(&self, max_age: Duration) -> usize {
        let max_age = chrono::Duration::from_std(max_age).unwrap_or(chrono::Duration::MAX);
        let now = chrono::Utc::now();

        let mut tasks = self.tasks.write().await;
        let before = tasks.len();
        tasks.retain(|_, task| match task.finished_at {
            Some(finished) if task.status.is_terminal() => now - finished < max_age,
            _ => true,
        });
        let pruned = before - tasks.len();
        drop(tasks);

        if pruned > 0 {
            self.changed.notify_waiters();
        }
        pruned
    }

    /// Number of tracked tasks.
    pub async fn len(&self) -> usize {
        self.tasks.read().await.len()
    }

    /// Wait until the task reaches a terminal state.
    ///
    /// Returns the terminal snapshot, or the current snapshot if `timeout`
    /// elapses first. Fails with [`TrackerError::UnknownTask`] if the task
    /// is (or becomes) absent.
    pub async fn wait_for_terminal(
        &self,
        task_id: TaskId,
        timeout: Duration,
    ) -> Result<DownloadTask, TrackerError> {
        let wait = async {
            loop {
                let notified = self.changed.notified();
                tokio::pin!(notified);
                // Register interest before reading so a concurrent update
                // between the read and the await is not missed.
                notified.as_mut().enable();

                let task = self
                    .get(task_id)
                    .await
                    .ok_or(TrackerError::UnknownTask(task_id))?;
                if task.status.is_terminal() {
                    return Ok(task);
                }
                notified.await;
            }
        };

        match tokio::time::timeout(timeout, wait).await {
            Ok(result) => result,
            Err(_) => self
                .get(task_id)
                .await
                .ok_or(TrackerError::UnknownTask(task_id)),
        }
    }
}
