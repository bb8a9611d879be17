//! Orchestration of registry, executor, and cancellation.
//!
//! [`DownloadTracker`] is the entry point used by the HTTP layer. Every
//! accepted request gets its own spawned supervisor that runs the executor
//! and records the terminal outcome, so callers never wait on a transfer.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::download_manager::{resolve_revision, validate_model_name};
use crate::downloads::executor::{DownloadExecutor, DownloadJob, ExecutionOutcome, ProgressHandle};
use crate::downloads::registry::{CancelDecision, RemoveDecision, TaskRegistry};
use crate::downloads::reporter::{DownloadSnapshot, StatusReporter};
use crate::downloads::task::{DownloadTask, TaskUpdate};
use crate::error::TrackerError;
use crate::types::TaskId;

type TokenMap = Arc<RwLock<HashMap<TaskId, CancellationToken>>>;

/// Handle to the download subsystem. Cheap to clone.
#[derive(Clone)]
pub struct DownloadTracker {
    registry: Arc<TaskRegistry>,
    executor: Arc<dyn DownloadExecutor>,
    /// Cancellation token per running execution.
    tokens: TokenMap,
    /// Parent of every per-task token; cancelled on shutdown.
    shutdown: CancellationToken,
}

impl DownloadTracker {
    pub fn new(executor: Arc<dyn DownloadExecutor>) -> Self {
        Self::with_registry(Arc::new(TaskRegistry::new()), executor)
    }

    pub fn with_registry(registry: Arc<TaskRegistry>, executor: Arc<dyn DownloadExecutor>) -> Self {
        Self {
            registry,
            executor,
            tokens: Arc::new(RwLock::new(HashMap::new())),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn registry(&self) -> &Arc<TaskRegistry> {
        &self.registry
    }

    pub fn reporter(&self) -> StatusReporter<'_> {
        StatusReporter::new(&self.registry)
    }

    // -----------------------------------------------------------------------
    // Commands
    // -----------------------------------------------------------------------

    /// Register a download and hand it to the executor in the background.
    ///
    /// Returns as soon as the task is registered. Fails with
    /// [`TrackerError::ShuttingDown`] once [`DownloadTracker::shutdown`] ran.
    pub async fn start_download(
        &self,
        model_name: &str,
        revision: Option<&str>,
    ) -> Result<TaskId, TrackerError> {
        if self.shutdown.is_cancelled() {
            return Err(TrackerError::ShuttingDown);
        }
        validate_model_name(model_name)?;
        let revision = resolve_revision(revision)?;
        let model_name = model_name.trim();

        let task = self.registry.register(model_name, revision).await?;
        let token = self.shutdown.child_token();
        self.tokens.write().await.insert(task.id, token.clone());

        tracing::info!(
            task_id = %task.id,
            model_name = %task.model_name,
            revision = %task.revision,
            "Download registered",
        );

        let job = DownloadJob {
            task_id: task.id,
            model_name: task.model_name,
            revision: task.revision,
        };
        tokio::spawn(supervise(
            Arc::clone(&self.registry),
            Arc::clone(&self.executor),
            Arc::clone(&self.tokens),
            job,
            token,
        ));

        Ok(task.id)
    }

    /// Request cancellation of a pending or downloading task.
    ///
    /// A pending task is cancelled on the spot. A downloading task is
    /// signalled and becomes `cancelled` once its executor acknowledges.
    pub async fn cancel_download(&self, task_id: TaskId) -> Result<(), TrackerError> {
        let decision = self.registry.request_cancel(task_id).await?;

        // Signal in both cases: a pending task's executor may already be
        // spawned and about to call `begin`.
        if let Some(token) = self.tokens.read().await.get(&task_id) {
            token.cancel();
        }

        match decision {
            CancelDecision::Cancelled(task) => {
                tracing::info!(task_id = %task_id, model_name = %task.model_name, "Pending download cancelled");
            }
            CancelDecision::SignalExecutor => {
                tracing::info!(task_id = %task_id, "Cancellation requested for running download");
            }
        }
        Ok(())
    }

    /// Remove a task, aborting its execution if it is running.
    ///
    /// A `downloading` task is evicted only after its executor has stopped
    /// and cleaned up, so the same model cannot be started again while the
    /// old transfer still touches its directory.
    pub async fn remove_download(&self, task_id: TaskId) -> Result<RemoveDecision, TrackerError> {
        let decision = self.registry.request_remove(task_id).await?;
        // The supervisor drops the token once the executor has returned.
        if let Some(token) = self.tokens.read().await.get(&task_id) {
            token.cancel();
        }
        match &decision {
            RemoveDecision::Removed(task) => {
                tracing::info!(task_id = %task_id, status = %task.status, "Download task removed");
            }
            RemoveDecision::Deferred(task) => {
                tracing::info!(
                    task_id = %task_id,
                    model_name = %task.model_name,
                    "Download task will be removed once its transfer stops",
                );
            }
        }
        Ok(decision)
    }

    /// Evict terminal tasks older than `max_age`.
    pub async fn prune_terminal(&self, max_age: Duration) -> usize {
        let pruned = self.registry.prune_terminal(max_age).await;
        if pruned > 0 {
            tracing::debug!(pruned, "Pruned finished download tasks");
        }
        pruned
    }

    /// Signal every running execution and reject new downloads.
    ///
    /// Tasks already registered still end up `cancelled` once their
    /// executors acknowledge.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Snapshots of tracked tasks; only `pending`/`downloading` when
    /// `active_only` is set.
    pub async fn list_downloads(&self, active_only: bool) -> Vec<DownloadSnapshot> {
        let reporter = self.reporter();
        if active_only {
            reporter.active().await
        } else {
            reporter.all().await
        }
    }

    pub async fn get_download(&self, task_id: TaskId) -> Result<DownloadSnapshot, TrackerError> {
        self.reporter()
            .get(task_id)
            .await
            .ok_or(TrackerError::UnknownTask(task_id))
    }

    /// Long-poll until the task is terminal or `timeout` elapses.
    pub async fn wait_for_terminal(
        &self,
        task_id: TaskId,
        timeout: Duration,
    ) -> Result<DownloadSnapshot, TrackerError> {
        let task = self.registry.wait_for_terminal(task_id, timeout).await?;
        Ok(DownloadSnapshot::from(&task))
    }

    /// Number of executions that have not yet reported an outcome.
    pub async fn running_executions(&self) -> usize {
        self.tokens.read().await.len()
    }
}

// ---------------------------------------------------------------------------
// Supervisor
// ---------------------------------------------------------------------------

/// Run one execution to completion and record its terminal state.
async fn supervise(
    registry: Arc<TaskRegistry>,
    executor: Arc<dyn DownloadExecutor>,
    tokens: TokenMap,
    job: DownloadJob,
    token: CancellationToken,
) {
    let task_id = job.task_id;
    let model_name = job.model_name.clone();

    let outcome = if token.is_cancelled() {
        ExecutionOutcome::Aborted
    } else {
        let progress = ProgressHandle::new(Arc::clone(&registry), task_id);
        let run = {
            let token = token.clone();
            tokio::spawn(async move { executor.execute(job, progress, token).await })
        };
        match run.await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(task_id = %task_id, error = %e, "Download executor panicked");
                ExecutionOutcome::Failed(format!("Download worker crashed: {e}"))
            }
        }
    };

    let update = terminal_update(task_id, &outcome, token.is_cancelled());
    match registry.finalize(task_id, update).await {
        Ok(task) => log_terminal(&task),
        Err(TrackerError::InvalidTransition { .. }) => {
            // The executor finished without ever calling `begin`.
            let update = TaskUpdate::failed("Executor finished without starting the transfer");
            if let Ok(task) = registry.finalize(task_id, update).await {
                log_terminal(&task);
            }
        }
        Err(TrackerError::TerminalTaskImmutable(_)) | Err(TrackerError::UnknownTask(_)) => {
            tracing::debug!(
                task_id = %task_id,
                model_name = %model_name,
                "Task already finalised or removed; dropping executor outcome",
            );
        }
        Err(e) => {
            tracing::warn!(task_id = %task_id, error = %e, "Failed to record download outcome");
        }
    }

    tokens.write().await.remove(&task_id);
}

/// Map an executor outcome to the terminal update to apply.
///
/// Once a cancellation was signalled the task ends `cancelled` whatever the
/// executor reported.
fn terminal_update(task_id: TaskId, outcome: &ExecutionOutcome, cancelled: bool) -> TaskUpdate {
    if cancelled {
        if let ExecutionOutcome::Completed { .. } = outcome {
            tracing::warn!(
                task_id = %task_id,
                "Executor reported completion after cancellation was requested",
            );
        }
        return TaskUpdate::cancelled();
    }

    match outcome {
        ExecutionOutcome::Completed { total_bytes } => {
            TaskUpdate::completed(*total_bytes, "Download completed")
        }
        ExecutionOutcome::Failed(message) => TaskUpdate::failed(message.clone()),
        ExecutionOutcome::Aborted => TaskUpdate::failed("Download aborted without a cancellation request"),
    }
}

fn log_terminal(task: &DownloadTask) {
    match &task.error {
        Some(error) => tracing::warn!(
            task_id = %task.id,
            model_name = %task.model_name,
            error = %error,
            "Download failed",
        ),
        None => tracing::info!(
            task_id = %task.id,
            model_name = %task.model_name,
            status = %task.status,
            downloaded_bytes = task.downloaded_bytes,
            "Download finished",
        ),
    }
}
