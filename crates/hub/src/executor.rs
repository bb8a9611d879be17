//! Production [`DownloadExecutor`]: streams repository files from the hub
//! into the local models directory.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::StreamExt;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;

use vdash_core::download_manager::{format_size, is_within, model_download_dir};
use vdash_core::downloads::{DownloadExecutor, DownloadJob, ExecutionOutcome, ProgressHandle};

use crate::client::{HubClient, RepoFile};
use crate::error::HubError;

/// Suffix of files still being written.
const INCOMPLETE_SUFFIX: &str = "incomplete";

/// Minimum delay between progress reports within one file.
const REPORT_INTERVAL: Duration = Duration::from_millis(250);

/// Downloads every file of a repository revision into
/// `{models_dir}/{org}/{model}`.
pub struct HubExecutor {
    client: HubClient,
    models_dir: PathBuf,
}

/// Files and directories created during one execution; removed on abort.
#[derive(Debug, Default)]
struct WrittenPaths {
    created_root: Option<PathBuf>,
    files: Vec<PathBuf>,
    /// Subdirectories created inside a model directory that already existed.
    dirs: Vec<PathBuf>,
}

impl WrittenPaths {
    async fn remove_all(&self) {
        if let Some(root) = &self.created_root {
            if let Err(e) = tokio::fs::remove_dir_all(root).await {
                tracing::warn!(path = %root.display(), error = %e, "Failed to remove partial download");
            }
            return;
        }
        for file in &self.files {
            match tokio::fs::remove_file(file).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    tracing::warn!(path = %file.display(), error = %e, "Failed to remove partial file");
                }
            }
        }
        // Deepest first; directories that gained other content stay.
        let mut dirs: Vec<&PathBuf> = self.dirs.iter().collect();
        dirs.sort_by_key(|dir| std::cmp::Reverse(dir.components().count()));
        for dir in dirs {
            if let Err(e) = tokio::fs::remove_dir(dir).await {
                tracing::debug!(path = %dir.display(), error = %e, "Left directory in place");
            }
        }
    }

    /// Create `dir` and its missing ancestors below `root`, remembering
    /// each one created.
    async fn create_dirs(&mut self, root: &Path, dir: &Path) -> std::io::Result<()> {
        let mut missing = Vec::new();
        let mut current = Some(dir);
        while let Some(path) = current {
            if path == root || !path.starts_with(root) || tokio::fs::try_exists(path).await? {
                break;
            }
            missing.push(path.to_path_buf());
            current = path.parent();
        }
        tokio::fs::create_dir_all(dir).await?;
        self.dirs.extend(missing);
        Ok(())
    }
}

impl HubExecutor {
    pub fn new(client: HubClient, models_dir: impl Into<PathBuf>) -> Self {
        Self {
            client,
            models_dir: models_dir.into(),
        }
    }

    pub fn models_dir(&self) -> &Path {
        &self.models_dir
    }

    async fn run(
        &self,
        job: &DownloadJob,
        progress: &ProgressHandle,
        cancel: &CancellationToken,
        written: &mut WrittenPaths,
    ) -> Result<u64, HubError> {
        let target = model_download_dir(&self.models_dir, &job.model_name)?;

        let files = tokio::select! {
            _ = cancel.cancelled() => return Err(HubError::Cancelled),
            files = self.client.model_files(&job.model_name, &job.revision) => files?,
        };
        if files.is_empty() {
            return Err(HubError::Invalid(format!(
                "Repository {} has no files at revision {}",
                job.model_name, job.revision
            )));
        }

        // Nothing is written before the task is confirmed as downloading.
        if progress
            .begin(
                format!("Downloading {} files...", files.len()),
                Some(target.as_path()),
            )
            .await
            .is_err()
        {
            return Err(HubError::Cancelled);
        }

        if !tokio::fs::try_exists(&target).await? {
            tokio::fs::create_dir_all(&target).await?;
            written.created_root = Some(target.clone());
        }

        let total_files = files.len();
        let mut downloaded: u64 = 0;
        for (index, file) in files.iter().enumerate() {
            let label = format!("{} ({}/{})", file.rfilename, index + 1, total_files);
            downloaded = self
                .fetch_file(job, file, &target, &label, downloaded, progress, cancel, written)
                .await?;
        }
        Ok(downloaded)
    }

    /// Download one file, returning the cumulative byte count.
    #[allow(clippy::too_many_arguments)]
    async fn fetch_file(
        &self,
        job: &DownloadJob,
        file: &RepoFile,
        target: &Path,
        label: &str,
        mut downloaded: u64,
        progress: &ProgressHandle,
        cancel: &CancellationToken,
        written: &mut WrittenPaths,
    ) -> Result<u64, HubError> {
        let dest = target.join(&file.rfilename);
        if !is_within(target, &dest) {
            return Err(HubError::Invalid(format!(
                "Refusing to write outside the model directory: {}",
                file.rfilename
            )));
        }

        if let (Some(expected), Ok(meta)) = (file.size, tokio::fs::metadata(&dest).await) {
            if meta.is_file() && meta.len() == expected {
                tracing::debug!(task_id = %job.task_id, file = %file.rfilename, "File already present, skipping");
                downloaded += expected;
                report(progress, downloaded, format!("Skipped {label}")).await?;
                return Ok(downloaded);
            }
        }

        if let Some(parent) = dest.parent() {
            written.create_dirs(target, parent).await?;
        }
        let partial = incomplete_path(&dest);
        written.files.push(partial.clone());

        let response = tokio::select! {
            _ = cancel.cancelled() => return Err(HubError::Cancelled),
            response = self.client.open_file(&job.model_name, &job.revision, &file.rfilename) => response?,
        };

        let mut out = tokio::fs::File::create(&partial).await?;
        let mut stream = response.bytes_stream();
        let mut last_report = Instant::now();

        loop {
            let chunk = tokio::select! {
                _ = cancel.cancelled() => return Err(HubError::Cancelled),
                chunk = stream.next() => chunk,
            };
            let Some(chunk) = chunk else { break };
            let chunk = chunk?;
            out.write_all(&chunk).await?;
            downloaded += chunk.len() as u64;

            if last_report.elapsed() >= REPORT_INTERVAL {
                last_report = Instant::now();
                report(
                    progress,
                    downloaded,
                    format!("Downloading {label}: {}", format_size(downloaded)),
                )
                .await?;
            }
        }
        out.flush().await?;
        drop(out);

        tokio::fs::rename(&partial, &dest).await?;
        written.files.push(dest);
        report(progress, downloaded, format!("Downloaded {label}")).await?;
        Ok(downloaded)
    }
}

/// A rejected progress report means the task was cancelled or removed.
async fn report(progress: &ProgressHandle, bytes: u64, message: String) -> Result<(), HubError> {
    progress
        .report(bytes, message)
        .await
        .map_err(|_| HubError::Cancelled)
}

fn incomplete_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().unwrap_or_default().to_os_string();
    name.push(".");
    name.push(INCOMPLETE_SUFFIX);
    dest.with_file_name(name)
}

#[async_trait]
impl DownloadExecutor for HubExecutor {
    async fn execute(
        &self,
        job: DownloadJob,
        progress: ProgressHandle,
        cancel: CancellationToken,
    ) -> ExecutionOutcome {
        let mut written = WrittenPaths::default();
        match self.run(&job, &progress, &cancel, &mut written).await {
            Ok(total_bytes) => ExecutionOutcome::Completed { total_bytes },
            Err(HubError::Cancelled) => {
                tracing::info!(task_id = %job.task_id, model_name = %job.model_name, "Removing partial download");
                written.remove_all().await;
                ExecutionOutcome::Aborted
            }
            Err(e) => {
                // Keep completed files so a retry can skip them.
                for file in written.files.iter().filter(|f| is_incomplete(f)) {
                    let _ = tokio::fs::remove_file(file).await;
                }
                ExecutionOutcome::Failed(e.to_string())
            }
        }
    }
}

fn is_incomplete(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == INCOMPLETE_SUFFIX)
}
