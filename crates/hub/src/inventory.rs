//! Inventory of models already present in the local models directory.
//!
//! Recognises both plain model directories (`{models_dir}/org/model`) and
//! hub cache directories (`models--org--model/snapshots/<rev>`).

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

use vdash_core::download_manager::{format_size, is_within};

use crate::error::HubError;

/// Entries smaller than this are metadata leftovers, not models.
pub const DEFAULT_MIN_MODEL_SIZE: u64 = 100 * 1024 * 1024;

/// How many directory levels below the root are searched.
const MAX_SCAN_DEPTH: usize = 3;

/// Prefix of hub cache directories.
const CACHE_PREFIX: &str = "models--";

/// File name fragments that mark a directory as a model.
const MODEL_INDICATORS: &[&str] = &[
    "config.json",
    "model.safetensors",
    "model.safetensors.index.json",
    "pytorch_model.bin",
    "pytorch_model.bin.index.json",
    "model-00001-of-",
    "tokenizer.json",
    "tokenizer_config.json",
    "consolidated.safetensors",
    "consolidated.safetensors.index.json",
    "consolidated-00001-of-",
    "params.json",
];

/// A model directory found on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocalModel {
    pub name: String,
    pub path: String,
    pub size: u64,
    pub size_human: String,
}

/// Scans and manages the models directory.
#[derive(Debug, Clone)]
pub struct ModelInventory {
    models_dir: PathBuf,
    min_model_size: u64,
}

impl ModelInventory {
    pub fn new(models_dir: impl Into<PathBuf>) -> Self {
        Self {
            models_dir: models_dir.into(),
            min_model_size: DEFAULT_MIN_MODEL_SIZE,
        }
    }

    /// Override the minimum size an entry must exceed to be listed.
    pub fn with_min_model_size(mut self, bytes: u64) -> Self {
        self.min_model_size = bytes;
        self
    }

    pub fn models_dir(&self) -> &Path {
        &self.models_dir
    }

    /// List valid models, de-duplicated by name (largest wins), sorted by
    /// name case-insensitively. A missing models directory yields an empty
    /// list.
    pub async fn list_models(&self) -> Result<Vec<LocalModel>, HubError> {
        let inventory = self.clone();
        tokio::task::spawn_blocking(move || inventory.scan())
            .await
            .map_err(|e| HubError::Io(std::io::Error::other(e)))?
    }

    /// Delete a model directory located inside the models directory.
    pub async fn delete_model(&self, model_path: &str) -> Result<(), HubError> {
        let path = PathBuf::from(model_path);
        let path = if path.is_absolute() {
            path
        } else {
            self.models_dir.join(path)
        };

        if !is_within(&self.models_dir, &path) {
            return Err(HubError::Invalid(format!(
                "Model path must be inside {}",
                self.models_dir.display()
            )));
        }
        if !tokio::fs::try_exists(&path).await? {
            return Err(HubError::NotFound(model_path.to_string()));
        }

        tokio::fs::remove_dir_all(&path).await?;
        tracing::info!(path = %path.display(), "Deleted local model");
        Ok(())
    }

    fn scan(&self) -> Result<Vec<LocalModel>, HubError> {
        if !self.models_dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut found = Vec::new();
        self.scan_dir(&self.models_dir, 0, &mut found)?;

        let mut by_name: HashMap<String, LocalModel> = HashMap::new();
        for model in found {
            match by_name.get(&model.name) {
                Some(existing) if existing.size >= model.size => {}
                _ => {
                    by_name.insert(model.name.clone(), model);
                }
            }
        }

        let mut models: Vec<LocalModel> = by_name
            .into_values()
            .filter(|m| m.size > self.min_model_size)
            .collect();
        models.sort_by_key(|m| m.name.to_lowercase());
        Ok(models)
    }

    fn scan_dir(&self, dir: &Path, depth: usize, found: &mut Vec<LocalModel>) -> Result<(), HubError> {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => return Ok(()),
            Err(e) => return Err(e.into()),
        };

        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            let file_name = entry.file_name().to_string_lossy().into_owned();
            if file_name.starts_with('.') {
                continue;
            }

            if let Some(repo_id) = parse_cache_name(&file_name) {
                if let Some(snapshot) = first_snapshot(&path) {
                    if is_model_dir(&snapshot) {
                        found.push(local_model(repo_id, &snapshot));
                        continue;
                    }
                }
            }

            if is_model_dir(&path) {
                let name = path
                    .strip_prefix(&self.models_dir)
                    .unwrap_or(&path)
                    .to_string_lossy()
                    .into_owned();
                found.push(local_model(name, &path));
            } else if depth < MAX_SCAN_DEPTH {
                self.scan_dir(&path, depth + 1, found)?;
            }
        }
        Ok(())
    }
}

fn local_model(name: String, path: &Path) -> LocalModel {
    let size = directory_size(path);
    LocalModel {
        name,
        path: path.display().to_string(),
        size,
        size_human: format_size(size),
    }
}

/// `models--org--name` to `org/name`.
fn parse_cache_name(dir_name: &str) -> Option<String> {
    let rest = dir_name.strip_prefix(CACHE_PREFIX)?;
    let parts: Vec<&str> = rest.split("--").collect();
    (parts.len() >= 2).then(|| parts.join("/"))
}

fn first_snapshot(cache_dir: &Path) -> Option<PathBuf> {
    fs::read_dir(cache_dir.join("snapshots"))
        .ok()?
        .flatten()
        .map(|e| e.path())
        .find(|p| p.is_dir())
}

/// A directory holding at least one file whose name contains an indicator.
fn is_model_dir(dir: &Path) -> bool {
    let Ok(entries) = fs::read_dir(dir) else {
        return false;
    };
    entries.flatten().any(|entry| {
        // `Path::is_file` follows symlinks, as cache snapshots are symlinks.
        entry.path().is_file() && {
            let name = entry.file_name().to_string_lossy().to_lowercase();
            MODEL_INDICATORS.iter().any(|indicator| name.contains(indicator))
        }
    })
}

/// Total size of regular files below `dir`, following symlinks and
/// skipping unreadable entries.
fn directory_size(dir: &Path) -> u64 {
    let Ok(entries) = fs::read_dir(dir) else {
        return 0;
    };
    entries
        .flatten()
        .map(|entry| {
            let path = entry.path();
            match fs::metadata(&path) {
                Ok(meta) if meta.is_file() => meta.len(),
                Ok(meta) if meta.is_dir() => directory_size(&path),
                _ => 0,
            }
        })
        .sum()
}
