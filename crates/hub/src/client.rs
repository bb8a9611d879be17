//! REST client for a HuggingFace-compatible model hub.
//!
//! Wraps the metadata endpoints (model info, file listing, refs) and the
//! `resolve` file endpoint using [`reqwest`].

use serde::{Deserialize, Serialize};

use vdash_core::download_manager::{validate_model_name, DEFAULT_REVISION};

use crate::error::HubError;

/// HTTP client for one hub endpoint.
#[derive(Debug, Clone)]
pub struct HubClient {
    client: reqwest::Client,
    endpoint: String,
    token: Option<String>,
}

/// Subset of the hub's model metadata the dashboard uses.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelInfo {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(rename = "modelId", default)]
    pub model_id: Option<String>,
    #[serde(default)]
    pub private: bool,
    #[serde(default)]
    pub downloads: Option<u64>,
    #[serde(default)]
    pub likes: Option<u64>,
    #[serde(default)]
    pub pipeline_tag: Option<String>,
    #[serde(default)]
    pub siblings: Vec<RepoFile>,
}

/// One file in a model repository.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RepoFile {
    pub rfilename: String,
    #[serde(default)]
    pub size: Option<u64>,
}

/// Result of checking a model name against the hub.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelValidation {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub downloads: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub likes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pipeline_tag: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ModelValidation {
    fn invalid(error: impl ToString) -> Self {
        Self {
            valid: false,
            model_id: None,
            private: None,
            downloads: None,
            likes: None,
            pipeline_tag: None,
            error: Some(error.to_string()),
        }
    }
}

impl ModelInfo {
    /// Canonical repository id; older hubs only send `modelId`.
    pub fn repo_id(&self) -> Option<&str> {
        self.id.as_deref().or(self.model_id.as_deref())
    }
}

impl From<ModelInfo> for ModelValidation {
    fn from(info: ModelInfo) -> Self {
        Self {
            valid: true,
            model_id: info.repo_id().map(str::to_string),
            private: Some(info.private),
            downloads: info.downloads,
            likes: info.likes,
            pipeline_tag: info.pipeline_tag,
            error: None,
        }
    }
}

/// Branches and tags available for a model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelRevisions {
    pub branches: Vec<String>,
    pub tags: Vec<String>,
    pub default: Option<String>,
}

impl ModelRevisions {
    /// Used when the refs endpoint cannot be reached.
    pub fn fallback() -> Self {
        Self {
            branches: vec![DEFAULT_REVISION.to_string()],
            tags: Vec::new(),
            default: Some(DEFAULT_REVISION.to_string()),
        }
    }

    fn from_refs(refs: RefsResponse) -> Self {
        let branches: Vec<String> = refs.branches.into_iter().map(|r| r.name).collect();
        let tags = refs.tags.into_iter().map(|r| r.name).collect();
        let default = if branches.iter().any(|b| b == DEFAULT_REVISION) {
            Some(DEFAULT_REVISION.to_string())
        } else {
            branches.first().cloned()
        };
        Self {
            branches,
            tags,
            default,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RefsResponse {
    #[serde(default)]
    branches: Vec<GitRef>,
    #[serde(default)]
    tags: Vec<GitRef>,
}

#[derive(Debug, Deserialize)]
struct GitRef {
    name: String,
}

impl HubClient {
    /// Create a client for `endpoint`, e.g. `https://huggingface.co`.
    pub fn new(endpoint: impl Into<String>, token: Option<String>) -> Self {
        Self::with_client(reqwest::Client::new(), endpoint, token)
    }

    /// Create a client reusing an existing [`reqwest::Client`].
    pub fn with_client(
        client: reqwest::Client,
        endpoint: impl Into<String>,
        token: Option<String>,
    ) -> Self {
        Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            token: token.filter(|t| !t.trim().is_empty()),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Model metadata from `GET /api/models/{repo}`.
    pub async fn model_info(&self, model_name: &str) -> Result<ModelInfo, HubError> {
        validate_model_name(model_name)?;
        let url = format!("{}/api/models/{}", self.endpoint, model_name);
        let response = self.get(&url).send().await?;
        Self::parse_response(response).await
    }

    /// Files of a repository at `revision`, with sizes where the hub
    /// reports them.
    pub async fn model_files(
        &self,
        model_name: &str,
        revision: &str,
    ) -> Result<Vec<RepoFile>, HubError> {
        validate_model_name(model_name)?;
        let url = format!(
            "{}/api/models/{}/revision/{}",
            self.endpoint,
            model_name,
            encode_revision(revision)
        );
        let response = self
            .get(&url)
            .query(&[("blobs", "true")])
            .send()
            .await?;
        let info: ModelInfo = Self::parse_response(response).await?;
        Ok(info.siblings)
    }

    /// Check that a model exists and is accessible.
    ///
    /// Never fails: hub and network errors are folded into
    /// `{ valid: false, error }`.
    pub async fn validate_model(&self, model_name: &str) -> ModelValidation {
        match self.model_info(model_name).await {
            Ok(info) => info.into(),
            Err(e) => {
                tracing::debug!(model_name, error = %e, "Model validation failed");
                ModelValidation::invalid(e)
            }
        }
    }

    /// Branches and tags for a model, falling back to `main` on failure.
    pub async fn model_revisions(&self, model_name: &str) -> ModelRevisions {
        match self.fetch_refs(model_name).await {
            Ok(refs) => ModelRevisions::from_refs(refs),
            Err(e) => {
                tracing::warn!(model_name, error = %e, "Failed to fetch model revisions");
                ModelRevisions::fallback()
            }
        }
    }

    /// Start streaming one file; the caller consumes the body.
    pub async fn open_file(
        &self,
        model_name: &str,
        revision: &str,
        filename: &str,
    ) -> Result<reqwest::Response, HubError> {
        let url = format!(
            "{}/{}/resolve/{}/{}",
            self.endpoint,
            model_name,
            encode_revision(revision),
            filename
        );
        let response = self.get(&url).send().await?;
        Self::ensure_success(response).await
    }

    // ---- private helpers ----

    async fn fetch_refs(&self, model_name: &str) -> Result<RefsResponse, HubError> {
        validate_model_name(model_name)?;
        let url = format!("{}/api/models/{}/refs", self.endpoint, model_name);
        let response = self.get(&url).send().await?;
        Self::parse_response(response).await
    }

    fn get(&self, url: &str) -> reqwest::RequestBuilder {
        let request = self.client.get(url);
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Return the response unchanged on 2xx, or [`HubError::Api`] carrying
    /// the status and body text.
    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, HubError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(HubError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, HubError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }
}

/// Revisions such as `refs/pr/1` must be a single path segment.
fn encode_revision(revision: &str) -> String {
    revision.replace('/', "%2F")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_trailing_slash_trimmed() {
        let client = HubClient::new("https://hub.example/", None);
        assert_eq!(client.endpoint(), "https://hub.example");
    }

    #[test]
    fn blank_token_ignored() {
        let client = HubClient::new("https://hub.example", Some("  ".to_string()));
        assert!(client.token.is_none());
    }

    #[test]
    fn revision_slashes_encoded() {
        assert_eq!(encode_revision("refs/pr/1"), "refs%2Fpr%2F1");
        assert_eq!(encode_revision("main"), "main");
    }

    #[test]
    fn refs_default_prefers_main() {
        let refs: RefsResponse = serde_json::from_value(serde_json::json!({
            "branches": [{ "name": "dev" }, { "name": "main" }],
            "tags": [{ "name": "v1" }],
        }))
        .unwrap();
        let revisions = ModelRevisions::from_refs(refs);
        assert_eq!(revisions.default.as_deref(), Some("main"));
        assert_eq!(revisions.tags, vec!["v1".to_string()]);
    }

    #[test]
    fn refs_without_main_use_first_branch() {
        let refs: RefsResponse = serde_json::from_value(serde_json::json!({
            "branches": [{ "name": "release" }],
        }))
        .unwrap();
        assert_eq!(
            ModelRevisions::from_refs(refs).default.as_deref(),
            Some("release")
        );
    }

    #[test]
    fn model_info_accepts_legacy_model_id() {
        let info: ModelInfo = serde_json::from_value(serde_json::json!({
            "modelId": "acme/model-a",
            "siblings": [{ "rfilename": "config.json", "size": 12 }],
        }))
        .unwrap();
        assert_eq!(info.repo_id(), Some("acme/model-a"));
        assert_eq!(info.siblings[0].size, Some(12));
    }

    #[test]
    fn invalid_validation_serializes_error_only() {
        let json = serde_json::to_value(ModelValidation::invalid("not found")).unwrap();
        assert_eq!(json, serde_json::json!({ "valid": false, "error": "not found" }));
    }
}
