use vdash_core::error::CoreError;

/// Errors from the model hub client, the executor, and the local inventory.
#[derive(Debug, thiserror::Error)]
pub enum HubError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The hub returned a non-2xx status code.
    #[error("Hub API error ({status}): {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// Local filesystem failure while writing or scanning models.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Rejected input (model name, revision, path).
    #[error("{0}")]
    Invalid(String),

    /// The requested local path does not exist.
    #[error("Model path {0} does not exist")]
    NotFound(String),

    /// The transfer observed its cancellation token.
    #[error("Download cancelled")]
    Cancelled,
}

impl From<CoreError> for HubError {
    fn from(err: CoreError) -> Self {
        HubError::Invalid(err.to_string())
    }
}
