use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Output format of the tracing subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable multi-field lines.
    Pretty,
    /// One JSON object per event.
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format '{other}'")),
        }
    }
}

/// A configuration value that could not be parsed.
#[derive(Debug, thiserror::Error)]
#[error("{var} is invalid: {reason}")]
pub struct ConfigError {
    pub var: &'static str,
    pub reason: String,
}

/// Server configuration loaded from environment variables.
///
/// All fields have defaults suitable for running next to a local inference
/// server; override via environment variables (or `.env`).
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS`.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// How long shutdown waits for background jobs and downloads (default: `30`).
    pub shutdown_timeout_secs: u64,
    /// Directory models are downloaded into and listed from.
    pub models_dir: PathBuf,
    /// Base URL of the model hub.
    pub hf_endpoint: String,
    /// Access token for gated or private models.
    pub hf_token: Option<String>,
    /// Age after which finished downloads are pruned.
    pub download_retention_secs: u64,
    /// How often the pruner runs.
    pub download_prune_interval_secs: u64,
    /// Interval of the shared download status poll.
    pub status_poll_interval_ms: u64,
    pub log_format: LogFormat,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                        | Default                    |
    /// |--------------------------------|----------------------------|
    /// | `HOST`                         | `0.0.0.0`                  |
    /// | `PORT`                         | `3000`                     |
    /// | `CORS_ORIGINS`                 | `http://localhost:5173`    |
    /// | `REQUEST_TIMEOUT_SECS`         | `30`                       |
    /// | `SHUTDOWN_TIMEOUT_SECS`        | `30`                       |
    /// | `VLLM_MODELS_DIR`              | `/models`                  |
    /// | `HF_ENDPOINT`                  | `https://huggingface.co`   |
    /// | `HF_TOKEN`                     | unset                      |
    /// | `DOWNLOAD_RETENTION_SECS`      | `3600`                     |
    /// | `DOWNLOAD_PRUNE_INTERVAL_SECS` | `300`                      |
    /// | `STATUS_POLL_INTERVAL_MS`      | `2000`                     |
    /// | `LOG_FORMAT`                   | `pretty`                   |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let cors_origins = get("CORS_ORIGINS", "http://localhost:5173")
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Ok(Self {
            host: get("HOST", "0.0.0.0"),
            port: parse("PORT", &get("PORT", "3000"))?,
            cors_origins,
            request_timeout_secs: parse("REQUEST_TIMEOUT_SECS", &get("REQUEST_TIMEOUT_SECS", "30"))?,
            shutdown_timeout_secs: parse(
                "SHUTDOWN_TIMEOUT_SECS",
                &get("SHUTDOWN_TIMEOUT_SECS", "30"),
            )?,
            models_dir: PathBuf::from(get("VLLM_MODELS_DIR", "/models")),
            hf_endpoint: get("HF_ENDPOINT", "https://huggingface.co"),
            hf_token: lookup("HF_TOKEN").filter(|t| !t.trim().is_empty()),
            download_retention_secs: parse(
                "DOWNLOAD_RETENTION_SECS",
                &get("DOWNLOAD_RETENTION_SECS", "3600"),
            )?,
            download_prune_interval_secs: positive(
                "DOWNLOAD_PRUNE_INTERVAL_SECS",
                parse(
                    "DOWNLOAD_PRUNE_INTERVAL_SECS",
                    &get("DOWNLOAD_PRUNE_INTERVAL_SECS", "300"),
                )?,
            )?,
            status_poll_interval_ms: positive(
                "STATUS_POLL_INTERVAL_MS",
                parse(
                    "STATUS_POLL_INTERVAL_MS",
                    &get("STATUS_POLL_INTERVAL_MS", "2000"),
                )?,
            )?,
            log_format: parse("LOG_FORMAT", &get("LOG_FORMAT", "pretty"))?,
        })
    }

    pub fn download_retention(&self) -> Duration {
        Duration::from_secs(self.download_retention_secs)
    }

    pub fn download_prune_interval(&self) -> Duration {
        Duration::from_secs(self.download_prune_interval_secs)
    }

    pub fn status_poll_interval(&self) -> Duration {
        Duration::from_millis(self.status_poll_interval_ms)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

fn parse<T>(var: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| ConfigError {
        var,
        reason: e.to_string(),
    })
}

/// Intervals of zero would make `tokio::time::interval` panic.
fn positive(var: &'static str, value: u64) -> Result<u64, ConfigError> {
    if value == 0 {
        return Err(ConfigError {
            var,
            reason: "must be greater than zero".to_string(),
        });
    }
    Ok(value)
}
