//! Provider adapters for the remote analysis vendors.
//!
//! The orchestrator is written against the [`AnalysisProvider`]
//! capability only; [`build`] is the single place that inspects the
//! [`Provider`] enum. Each adapter owns its own authenticated HTTP
//! client, so no state is shared between providers.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::OrchestratorConfig;
use crate::error::ConfigError;
use crate::job::Provider;

pub mod content;
pub mod emotion;
pub mod error;

pub use content::ContentClient;
pub use emotion::EmotionClient;
pub use error::{FetchError, PollError, UploadError};

/// Remote processing status as reported by a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteStatus {
    Queued,
    Processing,
    Completed,
    Failed,
}

/// Capability contract for one analysis vendor.
///
/// `upload` must be safe to call at most once per job; `poll_status`
/// must be idempotent and side-effect-free; `fetch_results` is valid
/// only after `poll_status` reports `Completed`; `delete_remote` is
/// best-effort and reports success as a boolean.
#[async_trait]
pub trait AnalysisProvider: Send + Sync {
    /// Which vendor this adapter drives.
    fn provider(&self) -> Provider;

    /// Creates the remote resource from the local video file(s) and
    /// returns the provider-assigned job identifier (possibly a
    /// serialized compound value, one sub-id per stream).
    async fn upload(&self, paths: &[PathBuf]) -> Result<String, UploadError>;

    /// Reports the remote processing status for an uploaded job.
    async fn poll_status(&self, provider_job_id: &str) -> Result<RemoteStatus, PollError>;

    /// Retrieves the provider-native result payload. The format is the
    /// response parser's responsibility, not the adapter's.
    async fn fetch_results(&self, provider_job_id: &str) -> Result<String, FetchError>;

    /// Deletes the remotely stored video/job. Failures are logged by
    /// the adapter and reported as `false`.
    async fn delete_remote(&self, provider_job_id: &str) -> bool;
}

/// Default connect timeout for HTTP requests (10 seconds).
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default request timeout for HTTP requests (30 seconds).
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Per-request timeout override for uploads, which can carry minutes
/// of video.
pub(crate) const UPLOAD_REQUEST_TIMEOUT: Duration = Duration::from_secs(600);

/// Creates an HTTP client with appropriate timeouts.
pub(crate) fn create_http_client() -> Result<reqwest::Client, ConfigError> {
    reqwest::Client::builder()
        .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
        .timeout(DEFAULT_REQUEST_TIMEOUT)
        .build()
        .map_err(|e| ConfigError::Validation {
            message: format!("Failed to create HTTP client: {}", e),
        })
}

/// Truncates a provider error body for log/error messages.
pub(crate) fn truncate_body(body: &str) -> String {
    const MAX_ERROR_BODY_LENGTH: usize = 200;
    if body.len() > MAX_ERROR_BODY_LENGTH {
        format!("{}... (truncated)", &body[..MAX_ERROR_BODY_LENGTH])
    } else {
        body.to_string()
    }
}

/// Constructs the adapter for the given provider. This is the only
/// place the provider enum is branched on.
pub fn build(
    provider: Provider,
    config: &OrchestratorConfig,
) -> Result<Arc<dyn AnalysisProvider>, ConfigError> {
    match provider {
        Provider::Emotion => {
            let api_key = config.emotion.api_key.resolve().map_err(|e| ConfigError::Secret {
                provider: provider.as_str().to_string(),
                source: e,
            })?;
            Ok(Arc::new(EmotionClient::new(
                config.emotion.base_url.clone(),
                api_key,
            )?))
        }
        Provider::Content => {
            let api_key = config.content.api_key.resolve().map_err(|e| ConfigError::Secret {
                provider: provider.as_str().to_string(),
                source: e,
            })?;
            Ok(Arc::new(ContentClient::new(
                config.content.base_url.clone(),
                api_key,
            )?))
        }
    }
}
