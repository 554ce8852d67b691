//! Emotion-timeline provider adapter.
//!
//! Asynchronous batch protocol: one multipart submission creates a
//! remote batch job covering all streams, whose status is then polled
//! until predictions can be fetched. The batch id is the job's
//! `provider_job_id`.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use reqwest::multipart;
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::error::ConfigError;
use crate::job::Provider;

use super::error::{FetchError, PollError, UploadError};
use super::{create_http_client, truncate_body, AnalysisProvider, RemoteStatus};

/// Upper bound the provider accepts per submission.
const MAX_UPLOAD_BYTES: u64 = 2 * 1024 * 1024 * 1024;

/// Video container formats the batch endpoint accepts.
const SUPPORTED_EXTENSIONS: &[&str] = &["mp4", "webm", "mov", "avi", "mkv"];

/// Response from the batch submission endpoint.
#[derive(Debug, Clone, Deserialize)]
struct SubmitResponse {
    job_id: String,
}

/// Response from the batch status endpoint.
#[derive(Debug, Clone, Deserialize)]
struct StatusResponse {
    state: JobState,
}

#[derive(Debug, Clone, Deserialize)]
struct JobState {
    status: String,
}

/// Maps the provider's batch status string onto [`RemoteStatus`].
fn map_batch_status(status: &str) -> Option<RemoteStatus> {
    match status {
        "QUEUED" => Some(RemoteStatus::Queued),
        "IN_PROGRESS" => Some(RemoteStatus::Processing),
        "COMPLETED" => Some(RemoteStatus::Completed),
        "FAILED" => Some(RemoteStatus::Failed),
        _ => None,
    }
}

/// Whether the batch endpoint accepts this file, judged by extension.
fn is_supported_video(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| SUPPORTED_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Emotion analysis batch API client.
pub struct EmotionClient {
    client: reqwest::Client,
    base_url: String,
    api_key: SecretString,
}

impl EmotionClient {
    pub fn new(base_url: String, api_key: SecretString) -> Result<Self, ConfigError> {
        Ok(Self {
            client: create_http_client()?,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    fn jobs_url(&self) -> String {
        format!("{}/v0/batch/jobs", self.base_url)
    }

    fn job_url(&self, job_id: &str) -> String {
        format!("{}/v0/batch/jobs/{}", self.base_url, job_id)
    }
}

#[async_trait]
impl AnalysisProvider for EmotionClient {
    fn provider(&self) -> Provider {
        Provider::Emotion
    }

    async fn upload(&self, paths: &[PathBuf]) -> Result<String, UploadError> {
        let mut form = multipart::Form::new();
        let mut total_bytes: u64 = 0;

        for path in paths {
            if !is_supported_video(path) {
                return Err(UploadError::UnsupportedFormat(path.clone()));
            }

            let bytes = tokio::fs::read(path).await.map_err(|e| UploadError::Io {
                path: path.clone(),
                source: e,
            })?;
            total_bytes += bytes.len() as u64;
            if total_bytes > MAX_UPLOAD_BYTES {
                return Err(UploadError::PayloadTooLarge {
                    size: total_bytes,
                    limit: MAX_UPLOAD_BYTES,
                });
            }

            let filename = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| "video".to_string());
            let mime = mime_guess::from_path(path).first_or_octet_stream();
            let part = multipart::Part::bytes(bytes)
                .file_name(filename)
                .mime_str(mime.as_ref())
                .map_err(|e| UploadError::Network(format!("Invalid part mime type: {}", e)))?;
            form = form.part("file", part);
        }

        log::info!(
            "Submitting {} stream(s) ({} bytes) to emotion batch endpoint",
            paths.len(),
            total_bytes
        );

        let response = self
            .client
            .post(self.jobs_url())
            .header("X-Api-Key", self.api_key.expose_secret())
            .timeout(super::UPLOAD_REQUEST_TIMEOUT)
            .multipart(form)
            .send()
            .await
            .map_err(|e| UploadError::Network(format!("Batch submission failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                    UploadError::Auth(truncate_body(&body))
                }
                StatusCode::PAYLOAD_TOO_LARGE => UploadError::PayloadTooLarge {
                    size: total_bytes,
                    limit: MAX_UPLOAD_BYTES,
                },
                _ => UploadError::Network(format!(
                    "Batch submission failed ({}): {}",
                    status,
                    truncate_body(&body)
                )),
            });
        }

        let submitted: SubmitResponse = response.json().await.map_err(|e| {
            UploadError::Network(format!("Failed to parse submission response: {}", e))
        })?;

        log::info!("Emotion batch job created: {}", submitted.job_id);
        Ok(submitted.job_id)
    }

    async fn poll_status(&self, provider_job_id: &str) -> Result<RemoteStatus, PollError> {
        let response = self
            .client
            .get(self.job_url(provider_job_id))
            .header("X-Api-Key", self.api_key.expose_secret())
            .send()
            .await
            .map_err(|e| PollError::Network(format!("Status request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                    PollError::Auth(truncate_body(&body))
                }
                _ => PollError::Network(format!(
                    "Status request failed ({}): {}",
                    status,
                    truncate_body(&body)
                )),
            });
        }

        let parsed: StatusResponse = response
            .json()
            .await
            .map_err(|e| PollError::MalformedResponse(e.to_string()))?;

        map_batch_status(&parsed.state.status).ok_or_else(|| {
            PollError::MalformedResponse(format!(
                "unknown batch status '{}'",
                parsed.state.status
            ))
        })
    }

    async fn fetch_results(&self, provider_job_id: &str) -> Result<String, FetchError> {
        let url = format!("{}/predictions", self.job_url(provider_job_id));
        let response = self
            .client
            .get(url)
            .header("X-Api-Key", self.api_key.expose_secret())
            .send()
            .await
            .map_err(|e| FetchError::Transient(format!("Predictions request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(match status {
                StatusCode::NOT_FOUND | StatusCode::GONE => FetchError::Gone(format!(
                    "batch job expired ({}): {}",
                    status,
                    truncate_body(&body)
                )),
                _ => FetchError::Transient(format!(
                    "Predictions request failed ({}): {}",
                    status,
                    truncate_body(&body)
                )),
            });
        }

        response
            .text()
            .await
            .map_err(|e| FetchError::Transient(format!("Failed to read predictions: {}", e)))
    }

    async fn delete_remote(&self, provider_job_id: &str) -> bool {
        let result = self
            .client
            .delete(self.job_url(provider_job_id))
            .header("X-Api-Key", self.api_key.expose_secret())
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => {
                log::info!("Deleted emotion batch job {}", provider_job_id);
                true
            }
            Ok(response) => {
                log::warn!(
                    "Delete of emotion batch job {} failed with status {}",
                    provider_job_id,
                    response.status()
                );
                false
            }
            Err(e) => {
                log::warn!("Delete of emotion batch job {} failed: {}", provider_job_id, e);
                false
            }
        }
    }
}
