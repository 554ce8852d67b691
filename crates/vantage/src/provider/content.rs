//! Video-content provider adapter.
//!
//! Upload-then-conversational-query protocol: each stream is uploaded
//! as its own remote file, then a single generation request referencing
//! every file asks the model for the structured analysis. The job's
//! `provider_job_id` is a compound value, a JSON array of the remote
//! file handles, one per stream.

use std::path::PathBuf;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::ConfigError;
use crate::job::Provider;

use super::error::{FetchError, PollError, UploadError};
use super::{create_http_client, truncate_body, AnalysisProvider, RemoteStatus};

/// Model used for the analysis query.
const ANALYSIS_MODEL: &str = "gemini-1.5-flash";

/// Fixed analysis prompt. The model is asked for exactly the canonical
/// content schema; whatever it actually returns is the response
/// parser's problem, not the adapter's.
const ANALYSIS_PROMPT: &str = r#"You are analyzing screen and webcam recordings of a work session.
Respond ONLY with valid JSON. Do not include any other text.

Return JSON with this exact structure:
{
  "time_segmentation": [
    {"start_seconds": 0.0, "end_seconds": 120.0, "activity": "writing code in an editor"}
  ],
  "app_usage": [
    {"app": "editor", "seconds": 300.0}
  ],
  "distraction_analysis": {
    "distraction_events": 2,
    "total_distraction_seconds": 45.0,
    "notes": ["brief social media check at 02:10"]
  },
  "insights": {
    "focus_ratio": 0.85,
    "summary": "one-paragraph session summary",
    "recommendations": ["short actionable suggestion"]
  }
}"#;

/// One remote file handle: `name` addresses the file API (status,
/// delete), `uri` is referenced from generation requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RemoteFile {
    name: String,
    uri: String,
}

/// Serializes remote file handles into the compound provider job id.
fn encode_compound_id(files: &[RemoteFile]) -> String {
    serde_json::to_string(files).unwrap_or_else(|_| "[]".to_string())
}

/// Decodes a compound provider job id back into file handles.
fn decode_compound_id(provider_job_id: &str) -> Result<Vec<RemoteFile>, String> {
    serde_json::from_str(provider_job_id)
        .map_err(|e| format!("bad compound provider_job_id: {}", e))
}

/// Aggregates per-file states into one remote status: failed if any
/// file failed, completed once every file is active, else processing.
fn aggregate_file_states(states: &[String]) -> RemoteStatus {
    if states.iter().any(|s| s == "FAILED") {
        RemoteStatus::Failed
    } else if !states.is_empty() && states.iter().all(|s| s == "ACTIVE") {
        RemoteStatus::Completed
    } else {
        RemoteStatus::Processing
    }
}

#[derive(Debug, Clone, Deserialize)]
struct FileInfo {
    name: String,
    #[serde(default)]
    uri: Option<String>,
    #[serde(default)]
    state: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct UploadResponse {
    file: FileInfo,
}

#[derive(Debug, Clone, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Clone, Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Debug, Clone, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Clone, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

/// Content analysis API client.
pub struct ContentClient {
    client: reqwest::Client,
    base_url: String,
    api_key: SecretString,
}

impl ContentClient {
    pub fn new(base_url: String, api_key: SecretString) -> Result<Self, ConfigError> {
        Ok(Self {
            client: create_http_client()?,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    fn upload_url(&self) -> String {
        format!("{}/upload/v1beta/files", self.base_url)
    }

    fn file_url(&self, name: &str) -> String {
        format!("{}/v1beta/{}", self.base_url, name)
    }

    fn generate_url(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, ANALYSIS_MODEL
        )
    }

    /// Uploads a single stream and returns its remote handle.
    async fn upload_one(&self, path: &PathBuf) -> Result<RemoteFile, UploadError> {
        let bytes = tokio::fs::read(path).await.map_err(|e| UploadError::Io {
            path: path.clone(),
            source: e,
        })?;
        let mime = mime_guess::from_path(path).first_or_octet_stream();

        let response = self
            .client
            .post(self.upload_url())
            .header("x-goog-api-key", self.api_key.expose_secret())
            .header(CONTENT_TYPE, mime.as_ref())
            .timeout(super::UPLOAD_REQUEST_TIMEOUT)
            .body(bytes)
            .send()
            .await
            .map_err(|e| UploadError::Network(format!("File upload failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                    UploadError::Auth(truncate_body(&body))
                }
                StatusCode::UNSUPPORTED_MEDIA_TYPE => UploadError::UnsupportedFormat(path.clone()),
                _ => UploadError::Network(format!(
                    "File upload failed ({}): {}",
                    status,
                    truncate_body(&body)
                )),
            });
        }

        let uploaded: UploadResponse = response.json().await.map_err(|e| {
            UploadError::Network(format!("Failed to parse upload response: {}", e))
        })?;

        let uri = uploaded.file.uri.unwrap_or_else(|| uploaded.file.name.clone());
        Ok(RemoteFile {
            name: uploaded.file.name,
            uri,
        })
    }

    async fn delete_file(&self, name: &str) -> bool {
        let result = self
            .client
            .delete(self.file_url(name))
            .header("x-goog-api-key", self.api_key.expose_secret())
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => true,
            Ok(response) => {
                log::warn!(
                    "Delete of remote file {} failed with status {}",
                    name,
                    response.status()
                );
                false
            }
            Err(e) => {
                log::warn!("Delete of remote file {} failed: {}", name, e);
                false
            }
        }
    }
}

#[async_trait]
impl AnalysisProvider for ContentClient {
    fn provider(&self) -> Provider {
        Provider::Content
    }

    async fn upload(&self, paths: &[PathBuf]) -> Result<String, UploadError> {
        let mut files: Vec<RemoteFile> = Vec::with_capacity(paths.len());

        for path in paths {
            match self.upload_one(path).await {
                Ok(file) => {
                    log::info!("Uploaded {} as remote file {}", path.display(), file.name);
                    files.push(file);
                }
                Err(e) => {
                    // Roll back the streams already uploaded so a retry
                    // starts from a clean remote state.
                    for file in &files {
                        self.delete_file(&file.name).await;
                    }
                    return Err(e);
                }
            }
        }

        Ok(encode_compound_id(&files))
    }

    async fn poll_status(&self, provider_job_id: &str) -> Result<RemoteStatus, PollError> {
        let files = decode_compound_id(provider_job_id).map_err(PollError::MalformedResponse)?;

        let mut states = Vec::with_capacity(files.len());
        for file in &files {
            let response = self
                .client
                .get(self.file_url(&file.name))
                .header("x-goog-api-key", self.api_key.expose_secret())
                .send()
                .await
                .map_err(|e| PollError::Network(format!("File status request failed: {}", e)))?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(match status {
                    StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                        PollError::Auth(truncate_body(&body))
                    }
                    _ => PollError::Network(format!(
                        "File status request failed ({}): {}",
                        status,
                        truncate_body(&body)
                    )),
                });
            }

            let info: FileInfo = response
                .json()
                .await
                .map_err(|e| PollError::MalformedResponse(e.to_string()))?;
            states.push(info.state.unwrap_or_else(|| "PROCESSING".to_string()));
        }

        Ok(aggregate_file_states(&states))
    }

    async fn fetch_results(&self, provider_job_id: &str) -> Result<String, FetchError> {
        let files = decode_compound_id(provider_job_id).map_err(FetchError::MalformedResponse)?;

        let mut parts: Vec<serde_json::Value> = files
            .iter()
            .map(|f| json!({"file_data": {"file_uri": f.uri}}))
            .collect();
        parts.push(json!({"text": ANALYSIS_PROMPT}));

        let request = json!({"contents": [{"parts": parts}]});

        let response = self
            .client
            .post(self.generate_url())
            .header("x-goog-api-key", self.api_key.expose_secret())
            .json(&request)
            .send()
            .await
            .map_err(|e| FetchError::Transient(format!("Generation request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(match status {
                StatusCode::NOT_FOUND | StatusCode::GONE => FetchError::Gone(format!(
                    "remote files expired ({}): {}",
                    status,
                    truncate_body(&body)
                )),
                _ => FetchError::Transient(format!(
                    "Generation request failed ({}): {}",
                    status,
                    truncate_body(&body)
                )),
            });
        }

        let generated: GenerateResponse = response
            .json()
            .await
            .map_err(|e| FetchError::MalformedResponse(e.to_string()))?;

        let text: String = generated
            .candidates
            .first()
            .map(|c| {
                c.content
                    .parts
                    .iter()
                    .filter_map(|p| p.text.as_deref())
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        if text.is_empty() {
            return Err(FetchError::MalformedResponse(
                "generation response contained no text".to_string(),
            ));
        }

        Ok(text)
    }

    async fn delete_remote(&self, provider_job_id: &str) -> bool {
        let files = match decode_compound_id(provider_job_id) {
            Ok(files) => files,
            Err(e) => {
                log::warn!("Cannot delete remote files: {}", e);
                return false;
            }
        };

        let mut all_deleted = true;
        for file in &files {
            if !self.delete_file(&file.name).await {
                all_deleted = false;
            }
        }
        if all_deleted {
            log::info!("Deleted {} remote file(s)", files.len());
        }
        all_deleted
    }
}
