//! Job records and the enums describing them.
//!
//! One `JobRecord` exists per (session, provider) pair. Records are
//! created by the orchestration manager, mutated only by the lifecycle
//! controller (through the store), and never physically deleted;
//! terminal jobs remain as an audit trail.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Remote analysis vendor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// Emotion-timeline analysis (asynchronous batch protocol).
    Emotion,
    /// Video-content analysis (upload-then-query protocol).
    Content,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Emotion => "emotion",
            Provider::Content => "content",
        }
    }

    /// Parses a stored provider tag. Unknown tags are rejected rather
    /// than defaulted: a job must never be driven by the wrong adapter.
    pub fn parse(s: &str) -> Option<Provider> {
        match s {
            "emotion" => Some(Provider::Emotion),
            "content" => Some(Provider::Content),
            _ => None,
        }
    }
}

/// Which local video stream(s) feed a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoType {
    Webcam,
    Screen,
    Both,
}

impl VideoType {
    pub fn as_str(&self) -> &'static str {
        match self {
            VideoType::Webcam => "webcam",
            VideoType::Screen => "screen",
            VideoType::Both => "both",
        }
    }

    pub fn parse(s: &str) -> Option<VideoType> {
        match s {
            "webcam" => Some(VideoType::Webcam),
            "screen" => Some(VideoType::Screen),
            "both" => Some(VideoType::Both),
            _ => None,
        }
    }
}

/// Job lifecycle status.
///
/// Transitions are monotonic: `Pending → Uploading → Processing →
/// Completed`, with `Failed` reachable from `Uploading` or `Processing`
/// (and `Uploading → Pending` while upload retries remain). `Completed`
/// and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Uploading,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Uploading => "uploading",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<JobStatus> {
        match s {
            "pending" => Some(JobStatus::Pending),
            "uploading" => Some(JobStatus::Uploading),
            "processing" => Some(JobStatus::Processing),
            "completed" => Some(JobStatus::Completed),
            "failed" => Some(JobStatus::Failed),
            _ => None,
        }
    }

    /// Returns true for states no lifecycle call will advance further.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

/// Persisted state for one provider's analysis of one session's video.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRecord {
    /// Unique job identifier (UUID), assigned at creation.
    pub job_id: String,
    /// Owning monitoring session.
    pub session_id: String,
    /// Remote analysis vendor for this job.
    pub provider: Provider,
    /// Identifier assigned by the provider once upload succeeds.
    /// May be a serialized compound value (one sub-id per stream).
    /// Set at most once; `None` until upload completes.
    pub provider_job_id: Option<String>,
    /// Which stream(s) feed this job.
    pub video_type: VideoType,
    /// Local source video paths, order-stable, fixed at creation.
    pub video_paths: Vec<PathBuf>,
    /// Current lifecycle status.
    pub status: JobStatus,
    pub upload_started_at: Option<DateTime<Utc>>,
    pub upload_completed_at: Option<DateTime<Utc>>,
    pub processing_started_at: Option<DateTime<Utc>>,
    pub processing_completed_at: Option<DateTime<Utc>>,
    pub results_stored_at: Option<DateTime<Utc>>,
    pub remote_deleted_at: Option<DateTime<Utc>>,
    /// Whether canonical results were fetched and stored locally.
    pub results_fetched: bool,
    /// Local path of the canonical results file once stored.
    pub results_file_path: Option<PathBuf>,
    /// The sole authority consulted before issuing a remote delete.
    /// True iff results are durably stored locally; written only by
    /// the store's `mark_results_fetched`.
    pub can_delete_remote: bool,
    /// Recoverable-failure counter.
    pub retry_count: u32,
    /// Most recent failure message.
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobRecord {
    /// Creates a fresh `Pending` record. The store re-stamps
    /// `created_at`/`updated_at` on insert.
    pub fn new(
        session_id: String,
        provider: Provider,
        video_type: VideoType,
        video_paths: Vec<PathBuf>,
    ) -> Self {
        let now = Utc::now();
        Self {
            job_id: uuid::Uuid::new_v4().to_string(),
            session_id,
            provider,
            provider_job_id: None,
            video_type,
            video_paths,
            status: JobStatus::Pending,
            upload_started_at: None,
            upload_completed_at: None,
            processing_started_at: None,
            processing_completed_at: None,
            results_stored_at: None,
            remote_deleted_at: None,
            results_fetched: false,
            results_file_path: None,
            can_delete_remote: false,
            retry_count: 0,
            last_error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// The deletion-safety invariant: remote video may be deleted only
    /// after results are durably persisted locally.
    pub fn deletion_safe(&self) -> bool {
        self.results_fetched && self.results_file_path.is_some() && self.results_stored_at.is_some()
    }

    /// Whether another upload attempt fits in the retry budget.
    pub fn can_retry(&self, max_retries: u32) -> bool {
        self.retry_count < max_retries
    }
}
