//! Job lifecycle controller.
//!
//! Drives a single job record through its state machine by calling the
//! provider adapter and the response parser, persisting every
//! transition. Adapter and network errors are caught here and turned
//! into a retry-counter increment plus a `last_error` string; they
//! never propagate past this boundary as errors.
//!
//! Results retrieval is deliberately decoupled from the `Completed`
//! transition: a job can sit completed-but-unfetched indefinitely
//! (including across a restart) with `can_delete_remote` still false.
//! A crash between remote completion and local persistence therefore
//! never leaves a deletable-but-unsaved job.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::time::Instant;

use crate::config::OrchestratorConfig;
use crate::db::{job_repo, Database};
use crate::error::OrchestratorError;
use crate::job::{JobRecord, JobStatus, Provider};
use crate::provider::{AnalysisProvider, RemoteStatus};
use crate::results::{self, ResultsDocument};

/// Drives jobs of one provider through upload, polling, retrieval and
/// deletion. Holds no per-job state: everything is read from and
/// written to the store, so any controller instance can pick up any of
/// its provider's jobs, including after a restart.
pub struct LifecycleController {
    db: Database,
    adapter: Arc<dyn AnalysisProvider>,
    config: Arc<OrchestratorConfig>,
}

impl LifecycleController {
    pub fn new(
        db: Database,
        adapter: Arc<dyn AnalysisProvider>,
        config: Arc<OrchestratorConfig>,
    ) -> Self {
        Self {
            db,
            adapter,
            config,
        }
    }

    fn load(&self, job_id: &str) -> Result<JobRecord, OrchestratorError> {
        job_repo::find_by_id(&self.db, job_id)?
            .ok_or_else(|| OrchestratorError::JobNotFound(job_id.to_string()))
    }

    /// Uploads a pending job's video to the provider.
    ///
    /// On failure the retry counter is incremented and the job returns
    /// to `Pending` while budget remains, else becomes `Failed`. A job
    /// that already carries a `provider_job_id` is never re-uploaded.
    pub async fn run_upload(&self, job_id: &str) -> Result<JobStatus, OrchestratorError> {
        let record = self.load(job_id)?;

        if record.provider_job_id.is_some() {
            log::warn!("Job {} is already uploaded, refusing re-upload", job_id);
            return Ok(record.status);
        }
        if record.status != JobStatus::Pending {
            log::warn!(
                "Job {} is {:?}, not pending; skipping upload",
                job_id,
                record.status
            );
            return Ok(record.status);
        }

        job_repo::update_status(&self.db, job_id, JobStatus::Uploading)?;

        match self.adapter.upload(&record.video_paths).await {
            Ok(provider_job_id) => {
                job_repo::mark_upload_complete(&self.db, job_id, &provider_job_id)?;
                job_repo::update_status(&self.db, job_id, JobStatus::Processing)?;
                log::info!(
                    "Job {} uploaded to {} as {}",
                    job_id,
                    record.provider.as_str(),
                    provider_job_id
                );
                Ok(JobStatus::Processing)
            }
            Err(e) => {
                let count = job_repo::increment_retry(&self.db, job_id, &e.to_string())?;
                if count >= self.config.max_retries {
                    log::error!(
                        "Job {} upload failed with no retries left ({}/{}): {}",
                        job_id,
                        count,
                        self.config.max_retries,
                        e
                    );
                    job_repo::update_status(&self.db, job_id, JobStatus::Failed)?;
                    Ok(JobStatus::Failed)
                } else {
                    log::warn!(
                        "Job {} upload failed (attempt {}/{}): {}",
                        job_id,
                        count,
                        self.config.max_retries,
                        e
                    );
                    job_repo::update_status(&self.db, job_id, JobStatus::Pending)?;
                    Ok(JobStatus::Pending)
                }
            }
        }
    }

    /// Single poll-and-persist step. A no-op returning the current
    /// status for terminal jobs and for jobs not yet processing.
    pub async fn poll_once(&self, job_id: &str) -> Result<JobStatus, OrchestratorError> {
        let record = self.load(job_id)?;

        // Terminal jobs and jobs not yet uploaded have nothing to poll.
        if record.status != JobStatus::Processing {
            return Ok(record.status);
        }

        let provider_job_id = match record.provider_job_id.as_deref() {
            Some(id) => id,
            None => {
                log::error!("Job {} is processing but has no provider_job_id", job_id);
                return Ok(record.status);
            }
        };

        match self.adapter.poll_status(provider_job_id).await {
            Ok(RemoteStatus::Queued) | Ok(RemoteStatus::Processing) => {
                job_repo::update_status(&self.db, job_id, JobStatus::Processing)?;
                Ok(JobStatus::Processing)
            }
            Ok(RemoteStatus::Completed) => {
                job_repo::update_status(&self.db, job_id, JobStatus::Completed)?;
                log::info!("Job {} completed remotely", job_id);
                Ok(JobStatus::Completed)
            }
            Ok(RemoteStatus::Failed) => {
                job_repo::increment_retry(&self.db, job_id, "remote processing failed")?;
                job_repo::update_status(&self.db, job_id, JobStatus::Failed)?;
                log::error!("Job {} failed remotely", job_id);
                Ok(JobStatus::Failed)
            }
            Err(e) => {
                // Transient poll failure: record it and keep the job
                // processing for the next poll.
                job_repo::increment_retry(&self.db, job_id, &e.to_string())?;
                log::warn!("Job {} status poll failed: {}", job_id, e);
                Ok(JobStatus::Processing)
            }
        }
    }

    /// Polls at the configured interval until the job reaches a
    /// terminal state or the overall timeout elapses. On timeout the
    /// job fails with a `last_error` beginning with "timeout".
    pub async fn poll_until_terminal(&self, job_id: &str) -> Result<JobStatus, OrchestratorError> {
        let deadline = Instant::now() + self.config.poll_timeout();
        let interval = self.config.poll_interval();

        loop {
            let status = self.poll_once(job_id).await?;
            if status != JobStatus::Processing {
                return Ok(status);
            }

            if Instant::now() + interval > deadline {
                let message = format!(
                    "timeout after {}s waiting for remote processing",
                    self.config.poll_timeout_secs
                );
                job_repo::increment_retry(&self.db, job_id, &message)?;
                job_repo::update_status(&self.db, job_id, JobStatus::Failed)?;
                log::error!("Job {} poll timed out", job_id);
                return Ok(JobStatus::Failed);
            }

            tokio::time::sleep(interval).await;
        }
    }

    /// Fetches, parses, validates and stores results for a remotely
    /// completed job. Atomic from the caller's point of view: either
    /// the job ends up fetched with a results file on disk, or nothing
    /// about it changes. Returns the local results path on success.
    pub async fn retrieve_and_store(
        &self,
        job_id: &str,
    ) -> Result<Option<PathBuf>, OrchestratorError> {
        let record = self.load(job_id)?;

        if record.status != JobStatus::Completed || record.results_fetched {
            log::warn!(
                "Job {} not eligible for retrieval (status {:?}, fetched {})",
                job_id,
                record.status,
                record.results_fetched
            );
            return Ok(None);
        }

        let provider_job_id = match record.provider_job_id.as_deref() {
            Some(id) => id,
            None => {
                log::error!("Job {} is completed but has no provider_job_id", job_id);
                return Ok(None);
            }
        };

        let raw = match self.adapter.fetch_results(provider_job_id).await {
            Ok(raw) => raw,
            Err(e) => {
                job_repo::increment_retry(&self.db, job_id, &e.to_string())?;
                if e.is_transient() {
                    log::warn!("Job {} results fetch failed, will retry: {}", job_id, e);
                } else {
                    log::error!("Job {} results are gone at the provider: {}", job_id, e);
                }
                return Ok(None);
            }
        };

        let document = self.canonicalize(&record, provider_job_id, &raw);
        if !document.validate() {
            // Partial records are still persisted; the gaps stay
            // visible in the stored document.
            log::warn!("Job {} results failed validation, storing partial record", job_id);
        }

        let path = match results::write_results(&self.config.results_dir(), job_id, &document) {
            Ok(path) => path,
            Err(e) => {
                job_repo::increment_retry(&self.db, job_id, &format!("results store failed: {}", e))?;
                log::error!("Job {} results could not be stored: {}", job_id, e);
                return Ok(None);
            }
        };

        job_repo::mark_results_fetched(&self.db, job_id, &path)?;
        Ok(Some(path))
    }

    fn canonicalize(&self, record: &JobRecord, provider_job_id: &str, raw: &str) -> ResultsDocument {
        match record.provider {
            Provider::Emotion => {
                let parsed = results::parse_emotion(raw, provider_job_id);
                if !parsed.tier.is_usable() {
                    log::warn!("Job {} emotion payload stored as fallback", record.job_id);
                }
                ResultsDocument::Emotion(parsed.record)
            }
            Provider::Content => {
                let parsed = results::parse_content(raw);
                if !parsed.tier.is_usable() {
                    log::warn!("Job {} content payload stored as fallback", record.job_id);
                }
                ResultsDocument::Content(parsed.record)
            }
        }
    }

    /// Deletes the remotely stored video, gated solely on
    /// `can_delete_remote`. A refused call performs no network I/O.
    /// Best-effort: adapter failure is logged and reported as `false`,
    /// and the job stays deletable for an independent retry.
    pub async fn delete_remote(&self, job_id: &str) -> Result<bool, OrchestratorError> {
        let record = self.load(job_id)?;

        if !record.can_delete_remote {
            log::warn!(
                "Refusing remote delete for job {}: results not yet stored locally",
                job_id
            );
            return Ok(false);
        }

        let provider_job_id = match record.provider_job_id.as_deref() {
            Some(id) => id,
            None => return Ok(false),
        };

        if self.adapter.delete_remote(provider_job_id).await {
            job_repo::mark_remote_deleted(&self.db, job_id)?;
            log::info!("Remote video for job {} deleted", job_id);
            Ok(true)
        } else {
            log::warn!("Remote delete for job {} failed, can be retried", job_id);
            Ok(false)
        }
    }
}
