//! Orchestration manager.
//!
//! Fan-out layer over the lifecycle controller: starts jobs for a
//! session (one per requested provider), and exposes status, retrieval
//! and deletion to the session layer. Only plain data crosses this
//! boundary: identifiers, status enums, booleans and file paths.
//!
//! The manager owns no background tasks. Upload happens synchronously
//! inside `start_session`; processing and retrieval are driven by later
//! calls (`check_status`, `poll_to_completion`, `retrieve_and_store`),
//! so hosts decide where poll loops run and can resume them after a
//! restart via `resume_in_flight`.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use futures_util::future::join_all;

use crate::config::OrchestratorConfig;
use crate::db::{job_repo, Database};
use crate::error::{ConfigError, OrchestratorError};
use crate::job::{JobRecord, JobStatus, Provider, VideoType};
use crate::lifecycle::LifecycleController;
use crate::provider::{self, AnalysisProvider};

pub struct OrchestrationManager {
    db: Database,
    config: Arc<OrchestratorConfig>,
    adapters: HashMap<Provider, Arc<dyn AnalysisProvider>>,
}

impl OrchestrationManager {
    /// Builds a manager with real adapters for both providers.
    pub fn new(db: Database, config: OrchestratorConfig) -> Result<Self, ConfigError> {
        let mut adapters: HashMap<Provider, Arc<dyn AnalysisProvider>> = HashMap::new();
        for p in [Provider::Emotion, Provider::Content] {
            adapters.insert(p, provider::build(p, &config)?);
        }
        Ok(Self {
            db,
            config: Arc::new(config),
            adapters,
        })
    }

    /// Builds a manager with injected adapters (used by tests and by
    /// hosts that only configure a subset of providers).
    pub fn with_adapters(
        db: Database,
        config: OrchestratorConfig,
        adapters: HashMap<Provider, Arc<dyn AnalysisProvider>>,
    ) -> Self {
        Self {
            db,
            config: Arc::new(config),
            adapters,
        }
    }

    fn controller_for(&self, p: Provider) -> Result<LifecycleController, OrchestratorError> {
        let adapter = self
            .adapters
            .get(&p)
            .cloned()
            .ok_or_else(|| OrchestratorError::ProviderNotConfigured(p.as_str().to_string()))?;
        Ok(LifecycleController::new(
            self.db.clone(),
            adapter,
            Arc::clone(&self.config),
        ))
    }

    /// Creates one job per requested provider and uploads them
    /// concurrently, returning once every upload has settled. Job ids
    /// are returned for failed uploads too; the failure is visible
    /// through the job's status.
    pub async fn start_session(
        &self,
        session_id: &str,
        video_paths: &[PathBuf],
        video_type: VideoType,
        providers: &[Provider],
    ) -> Result<HashMap<Provider, String>, OrchestratorError> {
        let mut started: Vec<(Provider, String, LifecycleController)> =
            Vec::with_capacity(providers.len());

        for &p in providers {
            let controller = self.controller_for(p)?;
            let record = JobRecord::new(
                session_id.to_string(),
                p,
                video_type,
                video_paths.to_vec(),
            );
            job_repo::create(&self.db, &record)?;
            log::info!(
                "Created job {} for session {} on provider {}",
                record.job_id,
                session_id,
                p.as_str()
            );
            started.push((p, record.job_id, controller));
        }

        let uploads = started
            .iter()
            .map(|(_, job_id, controller)| controller.run_upload(job_id));
        for result in join_all(uploads).await {
            result?;
        }

        Ok(started
            .into_iter()
            .map(|(p, job_id, _)| (p, job_id))
            .collect())
    }

    /// Single poll-and-persist step. Safe on any job: terminal jobs
    /// just report their current status.
    pub async fn check_status(&self, job_id: &str) -> Result<JobStatus, OrchestratorError> {
        let record = self.job(job_id)?;
        let controller = self.controller_for(record.provider)?;
        controller.poll_once(job_id).await
    }

    /// Drives the poll loop for one job until it terminates or times
    /// out. The caller owns the task; abandoning it leaves the record
    /// at its last persisted state for later resumption.
    pub async fn poll_to_completion(&self, job_id: &str) -> Result<JobStatus, OrchestratorError> {
        let record = self.job(job_id)?;
        let controller = self.controller_for(record.provider)?;
        controller.poll_until_terminal(job_id).await
    }

    /// Fetches and locally persists results for a completed job.
    /// Returns the results file path, or `None` when the job is not
    /// eligible or the fetch failed (recorded on the job).
    pub async fn retrieve_and_store(
        &self,
        job_id: &str,
    ) -> Result<Option<PathBuf>, OrchestratorError> {
        let record = self.job(job_id)?;
        let controller = self.controller_for(record.provider)?;
        controller.retrieve_and_store(job_id).await
    }

    /// Deletes the remotely stored video for a job. Refused (false,
    /// no adapter call) unless the job's results are durably stored.
    pub async fn delete_remote(&self, job_id: &str) -> Result<bool, OrchestratorError> {
        let record = self.job(job_id)?;
        let controller = self.controller_for(record.provider)?;
        controller.delete_remote(job_id).await
    }

    /// Re-attempts the upload of a job sitting in `Pending` after a
    /// recoverable failure.
    pub async fn retry_upload(&self, job_id: &str) -> Result<JobStatus, OrchestratorError> {
        let record = self.job(job_id)?;
        let controller = self.controller_for(record.provider)?;
        controller.run_upload(job_id).await
    }

    /// One sweep over pending jobs with a recorded failure: each gets
    /// one more upload attempt. Caller-triggered; the manager schedules
    /// nothing by itself.
    pub async fn sweep_recoverable(
        &self,
    ) -> Result<Vec<(String, JobStatus)>, OrchestratorError> {
        let candidates = job_repo::list_by_status(&self.db, JobStatus::Pending)?;
        let mut outcomes = Vec::new();

        for record in candidates {
            if record.retry_count == 0 {
                continue;
            }
            let controller = self.controller_for(record.provider)?;
            let status = controller.run_upload(&record.job_id).await?;
            outcomes.push((record.job_id, status));
        }

        if !outcomes.is_empty() {
            log::info!("Recoverable sweep retried {} job(s)", outcomes.len());
        }
        Ok(outcomes)
    }

    /// Jobs found mid-flight (status `Processing`), for hosts to
    /// re-spawn poll loops after a restart.
    pub fn resume_in_flight(&self) -> Result<Vec<JobRecord>, OrchestratorError> {
        Ok(job_repo::list_by_status(&self.db, JobStatus::Processing)?)
    }

    /// Reads one job record.
    pub fn job(&self, job_id: &str) -> Result<JobRecord, OrchestratorError> {
        job_repo::find_by_id(&self.db, job_id)?
            .ok_or_else(|| OrchestratorError::JobNotFound(job_id.to_string()))
    }

    /// Reads all job records of a session.
    pub fn jobs_for_session(&self, session_id: &str) -> Result<Vec<JobRecord>, OrchestratorError> {
        Ok(job_repo::list_for_session(&self.db, session_id)?)
    }
}
