//! Scripted provider adapter for orchestration tests.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;

use vantage::provider::{AnalysisProvider, FetchError, RemoteStatus, UploadError};
use vantage::Provider;

/// One scripted `fetch_results` outcome.
pub enum FetchScript {
    Ok(String),
    Transient(String),
    Gone(String),
}

#[derive(Default)]
struct MockState {
    uploads: VecDeque<Result<String, String>>,
    polls: VecDeque<RemoteStatus>,
    fetches: VecDeque<FetchScript>,
    delete_ok: bool,
    upload_calls: u32,
    poll_calls: u32,
    fetch_calls: u32,
    delete_calls: u32,
    uploaded_paths: Vec<Vec<PathBuf>>,
}

/// Provider adapter driven by scripted responses. Unscripted calls get
/// benign defaults (upload succeeds, poll reports completed) so tests
/// only script what they assert on.
pub struct MockProvider {
    provider: Provider,
    state: Mutex<MockState>,
}

impl MockProvider {
    pub fn new(provider: Provider) -> Self {
        Self {
            provider,
            state: Mutex::new(MockState {
                delete_ok: true,
                ..MockState::default()
            }),
        }
    }

    pub fn with_upload_ok(self, provider_job_id: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .uploads
            .push_back(Ok(provider_job_id.to_string()));
        self
    }

    pub fn with_upload_err(self, message: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .uploads
            .push_back(Err(message.to_string()));
        self
    }

    pub fn with_polls(self, statuses: &[RemoteStatus]) -> Self {
        self.state.lock().unwrap().polls.extend(statuses.iter().copied());
        self
    }

    pub fn with_fetch(self, script: FetchScript) -> Self {
        self.state.lock().unwrap().fetches.push_back(script);
        self
    }

    pub fn with_delete_ok(self, ok: bool) -> Self {
        self.state.lock().unwrap().delete_ok = ok;
        self
    }

    pub fn upload_calls(&self) -> u32 {
        self.state.lock().unwrap().upload_calls
    }

    pub fn poll_calls(&self) -> u32 {
        self.state.lock().unwrap().poll_calls
    }

    pub fn fetch_calls(&self) -> u32 {
        self.state.lock().unwrap().fetch_calls
    }

    pub fn delete_calls(&self) -> u32 {
        self.state.lock().unwrap().delete_calls
    }

    pub fn last_uploaded_paths(&self) -> Option<Vec<PathBuf>> {
        self.state.lock().unwrap().uploaded_paths.last().cloned()
    }
}

#[async_trait]
impl AnalysisProvider for MockProvider {
    fn provider(&self) -> Provider {
        self.provider
    }

    async fn upload(&self, paths: &[PathBuf]) -> Result<String, UploadError> {
        let mut state = self.state.lock().unwrap();
        state.upload_calls += 1;
        state.uploaded_paths.push(paths.to_vec());
        match state.uploads.pop_front() {
            Some(Ok(id)) => Ok(id),
            Some(Err(message)) => Err(UploadError::Network(message)),
            None => Ok(format!("mock-remote-{}", state.upload_calls)),
        }
    }

    async fn poll_status(&self, _provider_job_id: &str) -> Result<RemoteStatus, vantage::provider::PollError> {
        let mut state = self.state.lock().unwrap();
        state.poll_calls += 1;
        Ok(state.polls.pop_front().unwrap_or(RemoteStatus::Completed))
    }

    async fn fetch_results(&self, _provider_job_id: &str) -> Result<String, FetchError> {
        let mut state = self.state.lock().unwrap();
        state.fetch_calls += 1;
        match state.fetches.pop_front() {
            Some(FetchScript::Ok(payload)) => Ok(payload),
            Some(FetchScript::Transient(message)) => Err(FetchError::Transient(message)),
            Some(FetchScript::Gone(message)) => Err(FetchError::Gone(message)),
            None => Err(FetchError::Transient("no scripted fetch response".to_string())),
        }
    }

    async fn delete_remote(&self, _provider_job_id: &str) -> bool {
        let mut state = self.state.lock().unwrap();
        state.delete_calls += 1;
        state.delete_ok
    }
}
