//! Test harness wiring an in-memory store, scratch results directory
//! and scripted adapters into an orchestration manager.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use tempfile::TempDir;

use vantage::db::Database;
use vantage::provider::AnalysisProvider;
use vantage::{OrchestrationManager, OrchestratorConfig, Provider};

use super::mock::MockProvider;

pub struct TestHarness {
    pub db: Database,
    pub manager: OrchestrationManager,
    pub temp: TempDir,
    config: OrchestratorConfig,
}

impl TestHarness {
    /// Harness with a fast poll cadence and a generous timeout.
    pub fn new(mocks: Vec<(Provider, Arc<MockProvider>)>) -> Self {
        Self::with_config(mocks, |_| {})
    }

    /// Harness with config adjustments (e.g. a zero poll timeout).
    pub fn with_config(
        mocks: Vec<(Provider, Arc<MockProvider>)>,
        tweak: impl FnOnce(&mut OrchestratorConfig),
    ) -> Self {
        let temp = TempDir::new().expect("Failed to create temp directory");
        let db = Database::open_in_memory().expect("Failed to open in-memory database");

        let mut config = OrchestratorConfig::default();
        config.data_dir = temp.path().to_path_buf();
        config.poll_interval_secs = 0;
        config.poll_timeout_secs = 60;
        tweak(&mut config);

        let manager =
            OrchestrationManager::with_adapters(db.clone(), config.clone(), adapter_map(mocks));

        Self {
            db,
            manager,
            temp,
            config,
        }
    }

    /// A second manager over the same store, simulating a process
    /// restart with fresh adapters.
    pub fn restarted_manager(
        &self,
        mocks: Vec<(Provider, Arc<MockProvider>)>,
    ) -> OrchestrationManager {
        OrchestrationManager::with_adapters(self.db.clone(), self.config.clone(), adapter_map(mocks))
    }
}

fn adapter_map(
    mocks: Vec<(Provider, Arc<MockProvider>)>,
) -> HashMap<Provider, Arc<dyn AnalysisProvider>> {
    mocks
        .into_iter()
        .map(|(p, m)| (p, m as Arc<dyn AnalysisProvider>))
        .collect()
}

/// Source paths for a session with both streams. The mock adapter
/// never opens them, so they do not need to exist.
pub fn both_streams() -> Vec<PathBuf> {
    vec![
        PathBuf::from("/recordings/session/webcam.mp4"),
        PathBuf::from("/recordings/session/screen.mp4"),
    ]
}
