pub mod config;
pub mod db;
pub mod error;
pub mod job;
pub mod lifecycle;
pub mod logging;
pub mod manager;
pub mod provider;
pub mod results;
pub mod secrets;

pub use config::{load_config, OrchestratorConfig};
pub use error::{ConfigError, OrchestratorError, Result, VantageError};
pub use job::{JobRecord, JobStatus, Provider, VideoType};
pub use lifecycle::LifecycleController;
pub use manager::OrchestrationManager;
pub use provider::{AnalysisProvider, RemoteStatus};
pub use results::{ParseTier, ResultsDocument};
pub use secrets::{resolve_secret, SecretError};
