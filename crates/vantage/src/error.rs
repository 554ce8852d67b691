use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VantageError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),

    #[error("Orchestration error: {0}")]
    Orchestrator(#[from] OrchestratorError),

    #[error("Results storage error: {0}")]
    Results(#[from] crate::results::store::ResultsStoreError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Failed to resolve API key for provider '{provider}': {source}")]
    Secret {
        provider: String,
        #[source]
        source: crate::secrets::SecretError,
    },
}

/// Infrastructure faults surfaced by the lifecycle controller and the
/// orchestration manager. Adapter and network failures are never
/// reported this way; callers observe those only through a `Failed`
/// status, a `false`, or a `None` return.
#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("Job '{0}' not found")]
    JobNotFound(String),

    #[error("No adapter configured for provider '{0}'")]
    ProviderNotConfigured(String),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),
}

pub type Result<T> = std::result::Result<T, VantageError>;
