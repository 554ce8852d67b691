//! Provider adapter error types.
//!
//! Every variant is recoverable from the orchestrator's point of view:
//! the lifecycle controller translates these into a retry-counter
//! increment plus a `last_error` string, and nothing here crosses the
//! orchestration manager boundary.

use std::path::PathBuf;
use thiserror::Error;

/// Errors while creating the remote resource.
#[derive(Error, Debug)]
pub enum UploadError {
    /// Network-level failure (connect, timeout, 5xx).
    #[error("Upload failed: {0}")]
    Network(String),

    /// The provider rejected our credentials.
    #[error("Upload authentication failed: {0}")]
    Auth(String),

    /// The payload exceeds the provider's size limit.
    #[error("Payload too large: {size} bytes exceeds limit of {limit} bytes")]
    PayloadTooLarge { size: u64, limit: u64 },

    /// The provider does not accept this file format.
    #[error("Unsupported format for '{0}'")]
    UnsupportedFormat(PathBuf),

    /// Failed to read a local source file.
    #[error("Failed to read video '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors while polling remote job status.
#[derive(Error, Debug)]
pub enum PollError {
    #[error("Status poll failed: {0}")]
    Network(String),

    #[error("Status poll authentication failed: {0}")]
    Auth(String),

    /// The provider answered with something we cannot interpret.
    #[error("Malformed status response: {0}")]
    MalformedResponse(String),
}

/// Errors while retrieving results for a remotely completed job.
#[derive(Error, Debug)]
pub enum FetchError {
    /// Results unavailable right now; retrying the fetch may succeed.
    #[error("Results fetch failed: {0}")]
    Transient(String),

    /// Results permanently unavailable (the provider expired or
    /// garbage-collected the job). Retrying the fetch cannot succeed.
    #[error("Results permanently unavailable: {0}")]
    Gone(String),

    #[error("Malformed results response: {0}")]
    MalformedResponse(String),
}

impl FetchError {
    /// Whether a later fetch attempt can still succeed.
    pub fn is_transient(&self) -> bool {
        !matches!(self, FetchError::Gone(_))
    }
}
