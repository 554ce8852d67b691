//! Database error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors from database operations.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// SQLite error from rusqlite.
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// IO error when creating directories or files.
    #[error("IO error for path '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A migration failed to apply.
    #[error("Migration failed at version {version}: {reason}")]
    Migration { version: u32, reason: String },

    /// The database lock was poisoned.
    #[error("Database lock poisoned")]
    LockPoisoned,

    /// No job row exists for the given id.
    #[error("Job '{0}' not found")]
    JobNotFound(String),

    /// A stored row cannot be interpreted as a job record.
    #[error("Corrupt job row '{job_id}': {reason}")]
    Corrupt { job_id: String, reason: String },

    /// A set-once column was already written for this job.
    #[error("Job '{job_id}' already has {column} set")]
    AlreadySet {
        job_id: String,
        column: &'static str,
    },
}
