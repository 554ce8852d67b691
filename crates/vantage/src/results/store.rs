//! Canonical results file storage.
//!
//! One JSON document per job, written once and immutable thereafter.

use std::path::{Path, PathBuf};

use thiserror::Error;

use super::schema::ResultsDocument;

#[derive(Error, Debug)]
pub enum ResultsStoreError {
    #[error("Failed to create directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file '{path}': {source}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Results file already exists: {0}")]
    FileExists(PathBuf),

    #[error("Failed to serialize results: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Returns the canonical results path for a job.
pub fn results_path(dir: &Path, job_id: &str) -> PathBuf {
    dir.join(format!("{}.json", job_id))
}

/// Writes the canonical results document for a job. Refuses to
/// overwrite: results files are immutable once stored.
pub fn write_results(
    dir: &Path,
    job_id: &str,
    document: &ResultsDocument,
) -> Result<PathBuf, ResultsStoreError> {
    std::fs::create_dir_all(dir).map_err(|e| ResultsStoreError::CreateDirectory {
        path: dir.to_path_buf(),
        source: e,
    })?;

    let path = results_path(dir, job_id);
    if path.exists() {
        return Err(ResultsStoreError::FileExists(path));
    }

    let json = serde_json::to_string_pretty(document)?;
    std::fs::write(&path, json).map_err(|e| ResultsStoreError::WriteFile {
        path: path.clone(),
        source: e,
    })?;

    log::info!("Stored results for job {} at {}", job_id, path.display());
    Ok(path)
}
