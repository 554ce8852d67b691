//! Job repository — operations over the `analysis_jobs` table.
//!
//! Every timestamp is stamped here, at the moment of the call, never
//! supplied by the caller. Phase timestamps are set once (`COALESCE`)
//! and never cleared; `provider_job_id` writes are guarded so a job can
//! be uploaded at most once; `can_delete_remote` is written exclusively
//! by [`mark_results_fetched`].

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use rusqlite::{params, Row};

use crate::job::{JobRecord, JobStatus, Provider, VideoType};

use super::{Database, DatabaseError};

/// A raw job row from the database.
#[derive(Debug, Clone)]
struct JobRow {
    id: String,
    session_id: String,
    provider: String,
    provider_job_id: Option<String>,
    video_type: String,
    video_paths: String,
    status: String,
    upload_started_at: Option<String>,
    upload_completed_at: Option<String>,
    processing_started_at: Option<String>,
    processing_completed_at: Option<String>,
    results_stored_at: Option<String>,
    remote_deleted_at: Option<String>,
    results_fetched: bool,
    results_file_path: Option<String>,
    can_delete_remote: bool,
    retry_count: u32,
    last_error: Option<String>,
    created_at: String,
    updated_at: String,
}

impl JobRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            session_id: row.get("session_id")?,
            provider: row.get("provider")?,
            provider_job_id: row.get("provider_job_id")?,
            video_type: row.get("video_type")?,
            video_paths: row.get("video_paths")?,
            status: row.get("status")?,
            upload_started_at: row.get("upload_started_at")?,
            upload_completed_at: row.get("upload_completed_at")?,
            processing_started_at: row.get("processing_started_at")?,
            processing_completed_at: row.get("processing_completed_at")?,
            results_stored_at: row.get("results_stored_at")?,
            remote_deleted_at: row.get("remote_deleted_at")?,
            results_fetched: row.get("results_fetched")?,
            results_file_path: row.get("results_file_path")?,
            can_delete_remote: row.get("can_delete_remote")?,
            retry_count: row.get("retry_count")?,
            last_error: row.get("last_error")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    fn into_record(self) -> Result<JobRecord, DatabaseError> {
        // A wrong provider tag would drive the job with the wrong
        // adapter, so it is rejected rather than defaulted.
        let provider = Provider::parse(&self.provider).ok_or_else(|| DatabaseError::Corrupt {
            job_id: self.id.clone(),
            reason: format!("unknown provider '{}'", self.provider),
        })?;

        let status = JobStatus::parse(&self.status).unwrap_or_else(|| {
            log::warn!(
                "Unknown job status '{}' for job {}, defaulting to Pending",
                self.status,
                self.id
            );
            JobStatus::Pending
        });

        let video_type = VideoType::parse(&self.video_type).unwrap_or_else(|| {
            log::warn!(
                "Unknown video type '{}' for job {}, defaulting to Both",
                self.video_type,
                self.id
            );
            VideoType::Both
        });

        let video_paths: Vec<PathBuf> =
            serde_json::from_str(&self.video_paths).unwrap_or_else(|e| {
                log::warn!("Bad video_paths JSON for job {}: {}", self.id, e);
                Vec::new()
            });

        Ok(JobRecord {
            job_id: self.id,
            session_id: self.session_id,
            provider,
            provider_job_id: self.provider_job_id,
            video_type,
            video_paths,
            status,
            upload_started_at: parse_opt_timestamp(self.upload_started_at.as_deref()),
            upload_completed_at: parse_opt_timestamp(self.upload_completed_at.as_deref()),
            processing_started_at: parse_opt_timestamp(self.processing_started_at.as_deref()),
            processing_completed_at: parse_opt_timestamp(self.processing_completed_at.as_deref()),
            results_stored_at: parse_opt_timestamp(self.results_stored_at.as_deref()),
            remote_deleted_at: parse_opt_timestamp(self.remote_deleted_at.as_deref()),
            results_fetched: self.results_fetched,
            results_file_path: self.results_file_path.map(PathBuf::from),
            can_delete_remote: self.can_delete_remote,
            retry_count: self.retry_count,
            last_error: self.last_error,
            created_at: parse_timestamp(&self.created_at),
            updated_at: parse_timestamp(&self.updated_at),
        })
    }
}

fn parse_timestamp(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|e| {
            log::warn!("parse_timestamp: failed to parse '{}': {}", s, e);
            Utc::now()
        })
}

fn parse_opt_timestamp(s: Option<&str>) -> Option<DateTime<Utc>> {
    s.and_then(|s| match DateTime::parse_from_rfc3339(s) {
        Ok(dt) => Some(dt.with_timezone(&Utc)),
        Err(e) => {
            log::warn!("parse_opt_timestamp: failed to parse '{}': {}", s, e);
            None
        }
    })
}

fn now_string() -> String {
    Utc::now().to_rfc3339()
}

/// Inserts a new job record. `created_at`/`updated_at` are stamped by
/// the store, not taken from the record.
pub fn create(db: &Database, record: &JobRecord) -> Result<(), DatabaseError> {
    let now = now_string();
    let video_paths =
        serde_json::to_string(&record.video_paths).unwrap_or_else(|_| "[]".to_string());

    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO analysis_jobs (id, session_id, provider, provider_job_id, video_type,
             video_paths, status, results_fetched, can_delete_remote, retry_count, last_error,
             created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?12)",
            params![
                record.job_id,
                record.session_id,
                record.provider.as_str(),
                record.provider_job_id,
                record.video_type.as_str(),
                video_paths,
                record.status.as_str(),
                record.results_fetched,
                record.can_delete_remote,
                record.retry_count,
                record.last_error,
                now,
            ],
        )?;
        Ok(())
    })
}

/// Finds a job by its ID.
pub fn find_by_id(db: &Database, id: &str) -> Result<Option<JobRecord>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT * FROM analysis_jobs WHERE id = ?1")?;
        let mut rows = stmt.query_map(params![id], JobRow::from_row)?;
        match rows.next() {
            Some(Ok(row)) => Ok(Some(row.into_record()?)),
            Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
            None => Ok(None),
        }
    })
}

/// Finds a job by its ID, failing if it does not exist.
pub fn get(db: &Database, id: &str) -> Result<JobRecord, DatabaseError> {
    find_by_id(db, id)?.ok_or_else(|| DatabaseError::JobNotFound(id.to_string()))
}

/// Updates a job's status, stamping the phase timestamp the new status
/// implies. Each phase timestamp is set at most once.
pub fn update_status(db: &Database, id: &str, status: JobStatus) -> Result<(), DatabaseError> {
    let now = now_string();
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE analysis_jobs SET
                status = ?2,
                upload_started_at = CASE WHEN ?2 = 'uploading'
                    THEN COALESCE(upload_started_at, ?3) ELSE upload_started_at END,
                processing_started_at = CASE WHEN ?2 = 'processing'
                    THEN COALESCE(processing_started_at, ?3) ELSE processing_started_at END,
                processing_completed_at = CASE WHEN ?2 = 'completed'
                    THEN COALESCE(processing_completed_at, ?3) ELSE processing_completed_at END,
                updated_at = ?3
             WHERE id = ?1",
            params![id, status.as_str(), now],
        )?;
        if changed == 0 {
            return Err(DatabaseError::JobNotFound(id.to_string()));
        }
        Ok(())
    })
}

/// Records a successful upload: sets `provider_job_id` (at most once)
/// and stamps `upload_completed_at`.
pub fn mark_upload_complete(
    db: &Database,
    id: &str,
    provider_job_id: &str,
) -> Result<(), DatabaseError> {
    let now = now_string();
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE analysis_jobs SET
                provider_job_id = ?2,
                upload_completed_at = COALESCE(upload_completed_at, ?3),
                updated_at = ?3
             WHERE id = ?1 AND provider_job_id IS NULL",
            params![id, provider_job_id, now],
        )?;
        if changed == 0 {
            let exists: bool = conn.query_row(
                "SELECT COUNT(*) > 0 FROM analysis_jobs WHERE id = ?1",
                params![id],
                |r| r.get(0),
            )?;
            if exists {
                return Err(DatabaseError::AlreadySet {
                    job_id: id.to_string(),
                    column: "provider_job_id",
                });
            }
            return Err(DatabaseError::JobNotFound(id.to_string()));
        }
        Ok(())
    })
}

/// Records durably stored results. This is the only code path that sets
/// `can_delete_remote`, keeping the deletion-safety invariant in one
/// place: fetched flag, file path and stored-at stamp are written in
/// the same statement that grants deletability.
pub fn mark_results_fetched(
    db: &Database,
    id: &str,
    results_file_path: &std::path::Path,
) -> Result<(), DatabaseError> {
    let now = now_string();
    let path = results_file_path.to_string_lossy().to_string();
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE analysis_jobs SET
                results_fetched = 1,
                results_file_path = ?2,
                results_stored_at = COALESCE(results_stored_at, ?3),
                can_delete_remote = 1,
                updated_at = ?3
             WHERE id = ?1",
            params![id, path, now],
        )?;
        if changed == 0 {
            return Err(DatabaseError::JobNotFound(id.to_string()));
        }
        Ok(())
    })
}

/// Stamps `remote_deleted_at` after a successful remote delete.
pub fn mark_remote_deleted(db: &Database, id: &str) -> Result<(), DatabaseError> {
    let now = now_string();
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE analysis_jobs SET
                remote_deleted_at = COALESCE(remote_deleted_at, ?2),
                updated_at = ?2
             WHERE id = ?1",
            params![id, now],
        )?;
        if changed == 0 {
            return Err(DatabaseError::JobNotFound(id.to_string()));
        }
        Ok(())
    })
}

/// Increments the retry counter and overwrites `last_error`.
/// Returns the new counter value.
pub fn increment_retry(db: &Database, id: &str, error: &str) -> Result<u32, DatabaseError> {
    let now = now_string();
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE analysis_jobs SET
                retry_count = retry_count + 1,
                last_error = ?2,
                updated_at = ?3
             WHERE id = ?1",
            params![id, error, now],
        )?;
        if changed == 0 {
            return Err(DatabaseError::JobNotFound(id.to_string()));
        }
        let count: u32 = conn.query_row(
            "SELECT retry_count FROM analysis_jobs WHERE id = ?1",
            params![id],
            |r| r.get(0),
        )?;
        Ok(count)
    })
}

/// Lists all jobs belonging to a session, oldest first.
pub fn list_for_session(db: &Database, session_id: &str) -> Result<Vec<JobRecord>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT * FROM analysis_jobs WHERE session_id = ?1 ORDER BY created_at ASC",
        )?;
        let rows: Vec<JobRow> = stmt
            .query_map(params![session_id], JobRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(JobRow::into_record).collect()
    })
}

/// Lists all jobs in the given status, oldest first.
pub fn list_by_status(db: &Database, status: JobStatus) -> Result<Vec<JobRecord>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt =
            conn.prepare("SELECT * FROM analysis_jobs WHERE status = ?1 ORDER BY created_at ASC")?;
        let rows: Vec<JobRow> = stmt
            .query_map(params![status.as_str()], JobRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(JobRow::into_record).collect()
    })
}

/// Counts jobs with the given status.
pub fn count_by_status(db: &Database, status: JobStatus) -> Result<u64, DatabaseError> {
    db.with_conn(|conn| {
        let count: u64 = conn.query_row(
            "SELECT COUNT(*) FROM analysis_jobs WHERE status = ?1",
            params![status.as_str()],
            |r| r.get(0),
        )?;
        Ok(count)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> Database {
        Database::open_in_memory().expect("Failed to create test database")
    }

    fn sample_job(session: &str, provider: Provider) -> JobRecord {
        JobRecord::new(
            session.to_string(),
            provider,
            VideoType::Both,
            vec![
                PathBuf::from("/tmp/webcam.mp4"),
                PathBuf::from("/tmp/screen.mp4"),
            ],
        )
    }

    #[test]
    fn test_create_and_find() {
        let db = test_db();
        let job = sample_job("s1", Provider::Content);
        create(&db, &job).unwrap();

        let found = get(&db, &job.job_id).unwrap();
        assert_eq!(found.session_id, "s1");
        assert_eq!(found.provider, Provider::Content);
        assert_eq!(found.video_type, VideoType::Both);
        assert_eq!(found.status, JobStatus::Pending);
        assert_eq!(found.video_paths.len(), 2);
        assert!(found.provider_job_id.is_none());
        assert!(!found.can_delete_remote);
    }

    #[test]
    fn test_find_nonexistent() {
        let db = test_db();
        assert!(find_by_id(&db, "nonexistent").unwrap().is_none());
        assert!(matches!(
            get(&db, "nonexistent"),
            Err(DatabaseError::JobNotFound(_))
        ));
    }

    #[test]
    fn test_update_status_stamps_phase_timestamps() {
        let db = test_db();
        let job = sample_job("s1", Provider::Emotion);
        create(&db, &job).unwrap();

        update_status(&db, &job.job_id, JobStatus::Uploading).unwrap();
        let found = get(&db, &job.job_id).unwrap();
        assert_eq!(found.status, JobStatus::Uploading);
        assert!(found.upload_started_at.is_some());
        assert!(found.processing_started_at.is_none());

        update_status(&db, &job.job_id, JobStatus::Processing).unwrap();
        let found = get(&db, &job.job_id).unwrap();
        assert!(found.processing_started_at.is_some());
        assert!(found.processing_completed_at.is_none());

        update_status(&db, &job.job_id, JobStatus::Completed).unwrap();
        let found = get(&db, &job.job_id).unwrap();
        assert!(found.processing_completed_at.is_some());
    }

    #[test]
    fn test_phase_timestamps_set_once() {
        let db = test_db();
        let job = sample_job("s1", Provider::Emotion);
        create(&db, &job).unwrap();

        update_status(&db, &job.job_id, JobStatus::Uploading).unwrap();
        let first = get(&db, &job.job_id).unwrap().upload_started_at.unwrap();

        // Returning to pending and uploading again must not move the stamp.
        update_status(&db, &job.job_id, JobStatus::Pending).unwrap();
        update_status(&db, &job.job_id, JobStatus::Uploading).unwrap();
        let second = get(&db, &job.job_id).unwrap().upload_started_at.unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn test_mark_upload_complete_set_once() {
        let db = test_db();
        let job = sample_job("s1", Provider::Content);
        create(&db, &job).unwrap();

        mark_upload_complete(&db, &job.job_id, "remote-1").unwrap();
        let found = get(&db, &job.job_id).unwrap();
        assert_eq!(found.provider_job_id.as_deref(), Some("remote-1"));
        assert!(found.upload_completed_at.is_some());

        // A second upload must be rejected, not overwrite the remote id.
        let err = mark_upload_complete(&db, &job.job_id, "remote-2").unwrap_err();
        assert!(matches!(err, DatabaseError::AlreadySet { .. }));
        let found = get(&db, &job.job_id).unwrap();
        assert_eq!(found.provider_job_id.as_deref(), Some("remote-1"));
    }

    #[test]
    fn test_mark_results_fetched_grants_deletability() {
        let db = test_db();
        let job = sample_job("s1", Provider::Content);
        create(&db, &job).unwrap();

        mark_results_fetched(&db, &job.job_id, std::path::Path::new("/data/results/j.json"))
            .unwrap();

        let found = get(&db, &job.job_id).unwrap();
        assert!(found.results_fetched);
        assert_eq!(
            found.results_file_path.as_deref(),
            Some(std::path::Path::new("/data/results/j.json"))
        );
        assert!(found.results_stored_at.is_some());
        assert!(found.can_delete_remote);
        assert!(found.deletion_safe());
    }

    #[test]
    fn test_mark_remote_deleted() {
        let db = test_db();
        let job = sample_job("s1", Provider::Emotion);
        create(&db, &job).unwrap();

        mark_remote_deleted(&db, &job.job_id).unwrap();
        let found = get(&db, &job.job_id).unwrap();
        assert!(found.remote_deleted_at.is_some());
    }

    #[test]
    fn test_increment_retry_accumulates_and_overwrites() {
        let db = test_db();
        let job = sample_job("s1", Provider::Emotion);
        create(&db, &job).unwrap();

        let first = increment_retry(&db, &job.job_id, "network unreachable").unwrap();
        assert_eq!(first, 1);
        let second = increment_retry(&db, &job.job_id, "connection reset").unwrap();
        assert_eq!(second, 2);

        let found = get(&db, &job.job_id).unwrap();
        assert_eq!(found.retry_count, 2);
        assert_eq!(found.last_error.as_deref(), Some("connection reset"));
    }

    #[test]
    fn test_list_for_session() {
        let db = test_db();
        let a = sample_job("s1", Provider::Emotion);
        let b = sample_job("s1", Provider::Content);
        let other = sample_job("s2", Provider::Content);
        create(&db, &a).unwrap();
        create(&db, &b).unwrap();
        create(&db, &other).unwrap();

        let jobs = list_for_session(&db, "s1").unwrap();
        assert_eq!(jobs.len(), 2);
        assert!(jobs.iter().all(|j| j.session_id == "s1"));
    }

    #[test]
    fn test_list_by_status() {
        let db = test_db();
        let a = sample_job("s1", Provider::Emotion);
        let b = sample_job("s1", Provider::Content);
        create(&db, &a).unwrap();
        create(&db, &b).unwrap();
        update_status(&db, &b.job_id, JobStatus::Processing).unwrap();

        let pending = list_by_status(&db, JobStatus::Pending).unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].job_id, a.job_id);

        let processing = list_by_status(&db, JobStatus::Processing).unwrap();
        assert_eq!(processing.len(), 1);
        assert_eq!(processing[0].job_id, b.job_id);

        assert_eq!(count_by_status(&db, JobStatus::Failed).unwrap(), 0);
    }
}
