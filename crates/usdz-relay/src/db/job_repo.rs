//! Job repository: persistence of conversion jobs in the `jobs` table.

use chrono::{DateTime, Utc};
use rusqlite::{params, Row};

use super::{Database, DatabaseError};
use crate::job::{ConversionJob, JobId, JobState, Manifest};

/// A raw job row from the database.
#[derive(Debug, Clone, PartialEq)]
pub struct JobRow {
    pub id: i64,
    pub state: String,
    pub progress: i64,
    /// Ordered JSON array of manifest entries.
    pub manifest: String,
    pub option_args: String,
    pub extra_args: String,
    pub messages: String,
    pub error_text: String,
    pub completed: bool,
    pub created_at: String,
    pub updated_at: String,
    pub completed_at: Option<String>,
}

impl JobRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            state: row.get("state")?,
            progress: row.get("progress")?,
            manifest: row.get("manifest")?,
            option_args: row.get("option_args")?,
            extra_args: row.get("extra_args")?,
            messages: row.get("messages")?,
            error_text: row.get("error_text")?,
            completed: row.get("completed")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
            completed_at: row.get("completed_at")?,
        })
    }

    pub fn from_job(job: &ConversionJob) -> Result<Self, DatabaseError> {
        Ok(Self {
            id: job.id as i64,
            state: job.state.as_str().to_string(),
            progress: i64::from(job.progress),
            manifest: to_json("manifest", &job.manifest)?,
            option_args: to_json("option_args", &job.option_args)?,
            extra_args: job.extra_args.clone(),
            messages: to_json("messages", &job.messages)?,
            error_text: job.error_text.clone(),
            completed: job.completed,
            created_at: job.created_at.to_rfc3339(),
            updated_at: job.updated_at.to_rfc3339(),
            completed_at: job.completed_at.map(|t| t.to_rfc3339()),
        })
    }

    pub fn into_job(self) -> Result<ConversionJob, DatabaseError> {
        let state = self
            .state
            .parse::<JobState>()
            .map_err(|_| DatabaseError::InvalidValue {
                column: "state",
                value: self.state.clone(),
            })?;
        let id = JobId::try_from(self.id).map_err(|_| DatabaseError::InvalidValue {
            column: "id",
            value: self.id.to_string(),
        })?;
        let manifest: Manifest = from_json("manifest", &self.manifest)?;

        Ok(ConversionJob {
            id,
            manifest,
            option_args: from_json("option_args", &self.option_args)?,
            extra_args: self.extra_args,
            state,
            progress: self.progress.clamp(0, 100) as u8,
            messages: from_json("messages", &self.messages)?,
            error_text: self.error_text,
            completed: self.completed,
            created_at: parse_timestamp(&self.created_at),
            updated_at: parse_timestamp(&self.updated_at),
            completed_at: self.completed_at.as_deref().map(parse_timestamp),
        })
    }
}

fn to_json<T: serde::Serialize>(column: &'static str, value: &T) -> Result<String, DatabaseError> {
    serde_json::to_string(value).map_err(|e| DatabaseError::Serialize { column, source: e })
}

fn from_json<T: serde::de::DeserializeOwned>(
    column: &'static str,
    value: &str,
) -> Result<T, DatabaseError> {
    serde_json::from_str(value).map_err(|e| DatabaseError::Serialize { column, source: e })
}

fn parse_timestamp(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|e| {
            log::warn!("parse_timestamp: failed to parse '{}': {}", s, e);
            Utc::now()
        })
}

/// Inserts a job row, or overwrites every column of an existing one.
pub fn upsert(db: &Database, job: &JobRow) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO jobs (id, state, progress, manifest, option_args, extra_args, messages,
             error_text, completed, created_at, updated_at, completed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
             ON CONFLICT(id) DO UPDATE SET state=excluded.state, progress=excluded.progress,
             manifest=excluded.manifest, option_args=excluded.option_args,
             extra_args=excluded.extra_args, messages=excluded.messages,
             error_text=excluded.error_text, completed=excluded.completed,
             updated_at=excluded.updated_at, completed_at=excluded.completed_at",
            params![
                job.id,
                job.state,
                job.progress,
                job.manifest,
                job.option_args,
                job.extra_args,
                job.messages,
                job.error_text,
                job.completed,
                job.created_at,
                job.updated_at,
                job.completed_at,
            ],
        )?;
        Ok(())
    })
}

/// Stores the current state of `job`.
pub fn save(db: &Database, job: &ConversionJob) -> Result<(), DatabaseError> {
    upsert(db, &JobRow::from_job(job)?)
}

/// Finds a job by its ID.
pub fn find_by_id(db: &Database, id: JobId) -> Result<Option<JobRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT * FROM jobs WHERE id = ?1")?;
        let mut rows = stmt.query_map(params![id as i64], JobRow::from_row)?;
        match rows.next() {
            Some(Ok(row)) => Ok(Some(row)),
            Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
            None => Ok(None),
        }
    })
}

/// Returns every job row ordered by ascending id.
pub fn list_all(db: &Database) -> Result<Vec<JobRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT * FROM jobs ORDER BY id ASC")?;
        let rows = stmt
            .query_map([], JobRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Deletes a job row. Returns whether a row was removed.
pub fn delete(db: &Database, id: JobId) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute("DELETE FROM jobs WHERE id = ?1", params![id as i64])?;
        Ok(changed > 0)
    })
}

/// Highest stored job id, or `None` for an empty table.
pub fn max_id(db: &Database) -> Result<Option<JobId>, DatabaseError> {
    db.with_conn(|conn| {
        let max: Option<i64> = conn.query_row("SELECT MAX(id) FROM jobs", [], |r| r.get(0))?;
        Ok(max.and_then(|m| JobId::try_from(m).ok()))
    })
}

/// Counts jobs in the given state.
pub fn count_by_state(db: &Database, state: JobState) -> Result<u64, DatabaseError> {
    db.with_conn(|conn| {
        let count: u64 = conn.query_row(
            "SELECT COUNT(*) FROM jobs WHERE state = ?1",
            params![state.as_str()],
            |r| r.get(0),
        )?;
        Ok(count)
    })
}
