use chrono::{DateTime, Utc};
use leadpilot_core::error::{LeadPilotError, Result};
use leadpilot_core::traits::JobStore;
use leadpilot_core::types::{Job, JobStatus, JobUpdate};
use rusqlite::types::Type;
use rusqlite::{OptionalExtension, Row, params};
use serde_json::Value;

use crate::{Datastore, db_err};

fn status_from_sql(idx: usize, raw: String) -> rusqlite::Result<JobStatus> {
    JobStatus::parse(&raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Text,
            format!("unknown job status '{raw}'").into(),
        )
    })
}

fn job_from_row(row: &Row<'_>) -> rusqlite::Result<Job> {
    Ok(Job {
        id: row.get(0)?,
        job_type: row.get(1)?,
        status: status_from_sql(2, row.get(2)?)?,
        details: row.get(3)?,
        error_message: row.get(4)?,
        run_time: row.get(5)?,
        completed_at: row.get(6)?,
    })
}

impl JobStore for Datastore {
    fn insert_job(&self, job_type: &str, details: Option<&Value>) -> Result<Job> {
        let job = Job {
            id: uuid::Uuid::new_v4().to_string(),
            job_type: job_type.to_string(),
            status: JobStatus::Running,
            details: details.cloned(),
            error_message: None,
            run_time: Utc::now(),
            completed_at: None,
        };
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO jobs (id, type, status, details, error_message, run_time, completed_at)
             VALUES (?1, ?2, ?3, ?4, NULL, ?5, NULL)",
            params![job.id, job.job_type, job.status.as_str(), job.details, job.run_time],
        )
        .map_err(db_err("insert job"))?;
        Ok(job)
    }

    fn update_job(&self, job_id: &str, update: &JobUpdate) -> Result<()> {
        let completed_at = update.status.is_terminal().then(Utc::now);
        let conn = self.conn()?;
        let changed = conn
            .execute(
                "UPDATE jobs SET
                    status = ?2,
                    details = COALESCE(?3, details),
                    error_message = COALESCE(?4, error_message),
                    completed_at = COALESCE(?5, completed_at)
                 WHERE id = ?1 AND status NOT IN ('success', 'failed')",
                params![
                    job_id,
                    update.status.as_str(),
                    update.details,
                    update.error_message,
                    completed_at,
                ],
            )
            .map_err(db_err("update job"))?;
        if changed > 0 {
            return Ok(());
        }

        let current: Option<String> = conn
            .query_row(
                "SELECT status FROM jobs WHERE id = ?1",
                params![job_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(db_err("update job"))?;
        match current {
            Some(status) => Err(LeadPilotError::Validation(format!(
                "Job {job_id} is already {status}"
            ))),
            None => Err(LeadPilotError::Database(format!("Job not found: {job_id}"))),
        }
    }

    fn get_job(&self, job_id: &str) -> Result<Option<Job>> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT id, type, status, details, error_message, run_time, completed_at
             FROM jobs WHERE id = ?1",
            params![job_id],
            job_from_row,
        )
        .optional()
        .map_err(db_err("get job"))
    }

    fn job_statuses_since(&self, since: DateTime<Utc>) -> Result<Vec<(String, JobStatus)>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT type, status FROM jobs WHERE run_time >= ?1 ORDER BY run_time")
            .map_err(db_err("job stats"))?;
        let rows = stmt
            .query_map(params![since], |row| {
                Ok((row.get::<_, String>(0)?, status_from_sql(1, row.get(1)?)?))
            })
            .map_err(db_err("job stats"))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(db_err("read job"))?;
        Ok(rows)
    }
}

impl Datastore {
    /// Most recent jobs first.
    pub fn recent_jobs(&self, limit: u32) -> Result<Vec<Job>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, type, status, details, error_message, run_time, completed_at
                 FROM jobs ORDER BY run_time DESC, rowid DESC LIMIT ?1",
            )
            .map_err(db_err("recent jobs"))?;
        let jobs = stmt
            .query_map(params![limit], job_from_row)
            .map_err(db_err("recent jobs"))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(db_err("read job"))?;
        Ok(jobs)
    }
}
