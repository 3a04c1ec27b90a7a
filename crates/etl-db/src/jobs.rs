//! Job status repository.

use sqlx::{Pool, Postgres, Row};
use tracing::{debug, info};

use etl_core::{JobStatus, Result};

/// Current status row of a job.
#[derive(Debug, Clone, PartialEq)]
pub struct JobStatusRow {
    pub job_id: String,
    /// Raw column value; may hold statuses owned by other services (`PENDING`).
    pub status: String,
    pub error_message: Option<String>,
}

impl JobStatusRow {
    /// Parsed status, when it is one this engine writes.
    pub fn parsed(&self) -> Option<JobStatus> {
        self.status.parse().ok()
    }
}

/// PostgreSQL repository for the `file_jobs` table.
///
/// Rows are created by the upstream job service; this repository only
/// updates them.
#[derive(Clone)]
pub struct PgJobStatusRepository {
    pool: Pool<Postgres>,
}

impl PgJobStatusRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Set status and error message. Returns whether a row was updated.
    pub async fn update_status(
        &self,
        job_id: &str,
        status: JobStatus,
        error_message: Option<&str>,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE file_jobs
             SET status = $1, error_message = $2, updated_at = NOW()
             WHERE job_id = $3",
        )
        .bind(status.as_str())
        .bind(error_message)
        .bind(job_id)
        .execute(&self.pool)
        .await?;

        let updated = result.rows_affected() > 0;
        if updated {
            info!(
                subsystem = "database",
                component = "jobs",
                op = "update_status",
                job_id,
                status = %status,
                "Job status updated"
            );
        } else {
            debug!(
                subsystem = "database",
                component = "jobs",
                op = "update_status",
                job_id,
                status = %status,
                "No job row to update"
            );
        }
        Ok(updated)
    }

    /// Current status of a job.
    pub async fn get(&self, job_id: &str) -> Result<Option<JobStatusRow>> {
        let row = sqlx::query("SELECT job_id, status, error_message FROM file_jobs WHERE job_id = $1")
            .bind(job_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| JobStatusRow {
            job_id: r.get("job_id"),
            status: r.get("status"),
            error_message: r.get("error_message"),
        }))
    }

    /// Register a pending job. Used by tests and local tooling; production
    /// rows come from the job service.
    pub async fn create_pending(&self, job_id: &str, file_id: &str, file_name: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO file_jobs (job_id, file_id, file_name, status)
             VALUES ($1, $2, $3, 'PENDING')
             ON CONFLICT (job_id) DO NOTHING",
        )
        .bind(job_id)
        .bind(file_id)
        .bind(file_name)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
