//! Extraction record repository.

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use sqlx::{Pool, Postgres, Row};
use tracing::info;
use uuid::Uuid;

use etl_core::{ExtractedRecord, NewExtractedRecord, Result};

/// PostgreSQL repository for the `extracted_data` table.
#[derive(Clone)]
pub struct PgRecordRepository {
    pool: Pool<Postgres>,
}

impl PgRecordRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Insert a record and return its id (time-ordered UUIDv7).
    pub async fn insert(&self, record: NewExtractedRecord) -> Result<Uuid> {
        let id = Uuid::now_v7();
        // Postgres TEXT rejects NUL bytes
        let raw_text = record.raw_text.replace('\0', "");

        let record_id: Uuid = sqlx::query_scalar(
            "INSERT INTO extracted_data (id, job_id, file_name, file_type, content_json, raw_text)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING id",
        )
        .bind(id)
        .bind(&record.job_id)
        .bind(&record.file_name)
        .bind(&record.file_type)
        .bind(&record.content)
        .bind(&raw_text)
        .fetch_one(&self.pool)
        .await?;

        info!(
            subsystem = "database",
            component = "records",
            op = "insert",
            job_id = %record.job_id,
            record_id = %record_id,
            file_type = %record.file_type,
            "Extracted data saved"
        );
        Ok(record_id)
    }

    /// Fetch one record by id.
    pub async fn get(&self, record_id: Uuid) -> Result<Option<ExtractedRecord>> {
        let row = sqlx::query(
            "SELECT id, job_id, file_name, file_type, content_json, raw_text, created_at
             FROM extracted_data WHERE id = $1",
        )
        .bind(record_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| row_to_record(&r)))
    }

    /// All records written for a job, oldest first.
    ///
    /// Redelivered events can produce more than one.
    pub async fn list_for_job(&self, job_id: &str) -> Result<Vec<ExtractedRecord>> {
        let rows = sqlx::query(
            "SELECT id, job_id, file_name, file_type, content_json, raw_text, created_at
             FROM extracted_data WHERE job_id = $1
             ORDER BY created_at, id",
        )
        .bind(job_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(row_to_record).collect())
    }
}

fn row_to_record(row: &sqlx::postgres::PgRow) -> ExtractedRecord {
    let content_json: JsonValue = row.get("content_json");
    let created_at: DateTime<Utc> = row.get("created_at");
    ExtractedRecord {
        record_id: row.get("id"),
        job_id: row.get("job_id"),
        file_name: row.get("file_name"),
        file_type: row.get("file_type"),
        content_json,
        raw_text: row.get("raw_text"),
        created_at,
    }
}
