//! Persistence gateway against a live PostgreSQL.
//!
//! Run with `DATABASE_URL=... cargo test -p etl-db --features migrations -- --ignored`.

use etl_core::{ExtractionResult, JobStatus, NewExtractedRecord, PersistenceGateway};
use etl_db::test_fixtures::{connect_test_database, unique_job_id};
use etl_db::Database;

/// Test database, honouring a local `.env`.
async fn test_db() -> Database {
    dotenvy::dotenv().ok();
    connect_test_database().await
}

fn record(job_id: &str, raw_text: &str) -> NewExtractedRecord {
    NewExtractedRecord {
        job_id: job_id.to_string(),
        file_name: "a.pdf".to_string(),
        file_type: "PDF".to_string(),
        content: serde_json::json!({"file_name": "a.pdf", "file_type": "PDF", "page_count": 3}),
        raw_text: raw_text.to_string(),
    }
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with migrated database
async fn insert_record_round_trips() {
    let db = test_db().await;
    let job_id = unique_job_id("insert");

    let record_id = db.insert_record(record(&job_id, "hello")).await.unwrap();
    let stored = db.records.get(record_id).await.unwrap().unwrap();

    assert_eq!(stored.record_id, record_id);
    assert_eq!(stored.job_id, job_id);
    assert_eq!(stored.file_type, "PDF");
    assert_eq!(stored.content_json["page_count"], 3);
    assert_eq!(stored.raw_text.as_deref(), Some("hello"));
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with migrated database
async fn redelivery_produces_second_record() {
    let db = test_db().await;
    let job_id = unique_job_id("dup");

    let first = db.insert_record(record(&job_id, "x")).await.unwrap();
    let second = db.insert_record(record(&job_id, "x")).await.unwrap();
    assert_ne!(first, second);

    let records = db.records.list_for_job(&job_id).await.unwrap();
    assert_eq!(records.len(), 2);
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with migrated database
async fn status_transitions_are_recorded() {
    let db = test_db().await;
    let job_id = unique_job_id("status");
    db.jobs.create_pending(&job_id, "F1", "a.pdf").await.unwrap();

    db.update_job_status(&job_id, JobStatus::Processing, None)
        .await
        .unwrap();
    db.update_job_status(&job_id, JobStatus::Failed, Some("object not found: b/k"))
        .await
        .unwrap();

    let row = db.jobs.get(&job_id).await.unwrap().unwrap();
    assert_eq!(row.parsed(), Some(JobStatus::Failed));
    assert_eq!(row.error_message.as_deref(), Some("object not found: b/k"));
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with migrated database
async fn status_update_for_unknown_job_is_not_an_error() {
    let db = test_db().await;
    let updated = db
        .jobs
        .update_status(&unique_job_id("missing"), JobStatus::Complete, None)
        .await
        .unwrap();
    assert!(!updated);
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL
async fn ping_succeeds() {
    let db = test_db().await;
    db.ping().await.unwrap();
    db.close().await;
}

#[tokio::test]
#[ignore] // Requires DATABASE_URL with migrated database
async fn text_with_nul_bytes_is_accepted_by_jsonb() {
    let db = test_db().await;
    let job_id = unique_job_id("nul");
    let result = ExtractionResult {
        file_name: "n.txt".into(),
        file_type: "TEXT".into(),
        full_text: Some("abc\0def".into()),
        ..Default::default()
    };

    let record_id = db
        .insert_record(NewExtractedRecord {
            job_id: job_id.clone(),
            file_name: result.file_name.clone(),
            file_type: result.file_type.clone(),
            content: result.to_content_json().unwrap(),
            raw_text: result.raw_text(10_000),
        })
        .await
        .unwrap();

    let stored = db.records.get(record_id).await.unwrap().unwrap();
    assert_eq!(stored.content_json["full_text"], "abcdef");
    assert_eq!(stored.raw_text.as_deref(), Some("abcdef"));
}
