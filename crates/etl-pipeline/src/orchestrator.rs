//! Per-event pipeline: fetch, extract, persist.

use std::sync::Arc;
use std::time::Instant;

use tracing::{error, info, warn};
use uuid::Uuid;

use etl_core::{
    FileReadyEvent, JobStatus, NewExtractedRecord, PersistenceGateway, Result, RetrievalGateway,
};
use etl_extract::ProcessorRouter;

use crate::config::OrchestratorConfig;

/// What a successfully processed event produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutcome {
    pub record_id: Uuid,
    pub file_type: String,
    pub page_count: Option<u32>,
    /// No extractor handled the file; the record carries the error.
    pub unsupported: bool,
}

/// Runs one [`FileReadyEvent`] through retrieval, extraction and persistence.
///
/// Holds no per-event state, so one instance is shared by all workers.
pub struct Orchestrator {
    retrieval: Arc<dyn RetrievalGateway>,
    router: Arc<ProcessorRouter>,
    persistence: Arc<dyn PersistenceGateway>,
    config: OrchestratorConfig,
}

impl Orchestrator {
    pub fn new(
        retrieval: Arc<dyn RetrievalGateway>,
        router: Arc<ProcessorRouter>,
        persistence: Arc<dyn PersistenceGateway>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            retrieval,
            router,
            persistence,
            config,
        }
    }

    /// Process one event end to end.
    ///
    /// On failure the job is marked `FAILED` (best effort) and the original
    /// error is returned.
    pub async fn process(&self, event: &FileReadyEvent) -> Result<ProcessOutcome> {
        let start = Instant::now();

        info!(
            subsystem = "pipeline",
            component = "orchestrator",
            job_id = %event.job_id,
            file_id = %event.file_id,
            file_name = %event.file_name,
            "Processing file"
        );

        if self.config.track_job_status {
            self.mark(&event.job_id, JobStatus::Processing, None).await;
        }

        match self.run(event).await {
            Ok(outcome) => {
                if self.config.track_job_status {
                    self.mark(&event.job_id, JobStatus::Complete, None).await;
                }
                info!(
                    subsystem = "pipeline",
                    component = "orchestrator",
                    job_id = %event.job_id,
                    file_id = %event.file_id,
                    record_id = %outcome.record_id,
                    file_type = %outcome.file_type,
                    unsupported = outcome.unsupported,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Extraction complete"
                );
                Ok(outcome)
            }
            Err(e) => {
                error!(
                    subsystem = "pipeline",
                    component = "orchestrator",
                    job_id = %event.job_id,
                    file_id = %event.file_id,
                    error = %e,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "File processing failed"
                );
                let message = e.to_string();
                self.mark(&event.job_id, JobStatus::Failed, Some(&message))
                    .await;
                Err(e)
            }
        }
    }

    async fn run(&self, event: &FileReadyEvent) -> Result<ProcessOutcome> {
        let object_key = event.object_key();
        let data = self.retrieval.fetch(&event.bucket, object_key).await?;

        info!(
            subsystem = "pipeline",
            component = "orchestrator",
            job_id = %event.job_id,
            bucket = %event.bucket,
            object_key,
            bytes = data.len(),
            "File downloaded"
        );

        let result = self
            .router
            .process(&data, &event.file_name, event.content_type.as_deref())
            .await?;
        drop(data);

        let raw_text = result.raw_text(self.config.raw_text_max_chars);
        let content = result.to_content_json()?;

        let record_id = self
            .persistence
            .insert_record(NewExtractedRecord {
                job_id: event.job_id.clone(),
                file_name: event.file_name.clone(),
                file_type: result.file_type.clone(),
                content,
                raw_text,
            })
            .await?;

        Ok(ProcessOutcome {
            record_id,
            unsupported: result.is_unsupported(),
            file_type: result.file_type,
            page_count: result.page_count,
        })
    }

    /// Best-effort status write: failures are logged and dropped.
    async fn mark(&self, job_id: &str, status: JobStatus, error_message: Option<&str>) {
        if let Err(e) = self
            .persistence
            .update_job_status(job_id, status, error_message)
            .await
        {
            warn!(
                subsystem = "pipeline",
                component = "orchestrator",
                job_id,
                status = %status,
                error = %e,
                "Job status update failed"
            );
        }
    }
}
