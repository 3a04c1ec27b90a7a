//! Capability traits at the pipeline's seams.
//!
//! The orchestrator only sees these traits; concrete adapters (lopdf, S3,
//! PostgreSQL) live in their own crates and are wired together in the binary.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{ExtractionResult, JobStatus, NewExtractedRecord};

// =============================================================================
// EXTRACTION
// =============================================================================

/// Format-specific transformer from raw bytes to an [`ExtractionResult`].
///
/// Extractors are registered in a `ProcessorRouter` under every key returned
/// by [`Extractor::keys`] and dispatched by file type.
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Routing keys this extractor answers to: lower-case file extensions
    /// and MIME types.
    fn keys(&self) -> &[&'static str];

    /// Extract content from raw file data.
    ///
    /// Fails with `Error::Extraction` on unrecoverable input instead of
    /// returning a partial result.
    async fn process(
        &self,
        data: &[u8],
        file_name: &str,
        content_type: Option<&str>,
    ) -> Result<ExtractionResult>;

    /// Human-readable name of this extractor.
    fn name(&self) -> &str;
}

// =============================================================================
// OBJECT STORE
// =============================================================================

/// Read access to the object store holding uploaded files.
#[async_trait]
pub trait RetrievalGateway: Send + Sync {
    /// Fetch the full object body.
    ///
    /// Fails with `Error::Retrieval` (not found, access denied, transport).
    async fn fetch(&self, bucket: &str, object_key: &str) -> Result<Vec<u8>>;
}

// =============================================================================
// PERSISTENCE
// =============================================================================

/// Durable storage for extraction records and job status.
///
/// Implementations never retry; the caller decides what a failure means.
#[async_trait]
pub trait PersistenceGateway: Send + Sync {
    /// Store an extraction and return its generated record id.
    async fn insert_record(&self, record: NewExtractedRecord) -> Result<Uuid>;

    /// Move a job to `status`, optionally recording an error message.
    async fn update_job_status(
        &self,
        job_id: &str,
        status: JobStatus,
        error_message: Option<&str>,
    ) -> Result<()>;

    /// Verify the store is reachable.
    async fn ping(&self) -> Result<()>;
}
