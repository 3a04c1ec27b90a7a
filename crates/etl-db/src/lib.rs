//! # etl-db
//!
//! PostgreSQL persistence for the extraction engine.
//!
//! This crate provides:
//! - Connection pool management
//! - The `extracted_data` and `file_jobs` repositories
//! - [`Database`], the [`etl_core::PersistenceGateway`] used by the pipeline
//!
//! ## Example
//!
//! ```rust,ignore
//! use etl_db::{Database, DatabaseConfig};
//!
//! let config = DatabaseConfig::from_env();
//! let db = Database::connect_with_config(&config.url, config.pool_config()).await?;
//! db.ping().await?;
//! ```

pub mod config;
pub mod jobs;
pub mod pool;
pub mod records;

// Test fixtures for integration tests
// Note: Always compiled so integration tests (in tests/) can use DEFAULT_TEST_DATABASE_URL
pub mod test_fixtures;

use async_trait::async_trait;
use uuid::Uuid;

use etl_core::{JobStatus, NewExtractedRecord, PersistenceGateway, Result};

pub use config::DatabaseConfig;
pub use jobs::{JobStatusRow, PgJobStatusRepository};
pub use pool::{connect_pool, PoolConfig};
pub use records::PgRecordRepository;

/// Database handle bundling the pool and its repositories.
#[derive(Clone)]
pub struct Database {
    /// The underlying connection pool.
    pub pool: sqlx::Pool<sqlx::Postgres>,
    /// Extraction records.
    pub records: PgRecordRepository,
    /// Job status rows.
    pub jobs: PgJobStatusRepository,
}

impl Database {
    /// Create a new Database instance from a connection pool.
    pub fn new(pool: sqlx::Pool<sqlx::Postgres>) -> Self {
        Self {
            records: PgRecordRepository::new(pool.clone()),
            jobs: PgJobStatusRepository::new(pool.clone()),
            pool,
        }
    }

    /// Create a new Database instance by connecting to the given URL.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = connect_pool(url, &PoolConfig::default()).await?;
        Ok(Self::new(pool))
    }

    /// Create with custom pool configuration.
    pub async fn connect_with_config(url: &str, config: PoolConfig) -> Result<Self> {
        let pool = connect_pool(url, &config).await?;
        Ok(Self::new(pool))
    }

    /// Run pending migrations.
    #[cfg(feature = "migrations")]
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| etl_core::Error::Persistence(format!("Migration failed: {}", e)))?;
        Ok(())
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &sqlx::Pool<sqlx::Postgres> {
        &self.pool
    }

    /// Close all connections, waiting for checked-out ones to be returned.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl PersistenceGateway for Database {
    async fn insert_record(&self, record: NewExtractedRecord) -> Result<Uuid> {
        self.records.insert(record).await
    }

    async fn update_job_status(
        &self,
        job_id: &str,
        status: JobStatus,
        error_message: Option<&str>,
    ) -> Result<()> {
        self.jobs
            .update_status(job_id, status, error_message)
            .await
            .map(|_| ())
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
