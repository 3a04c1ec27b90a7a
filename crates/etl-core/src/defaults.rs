//! Centralized default constants for the extraction engine.
//!
//! Every crate reads its defaults from here so the binary, the tests and the
//! documentation agree on one value.

// =============================================================================
// BROKER
// =============================================================================

/// Default Kafka bootstrap servers.
pub const KAFKA_BOOTSTRAP_SERVERS: &str = "localhost:9092";

/// Default consumer group shared by all workers.
pub const KAFKA_CONSUMER_GROUP: &str = "etl_processing_group";

/// Default topic carrying file-ready events.
pub const KAFKA_TOPIC_FILE_READY: &str = "etl.file.ready";

/// Where a new consumer group starts reading.
pub const KAFKA_AUTO_OFFSET_RESET: &str = "earliest";

/// Upper bound on a single broker poll (milliseconds).
pub const POLL_TIMEOUT_MS: u64 = 1_000;

/// Pause before a rewound message is polled again (milliseconds).
pub const REDELIVERY_DELAY_MS: u64 = 5_000;

// =============================================================================
// WORKERS
// =============================================================================

/// Number of consumer workers (one broker client each).
pub const WORKER_COUNT: usize = 4;

/// Declared batch size. The sequential loop processes one message at a time.
pub const BATCH_SIZE: usize = 10;

/// Capacity of the pipeline event broadcast channel.
pub const EVENT_BUS_CAPACITY: usize = 256;

// =============================================================================
// EXTRACTION
// =============================================================================

/// Maximum characters of extracted text copied into `raw_text`.
pub const RAW_TEXT_MAX_CHARS: usize = 10_000;

/// Routing key used when neither content type nor extension identify a file.
pub const UNKNOWN_FILE_TYPE: &str = "unknown";

/// Separator placed between page texts in a document's full text.
pub const PAGE_SEPARATOR: &str = "\n\n";

// =============================================================================
// OBJECT STORE
// =============================================================================

/// Default MinIO endpoint (scheme optional).
pub const MINIO_ENDPOINT: &str = "localhost:9000";

/// Default MinIO credentials.
pub const MINIO_ACCESS_KEY: &str = "minioadmin";
pub const MINIO_SECRET_KEY: &str = "minioadmin";

/// Region name sent in S3 signatures; MinIO accepts any value.
pub const MINIO_REGION: &str = "us-east-1";

// =============================================================================
// DATABASE
// =============================================================================

pub const POSTGRES_HOST: &str = "localhost";
pub const POSTGRES_PORT: u16 = 5432;
pub const POSTGRES_DB: &str = "data_extraction";
pub const POSTGRES_USER: &str = "admin";
pub const POSTGRES_PASSWORD: &str = "changeme";

/// Pool size; each worker holds at most one connection at a time.
pub const DB_MAX_CONNECTIONS: u32 = 10;

/// How long a query waits for a free pooled connection (seconds).
pub const DB_ACQUIRE_TIMEOUT_SECS: u64 = 30;
