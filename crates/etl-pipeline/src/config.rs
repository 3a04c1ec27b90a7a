//! Pipeline configuration loaded from the environment.

use std::time::Duration;

use rdkafka::config::ClientConfig;

use etl_core::defaults;

fn parse_bool(value: &str) -> bool {
    value != "false" && value != "0"
}

/// Kafka connection and topic settings.
#[derive(Debug, Clone)]
pub struct KafkaConfig {
    pub bootstrap_servers: String,
    pub group_id: String,
    /// Topic carrying file-ready events.
    pub topic: String,
    pub auto_offset_reset: String,
    /// Where undecodable payloads are parked. Unset keeps them uncommitted.
    pub dead_letter_topic: Option<String>,
}

impl Default for KafkaConfig {
    fn default() -> Self {
        Self {
            bootstrap_servers: defaults::KAFKA_BOOTSTRAP_SERVERS.to_string(),
            group_id: defaults::KAFKA_CONSUMER_GROUP.to_string(),
            topic: defaults::KAFKA_TOPIC_FILE_READY.to_string(),
            auto_offset_reset: defaults::KAFKA_AUTO_OFFSET_RESET.to_string(),
            dead_letter_topic: None,
        }
    }
}

impl KafkaConfig {
    /// Load from `KAFKA_BOOTSTRAP_SERVERS`, `KAFKA_CONSUMER_GROUP`,
    /// `KAFKA_TOPIC_FILE_READY`, `KAFKA_AUTO_OFFSET_RESET` and
    /// `KAFKA_DEAD_LETTER_TOPIC`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let base = Self::default();
        Self {
            bootstrap_servers: lookup("KAFKA_BOOTSTRAP_SERVERS").unwrap_or(base.bootstrap_servers),
            group_id: lookup("KAFKA_CONSUMER_GROUP").unwrap_or(base.group_id),
            topic: lookup("KAFKA_TOPIC_FILE_READY").unwrap_or(base.topic),
            auto_offset_reset: lookup("KAFKA_AUTO_OFFSET_RESET").unwrap_or(base.auto_offset_reset),
            dead_letter_topic: lookup("KAFKA_DEAD_LETTER_TOPIC").filter(|t| !t.trim().is_empty()),
        }
    }

    /// Client settings for a consumer in the shared group.
    ///
    /// Auto-commit is off: offsets are committed only after a message's
    /// pipeline succeeds. Partition EOF is reported so it can be told apart
    /// from an idle poll.
    pub fn consumer_config(&self) -> ClientConfig {
        let mut config = ClientConfig::new();
        config
            .set("bootstrap.servers", &self.bootstrap_servers)
            .set("group.id", &self.group_id)
            .set("auto.offset.reset", &self.auto_offset_reset)
            .set("enable.auto.commit", "false")
            .set("enable.auto.offset.store", "false")
            .set("enable.partition.eof", "true");
        config
    }

    /// Client settings for the dead-letter producer.
    pub fn producer_config(&self) -> ClientConfig {
        let mut config = ClientConfig::new();
        config
            .set("bootstrap.servers", &self.bootstrap_servers)
            .set("message.timeout.ms", "30000");
        config
    }
}

/// Consumer loop and pool settings.
#[derive(Debug, Clone)]
pub struct ConsumerConfig {
    /// Number of workers, each with its own broker client.
    pub workers: usize,
    /// Declared batch size; logged, not used by the sequential loop.
    pub batch_size: usize,
    /// Upper bound on a single poll.
    pub poll_timeout: Duration,
    /// Pause after rewinding a failed message.
    pub redelivery_delay: Duration,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            workers: defaults::WORKER_COUNT,
            batch_size: defaults::BATCH_SIZE,
            poll_timeout: Duration::from_millis(defaults::POLL_TIMEOUT_MS),
            redelivery_delay: Duration::from_millis(defaults::REDELIVERY_DELAY_MS),
        }
    }
}

impl ConsumerConfig {
    /// Load from `ETL_WORKERS`, `BATCH_SIZE`, `ETL_POLL_TIMEOUT_MS` and
    /// `ETL_REDELIVERY_DELAY_MS`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let base = Self::default();

        let workers = lookup("ETL_WORKERS")
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(base.workers)
            .max(1);

        let batch_size = lookup("BATCH_SIZE")
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(base.batch_size);

        let poll_timeout = lookup("ETL_POLL_TIMEOUT_MS")
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_millis)
            .unwrap_or(base.poll_timeout);

        let redelivery_delay = lookup("ETL_REDELIVERY_DELAY_MS")
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_millis)
            .unwrap_or(base.redelivery_delay);

        Self {
            workers,
            batch_size,
            poll_timeout,
            redelivery_delay,
        }
    }

    /// Set the worker count.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Set the poll timeout.
    pub fn with_poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout = timeout;
        self
    }

    /// Set the pause after a rewind.
    pub fn with_redelivery_delay(mut self, delay: Duration) -> Self {
        self.redelivery_delay = delay;
        self
    }
}

/// Orchestrator settings.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Characters of extracted text stored in `raw_text`.
    pub raw_text_max_chars: usize,
    /// Write `PROCESSING` / `COMPLETED` markers in addition to `FAILED`.
    pub track_job_status: bool,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            raw_text_max_chars: defaults::RAW_TEXT_MAX_CHARS,
            track_job_status: true,
        }
    }
}

impl OrchestratorConfig {
    /// Load from `ETL_RAW_TEXT_MAX_CHARS` and `ETL_TRACK_JOB_STATUS`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let base = Self::default();
        Self {
            raw_text_max_chars: lookup("ETL_RAW_TEXT_MAX_CHARS")
                .and_then(|v| v.parse::<usize>().ok())
                .unwrap_or(base.raw_text_max_chars),
            track_job_status: lookup("ETL_TRACK_JOB_STATUS")
                .map(|v| parse_bool(&v))
                .unwrap_or(base.track_job_status),
        }
    }

    /// Enable or disable lifecycle markers.
    pub fn with_job_status_tracking(mut self, enabled: bool) -> Self {
        self.track_job_status = enabled;
        self
    }

    /// Set the `raw_text` cap.
    pub fn with_raw_text_max_chars(mut self, max_chars: usize) -> Self {
        self.raw_text_max_chars = max_chars;
        self
    }
}
