//! Kafka implementations of the broker seams.

use std::time::Duration;

use async_trait::async_trait;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::error::KafkaError;
use rdkafka::message::{Header, OwnedHeaders};
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::{Message, Offset, TopicPartitionList};
use tracing::{debug, info};

use etl_core::{Error, Result};

use crate::config::KafkaConfig;
use crate::source::{DeadLetterSink, Delivery, MessageSource, Polled};

/// Timeout for seek requests against the local client.
const SEEK_TIMEOUT: Duration = Duration::from_secs(10);

/// Time a dead-letter record may wait in the producer queue.
const PUBLISH_QUEUE_TIMEOUT: Duration = Duration::from_secs(10);

/// Header carrying the decode failure on dead-lettered records.
pub const DECODE_ERROR_HEADER: &str = "x-decode-error";

fn broker_error(context: &str, e: KafkaError) -> Error {
    Error::Broker(format!("{}: {}", context, e))
}

/// One consumer in the shared group, subscribed to the file-ready topic.
pub struct KafkaSource {
    consumer: StreamConsumer,
    topic: String,
}

impl KafkaSource {
    /// Create a consumer and subscribe it.
    pub fn new(config: &KafkaConfig) -> Result<Self> {
        let consumer: StreamConsumer = config
            .consumer_config()
            .create()
            .map_err(|e| broker_error("Failed to create consumer", e))?;

        consumer
            .subscribe(&[config.topic.as_str()])
            .map_err(|e| broker_error("Failed to subscribe", e))?;

        info!(
            subsystem = "broker",
            component = "consumer",
            topic = %config.topic,
            group_id = %config.group_id,
            "Kafka consumer subscribed"
        );

        Ok(Self {
            consumer,
            topic: config.topic.clone(),
        })
    }
}

#[async_trait]
impl MessageSource for KafkaSource {
    async fn poll(&mut self, timeout: Duration) -> Result<Polled> {
        let received = match tokio::time::timeout(timeout, self.consumer.recv()).await {
            Ok(received) => received,
            Err(_) => return Ok(Polled::Empty),
        };

        match received {
            Ok(message) => Ok(Polled::Message(Delivery {
                topic: message.topic().to_string(),
                partition: message.partition(),
                offset: message.offset(),
                key: message.key().map(<[u8]>::to_vec),
                payload: message.payload().map(<[u8]>::to_vec),
            })),
            Err(KafkaError::PartitionEOF(partition)) => Ok(Polled::PartitionEof { partition }),
            Err(e) => Err(broker_error("Consumer error", e)),
        }
    }

    async fn commit(&mut self, delivery: &Delivery) -> Result<()> {
        let mut offsets = TopicPartitionList::new();
        offsets
            .add_partition_offset(
                &delivery.topic,
                delivery.partition,
                Offset::Offset(delivery.offset + 1),
            )
            .map_err(|e| broker_error("Invalid commit offset", e))?;

        self.consumer
            .commit(&offsets, CommitMode::Sync)
            .map_err(|e| broker_error("Commit failed", e))
    }

    async fn redeliver(&mut self, delivery: &Delivery) -> Result<()> {
        self.consumer
            .seek(
                &delivery.topic,
                delivery.partition,
                Offset::Offset(delivery.offset),
                SEEK_TIMEOUT,
            )
            .map_err(|e| broker_error("Seek failed", e))?;

        debug!(
            subsystem = "broker",
            component = "consumer",
            partition = delivery.partition,
            offset = delivery.offset,
            "Partition rewound"
        );
        Ok(())
    }

    async fn close(&mut self) {
        self.consumer.unsubscribe();
        info!(
            subsystem = "broker",
            component = "consumer",
            topic = %self.topic,
            "Kafka consumer closed"
        );
    }
}

/// Publishes undecodable messages to a dead-letter topic.
pub struct KafkaDeadLetterSink {
    producer: FutureProducer,
    topic: String,
}

impl KafkaDeadLetterSink {
    pub fn new(config: &KafkaConfig, topic: impl Into<String>) -> Result<Self> {
        let producer: FutureProducer = config
            .producer_config()
            .create()
            .map_err(|e| broker_error("Failed to create producer", e))?;

        Ok(Self {
            producer,
            topic: topic.into(),
        })
    }
}

#[async_trait]
impl DeadLetterSink for KafkaDeadLetterSink {
    async fn publish(&self, delivery: &Delivery, reason: &str) -> Result<()> {
        let headers = OwnedHeaders::new().insert(Header {
            key: DECODE_ERROR_HEADER,
            value: Some(reason),
        });

        let mut record = FutureRecord::<[u8], [u8]>::to(&self.topic).headers(headers);
        if let Some(key) = delivery.key.as_deref() {
            record = record.key(key);
        }
        if let Some(payload) = delivery.payload.as_deref() {
            record = record.payload(payload);
        }

        self.producer
            .send(record, PUBLISH_QUEUE_TIMEOUT)
            .await
            .map(|_| ())
            .map_err(|(e, _)| broker_error("Dead-letter publish failed", e))
    }
}
