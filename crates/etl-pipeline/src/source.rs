//! Broker seams: where messages come from and where poison messages go.

use std::time::Duration;

use async_trait::async_trait;

use etl_core::Result;

/// One message handed out by the broker, detached from the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub key: Option<Vec<u8>>,
    /// `None` for tombstones.
    pub payload: Option<Vec<u8>>,
}

impl Delivery {
    pub fn new(topic: impl Into<String>, partition: i32, offset: i64, payload: Vec<u8>) -> Self {
        Self {
            topic: topic.into(),
            partition,
            offset,
            key: None,
            payload: Some(payload),
        }
    }

    /// Set the message key.
    pub fn with_key(mut self, key: Vec<u8>) -> Self {
        self.key = Some(key);
        self
    }
}

/// Outcome of a single poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Polled {
    /// Nothing arrived within the timeout.
    Empty,
    /// The consumer reached the end of a partition.
    PartitionEof { partition: i32 },
    Message(Delivery),
}

/// A partition-ordered, at-least-once message source owned by one worker.
///
/// Errors from `poll` are fatal to the worker; `commit` errors are not.
#[async_trait]
pub trait MessageSource: Send {
    /// Wait up to `timeout` for the next message.
    async fn poll(&mut self, timeout: Duration) -> Result<Polled>;

    /// Acknowledge `delivery`: the group's position moves to `offset + 1`.
    async fn commit(&mut self, delivery: &Delivery) -> Result<()>;

    /// Rewind the partition to `delivery.offset` so the message is handed
    /// out again and nothing after it is consumed first.
    async fn redeliver(&mut self, delivery: &Delivery) -> Result<()>;

    /// Leave the group and release the client.
    async fn close(&mut self);
}

/// Destination for payloads that cannot be decoded.
#[async_trait]
pub trait DeadLetterSink: Send + Sync {
    /// Publish `delivery` unchanged with `reason` attached.
    async fn publish(&self, delivery: &Delivery, reason: &str) -> Result<()>;
}
