//! Sequential consumer loop: one message at a time, commit on success.

use std::sync::Arc;

use tokio::sync::{broadcast, watch};
use tokio::time::sleep;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use etl_core::{Error, FileReadyEvent, Result};

use crate::config::ConsumerConfig;
use crate::orchestrator::Orchestrator;
use crate::source::{DeadLetterSink, Delivery, MessageSource, Polled};

/// Event emitted by consumer workers.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    /// Worker started polling.
    WorkerStarted { worker_id: usize },
    /// Worker closed its source and exited.
    WorkerStopped { worker_id: usize },
    /// A message was processed and committed.
    MessageProcessed {
        worker_id: usize,
        partition: i32,
        offset: i64,
        job_id: String,
        record_id: Uuid,
        file_type: String,
        unsupported: bool,
    },
    /// Processing failed; the partition was rewound.
    ProcessingFailed {
        worker_id: usize,
        partition: i32,
        offset: i64,
        job_id: String,
        error: String,
    },
    /// The payload was not a valid file-ready event.
    DecodeFailed {
        worker_id: usize,
        partition: i32,
        offset: i64,
        error: String,
    },
    /// An undecodable message was parked on the dead-letter topic.
    DeadLettered {
        worker_id: usize,
        partition: i32,
        offset: i64,
    },
}

/// One worker: polls its own source and drives each message through the
/// orchestrator before touching the next.
pub struct ConsumerLoop {
    worker_id: usize,
    source: Box<dyn MessageSource>,
    orchestrator: Arc<Orchestrator>,
    dead_letter: Option<Arc<dyn DeadLetterSink>>,
    config: ConsumerConfig,
    event_tx: broadcast::Sender<PipelineEvent>,
    shutdown_rx: watch::Receiver<bool>,
}

impl ConsumerLoop {
    pub fn new(
        worker_id: usize,
        source: Box<dyn MessageSource>,
        orchestrator: Arc<Orchestrator>,
        config: ConsumerConfig,
        event_tx: broadcast::Sender<PipelineEvent>,
        shutdown_rx: watch::Receiver<bool>,
    ) -> Self {
        Self {
            worker_id,
            source,
            orchestrator,
            dead_letter: None,
            config,
            event_tx,
            shutdown_rx,
        }
    }

    /// Park undecodable messages on `sink` instead of leaving them uncommitted.
    pub fn with_dead_letter(mut self, sink: Arc<dyn DeadLetterSink>) -> Self {
        self.dead_letter = Some(sink);
        self
    }

    /// Run until shutdown is signalled or the broker fails.
    ///
    /// The in-flight message always finishes before the source is closed.
    pub async fn run(mut self) -> Result<()> {
        info!(
            subsystem = "pipeline",
            component = "consumer",
            worker_id = self.worker_id,
            poll_timeout_ms = self.config.poll_timeout.as_millis() as u64,
            "Consumer worker started"
        );
        self.emit(PipelineEvent::WorkerStarted {
            worker_id: self.worker_id,
        });

        let result = self.consume().await;

        self.source.close().await;
        self.emit(PipelineEvent::WorkerStopped {
            worker_id: self.worker_id,
        });

        match &result {
            Ok(()) => info!(
                subsystem = "pipeline",
                component = "consumer",
                worker_id = self.worker_id,
                "Consumer worker stopped"
            ),
            Err(e) => error!(
                subsystem = "pipeline",
                component = "consumer",
                worker_id = self.worker_id,
                error = %e,
                "Consumer worker stopped on broker error"
            ),
        }
        result
    }

    async fn consume(&mut self) -> Result<()> {
        while !self.shutdown_requested() {
            match self.source.poll(self.config.poll_timeout).await? {
                Polled::Empty => continue,
                Polled::PartitionEof { partition } => {
                    debug!(
                        subsystem = "pipeline",
                        component = "consumer",
                        worker_id = self.worker_id,
                        partition,
                        "Reached end of partition"
                    );
                }
                Polled::Message(delivery) => self.handle(delivery).await?,
            }
        }
        Ok(())
    }

    /// Handle one delivery. Only broker failures that break ordering are
    /// returned as errors.
    async fn handle(&mut self, delivery: Delivery) -> Result<()> {
        let decoded = match delivery.payload.as_deref() {
            Some(payload) => FileReadyEvent::decode(payload),
            None => Err(Error::Decode("message has no payload".into())),
        };

        let event = match decoded {
            Ok(event) => event,
            Err(e) => return self.handle_undecodable(&delivery, e).await,
        };

        match self.orchestrator.process(&event).await {
            Ok(outcome) => {
                self.commit(&delivery).await;
                self.emit(PipelineEvent::MessageProcessed {
                    worker_id: self.worker_id,
                    partition: delivery.partition,
                    offset: delivery.offset,
                    job_id: event.job_id,
                    record_id: outcome.record_id,
                    file_type: outcome.file_type,
                    unsupported: outcome.unsupported,
                });
                Ok(())
            }
            Err(e) => {
                warn!(
                    subsystem = "pipeline",
                    component = "consumer",
                    worker_id = self.worker_id,
                    partition = delivery.partition,
                    offset = delivery.offset,
                    job_id = %event.job_id,
                    error = %e,
                    "Message not acknowledged, scheduling redelivery"
                );
                self.emit(PipelineEvent::ProcessingFailed {
                    worker_id: self.worker_id,
                    partition: delivery.partition,
                    offset: delivery.offset,
                    job_id: event.job_id,
                    error: e.to_string(),
                });
                self.rewind(&delivery).await
            }
        }
    }

    async fn handle_undecodable(&mut self, delivery: &Delivery, err: Error) -> Result<()> {
        error!(
            subsystem = "pipeline",
            component = "consumer",
            worker_id = self.worker_id,
            partition = delivery.partition,
            offset = delivery.offset,
            error = %err,
            "Failed to decode message"
        );
        self.emit(PipelineEvent::DecodeFailed {
            worker_id: self.worker_id,
            partition: delivery.partition,
            offset: delivery.offset,
            error: err.to_string(),
        });

        // Without a dead-letter topic the message is never acknowledged
        let Some(sink) = self.dead_letter.clone() else {
            return self.rewind(delivery).await;
        };

        match sink.publish(delivery, &err.to_string()).await {
            Ok(()) => {
                self.commit(delivery).await;
                self.emit(PipelineEvent::DeadLettered {
                    worker_id: self.worker_id,
                    partition: delivery.partition,
                    offset: delivery.offset,
                });
                Ok(())
            }
            Err(e) => {
                warn!(
                    subsystem = "pipeline",
                    component = "consumer",
                    worker_id = self.worker_id,
                    partition = delivery.partition,
                    offset = delivery.offset,
                    error = %e,
                    "Dead-letter publish failed, scheduling redelivery"
                );
                self.rewind(delivery).await
            }
        }
    }

    /// Commit failures are not fatal; the message may be seen again.
    async fn commit(&mut self, delivery: &Delivery) {
        if let Err(e) = self.source.commit(delivery).await {
            warn!(
                subsystem = "pipeline",
                component = "consumer",
                worker_id = self.worker_id,
                partition = delivery.partition,
                offset = delivery.offset,
                error = %e,
                "Offset commit failed"
            );
        }
    }

    /// Seek back to the failed offset, then pause unless shutting down.
    async fn rewind(&mut self, delivery: &Delivery) -> Result<()> {
        self.source.redeliver(delivery).await?;

        if self.config.redelivery_delay.is_zero() || self.shutdown_requested() {
            return Ok(());
        }
        tokio::select! {
            _ = sleep(self.config.redelivery_delay) => {}
            _ = self.shutdown_rx.changed() => {}
        }
        Ok(())
    }

    fn shutdown_requested(&self) -> bool {
        *self.shutdown_rx.borrow()
    }

    fn emit(&self, event: PipelineEvent) {
        // No subscribers is fine
        let _ = self.event_tx.send(event);
    }
}
