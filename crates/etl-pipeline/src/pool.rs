//! Worker pool: N consumer loops sharing one orchestrator.

use std::sync::Arc;

use tokio::sync::{broadcast, watch};
use tokio::task::JoinSet;
use tracing::{error, info};

use etl_core::{defaults, Error, Result};

use crate::config::ConsumerConfig;
use crate::consumer::{ConsumerLoop, PipelineEvent};
use crate::orchestrator::Orchestrator;
use crate::source::{DeadLetterSink, MessageSource};

/// Cloneable handle that asks every worker to stop after its current message.
#[derive(Clone)]
pub struct ShutdownTrigger {
    tx: Arc<watch::Sender<bool>>,
}

impl ShutdownTrigger {
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }
}

/// Handle for controlling a running pool.
pub struct PipelineHandle {
    shutdown: ShutdownTrigger,
    event_tx: broadcast::Sender<PipelineEvent>,
    tasks: JoinSet<Result<()>>,
}

impl PipelineHandle {
    /// Signal all workers to shut down gracefully.
    pub fn shutdown(&self) {
        self.shutdown.trigger();
    }

    /// Trigger usable from another task (signal handlers).
    pub fn shutdown_trigger(&self) -> ShutdownTrigger {
        self.shutdown.clone()
    }

    /// Get a receiver for pipeline events.
    pub fn events(&self) -> broadcast::Receiver<PipelineEvent> {
        self.event_tx.subscribe()
    }

    /// Wait for every worker to exit.
    ///
    /// The first worker failure stops the others; its error is returned once
    /// all of them have drained.
    pub async fn wait(mut self) -> Result<()> {
        let mut first_error: Option<Error> = None;

        while let Some(joined) = self.tasks.join_next().await {
            let result = match joined {
                Ok(result) => result,
                Err(e) => Err(Error::Internal(format!("Consumer worker panicked: {}", e))),
            };
            if let Err(e) = result {
                if first_error.is_none() {
                    error!(
                        subsystem = "pipeline",
                        component = "pool",
                        error = %e,
                        "Worker failed, stopping pool"
                    );
                    self.shutdown();
                    first_error = Some(e);
                }
            }
        }

        info!(subsystem = "pipeline", component = "pool", "All consumer workers stopped");
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Signal shutdown and wait for the drain.
    pub async fn shutdown_and_wait(self) -> Result<()> {
        self.shutdown();
        self.wait().await
    }
}

/// Runs `workers` consumer loops, each with its own [`MessageSource`].
///
/// Sources in the same consumer group are assigned disjoint partitions by the
/// broker, so no two workers process the same partition.
pub struct ConsumerPool {
    orchestrator: Arc<Orchestrator>,
    config: ConsumerConfig,
    dead_letter: Option<Arc<dyn DeadLetterSink>>,
    event_tx: broadcast::Sender<PipelineEvent>,
}

impl ConsumerPool {
    pub fn new(orchestrator: Arc<Orchestrator>, config: ConsumerConfig) -> Self {
        let (event_tx, _) = broadcast::channel(defaults::EVENT_BUS_CAPACITY);
        Self {
            orchestrator,
            config,
            dead_letter: None,
            event_tx,
        }
    }

    /// Subscribe before [`ConsumerPool::start`] to observe every event.
    pub fn events(&self) -> broadcast::Receiver<PipelineEvent> {
        self.event_tx.subscribe()
    }

    /// Route undecodable messages to `sink`.
    pub fn with_dead_letter(mut self, sink: Arc<dyn DeadLetterSink>) -> Self {
        self.dead_letter = Some(sink);
        self
    }

    /// Start the workers. `make_source` is called once per worker id.
    ///
    /// Fails without starting anything when a source cannot be created.
    pub fn start<F>(self, mut make_source: F) -> Result<PipelineHandle>
    where
        F: FnMut(usize) -> Result<Box<dyn MessageSource>>,
    {
        let workers = self.config.workers.max(1);
        let sources = (0..workers)
            .map(&mut make_source)
            .collect::<Result<Vec<_>>>()?;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let event_tx = self.event_tx;

        info!(
            subsystem = "pipeline",
            component = "pool",
            workers,
            batch_size = self.config.batch_size,
            dead_letter = self.dead_letter.is_some(),
            "Starting consumer pool"
        );

        let mut tasks = JoinSet::new();
        for (worker_id, source) in sources.into_iter().enumerate() {
            let mut consumer = ConsumerLoop::new(
                worker_id,
                source,
                self.orchestrator.clone(),
                self.config.clone(),
                event_tx.clone(),
                shutdown_rx.clone(),
            );
            if let Some(sink) = &self.dead_letter {
                consumer = consumer.with_dead_letter(sink.clone());
            }
            tasks.spawn(consumer.run());
        }

        Ok(PipelineHandle {
            shutdown: ShutdownTrigger {
                tx: Arc::new(shutdown_tx),
            },
            event_tx,
            tasks,
        })
    }
}
