//! # etl-pipeline
//!
//! Event consumption and per-event orchestration.
//!
//! - [`Orchestrator`]: fetch → extract → persist for one event, with the
//!   best-effort `FAILED` status write on error.
//! - [`ConsumerLoop`]: one worker polling its own [`MessageSource`], committing
//!   each message only after the orchestrator succeeds and rewinding the
//!   partition when it fails.
//! - [`ConsumerPool`]: runs the configured number of workers and drains them
//!   on shutdown.

pub mod config;
pub mod consumer;
pub mod kafka;
pub mod orchestrator;
pub mod pool;
pub mod source;
pub mod testing;

pub use config::{ConsumerConfig, KafkaConfig, OrchestratorConfig};
pub use consumer::{ConsumerLoop, PipelineEvent};
pub use kafka::{KafkaDeadLetterSink, KafkaSource};
pub use orchestrator::{Orchestrator, ProcessOutcome};
pub use pool::{ConsumerPool, PipelineHandle, ShutdownTrigger};
pub use source::{DeadLetterSink, Delivery, MessageSource, Polled};
