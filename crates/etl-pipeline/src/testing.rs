//! In-memory collaborators for pipeline tests.
//!
//! Always compiled so integration tests (in tests/) and downstream crates can
//! drive the consumer loop without a broker, object store or database.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;
use uuid::Uuid;

use etl_core::{
    Error, JobStatus, NewExtractedRecord, PersistenceGateway, Result, RetrievalError,
    RetrievalGateway,
};

use crate::source::{DeadLetterSink, Delivery, MessageSource, Polled};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// =============================================================================
// MESSAGE SOURCE
// =============================================================================

#[derive(Default)]
struct SourceState {
    queue: VecDeque<Polled>,
    committed: Vec<(i32, i64)>,
    redelivered: Vec<(i32, i64)>,
    poll_error: Option<String>,
    fail_commits: bool,
    closed: bool,
}

/// Queue-backed [`MessageSource`]. Clones share state, so a test keeps one
/// clone to inspect commits after the loop has consumed the other.
#[derive(Clone, Default)]
pub struct InMemorySource {
    state: Arc<Mutex<SourceState>>,
}

impl InMemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message.
    pub fn push(&self, delivery: Delivery) {
        lock(&self.state).queue.push_back(Polled::Message(delivery));
    }

    /// Append an end-of-partition signal.
    pub fn push_partition_eof(&self, partition: i32) {
        lock(&self.state)
            .queue
            .push_back(Polled::PartitionEof { partition });
    }

    /// Append a JSON payload at `offset` on partition 0.
    pub fn push_payload(&self, offset: i64, payload: &[u8]) {
        self.push(Delivery::new("etl.file.ready", 0, offset, payload.to_vec()));
    }

    /// Make the next poll fail with a broker error.
    pub fn fail_next_poll(&self, message: impl Into<String>) {
        lock(&self.state).poll_error = Some(message.into());
    }

    /// Make every commit fail.
    pub fn fail_commits(&self) {
        lock(&self.state).fail_commits = true;
    }

    /// `(partition, next_offset)` pairs committed so far.
    pub fn committed(&self) -> Vec<(i32, i64)> {
        lock(&self.state).committed.clone()
    }

    /// `(partition, offset)` pairs rewound so far.
    pub fn redelivered(&self) -> Vec<(i32, i64)> {
        lock(&self.state).redelivered.clone()
    }

    /// Messages and signals not yet handed out.
    pub fn pending(&self) -> usize {
        lock(&self.state).queue.len()
    }

    pub fn is_closed(&self) -> bool {
        lock(&self.state).closed
    }
}

#[async_trait]
impl MessageSource for InMemorySource {
    async fn poll(&mut self, timeout: Duration) -> Result<Polled> {
        let next = {
            let mut state = lock(&self.state);
            if let Some(message) = state.poll_error.take() {
                return Err(Error::Broker(message));
            }
            state.queue.pop_front()
        };

        match next {
            Some(polled) => Ok(polled),
            None => {
                tokio::time::sleep(timeout).await;
                Ok(Polled::Empty)
            }
        }
    }

    async fn commit(&mut self, delivery: &Delivery) -> Result<()> {
        let mut state = lock(&self.state);
        if state.fail_commits {
            return Err(Error::Broker("commit rejected".into()));
        }
        state.committed.push((delivery.partition, delivery.offset + 1));
        Ok(())
    }

    async fn redeliver(&mut self, delivery: &Delivery) -> Result<()> {
        let mut state = lock(&self.state);
        state.redelivered.push((delivery.partition, delivery.offset));
        state.queue.push_front(Polled::Message(delivery.clone()));
        Ok(())
    }

    async fn close(&mut self) {
        lock(&self.state).closed = true;
    }
}

// =============================================================================
// OBJECT STORE
// =============================================================================

#[derive(Default)]
struct StoreState {
    objects: HashMap<(String, String), Vec<u8>>,
    fetches: Vec<(String, String)>,
    failure: Option<RetrievalError>,
    gate: Option<Arc<Notify>>,
}

/// Map-backed [`RetrievalGateway`]; unknown keys are `NotFound`.
#[derive(Clone, Default)]
pub struct InMemoryObjectStore {
    state: Arc<Mutex<StoreState>>,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, bucket: &str, key: &str, data: Vec<u8>) {
        lock(&self.state)
            .objects
            .insert((bucket.to_string(), key.to_string()), data);
    }

    /// Fail every fetch with `error`.
    pub fn fail_with(&self, error: RetrievalError) {
        lock(&self.state).failure = Some(error);
    }

    /// Stop failing fetches.
    pub fn recover(&self) {
        lock(&self.state).failure = None;
    }

    /// Hold every fetch until the returned gate is notified (once per fetch).
    pub fn hold_fetches(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        lock(&self.state).gate = Some(Arc::clone(&gate));
        gate
    }

    /// `(bucket, key)` of every fetch, in order.
    pub fn fetches(&self) -> Vec<(String, String)> {
        lock(&self.state).fetches.clone()
    }
}

#[async_trait]
impl RetrievalGateway for InMemoryObjectStore {
    async fn fetch(&self, bucket: &str, object_key: &str) -> Result<Vec<u8>> {
        let (gate, outcome) = {
            let mut state = lock(&self.state);
            state
                .fetches
                .push((bucket.to_string(), object_key.to_string()));

            let outcome = match state.failure.clone() {
                Some(error) => Err(Error::Retrieval(error)),
                None => state
                    .objects
                    .get(&(bucket.to_string(), object_key.to_string()))
                    .cloned()
                    .ok_or_else(|| {
                        Error::Retrieval(RetrievalError::NotFound {
                            bucket: bucket.to_string(),
                            key: object_key.to_string(),
                        })
                    }),
            };
            (state.gate.clone(), outcome)
        };

        if let Some(gate) = gate {
            gate.notified().await;
        }
        outcome
    }
}

// =============================================================================
// PERSISTENCE
// =============================================================================

/// A status write seen by [`InMemoryPersistence`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusUpdate {
    pub job_id: String,
    pub status: JobStatus,
    pub error_message: Option<String>,
}

#[derive(Default)]
struct PersistenceState {
    records: Vec<(Uuid, NewExtractedRecord)>,
    statuses: Vec<StatusUpdate>,
    fail_inserts: bool,
    fail_status_updates: bool,
}

/// Vec-backed [`PersistenceGateway`].
#[derive(Clone, Default)]
pub struct InMemoryPersistence {
    state: Arc<Mutex<PersistenceState>>,
}

impl InMemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every insert fail.
    pub fn fail_inserts(&self) {
        lock(&self.state).fail_inserts = true;
    }

    /// Make every status write fail.
    pub fn fail_status_updates(&self) {
        lock(&self.state).fail_status_updates = true;
    }

    pub fn records(&self) -> Vec<(Uuid, NewExtractedRecord)> {
        lock(&self.state).records.clone()
    }

    pub fn status_updates(&self) -> Vec<StatusUpdate> {
        lock(&self.state).statuses.clone()
    }

    /// Status updates for one job, in order.
    pub fn statuses_for(&self, job_id: &str) -> Vec<JobStatus> {
        lock(&self.state)
            .statuses
            .iter()
            .filter(|u| u.job_id == job_id)
            .map(|u| u.status)
            .collect()
    }
}

#[async_trait]
impl PersistenceGateway for InMemoryPersistence {
    async fn insert_record(&self, record: NewExtractedRecord) -> Result<Uuid> {
        let mut state = lock(&self.state);
        if state.fail_inserts {
            return Err(Error::Persistence("insert rejected".into()));
        }
        let id = Uuid::now_v7();
        state.records.push((id, record));
        Ok(id)
    }

    async fn update_job_status(
        &self,
        job_id: &str,
        status: JobStatus,
        error_message: Option<&str>,
    ) -> Result<()> {
        let mut state = lock(&self.state);
        if state.fail_status_updates {
            return Err(Error::Persistence("status update rejected".into()));
        }
        state.statuses.push(StatusUpdate {
            job_id: job_id.to_string(),
            status,
            error_message: error_message.map(str::to_string),
        });
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

// =============================================================================
// DEAD LETTERS
// =============================================================================

#[derive(Default)]
struct DeadLetterState {
    published: Vec<(Delivery, String)>,
    fail: bool,
}

/// [`DeadLetterSink`] that records what it was given.
#[derive(Clone, Default)]
pub struct RecordingDeadLetterSink {
    state: Arc<Mutex<DeadLetterState>>,
}

impl RecordingDeadLetterSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every publish fail.
    pub fn fail_publishes(&self) {
        lock(&self.state).fail = true;
    }

    pub fn published(&self) -> Vec<(Delivery, String)> {
        lock(&self.state).published.clone()
    }
}

#[async_trait]
impl DeadLetterSink for RecordingDeadLetterSink {
    async fn publish(&self, delivery: &Delivery, reason: &str) -> Result<()> {
        let mut state = lock(&self.state);
        if state.fail {
            return Err(Error::Broker("dead-letter topic unavailable".into()));
        }
        state.published.push((delivery.clone(), reason.to_string()));
        Ok(())
    }
}
