//! Deferred indexing jobs
//!
//! A job is "unindex this entity, then index it again from these fields".
//! The terms are resolved from the record when the job is built, so a job
//! indexes exactly the content it was scheduled with, whether or not the
//! host has persisted that record yet. Jobs serialize to JSON and can be
//! handed to any queue.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use termdex_core::{EntityRef, FieldRef, IndexStore, Record, Result};
use tracing::error;

use crate::indexer::collect_terms;
use crate::tokenizer::TermOccurrence;

/// Unindex-then-reindex work for one entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexJob {
    /// Entity to refresh
    pub entity: EntityRef,
    /// Fields the terms were resolved from
    pub fields: Vec<FieldRef>,
    /// Terms to index once the old postings are gone
    #[serde(default)]
    pub terms: Vec<TermOccurrence>,
}

impl IndexJob {
    /// Create a new job
    pub fn new(entity: EntityRef, fields: Vec<FieldRef>, terms: Vec<TermOccurrence>) -> Self {
        IndexJob {
            entity,
            fields,
            terms,
        }
    }

    /// Resolve `fields` on `record` into a job
    ///
    /// # Errors
    ///
    /// Returns a configuration error if a field does not fit the record.
    pub fn from_record(record: &dyn Record, fields: &[FieldRef]) -> Result<Self> {
        let terms = collect_terms(record, fields)?;
        Ok(IndexJob::new(record.entity_ref(), fields.to_vec(), terms))
    }

    /// Serialize to JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Deserialize from JSON
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Executes jobs taken off a queue
pub trait JobHandler: Send + Sync {
    /// Run one job to completion
    fn handle(&self, job: &IndexJob) -> Result<()>;
}

/// Accepts jobs for later execution
pub trait JobQueue: Send + Sync {
    /// Schedule `job` on the named queue
    ///
    /// A `transactional` job is bound to the caller's open host transaction:
    /// it is released when that transaction commits and dropped if it
    /// aborts.
    fn enqueue(&self, queue: &str, job: IndexJob, transactional: bool) -> Result<()>;
}

/// Runs every job on the calling thread
///
/// Transactional jobs run from the store's after-commit hook. Failures of
/// those can only be logged.
pub struct InlineQueue {
    store: Arc<dyn IndexStore>,
    handler: Arc<dyn JobHandler>,
}

impl InlineQueue {
    /// Create a new inline queue
    pub fn new(store: Arc<dyn IndexStore>, handler: Arc<dyn JobHandler>) -> Self {
        InlineQueue { store, handler }
    }
}

impl JobQueue for InlineQueue {
    fn enqueue(&self, queue: &str, job: IndexJob, transactional: bool) -> Result<()> {
        if !transactional {
            return self.handler.handle(&job);
        }
        let handler = Arc::clone(&self.handler);
        let queue = queue.to_string();
        self.store.after_commit(Box::new(move || {
            if let Err(e) = handler.handle(&job) {
                error!(
                    target: "termdex::queue",
                    queue = %queue,
                    entity = %job.entity,
                    error = %e,
                    "Deferred indexing job failed"
                );
            }
        }));
        Ok(())
    }
}

/// One job accepted by a `RecordingQueue`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedJob {
    /// Queue name the job was scheduled on
    pub queue: String,
    /// The job
    pub job: IndexJob,
    /// Whether it was bound to an open transaction
    pub transactional: bool,
}

/// Holds jobs without running them until `run_pending` is called
#[derive(Debug, Default)]
pub struct RecordingQueue {
    jobs: Mutex<Vec<QueuedJob>>,
}

impl RecordingQueue {
    /// Create an empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Jobs accepted so far, oldest first
    pub fn jobs(&self) -> Vec<QueuedJob> {
        self.jobs.lock().clone()
    }

    /// Number of pending jobs
    pub fn len(&self) -> usize {
        self.jobs.lock().len()
    }

    /// True if nothing is pending
    pub fn is_empty(&self) -> bool {
        self.jobs.lock().is_empty()
    }

    /// Run and remove every pending job in FIFO order
    ///
    /// Stops at the first failing job; it and later jobs stay pending.
    pub fn run_pending(&self, handler: &dyn JobHandler) -> Result<usize> {
        let mut ran = 0;
        loop {
            let next = {
                let jobs = self.jobs.lock();
                match jobs.first() {
                    Some(queued) => queued.job.clone(),
                    None => return Ok(ran),
                }
            };
            handler.handle(&next)?;
            self.jobs.lock().remove(0);
            ran += 1;
        }
    }
}

impl JobQueue for RecordingQueue {
    fn enqueue(&self, queue: &str, job: IndexJob, transactional: bool) -> Result<()> {
        self.jobs.lock().push(QueuedJob {
            queue: queue.to_string(),
            job,
            transactional,
        });
        Ok(())
    }
}
