//! Background indexing queues.
//!
//! Each named queue is a FIFO of `IndexJob`s served by a fixed pool of
//! worker threads. Queues are created on first use with the worker count
//! and depth limit from `SearchConfig`.

use dashmap::DashMap;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use termdex_core::{Error, IndexStore, Result};
use tracing::{debug, error};

use crate::config::SearchConfig;
use crate::deferred::{IndexJob, JobHandler, JobQueue};

/// Rejection of a job by a background queue.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueueError {
    /// The queue holds `max_queue_depth` jobs already
    #[error("indexing queue '{0}' is full")]
    Full(String),
    /// The queue has been shut down
    #[error("indexing queue '{0}' is shut down")]
    ShutDown(String),
}

impl From<QueueError> for Error {
    fn from(e: QueueError) -> Self {
        Error::queue(e.to_string())
    }
}

/// Queue metrics snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueStats {
    /// Number of jobs waiting in the queue.
    pub queue_depth: usize,
    /// Number of jobs currently being executed by workers.
    pub active_jobs: usize,
    /// Jobs finished since the queue was created, failed ones included.
    pub jobs_completed: u64,
    /// Jobs that returned an error or panicked.
    pub jobs_failed: u64,
    /// Number of worker threads.
    pub worker_count: usize,
}

struct LaneInner {
    name: String,
    queue: Mutex<VecDeque<IndexJob>>,
    work_ready: Condvar,
    drain_cond: Condvar,
    shutdown: AtomicBool,
    queue_depth: AtomicUsize,
    active_jobs: AtomicUsize,
    max_queue_depth: usize,
    jobs_completed: AtomicU64,
    jobs_failed: AtomicU64,
    handler: Arc<dyn JobHandler>,
}

struct Lane {
    inner: Arc<LaneInner>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    num_threads: usize,
}

impl Lane {
    fn start(
        name: &str,
        num_threads: usize,
        max_queue_depth: usize,
        handler: Arc<dyn JobHandler>,
    ) -> Result<Self> {
        let inner = Arc::new(LaneInner {
            name: name.to_string(),
            queue: Mutex::new(VecDeque::new()),
            work_ready: Condvar::new(),
            drain_cond: Condvar::new(),
            shutdown: AtomicBool::new(false),
            queue_depth: AtomicUsize::new(0),
            active_jobs: AtomicUsize::new(0),
            max_queue_depth,
            jobs_completed: AtomicU64::new(0),
            jobs_failed: AtomicU64::new(0),
            handler,
        });

        let lane = Lane {
            inner: Arc::clone(&inner),
            workers: Mutex::new(Vec::with_capacity(num_threads)),
            num_threads,
        };
        for i in 0..num_threads {
            let inner_clone = Arc::clone(&inner);
            let spawned = std::thread::Builder::new()
                .name(format!("termdex-{}-{}", name, i))
                .spawn(move || worker_loop(&inner_clone));
            match spawned {
                Ok(handle) => lane.workers.lock().push(handle),
                Err(e) => {
                    lane.shutdown();
                    return Err(e.into());
                }
            }
        }
        debug!(target: "termdex::queue", queue = name, workers = num_threads, "Queue started");
        Ok(lane)
    }

    fn submit(&self, job: IndexJob) -> std::result::Result<(), QueueError> {
        // Reject after shutdown: workers have been joined, job would never run
        if self.inner.shutdown.load(Ordering::Acquire) {
            return Err(QueueError::ShutDown(self.inner.name.clone()));
        }

        {
            let mut queue = self.inner.queue.lock();
            if queue.len() >= self.inner.max_queue_depth {
                return Err(QueueError::Full(self.inner.name.clone()));
            }
            queue.push_back(job);
            self.inner.queue_depth.fetch_add(1, Ordering::Release);
        }

        self.inner.work_ready.notify_one();
        Ok(())
    }

    fn drain(&self) {
        let mut queue = self.inner.queue.lock();
        while self.inner.queue_depth.load(Ordering::Acquire) > 0
            || self.inner.active_jobs.load(Ordering::Acquire) > 0
        {
            self.inner.drain_cond.wait(&mut queue);
        }
    }

    fn shutdown(&self) {
        self.inner.shutdown.store(true, Ordering::Release);

        // Notify under the queue lock so a worker between its shutdown check
        // and its wait cannot miss the wakeup
        {
            let _queue = self.inner.queue.lock();
            self.inner.work_ready.notify_all();
        }

        let mut workers = self.workers.lock();
        for handle in workers.drain(..) {
            let _ = handle.join();
        }
    }

    fn stats(&self) -> QueueStats {
        QueueStats {
            queue_depth: self.inner.queue_depth.load(Ordering::Relaxed),
            active_jobs: self.inner.active_jobs.load(Ordering::Relaxed),
            jobs_completed: self.inner.jobs_completed.load(Ordering::Relaxed),
            jobs_failed: self.inner.jobs_failed.load(Ordering::Relaxed),
            worker_count: self.num_threads,
        }
    }
}

/// Decrements `active_jobs` and wakes drain waiters, even if a job panics.
struct ActiveJobGuard<'a> {
    inner: &'a LaneInner,
}

impl Drop for ActiveJobGuard<'_> {
    fn drop(&mut self) {
        self.inner.jobs_completed.fetch_add(1, Ordering::Relaxed);
        let prev_active = self.inner.active_jobs.fetch_sub(1, Ordering::Release);

        if prev_active == 1 && self.inner.queue_depth.load(Ordering::Acquire) == 0 {
            let _queue = self.inner.queue.lock();
            self.inner.drain_cond.notify_all();
        }
    }
}

fn worker_loop(inner: &LaneInner) {
    loop {
        let job = {
            let mut queue = inner.queue.lock();
            loop {
                if let Some(job) = queue.pop_front() {
                    inner.queue_depth.fetch_sub(1, Ordering::Release);
                    inner.active_jobs.fetch_add(1, Ordering::Release);
                    break job;
                }
                if inner.shutdown.load(Ordering::Acquire) {
                    return;
                }
                inner.work_ready.wait(&mut queue);
            }
        };

        let _guard = ActiveJobGuard { inner };

        let outcome =
            std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| inner.handler.handle(&job)));
        match outcome {
            Ok(Ok(())) => {
                debug!(target: "termdex::queue", queue = %inner.name, entity = %job.entity, "Job done");
            }
            Ok(Err(e)) => {
                inner.jobs_failed.fetch_add(1, Ordering::Relaxed);
                error!(
                    target: "termdex::queue",
                    queue = %inner.name,
                    entity = %job.entity,
                    error = %e,
                    "Deferred indexing job failed"
                );
            }
            Err(panic) => {
                inner.jobs_failed.fetch_add(1, Ordering::Relaxed);
                error!(
                    target: "termdex::queue",
                    queue = %inner.name,
                    entity = %job.entity,
                    "Deferred indexing job panicked: {:?}",
                    panic.downcast_ref::<&str>().copied().unwrap_or("(non-string panic)")
                );
            }
        }
    }
}

/// Named background queues sharing one job handler.
///
/// Transactional jobs are handed to `IndexStore::after_commit` and reach a
/// queue only once the caller's transaction commits.
pub struct BackgroundQueue {
    store: Arc<dyn IndexStore>,
    handler: Arc<dyn JobHandler>,
    lanes: DashMap<String, Arc<Lane>>,
    worker_threads: usize,
    max_queue_depth: usize,
    shutdown: AtomicBool,
}

impl BackgroundQueue {
    /// Create a queue set; no threads start until the first job arrives.
    pub fn new(
        store: Arc<dyn IndexStore>,
        handler: Arc<dyn JobHandler>,
        config: &SearchConfig,
    ) -> Self {
        BackgroundQueue {
            store,
            handler,
            lanes: DashMap::new(),
            worker_threads: config.worker_threads.max(1),
            max_queue_depth: config.max_queue_depth.max(1),
            shutdown: AtomicBool::new(false),
        }
    }

    fn lane(&self, name: &str) -> Result<Arc<Lane>> {
        if self.shutdown.load(Ordering::Acquire) {
            return Err(QueueError::ShutDown(name.to_string()).into());
        }
        if let Some(lane) = self.lanes.get(name) {
            return Ok(Arc::clone(lane.value()));
        }
        let entry = self.lanes.entry(name.to_string());
        match entry {
            dashmap::mapref::entry::Entry::Occupied(lane) => Ok(Arc::clone(lane.get())),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                let lane = Arc::new(Lane::start(
                    name,
                    self.worker_threads,
                    self.max_queue_depth,
                    Arc::clone(&self.handler),
                )?);
                slot.insert(Arc::clone(&lane));
                Ok(lane)
            }
        }
    }

    /// Block until every queue is empty and idle.
    ///
    /// Workers keep running afterwards.
    pub fn drain(&self) {
        for lane in self.snapshot() {
            lane.drain();
        }
    }

    /// Block until the named queue is empty and idle.
    pub fn drain_queue(&self, name: &str) {
        let lane = self.lanes.get(name).map(|l| Arc::clone(l.value()));
        if let Some(lane) = lane {
            lane.drain();
        }
    }

    /// Stop accepting jobs, finish the queued ones and join all workers.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);
        for lane in self.snapshot() {
            lane.shutdown();
        }
    }

    /// Metrics of the named queue, if it exists.
    pub fn stats(&self, name: &str) -> Option<QueueStats> {
        self.lanes.get(name).map(|lane| lane.stats())
    }

    /// Names of the queues created so far, sorted.
    pub fn queue_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.lanes.iter().map(|l| l.key().clone()).collect();
        names.sort();
        names
    }

    fn snapshot(&self) -> Vec<Arc<Lane>> {
        self.lanes.iter().map(|l| Arc::clone(l.value())).collect()
    }
}

impl JobQueue for BackgroundQueue {
    fn enqueue(&self, queue: &str, job: IndexJob, transactional: bool) -> Result<()> {
        let lane = self.lane(queue)?;
        if !transactional {
            return Ok(lane.submit(job)?);
        }
        debug!(target: "termdex::queue", queue, entity = %job.entity, "Job held until commit");
        self.store.after_commit(Box::new(move || {
            let entity = job.entity.clone();
            if let Err(e) = lane.submit(job) {
                error!(
                    target: "termdex::queue",
                    entity = %entity,
                    error = %e,
                    "Dropping job released by commit"
                );
            }
        }));
        Ok(())
    }
}

impl Drop for BackgroundQueue {
    fn drop(&mut self) {
        self.shutdown();
    }
}
