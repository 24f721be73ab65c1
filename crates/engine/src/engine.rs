//! SearchEngine: the public entry point
//!
//! Ties together the indexer, the searcher, the deferred job queue and the
//! per-table field registry. Build one with `SearchEngine::builder`.
//!
//! # Deferral
//!
//! `index(.., defer = true)` schedules an `IndexJob` on the configured queue
//! instead of indexing inline. When the store reports an open host
//! transaction the job is always deferred and tagged transactional, so it
//! only runs once that transaction commits.

use std::sync::Arc;

use termdex_core::{
    EntityRef, EntityRepository, FieldRef, IndexStore, Posting, Record, Result,
};
use tracing::debug;

use crate::background::BackgroundQueue;
use crate::config::SearchConfig;
use crate::deferred::{IndexJob, InlineQueue, JobQueue};
use crate::hooks::SearchRegistry;
use crate::indexer::{IndexReport, Indexer, UnindexReport};
use crate::retry::{RetryPolicy, Sleeper, ThreadSleeper};
use crate::search::{ScoredEntity, SearchRequest, Searcher};

/// Which queue deferred jobs go to
enum QueueChoice {
    Background,
    Inline,
    Custom(Arc<dyn JobQueue>),
}

/// Builder for `SearchEngine`
pub struct SearchEngineBuilder {
    store: Arc<dyn IndexStore>,
    repository: Arc<dyn EntityRepository>,
    config: SearchConfig,
    sleeper: Arc<dyn Sleeper>,
    queue: QueueChoice,
}

impl SearchEngineBuilder {
    /// Use `config` instead of the defaults
    pub fn config(mut self, config: SearchConfig) -> Self {
        self.config = config;
        self
    }

    /// Wait between retries with `sleeper`
    pub fn sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Run deferred jobs on the calling thread (the default is background
    /// worker threads)
    pub fn inline_queue(mut self) -> Self {
        self.queue = QueueChoice::Inline;
        self
    }

    /// Hand deferred jobs to a host-provided queue
    pub fn job_queue(mut self, queue: Arc<dyn JobQueue>) -> Self {
        self.queue = QueueChoice::Custom(queue);
        self
    }

    /// Validate the configuration and build the engine
    pub fn build(self) -> Result<SearchEngine> {
        self.config.validate()?;

        let retry = RetryPolicy::with_sleeper(self.config.retry.clone(), self.sleeper);
        let indexer = Arc::new(Indexer::new(Arc::clone(&self.store), retry));
        let searcher = Searcher::new(Arc::clone(&self.store), Arc::clone(&self.repository));

        let mut background = None;
        let queue: Arc<dyn JobQueue> = match self.queue {
            QueueChoice::Background => {
                let workers = Arc::new(BackgroundQueue::new(
                    Arc::clone(&self.store),
                    indexer.clone(),
                    &self.config,
                ));
                background = Some(Arc::clone(&workers));
                workers
            }
            QueueChoice::Inline => Arc::new(InlineQueue::new(
                Arc::clone(&self.store),
                indexer.clone(),
            )),
            QueueChoice::Custom(queue) => queue,
        };

        Ok(SearchEngine {
            config: self.config,
            store: self.store,
            indexer,
            searcher,
            queue,
            background,
            registry: SearchRegistry::new(),
        })
    }
}

/// Full-text index over host records
pub struct SearchEngine {
    config: SearchConfig,
    store: Arc<dyn IndexStore>,
    indexer: Arc<Indexer>,
    searcher: Searcher,
    queue: Arc<dyn JobQueue>,
    background: Option<Arc<BackgroundQueue>>,
    registry: SearchRegistry,
}

impl SearchEngine {
    /// Start building an engine over `store` and `repository`
    pub fn builder(
        store: Arc<dyn IndexStore>,
        repository: Arc<dyn EntityRepository>,
    ) -> SearchEngineBuilder {
        SearchEngineBuilder {
            store,
            repository,
            config: SearchConfig::default(),
            sleeper: Arc::new(ThreadSleeper),
            queue: QueueChoice::Background,
        }
    }

    /// Active configuration
    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Indexable fields per table
    pub fn registry(&self) -> &SearchRegistry {
        &self.registry
    }

    /// The indexer doing the writes
    pub fn indexer(&self) -> &Arc<Indexer> {
        &self.indexer
    }

    /// Declare the indexable fields of `table`
    pub fn register<I, S>(&self, table: &str, fields: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.registry.register(table, fields)
    }

    /// Retract and re-index `record`, inline or through the job queue
    ///
    /// Either way the postings reflect `record` as passed in. A deferred job
    /// carries the terms resolved here and never reads the record back.
    ///
    /// # Errors
    ///
    /// A configuration error if a field does not fit the record, checked
    /// before anything is retracted or scheduled. When run inline, also a
    /// `TransactionAborted` once the retry budget is spent.
    pub fn index(&self, record: &dyn Record, fields: &[FieldRef], defer: bool) -> Result<()> {
        let transactional = self.store.in_transaction();
        if !(defer || transactional) {
            self.indexer.reindex(record, fields)?;
            return Ok(());
        }

        let job = IndexJob::from_record(record, fields)?;
        debug!(
            target: "termdex::index",
            entity = %job.entity,
            terms = job.terms.len(),
            queue = %self.config.queue_name,
            transactional,
            "Deferring unindex and reindex"
        );
        self.queue.enqueue(&self.config.queue_name, job, transactional)
    }

    /// Retract and re-index `record` on the calling thread
    pub fn reindex_now(&self, record: &dyn Record, fields: &[FieldRef]) -> Result<IndexReport> {
        self.indexer.reindex(record, fields)
    }

    /// Retract every posting of `entity`
    pub fn unindex(&self, entity: &EntityRef) -> Result<UnindexReport> {
        self.indexer.unindex(entity)
    }

    /// Execute a deferred job (for host-side queue workers)
    pub fn run_job(&self, job: &IndexJob) -> Result<IndexReport> {
        self.indexer.run_job(job)
    }

    /// Ranked, filtered records of one result page
    pub fn search(&self, request: &SearchRequest) -> Result<Vec<Arc<dyn Record>>> {
        self.searcher.search(request)
    }

    /// Ranked ids and scores of one result page, filters not applied
    pub fn rank(&self, request: &SearchRequest) -> Result<Vec<ScoredEntity>> {
        self.searcher.rank(request)
    }

    /// Postings currently held for `entity`
    pub fn postings_for(&self, entity: &EntityRef) -> Result<Vec<Posting>> {
        self.store.postings_for_entity(entity)
    }

    /// Global count of `term`, `None` if it was never indexed
    pub fn term_count(&self, term: &str) -> Result<Option<i64>> {
        self.store.term_count(term)
    }

    /// Total number of postings
    pub fn posting_count(&self) -> Result<usize> {
        self.store.posting_count()
    }

    /// Block until background queues are idle (no-op for other queues)
    pub fn drain(&self) {
        if let Some(background) = &self.background {
            background.drain();
        }
    }

    /// Stop background workers after finishing queued jobs
    pub fn shutdown(&self) {
        if let Some(background) = &self.background {
            background.shutdown();
        }
    }
}
