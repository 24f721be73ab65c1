//! Shared test utilities for the integration suites.
//!
//! Import via `#[path = "../common/mod.rs"] mod common;` from a suite's main.rs.

#![allow(dead_code)]
#![allow(unused_imports)]

use std::sync::{Arc, Once};

pub use termdex::*;

// ============================================================================
// Initialization
// ============================================================================

static INIT_TRACING: Once = Once::new();

/// Route engine logs to the test harness output (shown on failure only).
pub fn init_tracing() {
    INIT_TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_max_level(tracing::Level::DEBUG)
            .try_init();
    });
}

// ============================================================================
// TestEngine - engine over in-memory store and repository
// ============================================================================

/// Engine wrapper owning its store, repository and lifecycle hook.
pub struct TestEngine {
    pub engine: Arc<SearchEngine>,
    pub store: Arc<MemoryStore>,
    pub repo: Arc<MemoryRepository>,
    pub sleeper: Arc<RecordingSleeper>,
    pub hook: ChangeHook,
}

impl TestEngine {
    /// Deferred jobs run on the calling thread.
    pub fn inline() -> Self {
        Self::build(|builder| builder.inline_queue())
    }

    /// Deferred jobs run on background workers.
    pub fn background() -> Self {
        Self::build(|builder| builder)
    }

    /// Deferred jobs are handed to `queue`.
    pub fn with_queue(queue: Arc<dyn JobQueue>) -> Self {
        Self::build(|builder| builder.job_queue(queue))
    }

    /// Engine with `config`, inline queue.
    pub fn with_config(config: SearchConfig) -> Self {
        Self::build(|builder| builder.config(config).inline_queue())
    }

    fn build(customize: impl FnOnce(SearchEngineBuilder) -> SearchEngineBuilder) -> Self {
        init_tracing();
        let store = Arc::new(MemoryStore::new());
        let repo = Arc::new(MemoryRepository::new());
        let sleeper = Arc::new(RecordingSleeper::new());
        let builder = SearchEngine::builder(store.clone(), repo.clone()).sleeper(sleeper.clone());
        let engine = Arc::new(customize(builder).build().expect("engine builds"));
        let hook = ChangeHook::new(engine.clone());
        TestEngine {
            engine,
            store,
            repo,
            sleeper,
            hook,
        }
    }

    /// Store `doc` in the repository and index it synchronously.
    pub fn index(&self, doc: Document, fields: &[&str]) -> Arc<dyn Record> {
        let record = self.repo.insert_document(doc);
        self.engine
            .index(record.as_ref(), &parse(fields), false)
            .expect("index succeeds");
        record
    }

    /// Store `doc` and report it through the lifecycle hook.
    pub fn save(&self, doc: Document) -> Arc<dyn Record> {
        let is_create = self.repo.load(doc.entity()).expect("load").is_none();
        let record = self.repo.insert_document(doc);
        self.hook
            .on_entity_saved(record.as_ref(), is_create, false)
            .expect("save hook succeeds");
        record
    }

    /// Report a deletion through the hook, then drop the record.
    pub fn delete(&self, entity: &EntityRef) {
        self.hook.on_entity_deleted(entity).expect("delete hook succeeds");
        self.repo.remove(entity);
    }

    /// Ids of the first result page, in rank order.
    pub fn search(&self, table: &str, query: &str) -> Vec<u64> {
        self.search_request(&SearchRequest::new(table, query))
    }

    /// Ids of the page selected by `request`, in rank order.
    pub fn search_request(&self, request: &SearchRequest) -> Vec<u64> {
        ids(&self.engine.search(request).expect("search succeeds"))
    }

    /// Global count of `term`, 0 when absent.
    pub fn count(&self, term: &str) -> i64 {
        self.engine.term_count(term).expect("term count").unwrap_or(0)
    }

    /// Number of postings held for `term` in `table`.
    pub fn postings_of(&self, table: &str, term: &str) -> usize {
        self.engine
            .indexer()
            .store()
            .postings_for_terms(&[term.to_string()], table)
            .expect("postings")
            .len()
    }
}

/// Parse field references, panicking on malformed input.
pub fn parse(fields: &[&str]) -> Vec<FieldRef> {
    FieldRef::parse_all(fields.iter().copied()).expect("valid field references")
}

/// Entity ids of `records`, in order.
pub fn ids(records: &[Arc<dyn Record>]) -> Vec<u64> {
    records.iter().map(|r| r.entity_ref().id.0).collect()
}

/// Same ids, ignoring order.
pub fn sorted(mut ids: Vec<u64>) -> Vec<u64> {
    ids.sort_unstable();
    ids
}

/// A record of the `items` table with two text fields.
pub fn item(id: u64, field1: &str, field2: &str) -> Document {
    Document::new("items", id)
        .with("field1", field1)
        .with("field2", field2)
}
