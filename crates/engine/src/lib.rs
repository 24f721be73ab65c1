//! Indexing and ranking engine for termdex
//!
//! This crate holds everything above the storage contract:
//! - Tokenizer: text → lowercased 1..=4 word n-grams with counts
//! - Indexer: per-term atomic posting and counter updates, with retry
//! - Searcher: query parsing, scoring, paging and record resolution
//! - Deferred jobs: inline, recording and background worker queues
//! - Hooks: per-table field registry and the lifecycle observer
//! - SearchEngine: the facade tying these together
//!
//! The engine never owns host records; it reads them through
//! `EntityRepository` and stores only postings and counters.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod background;
pub mod config;
pub mod deferred;
pub mod engine;
pub mod hooks;
pub mod indexer;
pub mod retry;
pub mod search;
pub mod tokenizer;

pub use background::{BackgroundQueue, QueueError, QueueStats};
pub use config::{Backoff, RetryConfig, SearchConfig, CONFIG_FILE_NAME, DEFAULT_QUEUE};
pub use deferred::{IndexJob, InlineQueue, JobHandler, JobQueue, QueuedJob, RecordingQueue};
pub use engine::{SearchEngine, SearchEngineBuilder};
pub use hooks::{ChangeHook, EntityObserver, SearchRegistry};
pub use indexer::{collect_terms, IndexReport, Indexer, UnindexReport};
pub use retry::{RecordingSleeper, RetryPolicy, Sleeper, ThreadSleeper};
pub use search::{paginate, rank, score, ScoredEntity, SearchRequest, Searcher};
pub use tokenizer::{parse_query, tokenize, TermBag, TermOccurrence, MAX_NGRAM};
