//! termdex - full-text search for host record stores
//!
//! termdex adds "good enough" search to records that live in some other
//! store. Text fields are broken into 1..=4 word n-grams, each kept as a
//! posting with its occurrence count, next to a global per-term counter.
//! Queries score entities by how rare their matched terms are.
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use termdex::{Document, FieldRef, MemoryRepository, MemoryStore, SearchEngine, SearchRequest};
//!
//! let repo = Arc::new(MemoryRepository::new());
//! let engine = SearchEngine::builder(Arc::new(MemoryStore::new()), repo.clone())
//!     .inline_queue()
//!     .build()?;
//!
//! let doc = repo.insert_document(Document::new("books", 1).with("title", "Eat a fish"));
//! engine.index(doc.as_ref(), &FieldRef::parse_all(["title"])?, false)?;
//!
//! let hits = engine.search(&SearchRequest::new("books", "fish"))?;
//! ```
//!
//! # Architecture
//!
//! - `termdex-core`: data model, record traits, storage contract, errors
//! - `termdex-storage`: in-memory store with optimistic concurrency
//! - `termdex-engine`: tokenizer, indexer, ranking, queues, hooks

pub use termdex_core::*;
pub use termdex_engine::*;
pub use termdex_storage::{Document, MemoryRepository, MemoryStore, StoreStats};
