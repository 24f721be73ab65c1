//! Storage layer for termdex
//!
//! This crate implements the in-memory backends:
//! - MemoryStore: postings and counters behind a RwLock, with OCC units
//! - MemoryTransaction: read-set tracking and buffered writes
//! - MemoryRepository / Document: a host record store for embedding and tests

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod document;
pub mod memory;
pub mod repository;
pub mod transaction;

pub use document::Document;
pub use memory::{MemoryStore, StoreStats};
pub use repository::MemoryRepository;
pub use transaction::{validate_read_set, ConflictType, MemoryTransaction, StoreKey, ValidationResult};
