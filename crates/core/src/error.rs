//! Error types for termdex
//!
//! This module defines all error types used throughout the system.
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.
//!
//! Only two kinds ever reach callers of the indexing entry points:
//! `Configuration` (bad field reference) and, once the retry budget is
//! exhausted, `TransactionAborted`. Missing and negative counters are
//! reported through logs only.

use crate::record::EntityRef;
use std::io;
use thiserror::Error;

/// Result type alias for termdex operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for termdex
#[derive(Debug, Error)]
pub enum Error {
    /// A field reference traverses more than one relation or iterable level
    #[error("Invalid field reference '{field}': {reason}")]
    Configuration {
        /// The offending field reference, as written
        field: String,
        /// Why the reference was rejected
        reason: String,
    },

    /// Transaction aborted due to an optimistic-concurrency conflict
    #[error("Transaction aborted: {reason}")]
    TransactionAborted {
        /// Description of the conflict
        reason: String,
    },

    /// Caller supplied an argument that cannot be processed
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// An entity required by the operation does not exist
    #[error("Entity not found: {0}")]
    EntityNotFound(EntityRef),

    /// Storage layer error
    #[error("Storage error: {0}")]
    Storage(String),

    /// The deferred work queue rejected a job
    #[error("Queue error: {0}")]
    Queue(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration file could not be parsed or holds invalid values
    #[error("Config error: {0}")]
    Config(String),

    /// I/O error (configuration files)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    /// Build a configuration error for `field`
    pub fn configuration(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::Configuration {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Build a conflict error
    pub fn conflict(reason: impl Into<String>) -> Self {
        Error::TransactionAborted {
            reason: reason.into(),
        }
    }

    /// Build an invalid-input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Error::InvalidInput(msg.into())
    }

    /// Build a storage error
    pub fn storage(msg: impl Into<String>) -> Self {
        Error::Storage(msg.into())
    }

    /// Build a queue error
    pub fn queue(msg: impl Into<String>) -> Self {
        Error::Queue(msg.into())
    }

    /// True for optimistic-concurrency conflicts, the only retryable kind
    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::TransactionAborted { .. })
    }

    /// True for field-reference errors
    pub fn is_configuration(&self) -> bool {
        matches!(self, Error::Configuration { .. })
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
