//! Core types and traits for termdex
//!
//! This crate defines the foundational types used throughout the system:
//! - EntityRef / EntityId: identity of an indexed host record
//! - Record / FieldValue / Scalar: the host record model
//! - FieldRef: validated indexable field references
//! - Posting / GlobalTermCount: the index data model
//! - Error: Error type hierarchy
//! - Traits: persistence contract (IndexStore, IndexTransaction) and
//!   record lookup (EntityRepository)

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod field;
pub mod posting;
pub mod record;
pub mod traits;

pub use error::{Error, Result};
pub use field::FieldRef;
pub use posting::{GlobalTermCount, Posting, PostingKey};
pub use record::{
    EntityId, EntityRef, EntityRepository, EqualityFilter, FieldValue, Record, Scalar,
};
pub use traits::{CommitCallback, IndexStore, IndexTransaction};
