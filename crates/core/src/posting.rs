//! Index data model
//!
//! - Posting: occurrences of one term in one entity's indexed text
//! - PostingKey: the (term, table, id) identity of a posting
//! - GlobalTermCount: occurrences of one term across all entities

use crate::record::{EntityId, EntityRef};
use serde::{Deserialize, Serialize};

/// Identity of a posting
///
/// Ordered term-first so that all postings of one term are contiguous in
/// an ordered map.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PostingKey {
    /// Normalized term
    pub term: String,
    /// Table of the owning entity
    pub table: String,
    /// Primary key of the owning entity
    pub id: EntityId,
}

impl PostingKey {
    /// Build the key for `term` on `entity`
    pub fn new(term: impl Into<String>, entity: &EntityRef) -> Self {
        PostingKey {
            term: term.into(),
            table: entity.table.clone(),
            id: entity.id,
        }
    }

    /// The entity this key belongs to
    pub fn entity(&self) -> EntityRef {
        EntityRef::from_parts(self.table.clone(), self.id)
    }
}

/// One term found in one entity's indexed fields
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Posting {
    /// Normalized term (1 to 4 lowercased words joined by single spaces)
    pub term: String,
    /// Table of the owning entity
    pub entity_table: String,
    /// Primary key of the owning entity
    pub entity_id: EntityId,
    /// How often `term` occurs in the entity's indexed text
    pub occurrences: u64,
}

impl Posting {
    /// Create a new posting
    pub fn new(term: impl Into<String>, entity: &EntityRef, occurrences: u64) -> Self {
        Posting {
            term: term.into(),
            entity_table: entity.table.clone(),
            entity_id: entity.id,
            occurrences,
        }
    }

    /// Unique key of this posting
    pub fn key(&self) -> PostingKey {
        PostingKey {
            term: self.term.clone(),
            table: self.entity_table.clone(),
            id: self.entity_id,
        }
    }

    /// The entity owning this posting
    pub fn entity(&self) -> EntityRef {
        EntityRef::from_parts(self.entity_table.clone(), self.entity_id)
    }
}

/// Aggregate occurrences of a term across every indexed entity
///
/// `count` is signed so that drift below zero (a missed or doubled
/// retraction) stays visible instead of wrapping or being clamped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalTermCount {
    /// Normalized term (primary key)
    pub term: String,
    /// Sum of `occurrences` over live postings of `term`
    pub count: i64,
}

impl GlobalTermCount {
    /// Create a counter row
    pub fn new(term: impl Into<String>, count: i64) -> Self {
        GlobalTermCount {
            term: term.into(),
            count,
        }
    }

    /// Create a zero counter row
    pub fn zero(term: impl Into<String>) -> Self {
        Self::new(term, 0)
    }
}
