//! Host record model
//!
//! termdex never owns the records it indexes. The host hands them over as
//! `Record` trait objects and resolves ids back to records through an
//! `EntityRepository`. This module defines:
//! - EntityId / EntityRef: identity of an indexed record
//! - Scalar: comparable leaf values (field content and filter operands)
//! - FieldValue: what a record yields for one named field
//! - Record / EntityRepository: the host-side traits

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Primary key of a record within its table
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityId(pub u64);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for EntityId {
    fn from(id: u64) -> Self {
        EntityId(id)
    }
}

/// Identity of one indexed record: owning table + primary key
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityRef {
    /// Table (collection) the record belongs to
    pub table: String,
    /// Primary key within `table`
    pub id: EntityId,
}

impl EntityRef {
    /// Create a new entity reference
    pub fn new(table: impl Into<String>, id: u64) -> Self {
        Self::from_parts(table, EntityId(id))
    }

    /// Create a reference from an already-typed id
    pub fn from_parts(table: impl Into<String>, id: EntityId) -> Self {
        EntityRef {
            table: table.into(),
            id,
        }
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.table, self.id)
    }
}

/// Leaf value stored in a record field
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Scalar {
    /// Absent value; never tokenized
    Null,
    /// Boolean
    Bool(bool),
    /// Integer
    Int(i64),
    /// Free text
    Text(String),
}

impl Scalar {
    /// Text form used for tokenization; `None` for `Null`
    pub fn as_text(&self) -> Option<String> {
        match self {
            Scalar::Null => None,
            Scalar::Bool(b) => Some(b.to_string()),
            Scalar::Int(i) => Some(i.to_string()),
            Scalar::Text(s) => Some(s.clone()),
        }
    }
}

impl From<&str> for Scalar {
    fn from(s: &str) -> Self {
        Scalar::Text(s.to_string())
    }
}

impl From<String> for Scalar {
    fn from(s: String) -> Self {
        Scalar::Text(s)
    }
}

impl From<i64> for Scalar {
    fn from(i: i64) -> Self {
        Scalar::Int(i)
    }
}

impl From<bool> for Scalar {
    fn from(b: bool) -> Self {
        Scalar::Bool(b)
    }
}

/// What a record yields for one named field
#[derive(Debug, Clone)]
pub enum FieldValue {
    /// A single leaf value
    Scalar(Scalar),
    /// An iterable of leaf values
    List(Vec<Scalar>),
    /// A one-hop relation to another record (`None` when unset)
    One(Option<Arc<dyn Record>>),
    /// A one-hop collection of related records
    Many(Vec<Arc<dyn Record>>),
}

impl FieldValue {
    /// Shorthand for `FieldValue::Scalar(Scalar::Null)`
    pub fn null() -> Self {
        FieldValue::Scalar(Scalar::Null)
    }

    /// Shorthand for a text scalar
    pub fn text(s: impl Into<String>) -> Self {
        FieldValue::Scalar(Scalar::Text(s.into()))
    }

    /// Short human-readable name of the variant, used in error messages
    pub fn kind(&self) -> &'static str {
        match self {
            FieldValue::Scalar(_) => "scalar",
            FieldValue::List(_) => "list",
            FieldValue::One(_) => "relation",
            FieldValue::Many(_) => "collection",
        }
    }
}

impl From<Scalar> for FieldValue {
    fn from(value: Scalar) -> Self {
        FieldValue::Scalar(value)
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self {
        FieldValue::text(s)
    }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self {
        FieldValue::text(s)
    }
}

impl From<i64> for FieldValue {
    fn from(i: i64) -> Self {
        FieldValue::Scalar(Scalar::Int(i))
    }
}

impl From<Vec<Scalar>> for FieldValue {
    fn from(values: Vec<Scalar>) -> Self {
        FieldValue::List(values)
    }
}

/// A host record that can be indexed
///
/// Unknown field names should yield `FieldValue::null()`.
pub trait Record: fmt::Debug + Send + Sync {
    /// Identity of this record
    fn entity_ref(&self) -> EntityRef;

    /// Value of the named field
    fn field(&self, name: &str) -> FieldValue;
}

/// Equality predicate on a record attribute, applied when resolving results
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EqualityFilter {
    /// Attribute name
    pub attr: String,
    /// Required value
    pub value: Scalar,
}

impl EqualityFilter {
    /// Create a new filter
    pub fn new(attr: impl Into<String>, value: impl Into<Scalar>) -> Self {
        EqualityFilter {
            attr: attr.into(),
            value: value.into(),
        }
    }

    /// Whether `record` satisfies this filter
    ///
    /// Only scalar fields can match; lists and relations never do.
    pub fn matches(&self, record: &dyn Record) -> bool {
        match record.field(&self.attr) {
            FieldValue::Scalar(v) => v == self.value,
            _ => false,
        }
    }
}

/// Host-side lookup of records by identity
///
/// Implemented by the persistence layer that owns the records.
pub trait EntityRepository: Send + Sync {
    /// Load one record, `None` if it no longer exists
    fn load(&self, entity: &EntityRef) -> Result<Option<Arc<dyn Record>>>;

    /// Load every record of `table` whose id is in `ids` and which satisfies
    /// all `filters`. Order of the returned records is unspecified.
    fn fetch(
        &self,
        table: &str,
        ids: &[EntityId],
        filters: &[EqualityFilter],
    ) -> Result<Vec<Arc<dyn Record>>>;
}
