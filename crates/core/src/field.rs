//! Indexable field references
//!
//! A field reference names where indexable text lives on a record:
//!
//! - `"title"`: a direct attribute (a scalar, or a list of scalars)
//! - `"author.name"`: one hop through a relation. If `author` is a single
//!   related record its `name` is taken; if it is a collection, `name` is
//!   taken from every member.
//!
//! References are parsed once, when the host declares its searchable
//! fields. Anything deeper than one hop is rejected at parse time. The
//! shape of the data (relation vs. collection vs. list) is only known when
//! a record is resolved, so shape violations surface at index time.

use crate::error::{Error, Result};
use crate::record::{FieldValue, Record, Scalar};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Separator between the relation and the attribute
pub const FIELD_SEPARATOR: char = '.';

/// A validated field reference
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum FieldRef {
    /// Direct attribute of the record
    Attr(String),
    /// Attribute reached through one relation or one collection
    Relation {
        /// Name of the relation field on the record
        relation: String,
        /// Attribute read from the related record(s)
        attr: String,
    },
}

impl FieldRef {
    /// Parse `"attr"` or `"relation.attr"`
    ///
    /// # Errors
    ///
    /// Returns `Error::Configuration` for empty segments or more than one hop.
    pub fn parse(reference: &str) -> Result<Self> {
        let segments: Vec<&str> = reference.trim().split(FIELD_SEPARATOR).collect();
        if segments.iter().any(|s| s.trim().is_empty()) {
            return Err(Error::configuration(reference, "empty path segment"));
        }
        match segments.as_slice() {
            [attr] => Ok(FieldRef::Attr(attr.trim().to_string())),
            [relation, attr] => Ok(FieldRef::Relation {
                relation: relation.trim().to_string(),
                attr: attr.trim().to_string(),
            }),
            _ => Err(Error::configuration(
                reference,
                "only one level of related object can be indexed",
            )),
        }
    }

    /// Parse a list of references, failing on the first invalid one
    pub fn parse_all<I, S>(references: I) -> Result<Vec<Self>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        references
            .into_iter()
            .map(|r| FieldRef::parse(r.as_ref()))
            .collect()
    }

    /// Collect the leaf values this reference points at on `record`
    ///
    /// `Null` leaves are kept; callers skip them when tokenizing.
    ///
    /// # Errors
    ///
    /// Returns `Error::Configuration` when the record's shape would require
    /// a second level of relation or iteration.
    pub fn resolve(&self, record: &dyn Record) -> Result<Vec<Scalar>> {
        match self {
            FieldRef::Attr(name) => match record.field(name) {
                FieldValue::Scalar(value) => Ok(vec![value]),
                FieldValue::List(values) => Ok(values),
                other => Err(self.shape_error(format!(
                    "'{}' is a {}; reference an attribute of it instead",
                    name,
                    other.kind()
                ))),
            },
            FieldRef::Relation { relation, attr } => match record.field(relation) {
                FieldValue::One(None) | FieldValue::Scalar(Scalar::Null) => Ok(Vec::new()),
                FieldValue::One(Some(related)) => match related.field(attr) {
                    FieldValue::Scalar(value) => Ok(vec![value]),
                    FieldValue::List(values) => Ok(values),
                    _ => Err(self.shape_error("only one level of related object can be indexed")),
                },
                FieldValue::Many(members) => {
                    let mut values = Vec::with_capacity(members.len());
                    for member in &members {
                        match member.field(attr) {
                            FieldValue::Scalar(value) => values.push(value),
                            FieldValue::List(_) => {
                                return Err(
                                    self.shape_error("only one level of iterable can be indexed")
                                )
                            }
                            _ => {
                                return Err(self
                                    .shape_error("only one level of related object can be indexed"))
                            }
                        }
                    }
                    Ok(values)
                }
                FieldValue::List(_) => {
                    Err(self.shape_error("only one level of iterable can be indexed"))
                }
                FieldValue::Scalar(_) => {
                    Err(self.shape_error(format!("'{}' is not a relation", relation)))
                }
            },
        }
    }

    fn shape_error(&self, reason: impl Into<String>) -> Error {
        Error::configuration(self.to_string(), reason)
    }
}

impl fmt::Display for FieldRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldRef::Attr(attr) => write!(f, "{}", attr),
            FieldRef::Relation { relation, attr } => {
                write!(f, "{}{}{}", relation, FIELD_SEPARATOR, attr)
            }
        }
    }
}

impl FromStr for FieldRef {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        FieldRef::parse(s)
    }
}

impl TryFrom<String> for FieldRef {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        FieldRef::parse(&s)
    }
}

impl From<FieldRef> for String {
    fn from(field: FieldRef) -> Self {
        field.to_string()
    }
}
