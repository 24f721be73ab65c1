//! Document: a field-map record for hosts without their own record types

use std::collections::BTreeMap;
use std::sync::Arc;

use termdex_core::{EntityRef, FieldValue, Record, Scalar};

/// A record backed by a map of named fields
///
/// Unknown fields read as null.
#[derive(Debug, Clone)]
pub struct Document {
    entity: EntityRef,
    fields: BTreeMap<String, FieldValue>,
}

impl Document {
    /// Create an empty document
    pub fn new(table: impl Into<String>, id: u64) -> Self {
        Document {
            entity: EntityRef::new(table, id),
            fields: BTreeMap::new(),
        }
    }

    /// Builder-style field setter
    pub fn with(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.set(name, value);
        self
    }

    /// Set a list field
    pub fn with_list<I, S>(self, name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Scalar>,
    {
        let list: Vec<Scalar> = values.into_iter().map(Into::into).collect();
        self.with(name, FieldValue::List(list))
    }

    /// Set a one-hop relation
    pub fn with_related(self, name: impl Into<String>, related: Option<Document>) -> Self {
        let related = related.map(|doc| Arc::new(doc) as Arc<dyn Record>);
        self.with(name, FieldValue::One(related))
    }

    /// Set a one-hop collection of related records
    pub fn with_many(self, name: impl Into<String>, related: Vec<Document>) -> Self {
        let related = related
            .into_iter()
            .map(|doc| Arc::new(doc) as Arc<dyn Record>)
            .collect();
        self.with(name, FieldValue::Many(related))
    }

    /// Set or replace a field in place
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<FieldValue>) {
        self.fields.insert(name.into(), value.into());
    }

    /// Raw field lookup
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    /// Identity of this document
    pub fn entity(&self) -> &EntityRef {
        &self.entity
    }

    /// Wrap into a shared record
    pub fn into_record(self) -> Arc<dyn Record> {
        Arc::new(self)
    }
}

impl Record for Document {
    fn entity_ref(&self) -> EntityRef {
        self.entity.clone()
    }

    fn field(&self, name: &str) -> FieldValue {
        self.fields.get(name).cloned().unwrap_or_else(FieldValue::null)
    }
}
