//! Entity lifecycle hooks
//!
//! The host reports record changes through `EntityObserver`. `ChangeHook`
//! looks up the indexable fields declared for the record's table in the
//! `SearchRegistry` and indexes or unindexes accordingly. Tables without a
//! declaration are ignored.

use std::sync::Arc;

use dashmap::DashMap;
use termdex_core::{EntityRef, FieldRef, Record, Result};
use tracing::debug;

use crate::engine::SearchEngine;

/// Indexable fields per table
#[derive(Debug, Default)]
pub struct SearchRegistry {
    tables: DashMap<String, Vec<FieldRef>>,
}

impl SearchRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and declare the indexable fields of `table`, replacing any
    /// earlier declaration
    ///
    /// # Errors
    ///
    /// A configuration error if any reference is malformed; the registry is
    /// left unchanged in that case.
    pub fn register<I, S>(&self, table: &str, fields: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let parsed = FieldRef::parse_all(fields)?;
        self.register_fields(table, parsed);
        Ok(())
    }

    /// Declare already-parsed fields for `table`
    pub fn register_fields(&self, table: &str, fields: Vec<FieldRef>) {
        self.tables.insert(table.to_string(), fields);
    }

    /// Remove the declaration of `table`
    pub fn unregister(&self, table: &str) -> bool {
        self.tables.remove(table).is_some()
    }

    /// Fields declared for `table`; `None` if undeclared or empty
    pub fn fields_for(&self, table: &str) -> Option<Vec<FieldRef>> {
        self.tables
            .get(table)
            .map(|fields| fields.value().clone())
            .filter(|fields| !fields.is_empty())
    }
}

/// Receives record lifecycle events from the host
///
/// Call these at commit time of the host's own write.
pub trait EntityObserver: Send + Sync {
    /// A record was created or updated
    ///
    /// `is_raw_load` marks bulk or fixture loading, which indexes
    /// synchronously.
    fn on_entity_saved(&self, record: &dyn Record, is_create: bool, is_raw_load: bool)
        -> Result<()>;

    /// A record is being deleted
    fn on_entity_deleted(&self, entity: &EntityRef) -> Result<()>;
}

/// Observer that keeps a `SearchEngine` in sync with host records
pub struct ChangeHook {
    engine: Arc<SearchEngine>,
}

impl ChangeHook {
    /// Create a hook feeding `engine`
    pub fn new(engine: Arc<SearchEngine>) -> Self {
        ChangeHook { engine }
    }
}

impl EntityObserver for ChangeHook {
    fn on_entity_saved(
        &self,
        record: &dyn Record,
        is_create: bool,
        is_raw_load: bool,
    ) -> Result<()> {
        let entity = record.entity_ref();
        let Some(fields) = self.engine.registry().fields_for(&entity.table) else {
            return Ok(());
        };
        debug!(
            target: "termdex::hook",
            entity = %entity,
            is_create,
            is_raw_load,
            "Entity saved"
        );
        self.engine.index(record, &fields, !is_raw_load)
    }

    fn on_entity_deleted(&self, entity: &EntityRef) -> Result<()> {
        if self.engine.registry().fields_for(&entity.table).is_none() {
            return Ok(());
        }
        debug!(target: "termdex::hook", entity = %entity, "Entity deleted");
        self.engine.unindex(entity)?;
        Ok(())
    }
}
