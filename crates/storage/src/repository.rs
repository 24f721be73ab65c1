//! MemoryRepository: in-memory `EntityRepository`

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;
use termdex_core::{EntityId, EntityRef, EntityRepository, EqualityFilter, Record, Result};

use crate::document::Document;

/// Host records held in memory, keyed by identity
#[derive(Default)]
pub struct MemoryRepository {
    records: RwLock<BTreeMap<EntityRef, Arc<dyn Record>>>,
}

impl MemoryRepository {
    /// Create an empty repository
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a record, returning the previous one
    pub fn insert(&self, record: Arc<dyn Record>) -> Option<Arc<dyn Record>> {
        self.records.write().insert(record.entity_ref(), record)
    }

    /// Insert a document and hand back the shared record
    pub fn insert_document(&self, doc: Document) -> Arc<dyn Record> {
        let record = doc.into_record();
        self.insert(Arc::clone(&record));
        record
    }

    /// Remove a record
    pub fn remove(&self, entity: &EntityRef) -> Option<Arc<dyn Record>> {
        self.records.write().remove(entity)
    }

    /// Number of stored records
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// True if no records are stored
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

impl EntityRepository for MemoryRepository {
    fn load(&self, entity: &EntityRef) -> Result<Option<Arc<dyn Record>>> {
        Ok(self.records.read().get(entity).cloned())
    }

    fn fetch(
        &self,
        table: &str,
        ids: &[EntityId],
        filters: &[EqualityFilter],
    ) -> Result<Vec<Arc<dyn Record>>> {
        let records = self.records.read();
        Ok(ids
            .iter()
            .filter_map(|&id| records.get(&EntityRef::from_parts(table, id)))
            .filter(|record| filters.iter().all(|f| f.matches(record.as_ref())))
            .cloned()
            .collect())
    }
}
