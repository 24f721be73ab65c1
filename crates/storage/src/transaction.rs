//! Transaction context for OCC
//!
//! `MemoryTransaction` tracks every read (with the version observed) and
//! buffers every write of one atomic unit. At commit time the read set is
//! validated against the store:
//!
//! - First-committer-wins based on the READ-SET
//! - Absent keys are read at version 0, so two units racing to create the
//!   same posting or counter conflict with each other
//! - Blind writes (write without read) do NOT conflict

use std::collections::BTreeMap;

use rustc_hash::FxHashMap;
use termdex_core::{GlobalTermCount, IndexTransaction, Posting, PostingKey, Result};

use crate::memory::MemoryStore;

/// Key of any record kind held by the store
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StoreKey {
    /// A posting
    Posting(PostingKey),
    /// A global term counter
    Count(String),
}

/// A conflict found while validating a read set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictType {
    /// The key that changed
    pub key: StoreKey,
    /// Version recorded when the unit read the key
    pub read_version: u64,
    /// Version in storage at validation time
    pub current_version: u64,
}

/// Result of transaction validation
///
/// A unit commits only if `is_valid()` returns true.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    /// All conflicts detected during validation
    pub conflicts: Vec<ConflictType>,
}

impl ValidationResult {
    /// Check if validation passed (no conflicts)
    pub fn is_valid(&self) -> bool {
        self.conflicts.is_empty()
    }

    /// Get the number of conflicts
    pub fn conflict_count(&self) -> usize {
        self.conflicts.len()
    }
}

/// Validate a read set against the versions currently stored
pub fn validate_read_set(
    read_set: &FxHashMap<StoreKey, u64>,
    versions: &FxHashMap<StoreKey, u64>,
) -> ValidationResult {
    let conflicts = read_set
        .iter()
        .filter_map(|(key, &read_version)| {
            let current_version = versions.get(key).copied().unwrap_or(0);
            (current_version != read_version).then(|| ConflictType {
                key: key.clone(),
                read_version,
                current_version,
            })
        })
        .collect();
    ValidationResult { conflicts }
}

/// Buffered state of one atomic unit against a `MemoryStore`
pub struct MemoryTransaction<'a> {
    store: &'a MemoryStore,
    pub(crate) read_set: FxHashMap<StoreKey, u64>,
    /// `None` marks a delete
    pub(crate) posting_writes: BTreeMap<PostingKey, Option<Posting>>,
    pub(crate) count_writes: FxHashMap<String, i64>,
}

impl<'a> MemoryTransaction<'a> {
    pub(crate) fn new(store: &'a MemoryStore) -> Self {
        MemoryTransaction {
            store,
            read_set: FxHashMap::default(),
            posting_writes: BTreeMap::new(),
            count_writes: FxHashMap::default(),
        }
    }

    /// Number of keys read so far
    pub fn read_count(&self) -> usize {
        self.read_set.len()
    }

    /// Number of buffered writes (puts and deletes)
    pub fn write_count(&self) -> usize {
        self.posting_writes.len() + self.count_writes.len()
    }

    /// Record the first version seen for `key`; later reads keep it
    fn track(&mut self, key: StoreKey, version: u64) {
        self.read_set.entry(key).or_insert(version);
    }
}

impl IndexTransaction for MemoryTransaction<'_> {
    fn get_posting(&mut self, key: &PostingKey) -> Result<Option<Posting>> {
        if let Some(buffered) = self.posting_writes.get(key) {
            return Ok(buffered.clone());
        }
        let (posting, version) = self.store.read_posting(key);
        self.track(StoreKey::Posting(key.clone()), version);
        Ok(posting)
    }

    fn create_posting(&mut self, posting: Posting) -> Result<bool> {
        let key = posting.key();
        if self.get_posting(&key)?.is_some() {
            return Ok(false);
        }
        self.posting_writes.insert(key, Some(posting));
        Ok(true)
    }

    fn delete_posting(&mut self, key: &PostingKey) -> Result<()> {
        self.posting_writes.insert(key.clone(), None);
        Ok(())
    }

    fn get_term_count(&mut self, term: &str) -> Result<Option<GlobalTermCount>> {
        if let Some(&count) = self.count_writes.get(term) {
            return Ok(Some(GlobalTermCount::new(term, count)));
        }
        let (count, version) = self.store.read_count(term);
        self.track(StoreKey::Count(term.to_string()), version);
        Ok(count.map(|c| GlobalTermCount::new(term, c)))
    }

    fn put_term_count(&mut self, count: GlobalTermCount) -> Result<()> {
        self.count_writes.insert(count.term, count.count);
        Ok(())
    }
}
