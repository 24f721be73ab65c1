//! MemoryStore: in-memory index storage with optimistic concurrency
//!
//! This module implements the `IndexStore` contract using:
//! - `BTreeMap<PostingKey, Posting>` ordered term-first, so all postings of
//!   a term for one table are one contiguous range
//! - a secondary index entity → terms for unindexing
//! - `FxHashMap` for counters and per-key versions
//! - `parking_lot::RwLock` for thread-safe access
//! - `AtomicU64` for monotonically increasing commit versions
//!
//! # Design Notes
//!
//! - **Versions survive deletion**: a deleted key keeps its last commit
//!   version, so a unit that read the key before the delete still conflicts.
//! - **Commit under the write lock**: validation and application happen in
//!   one critical section, which makes every unit visible all at once.
//! - **Host scopes**: `scope()` models a host-level transaction for the
//!   calling thread. Callbacks registered through `after_commit` while a
//!   scope is open run only if the scope succeeds.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::thread::{self, ThreadId};

use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use termdex_core::{
    CommitCallback, EntityId, EntityRef, Error, IndexStore, IndexTransaction, Posting,
    PostingKey, Result,
};
use tracing::debug;

use crate::transaction::{validate_read_set, MemoryTransaction, StoreKey};

#[derive(Debug, Default)]
struct IndexState {
    postings: BTreeMap<PostingKey, Posting>,
    by_entity: BTreeMap<EntityRef, BTreeSet<String>>,
    counts: FxHashMap<String, i64>,
    versions: FxHashMap<StoreKey, u64>,
}

impl IndexState {
    fn insert_posting(&mut self, posting: Posting) {
        self.by_entity
            .entry(posting.entity())
            .or_default()
            .insert(posting.term.clone());
        self.postings.insert(posting.key(), posting);
    }

    fn remove_posting(&mut self, key: &PostingKey) {
        if self.postings.remove(key).is_none() {
            return;
        }
        let entity = key.entity();
        if let Some(terms) = self.by_entity.get_mut(&entity) {
            terms.remove(&key.term);
            if terms.is_empty() {
                self.by_entity.remove(&entity);
            }
        }
    }

    fn version_of(&self, key: &StoreKey) -> u64 {
        self.versions.get(key).copied().unwrap_or(0)
    }
}

/// Snapshot of store activity counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreStats {
    /// Units committed
    pub commits: u64,
    /// Units rejected by validation (including injected conflicts)
    pub conflicts: u64,
    /// Highest commit version assigned so far
    pub version: u64,
}

/// In-memory `IndexStore`
///
/// Thread-safe; share it behind an `Arc`.
pub struct MemoryStore {
    state: RwLock<IndexState>,
    version: AtomicU64,
    commits: AtomicU64,
    conflicts: AtomicU64,
    injected_conflicts: AtomicUsize,
    scopes: Mutex<FxHashMap<ThreadId, Vec<CommitCallback>>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Create a new empty store. Initial version is 0.
    pub fn new() -> Self {
        MemoryStore {
            state: RwLock::new(IndexState::default()),
            version: AtomicU64::new(0),
            commits: AtomicU64::new(0),
            conflicts: AtomicU64::new(0),
            injected_conflicts: AtomicUsize::new(0),
            scopes: Mutex::new(FxHashMap::default()),
        }
    }

    /// Make the next `n` commits fail validation
    ///
    /// Simulates contention from writers in other processes.
    pub fn inject_conflicts(&self, n: usize) {
        self.injected_conflicts.fetch_add(n, Ordering::SeqCst);
    }

    /// Activity counters
    pub fn stats(&self) -> StoreStats {
        StoreStats {
            commits: self.commits.load(Ordering::Relaxed),
            conflicts: self.conflicts.load(Ordering::Relaxed),
            version: self.version.load(Ordering::SeqCst),
        }
    }

    /// Every counter row, including zero rows
    pub fn all_term_counts(&self) -> BTreeMap<String, i64> {
        self.state
            .read()
            .counts
            .iter()
            .map(|(term, &count)| (term.clone(), count))
            .collect()
    }

    /// Overwrite a counter outside any unit
    ///
    /// Seeds drift scenarios in tests; the indexer never calls this.
    pub fn set_term_count(&self, term: &str, count: i64) {
        let mut state = self.state.write();
        let version = self.next_version();
        state.counts.insert(term.to_string(), count);
        state.versions.insert(StoreKey::Count(term.to_string()), version);
    }

    /// Remove a counter row outside any unit
    pub fn remove_term_count(&self, term: &str) {
        let mut state = self.state.write();
        let version = self.next_version();
        state.counts.remove(term);
        state.versions.insert(StoreKey::Count(term.to_string()), version);
    }

    /// Run `f` as a host-level transaction scope for the calling thread
    ///
    /// Work registered through `after_commit` inside the scope runs after
    /// `f` returns `Ok`, and is dropped if `f` returns `Err` or panics.
    /// Nested scopes join the outermost one.
    pub fn scope<T>(&self, f: impl FnOnce() -> Result<T>) -> Result<T> {
        let tid = thread::current().id();
        {
            let mut scopes = self.scopes.lock();
            if scopes.contains_key(&tid) {
                drop(scopes);
                return f();
            }
            scopes.insert(tid, Vec::new());
        }

        let guard = ScopeGuard { store: self, tid };
        let result = f();
        let callbacks = self
            .scopes
            .lock()
            .get_mut(&tid)
            .map(std::mem::take)
            .unwrap_or_default();
        drop(guard);

        match &result {
            Ok(_) => {
                for callback in callbacks {
                    callback();
                }
            }
            Err(e) => {
                debug!(
                    target: "termdex::txn",
                    dropped = callbacks.len(),
                    error = %e,
                    "Scope aborted, discarding deferred work"
                );
            }
        }
        result
    }

    pub(crate) fn read_posting(&self, key: &PostingKey) -> (Option<Posting>, u64) {
        let state = self.state.read();
        let version = state.version_of(&StoreKey::Posting(key.clone()));
        (state.postings.get(key).cloned(), version)
    }

    pub(crate) fn read_count(&self, term: &str) -> (Option<i64>, u64) {
        let state = self.state.read();
        let version = state.version_of(&StoreKey::Count(term.to_string()));
        (state.counts.get(term).copied(), version)
    }

    fn next_version(&self) -> u64 {
        self.version.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn take_injected_conflict(&self) -> bool {
        self.injected_conflicts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    /// Validate and apply a unit
    fn commit(&self, txn: MemoryTransaction<'_>) -> Result<()> {
        let MemoryTransaction {
            read_set,
            posting_writes,
            count_writes,
            ..
        } = txn;

        let mut state = self.state.write();

        if self.take_injected_conflict() {
            self.conflicts.fetch_add(1, Ordering::Relaxed);
            return Err(Error::conflict("injected conflict"));
        }

        let validation = validate_read_set(&read_set, &state.versions);
        if !validation.is_valid() {
            self.conflicts.fetch_add(1, Ordering::Relaxed);
            debug!(
                target: "termdex::txn",
                conflicts = validation.conflict_count(),
                "Transaction aborted"
            );
            return Err(Error::conflict(format!(
                "validation failed: {} conflict(s)",
                validation.conflict_count()
            )));
        }

        if !posting_writes.is_empty() || !count_writes.is_empty() {
            let commit_version = self.next_version();
            for (key, write) in posting_writes {
                match write {
                    Some(posting) => state.insert_posting(posting),
                    None => state.remove_posting(&key),
                }
                state.versions.insert(StoreKey::Posting(key), commit_version);
            }
            for (term, count) in count_writes {
                state.counts.insert(term.clone(), count);
                state.versions.insert(StoreKey::Count(term), commit_version);
            }
        }

        self.commits.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

/// Unregisters a host scope even if its body panics
struct ScopeGuard<'a> {
    store: &'a MemoryStore,
    tid: ThreadId,
}

impl Drop for ScopeGuard<'_> {
    fn drop(&mut self) {
        self.store.scopes.lock().remove(&self.tid);
    }
}

impl IndexStore for MemoryStore {
    fn transaction(
        &self,
        f: &mut dyn FnMut(&mut dyn IndexTransaction) -> Result<()>,
    ) -> Result<()> {
        let mut txn = MemoryTransaction::new(self);
        f(&mut txn)?;
        self.commit(txn)
    }

    fn postings_for_entity(&self, entity: &EntityRef) -> Result<Vec<Posting>> {
        let state = self.state.read();
        let Some(terms) = state.by_entity.get(entity) else {
            return Ok(Vec::new());
        };
        Ok(terms
            .iter()
            .filter_map(|term| state.postings.get(&PostingKey::new(term.clone(), entity)))
            .cloned()
            .collect())
    }

    fn postings_for_terms(&self, terms: &[String], table: &str) -> Result<Vec<Posting>> {
        let state = self.state.read();
        let mut seen = BTreeSet::new();
        let mut postings = Vec::new();
        for term in terms {
            if !seen.insert(term.as_str()) {
                continue;
            }
            let start = PostingKey {
                term: term.clone(),
                table: table.to_string(),
                id: EntityId(0),
            };
            let end = PostingKey {
                id: EntityId(u64::MAX),
                ..start.clone()
            };
            postings.extend(state.postings.range(start..=end).map(|(_, p)| p.clone()));
        }
        Ok(postings)
    }

    fn term_counts(&self, terms: &[String]) -> Result<HashMap<String, i64>> {
        let state = self.state.read();
        Ok(terms
            .iter()
            .filter_map(|term| state.counts.get(term).map(|&c| (term.clone(), c)))
            .collect())
    }

    fn posting_count(&self) -> Result<usize> {
        Ok(self.state.read().postings.len())
    }

    fn in_transaction(&self) -> bool {
        self.scopes.lock().contains_key(&thread::current().id())
    }

    fn after_commit(&self, callback: CommitCallback) {
        let tid = thread::current().id();
        {
            let mut scopes = self.scopes.lock();
            if let Some(pending) = scopes.get_mut(&tid) {
                pending.push(callback);
                return;
            }
        }
        callback();
    }
}
