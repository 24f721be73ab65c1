//! Persistence contract for the index
//!
//! The index lives in two record kinds, postings and global term counts,
//! owned by whatever storage backend the host provides. These traits are
//! the whole surface the engine needs from it:
//!
//! - `IndexStore`: read paths for queries, plus atomic units for writers
//! - `IndexTransaction`: the operations available inside one atomic unit
//!
//! Thread safety: all methods must be callable concurrently from multiple
//! threads (requires Send + Sync).

use std::collections::HashMap;

use crate::error::Result;
use crate::posting::{GlobalTermCount, Posting, PostingKey};
use crate::record::EntityRef;

/// Callback run once the enclosing transaction commits
pub type CommitCallback = Box<dyn FnOnce() + Send + 'static>;

/// Operations available inside one atomic unit
///
/// Reads observe the unit's own uncommitted writes. Nothing becomes
/// visible to other readers until the unit commits, and then everything
/// does at once.
pub trait IndexTransaction {
    /// Read a posting
    fn get_posting(&mut self, key: &PostingKey) -> Result<Option<Posting>>;

    /// Create a posting unless one with the same key already exists
    ///
    /// Returns `true` if the posting was created, `false` if an existing
    /// posting was left untouched.
    fn create_posting(&mut self, posting: Posting) -> Result<bool>;

    /// Delete a posting (no-op if absent)
    fn delete_posting(&mut self, key: &PostingKey) -> Result<()>;

    /// Read a global term count
    fn get_term_count(&mut self, term: &str) -> Result<Option<GlobalTermCount>>;

    /// Insert or overwrite a global term count
    fn put_term_count(&mut self, count: GlobalTermCount) -> Result<()>;
}

/// Storage backend holding postings and global term counts
pub trait IndexStore: Send + Sync {
    /// Run `f` as one atomic unit
    ///
    /// If `f` returns an error the unit is discarded and the error returned.
    /// If `f` succeeds but a concurrent writer invalidated what it read,
    /// the unit is discarded and `Error::TransactionAborted` is returned;
    /// the caller may run `f` again.
    fn transaction(
        &self,
        f: &mut dyn FnMut(&mut dyn IndexTransaction) -> Result<()>,
    ) -> Result<()>;

    /// Every posting owned by `entity`
    fn postings_for_entity(&self, entity: &EntityRef) -> Result<Vec<Posting>>;

    /// Every posting of `table` whose term is in `terms`
    fn postings_for_terms(&self, terms: &[String], table: &str) -> Result<Vec<Posting>>;

    /// Global counts of the given terms; absent terms are omitted
    fn term_counts(&self, terms: &[String]) -> Result<HashMap<String, i64>>;

    /// Global count of one term
    fn term_count(&self, term: &str) -> Result<Option<i64>> {
        let mut counts = self.term_counts(&[term.to_string()])?;
        Ok(counts.remove(term))
    }

    /// Total number of live postings
    fn posting_count(&self) -> Result<usize>;

    /// Whether the calling thread is inside a host-level transaction scope
    fn in_transaction(&self) -> bool {
        false
    }

    /// Defer `callback` until the calling thread's host-level transaction
    /// commits; it is dropped if that transaction aborts. Outside a
    /// transaction scope the callback runs immediately.
    fn after_commit(&self, callback: CommitCallback) {
        callback()
    }
}
