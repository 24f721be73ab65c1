//! Indexer: writes and retracts postings for one entity
//!
//! Every term is its own atomic unit: the posting write (or delete) and the
//! matching `GlobalTermCount` update commit together, and a unit that loses
//! a concurrency race is re-run by the `RetryPolicy`.
//!
//! # Writing
//!
//! `create_posting` is create-if-absent. When a concurrent indexer already
//! wrote the posting for a term, the unit commits nothing and the counter
//! is left alone, so racing indexers never double count.
//!
//! # Retracting
//!
//! Each posting is re-read inside its unit, so a posting already removed by
//! a concurrent unindex is skipped. A missing counter is logged and the
//! posting is deleted anyway. A counter driven below zero is logged as an
//! error and still written.

use std::sync::Arc;

use termdex_core::{EntityRef, FieldRef, GlobalTermCount, IndexStore, Posting, Record, Result};
use tracing::{debug, error, info, warn};

use crate::deferred::{IndexJob, JobHandler};
use crate::retry::RetryPolicy;
use crate::tokenizer::{TermBag, TermOccurrence};

/// Outcome of writing an entity's postings
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IndexReport {
    /// Postings created
    pub written: usize,
    /// Terms skipped because the posting already existed
    pub skipped: usize,
}

/// Outcome of retracting an entity's postings
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct UnindexReport {
    /// Postings deleted
    pub removed: usize,
    /// Postings whose counter row was missing
    pub missing_counters: usize,
    /// Counters left below zero
    pub negative_counters: usize,
}

enum Retraction {
    Gone,
    MissingCounter,
    Decremented { remaining: i64 },
}

/// Tokenize every value of `fields` on `record` into one term list
///
/// Counts of a term appearing in several values are summed.
///
/// # Errors
///
/// Returns a configuration error if a field reference does not fit the
/// shape of the record.
pub fn collect_terms(record: &dyn Record, fields: &[FieldRef]) -> Result<Vec<TermOccurrence>> {
    let mut bag = TermBag::new();
    for field in fields {
        for value in field.resolve(record)? {
            if let Some(text) = value.as_text() {
                bag.add_text(&text);
            }
        }
    }
    Ok(bag.into_terms())
}

/// Writes and retracts postings against an `IndexStore`
pub struct Indexer {
    store: Arc<dyn IndexStore>,
    retry: RetryPolicy,
}

impl Indexer {
    /// Create a new indexer
    pub fn new(store: Arc<dyn IndexStore>, retry: RetryPolicy) -> Self {
        Indexer { store, retry }
    }

    /// The backing store
    pub fn store(&self) -> &Arc<dyn IndexStore> {
        &self.store
    }

    /// Retract the entity's postings, then index `fields` afresh
    ///
    /// Fields are resolved before anything is retracted, so a configuration
    /// error leaves the existing postings untouched.
    pub fn reindex(&self, record: &dyn Record, fields: &[FieldRef]) -> Result<IndexReport> {
        let entity = record.entity_ref();
        let terms = match collect_terms(record, fields) {
            Ok(terms) => terms,
            Err(e) => {
                error!(target: "termdex::index", entity = %entity, error = %e, "Cannot index entity");
                return Err(e);
            }
        };
        self.unindex(&entity)?;
        self.write_terms(&entity, &terms)
    }

    /// Write one posting per term and bump the global counters
    pub fn write_terms(&self, entity: &EntityRef, terms: &[TermOccurrence]) -> Result<IndexReport> {
        let mut report = IndexReport::default();
        for occurrence in terms {
            if self.write_term(entity, occurrence)? {
                report.written += 1;
            } else {
                debug!(
                    target: "termdex::index",
                    entity = %entity,
                    term = %occurrence.term,
                    "Posting already present, skipping"
                );
                report.skipped += 1;
            }
        }
        info!(
            target: "termdex::index",
            entity = %entity,
            written = report.written,
            skipped = report.skipped,
            "Indexed entity"
        );
        Ok(report)
    }

    fn write_term(&self, entity: &EntityRef, occurrence: &TermOccurrence) -> Result<bool> {
        let term = occurrence.term.as_str();
        let delta = occurrence.occurrences as i64;
        self.retry.run(term, || {
            let mut created = false;
            self.store.transaction(&mut |txn| {
                created = txn.create_posting(Posting::new(term, entity, occurrence.occurrences))?;
                if !created {
                    return Ok(());
                }
                let current = txn.get_term_count(term)?.map_or(0, |c| c.count);
                txn.put_term_count(GlobalTermCount::new(term, current + delta))
            })?;
            Ok(created)
        })
    }

    /// Retract every posting of `entity`
    ///
    /// Safe to repeat: an entity without postings is a no-op.
    pub fn unindex(&self, entity: &EntityRef) -> Result<UnindexReport> {
        let mut report = UnindexReport::default();
        for posting in self.store.postings_for_entity(entity)? {
            match self.retract(&posting)? {
                Retraction::Gone => {}
                Retraction::MissingCounter => {
                    warn!(
                        target: "termdex::unindex",
                        term = %posting.term,
                        entity = %entity,
                        "A GlobalTermCount for the term does not exist, ignoring"
                    );
                    report.removed += 1;
                    report.missing_counters += 1;
                }
                Retraction::Decremented { remaining } => {
                    if remaining < 0 {
                        error!(
                            target: "termdex::unindex",
                            term = %posting.term,
                            entity = %entity,
                            count = remaining,
                            "GlobalTermCount went negative"
                        );
                        report.negative_counters += 1;
                    }
                    report.removed += 1;
                }
            }
        }
        if report.removed > 0 {
            debug!(
                target: "termdex::unindex",
                entity = %entity,
                removed = report.removed,
                "Unindexed entity"
            );
        }
        Ok(report)
    }

    fn retract(&self, posting: &Posting) -> Result<Retraction> {
        let key = posting.key();
        self.retry.run(&posting.term, || {
            let mut outcome = Retraction::Gone;
            self.store.transaction(&mut |txn| {
                outcome = Retraction::Gone;
                let Some(current) = txn.get_posting(&key)? else {
                    return Ok(());
                };
                outcome = match txn.get_term_count(&current.term)? {
                    Some(counter) => {
                        let remaining = counter.count - current.occurrences as i64;
                        txn.put_term_count(GlobalTermCount::new(current.term.clone(), remaining))?;
                        Retraction::Decremented { remaining }
                    }
                    None => Retraction::MissingCounter,
                };
                txn.delete_posting(&key)
            })?;
            Ok(outcome)
        })
    }

    /// Execute a deferred job: retract, then write the job's terms
    pub fn run_job(&self, job: &IndexJob) -> Result<IndexReport> {
        self.unindex(&job.entity)?;
        self.write_terms(&job.entity, &job.terms)
    }
}

impl JobHandler for Indexer {
    fn handle(&self, job: &IndexJob) -> Result<()> {
        self.run_job(job).map(|_| ())
    }
}
