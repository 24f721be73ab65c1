//! Query evaluation and ranking
//!
//! A query is split shell-style into terms. Every posting of a query term
//! in the requested table contributes the term's global count to its
//! entity; an entity's score is
//!
//! ```text
//! sum(counts) / (n + (n - 1) * 0.5)      n = matched terms
//! ```
//!
//! Lower scores rank first: rare terms weigh more than common ones, and
//! matching several terms helps without letting a pile of common terms
//! outrank one rare hit.

use std::collections::HashMap;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use termdex_core::{
    EntityId, EntityRepository, EqualityFilter, IndexStore, Posting, Record, Result, Scalar,
};
use tracing::{debug, warn};

use crate::tokenizer::parse_query;

/// Results per page when none is given
pub const DEFAULT_PER_PAGE: usize = 50;
/// Number of pages ranked when none is given
pub const DEFAULT_TOTAL_PAGES: usize = 10;

/// A ranked query against one table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchRequest {
    /// Table whose entities are searched
    pub table: String,
    /// Raw query string
    pub query: String,
    /// Page size
    pub per_page: usize,
    /// 1-based page number
    pub current_page: usize,
    /// Only the first `total_pages * per_page` ranked entities are kept
    pub total_pages: usize,
    /// Equality filters intersected with the ranked candidates
    pub filters: Vec<EqualityFilter>,
}

impl SearchRequest {
    /// Query `table` with default paging and no filters
    pub fn new(table: impl Into<String>, query: impl Into<String>) -> Self {
        SearchRequest {
            table: table.into(),
            query: query.into(),
            per_page: DEFAULT_PER_PAGE,
            current_page: 1,
            total_pages: DEFAULT_TOTAL_PAGES,
            filters: Vec::new(),
        }
    }

    /// Set the page size
    pub fn per_page(mut self, per_page: usize) -> Self {
        self.per_page = per_page;
        self
    }

    /// Set the 1-based page number
    pub fn page(mut self, current_page: usize) -> Self {
        self.current_page = current_page;
        self
    }

    /// Set the number of ranked pages
    pub fn total_pages(mut self, total_pages: usize) -> Self {
        self.total_pages = total_pages;
        self
    }

    /// Add an equality filter
    pub fn filter(mut self, attr: impl Into<String>, value: impl Into<Scalar>) -> Self {
        self.filters.push(EqualityFilter::new(attr, value));
        self
    }
}

/// One ranked entity
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredEntity {
    /// Entity id within the searched table
    pub id: EntityId,
    /// Ranking score, lower is better
    pub score: f64,
    /// Number of matched query terms
    pub matched: usize,
}

/// Score of an entity from the global counts of its matched terms
pub fn score(counts: &[i64]) -> f64 {
    if counts.is_empty() {
        return 0.0;
    }
    let n = counts.len() as f64;
    let sum: i64 = counts.iter().sum();
    sum as f64 / (n + (n - 1.0) * 0.5)
}

/// Group postings by entity and rank them, best first
///
/// Postings whose term has no entry in `counts` are ignored. Ties keep
/// ascending id order.
pub fn rank(postings: &[Posting], counts: &HashMap<String, i64>) -> Vec<ScoredEntity> {
    let mut positions: FxHashMap<EntityId, usize> = FxHashMap::default();
    let mut grouped: Vec<(EntityId, Vec<i64>)> = Vec::new();

    for posting in postings {
        let Some(&count) = counts.get(&posting.term) else {
            warn!(
                target: "termdex::search",
                term = %posting.term,
                "Posting without a GlobalTermCount, ignoring"
            );
            continue;
        };
        let pos = *positions.entry(posting.entity_id).or_insert_with(|| {
            grouped.push((posting.entity_id, Vec::new()));
            grouped.len() - 1
        });
        grouped[pos].1.push(count);
    }

    let mut ranked: Vec<ScoredEntity> = grouped
        .into_iter()
        .map(|(id, counts)| ScoredEntity {
            id,
            score: score(&counts),
            matched: counts.len(),
        })
        .collect();
    ranked.sort_by(|a, b| a.score.total_cmp(&b.score).then(a.id.cmp(&b.id)));
    ranked
}

/// Cut the ranked list to `total_pages * per_page` and return one page
///
/// `current_page` is 1-based; page 0 and pages past the end are empty.
pub fn paginate(
    ranked: &[ScoredEntity],
    per_page: usize,
    current_page: usize,
    total_pages: usize,
) -> &[ScoredEntity] {
    if current_page == 0 {
        return &[];
    }
    let limit = ranked.len().min(total_pages.saturating_mul(per_page));
    let offset = current_page.saturating_sub(1).saturating_mul(per_page);
    if offset >= limit {
        return &[];
    }
    let end = limit.min(offset.saturating_add(per_page));
    &ranked[offset..end]
}

/// Read-only query evaluation
pub struct Searcher {
    store: Arc<dyn IndexStore>,
    repository: Arc<dyn EntityRepository>,
}

impl Searcher {
    /// Create a new searcher
    pub fn new(store: Arc<dyn IndexStore>, repository: Arc<dyn EntityRepository>) -> Self {
        Searcher { store, repository }
    }

    /// Ranked page of `request`, before filters and record resolution
    ///
    /// # Errors
    ///
    /// `InvalidInput` for unbalanced quotes.
    pub fn rank(&self, request: &SearchRequest) -> Result<Vec<ScoredEntity>> {
        let terms = parse_query(&request.query)?;
        if terms.is_empty() {
            return Ok(Vec::new());
        }

        let counts = self.store.term_counts(&terms)?;
        let postings = self.store.postings_for_terms(&terms, &request.table)?;
        let ranked = rank(&postings, &counts);
        let page = paginate(
            &ranked,
            request.per_page,
            request.current_page,
            request.total_pages,
        );

        debug!(
            target: "termdex::search",
            table = %request.table,
            terms = terms.len(),
            postings = postings.len(),
            candidates = ranked.len(),
            page = page.len(),
            "Ranked query"
        );
        Ok(page.to_vec())
    }

    /// Records of the requested page, in rank order
    ///
    /// Entities failing a filter or no longer present are dropped.
    pub fn search(&self, request: &SearchRequest) -> Result<Vec<Arc<dyn Record>>> {
        let page = self.rank(request)?;
        if page.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<EntityId> = page.iter().map(|s| s.id).collect();
        let order: FxHashMap<EntityId, usize> =
            ids.iter().enumerate().map(|(pos, &id)| (id, pos)).collect();

        let mut slots: Vec<Option<Arc<dyn Record>>> = vec![None; ids.len()];
        for record in self
            .repository
            .fetch(&request.table, &ids, &request.filters)?
        {
            if let Some(&pos) = order.get(&record.entity_ref().id) {
                slots[pos] = Some(record);
            }
        }
        Ok(slots.into_iter().flatten().collect())
    }
}
