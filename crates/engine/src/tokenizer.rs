//! Text tokenizer for indexing and querying
//!
//! Pipeline: lowercase → split on whitespace → every window of 1..=4
//!           adjacent words → join with single spaces → count matches
//!
//! Occurrence counts are non-overlapping substring matches of the term in
//! the lowercased source, so "ana" is counted inside "banana" and a term
//! spanning a double space counts zero.

use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use termdex_core::{Error, Result};

/// Longest n-gram, in words
pub const MAX_NGRAM: usize = 4;

/// A term and how often it occurs in one text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermOccurrence {
    /// Normalized term
    pub term: String,
    /// Non-overlapping substring matches in the lowercased source
    pub occurrences: u64,
}

/// Every n-gram window of `text`, in source order, duplicates included.
///
/// # Example
///
/// ```
/// use termdex_engine::tokenizer::ngrams;
///
/// assert_eq!(ngrams("Red Fox"), vec!["red", "red fox", "fox"]);
/// ```
pub fn ngrams(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    let words: Vec<&str> = lower.split_whitespace().collect();
    let mut terms = Vec::new();
    for start in 0..words.len() {
        for len in 1..=MAX_NGRAM {
            let Some(window) = words.get(start..start + len) else {
                break;
            };
            let term = window.join(" ");
            if !term.trim().is_empty() {
                terms.push(term);
            }
        }
    }
    terms
}

/// Non-overlapping matches of `term` in `haystack` (both already lowercased)
pub fn count_occurrences(haystack: &str, term: &str) -> u64 {
    if term.is_empty() {
        return 0;
    }
    haystack.matches(term).count() as u64
}

/// Distinct terms of `text` with their counts, in first-seen order.
pub fn tokenize(text: &str) -> Vec<TermOccurrence> {
    let lower = text.to_lowercase();
    let mut seen = FxHashSet::default();
    let mut terms = Vec::new();
    for term in ngrams(text) {
        if seen.insert(term.clone()) {
            let occurrences = count_occurrences(&lower, &term);
            terms.push(TermOccurrence { term, occurrences });
        }
    }
    terms
}

/// Accumulates term counts over several texts of one entity
///
/// Counts of a term seen in more than one text are summed; iteration
/// follows first-seen order.
#[derive(Debug, Default, Clone)]
pub struct TermBag {
    positions: FxHashMap<String, usize>,
    terms: Vec<TermOccurrence>,
}

impl TermBag {
    /// Create an empty bag
    pub fn new() -> Self {
        Self::default()
    }

    /// Tokenize `text` and add its counts
    pub fn add_text(&mut self, text: &str) {
        for occurrence in tokenize(text) {
            self.add(occurrence);
        }
    }

    /// Add one term count
    pub fn add(&mut self, occurrence: TermOccurrence) {
        match self.positions.get(&occurrence.term) {
            Some(&pos) => self.terms[pos].occurrences += occurrence.occurrences,
            None => {
                self.positions.insert(occurrence.term.clone(), self.terms.len());
                self.terms.push(occurrence);
            }
        }
    }

    /// Number of distinct terms
    pub fn len(&self) -> usize {
        self.terms.len()
    }

    /// True if no term was added
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Consume into the ordered term list
    pub fn into_terms(self) -> Vec<TermOccurrence> {
        self.terms
    }
}

/// Split a query string into lowercased terms, shell-style.
///
/// Quoted phrases become a single term. Empty terms are dropped. `#` is an
/// ordinary character, so `#rust` is a term rather than a comment.
///
/// # Errors
///
/// Returns `Error::InvalidInput` for unbalanced quotes or a dangling escape.
pub fn parse_query(query: &str) -> Result<Vec<String>> {
    let lower = escape_comment_marks(&query.to_lowercase());
    let terms = shlex::split(&lower)
        .ok_or_else(|| Error::invalid_input(format!("unbalanced quoting in query: {}", query)))?;
    Ok(terms.into_iter().filter(|t| !t.is_empty()).collect())
}

/// Backslash-escape every unquoted `#` that starts a word
///
/// `shlex` always treats such a `#` as the start of a comment.
fn escape_comment_marks(query: &str) -> String {
    #[derive(Clone, Copy, PartialEq)]
    enum Quote {
        None,
        Single,
        Double,
    }

    let mut out = String::with_capacity(query.len());
    let mut quote = Quote::None;
    let mut escaped = false;
    let mut word_start = true;
    for ch in query.chars() {
        if escaped {
            escaped = false;
            out.push(ch);
            word_start = false;
            continue;
        }
        match (quote, ch) {
            (Quote::None, '#') if word_start => out.push_str("\\#"),
            (Quote::None, '\\') | (Quote::Double, '\\') => {
                escaped = true;
                out.push(ch);
            }
            (Quote::None, '\'') => {
                quote = Quote::Single;
                out.push(ch);
            }
            (Quote::None, '"') => {
                quote = Quote::Double;
                out.push(ch);
            }
            (Quote::Single, '\'') | (Quote::Double, '"') => {
                quote = Quote::None;
                out.push(ch);
            }
            _ => out.push(ch),
        }
        word_start = quote == Quote::None && ch.is_whitespace();
    }
    out
}
