use std::collections::{HashMap, HashSet};

use crate::Item;

/// How to order search results. `Relevance` is the default and sorts by
/// descending score; the others sort by the named field.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SortField {
    #[default]
    Relevance,
    Text,
    Weight,
    Index,
}

#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SearchOptions {
    pub limit: usize,
    pub offset: usize,
    pub sort: SortField,
    pub descending: bool,
    /// Enables the character-set similarity fallback when exact/substring
    /// matching underfills the result quota.
    pub fuzzy: bool,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            limit: 50,
            offset: 0,
            sort: SortField::Relevance,
            descending: true,
            fuzzy: true,
        }
    }
}

#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SearchHit {
    pub item: Item,
    pub score: f64,
}

#[derive(Clone, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SearchResults {
    pub hits: Vec<SearchHit>,
    /// Candidates matched before pagination.
    pub total_matched: usize,
    /// Whether every chunk of the dataset had been indexed when the query
    /// completed.
    pub exhaustive: bool,
}

/// Inverted index mapping normalized term → postings.
///
/// Built incrementally as chunks load; never recomputed from scratch. A
/// posting's contribution reflects which field the term came from (text >
/// description > tags) and participates in relevance accumulation for
/// multi-token queries.
#[derive(Clone, Debug, Default)]
pub struct SearchIndex {
    terms: HashMap<String, Vec<Posting>>,
    indexed_items: usize,
}

#[derive(Clone, Copy, Debug)]
struct Posting {
    item: usize,
    contribution: f32,
}

impl SearchIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn term_count(&self) -> usize {
        self.terms.len()
    }

    pub fn indexed_items(&self) -> usize {
        self.indexed_items
    }

    pub fn index_item(&mut self, item: &Item) {
        for term in tokenize(&item.text) {
            self.post(term, item.index, 1.0);
        }
        if let Some(desc) = &item.description {
            for term in tokenize(desc) {
                self.post(term, item.index, 0.5);
            }
        }
        for tag in &item.tags {
            for term in tokenize(tag) {
                self.post(term, item.index, 0.4);
            }
        }
        self.indexed_items += 1;
    }

    fn post(&mut self, term: String, item: usize, contribution: f32) {
        let postings = self.terms.entry(term).or_default();
        // An item usually contributes a term once; keep the strongest field.
        if let Some(p) = postings.iter_mut().rev().find(|p| p.item == item) {
            p.contribution = p.contribution.max(contribution);
            return;
        }
        postings.push(Posting { item, contribution });
    }

    /// Candidate item indices for the query tokens. Terms match by prefix so
    /// that incremental typing narrows rather than empties the candidate set.
    pub fn candidates(&self, tokens: &[String]) -> HashSet<usize> {
        let mut out = HashSet::new();
        for token in tokens {
            for (term, postings) in &self.terms {
                if term.starts_with(token.as_str()) {
                    out.extend(postings.iter().map(|p| p.item));
                }
            }
        }
        out
    }
}

/// Lowercased alphanumeric terms.
pub(crate) fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .collect()
}

/// Relevance score for `item` against `query`.
///
/// Exact text match > prefix > substring > description/tag match, with a
/// small weight-based tiebreaker. Returns 0.0 when nothing matches.
pub(crate) fn score_item(item: &Item, query: &str, tokens: &[String]) -> f64 {
    let text = item.text.to_lowercase();
    let q = query.trim().to_lowercase();

    let mut score = if text == q {
        100.0
    } else if text.starts_with(&q) {
        60.0
    } else if text.contains(&q) {
        40.0
    } else {
        let mut s = 0.0;
        for token in tokens {
            if text.contains(token.as_str()) {
                s += 25.0;
                continue;
            }
            if let Some(desc) = &item.description {
                if desc.to_lowercase().contains(token.as_str()) {
                    s += 15.0;
                    continue;
                }
            }
            if item
                .tags
                .iter()
                .any(|t| t.to_lowercase().contains(token.as_str()))
            {
                s += 10.0;
            }
        }
        s
    };

    if score > 0.0 {
        score += item.weight * 0.01;
    }
    score
}

/// Character-set similarity (Jaccard index over lowercased alphanumeric
/// characters). Used as a fuzzy fallback for typos like "aple" → "apple".
pub(crate) fn char_set_similarity(a: &str, b: &str) -> f64 {
    let set_a: HashSet<char> = a
        .chars()
        .filter(|c| c.is_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect();
    let set_b: HashSet<char> = b
        .chars()
        .filter(|c| c.is_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect();
    if set_a.is_empty() || set_b.is_empty() {
        return 0.0;
    }
    let intersection = set_a.intersection(&set_b).count();
    let union = set_a.union(&set_b).count();
    intersection as f64 / union as f64
}

/// Fuzzy score for an item that failed exact matching, or `None` when the
/// similarity is below the acceptance threshold.
pub(crate) fn fuzzy_score(item: &Item, query: &str, threshold: f64) -> Option<f64> {
    let sim = char_set_similarity(&item.text, query);
    if sim >= threshold {
        Some(20.0 * sim + item.weight * 0.01)
    } else {
        None
    }
}

/// Orders `hits` per the requested sort, then paginates with offset/limit.
pub(crate) fn sort_and_paginate(
    mut hits: Vec<SearchHit>,
    opts: &SearchOptions,
) -> (Vec<SearchHit>, usize) {
    let total = hits.len();
    match opts.sort {
        SortField::Relevance => {
            hits.sort_by(|a, b| b.score.total_cmp(&a.score).then(a.item.index.cmp(&b.item.index)));
            if !opts.descending {
                hits.reverse();
            }
        }
        SortField::Text => {
            hits.sort_by(|a, b| a.item.text.cmp(&b.item.text));
            if opts.descending {
                hits.reverse();
            }
        }
        SortField::Weight => {
            hits.sort_by(|a, b| a.item.weight.total_cmp(&b.item.weight));
            if opts.descending {
                hits.reverse();
            }
        }
        SortField::Index => {
            hits.sort_by_key(|h| h.item.index);
            if opts.descending {
                hits.reverse();
            }
        }
    }
    let page = hits
        .into_iter()
        .skip(opts.offset)
        .take(opts.limit)
        .collect();
    (page, total)
}
