//! View derivation: free-text search plus single-select facets
//!
//! Filtering never refetches and never reorders; the output follows the
//! cache's insertion order. The only sorted view is [`recent_items`].

use crate::core::record::{Item, Record};

/// Free-text query plus at most one selected value per facet dimension
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterState<F> {
    query: String,
    facets: Vec<(F, String)>,
}

impl<F> Default for FilterState<F> {
    fn default() -> Self {
        Self {
            query: String::new(),
            facets: Vec::new(),
        }
    }
}

impl<F: Copy + Eq> FilterState<F> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`FilterState::set_query`]
    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.set_query(query);
        self
    }

    /// Builder form of [`FilterState::set_facet`]
    pub fn with_facet(mut self, facet: F, value: impl Into<String>) -> Self {
        self.set_facet(facet, value);
        self
    }

    pub fn set_query(&mut self, query: impl Into<String>) {
        self.query = query.into();
    }

    /// Select a facet value, replacing any previous selection; empty means "show all"
    pub fn set_facet(&mut self, facet: F, value: impl Into<String>) {
        let value = value.into();
        self.facets.retain(|(f, _)| *f != facet);
        if !value.is_empty() {
            self.facets.push((facet, value));
        }
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn selected(&self, facet: F) -> Option<&str> {
        self.facets
            .iter()
            .find(|(f, _)| *f == facet)
            .map(|(_, v)| v.as_str())
    }

    /// True when the filter admits every record
    pub fn is_unconstrained(&self) -> bool {
        self.query.is_empty() && self.facets.is_empty()
    }
}

/// Whether a single record passes the filter
pub fn matches<R: Record>(record: &R, filter: &FilterState<R::Facet>) -> bool {
    let text_ok = filter.query.is_empty() || {
        let needle = filter.query.to_lowercase();
        record
            .search_candidates()
            .iter()
            .any(|candidate| candidate.to_lowercase().contains(&needle))
    };

    text_ok
        && filter
            .facets
            .iter()
            .all(|(facet, wanted)| record.facet_value(*facet).is_some_and(|v| v == wanted.as_str()))
}

/// The visible subset of `records`, in cache order
pub fn derive<'a, R: Record>(records: &'a [R], filter: &FilterState<R::Facet>) -> Vec<&'a R> {
    records.iter().filter(|r| matches(*r, filter)).collect()
}

/// The `limit` most recent items, newest first
///
/// Ties keep cache order.
pub fn recent_items(items: &[Item], limit: usize) -> Vec<&Item> {
    let mut sorted: Vec<&Item> = items.iter().collect();
    sorted.sort_by_key(|item| std::cmp::Reverse(item.effective_timestamp()));
    sorted.truncate(limit);
    sorted
}
