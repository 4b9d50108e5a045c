#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Token-based blocking index over the candidate (contemporary) side.
//!
//! Blocking restricts fuzzy comparison to records sharing at least one
//! query token: an inverted index maps street tokens (and, as a
//! fallback, name tokens) to posting lists of record ids. Locality and
//! town values are kept per record for optional exact-match filtering.
//!
//! Built once per matching pass and treated as an immutable read-only
//! snapshot for the remainder of that pass.

use std::collections::{BTreeMap, BTreeSet};

use placelink_models::{AddressCollection, RecordId};
use placelink_tokenize::TokenSet;

/// Optional exact-match constraints applied to street-token candidates.
///
/// A filter field only constrains the result when the query side carries
/// a value for it; the name-token fallback ignores filters entirely.
#[derive(Debug, Clone, Copy, Default)]
pub struct CandidateFilter<'a> {
    /// Require candidate locality to equal this value.
    pub locality: Option<&'a str>,
    /// Require candidate town to equal this value.
    pub town: Option<&'a str>,
}

/// Inverted index from tokens to candidate record ids.
#[derive(Debug, Default)]
pub struct BlockingIndex {
    street: BTreeMap<String, Vec<RecordId>>,
    name: BTreeMap<String, Vec<RecordId>>,
    locality: BTreeMap<RecordId, String>,
    town: BTreeMap<RecordId, String>,
}

impl BlockingIndex {
    /// Builds the index over a collection's street and name fields.
    #[must_use]
    pub fn build(collection: &AddressCollection) -> Self {
        let mut index = Self::default();
        for record in collection {
            if let Some(street) = record.street.as_deref() {
                for token in dedup_tokens(street) {
                    index
                        .street
                        .entry(token.to_string())
                        .or_default()
                        .push(record.id);
                }
            }
            if let Some(name) = record.name.as_deref() {
                for token in dedup_tokens(name) {
                    index
                        .name
                        .entry(token.to_string())
                        .or_default()
                        .push(record.id);
                }
            }
            if let Some(locality) = record.locality.as_deref() {
                if !locality.is_empty() {
                    index.locality.insert(record.id, locality.to_string());
                }
            }
            if let Some(town) = record.town.as_deref() {
                if !town.is_empty() {
                    index.town.insert(record.id, town.to_string());
                }
            }
        }
        log::debug!(
            "blocking index: {} street tokens, {} name tokens over {} records",
            index.street.len(),
            index.name.len(),
            collection.len()
        );
        index
    }

    /// Candidate record ids for a query token set.
    ///
    /// The union of street postings for all tokens not in `exclude`,
    /// intersected with the locality/town equality constraints of
    /// `filter`. When the street query yields nothing, falls back to
    /// the union of name postings (unfiltered). An empty result is a
    /// valid outcome, not an error.
    #[must_use]
    pub fn candidates(
        &self,
        tokens: &TokenSet,
        exclude: &BTreeSet<String>,
        filter: &CandidateFilter<'_>,
    ) -> BTreeSet<RecordId> {
        let mut ids = self.union_postings(&self.street, tokens, exclude);
        ids.retain(|id| self.passes_filter(*id, filter));

        if ids.is_empty() {
            ids = self.union_postings(&self.name, tokens, exclude);
        }

        ids
    }

    fn union_postings(
        &self,
        postings: &BTreeMap<String, Vec<RecordId>>,
        tokens: &TokenSet,
        exclude: &BTreeSet<String>,
    ) -> BTreeSet<RecordId> {
        let mut ids = BTreeSet::new();
        for token in tokens.iter() {
            if token.is_empty() || exclude.contains(token) {
                continue;
            }
            if let Some(list) = postings.get(token) {
                ids.extend(list.iter().copied());
            }
        }
        ids
    }

    fn passes_filter(&self, id: RecordId, filter: &CandidateFilter<'_>) -> bool {
        if let Some(locality) = filter.locality {
            if self.locality.get(&id).is_none_or(|v| v != locality) {
                return false;
            }
        }
        if let Some(town) = filter.town {
            if self.town.get(&id).is_none_or(|v| v != town) {
                return false;
            }
        }
        true
    }
}

/// Whitespace tokens with first-occurrence dedup, so a repeated token
/// does not produce duplicate postings for one record.
fn dedup_tokens(value: &str) -> impl Iterator<Item = &str> {
    let mut seen: Vec<&str> = Vec::new();
    value.split_whitespace().filter(move |token| {
        if seen.contains(token) {
            false
        } else {
            seen.push(*token);
            true
        }
    })
}
