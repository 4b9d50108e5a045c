//! Token document-frequency counts over a whole collection.

use std::collections::{BTreeMap, BTreeSet};

use placelink_models::{AddressCollection, FieldSelection};

/// Token → occurrence count within one collection.
///
/// Counts are a plain multiset tally: tokens are *not* deduplicated
/// within or across records, so a token appearing twice in one record
/// counts twice. Built fresh per matching pass; read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct FrequencyTable {
    counts: BTreeMap<String, u32>,
}

impl FrequencyTable {
    /// Tallies token occurrences across every record in the collection,
    /// over the selected fields.
    ///
    /// Deterministic and order-independent: the same records in any
    /// order produce the same table.
    #[must_use]
    pub fn build(collection: &AddressCollection, fields: FieldSelection) -> Self {
        let mut counts: BTreeMap<String, u32> = BTreeMap::new();
        for record in collection {
            for field in fields.fields() {
                if let Some(value) = field.value(record) {
                    for token in value.split_whitespace() {
                        *counts.entry(token.to_string()).or_insert(0) += 1;
                    }
                }
            }
        }
        Self { counts }
    }

    /// Occurrence count for a token (0 when absent).
    #[must_use]
    pub fn count(&self, token: &str) -> u32 {
        self.counts.get(token).copied().unwrap_or(0)
    }

    /// Tokens whose count exceeds `limit` — the blocking exclusion set
    /// that keeps globally common tokens ("street") from exploding
    /// candidate sets.
    #[must_use]
    pub fn tokens_above(&self, limit: u32) -> BTreeSet<String> {
        self.counts
            .iter()
            .filter(|&(_, &count)| count > limit)
            .map(|(token, _)| token.clone())
            .collect()
    }

    /// Number of distinct tokens.
    #[must_use]
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    /// `true` when no tokens were tallied.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use placelink_models::AddressRecord;

    fn record(id: u64, street: &str) -> AddressRecord {
        AddressRecord {
            id,
            name: None,
            number: None,
            street: Some(street.into()),
            locality: None,
            town: None,
            easting: None,
            northing: None,
            district_code: None,
            start_year: None,
            event_count: 1,
        }
    }

    fn collection(records: Vec<AddressRecord>) -> AddressCollection {
        AddressCollection::from_records(records).unwrap()
    }

    #[test]
    fn counts_across_records() {
        let c = collection(vec![
            record(1, "main street"),
            record(2, "main road"),
            record(3, "upper main"),
        ]);
        let table = FrequencyTable::build(&c, FieldSelection::STREET);
        assert_eq!(table.count("main"), 3);
        assert_eq!(table.count("street"), 1);
        assert_eq!(table.count("absent"), 0);
    }

    #[test]
    fn counts_are_a_multiset() {
        let c = collection(vec![record(1, "main main")]);
        let table = FrequencyTable::build(&c, FieldSelection::STREET);
        assert_eq!(table.count("main"), 2);
    }

    #[test]
    fn exclusion_set_is_strictly_above_limit() {
        let c = collection(vec![
            record(1, "main street"),
            record(2, "main street"),
            record(3, "main lane"),
        ]);
        let table = FrequencyTable::build(&c, FieldSelection::STREET);
        let excluded = table.tokens_above(2);
        assert!(excluded.contains("main"));
        assert!(!excluded.contains("street"));
        assert!(!excluded.contains("lane"));
    }
}
