//! Round-1 matching of the historical collection against the
//! contemporary collection.

use std::collections::BTreeSet;

use placelink_blocking::{BlockingIndex, CandidateFilter};
use placelink_models::{
    AddressCollection, AddressRecord, DistanceKind, FieldSelection, LinkRecord, LinkTable,
    MatchStatus, RecordId,
};
use placelink_tokenize::{FrequencyTable, TokenSet, tokenize};

use crate::MatchError;
use crate::distance::similarity;
use crate::sink::{ChunkBuffer, DEFAULT_CHUNK_SIZE, LinkSink};

/// Round-1 matching configuration.
#[derive(Debug, Clone, Copy)]
pub struct MatchConfig {
    /// Token-set similarity measure.
    pub distance: DistanceKind,
    /// Minimum similarity (0..=1) to accept the best candidate.
    pub threshold: f64,
    /// Fields tokenized on the query (historical) side.
    pub query_fields: FieldSelection,
    /// Exclude tokens whose collection frequency exceeds this from
    /// blocking keys; `None` keeps every token.
    pub frequency_limit: Option<u32>,
    /// Require candidate locality to equal the query's, when present.
    pub filter_locality: bool,
    /// Require candidate town to equal the query's, when present.
    pub filter_town: bool,
    /// Links accumulated per sink flush.
    pub chunk_size: usize,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            distance: DistanceKind::Levenshtein,
            threshold: 0.9,
            query_fields: FieldSelection::STREET,
            frequency_limit: None,
            filter_locality: false,
            filter_town: false,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

/// Counts from one matching run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MatchSummary {
    /// Historical records processed.
    pub total: usize,
    /// Links with status matched.
    pub matched: usize,
    /// Links with status unmatched.
    pub unmatched: usize,
}

/// Scores historical records against blocked contemporary candidates.
///
/// Holds read-only snapshots (collection, blocking index, frequency
/// exclusions) for one pass; the only mutable state during a run is the
/// chunk buffer it owns.
pub struct Matcher<'a> {
    contemporary: &'a AddressCollection,
    blocking: &'a BlockingIndex,
    exclude: BTreeSet<String>,
    config: MatchConfig,
}

impl<'a> Matcher<'a> {
    /// Prepares a matcher for one pass.
    #[must_use]
    pub fn new(
        contemporary: &'a AddressCollection,
        blocking: &'a BlockingIndex,
        frequencies: &FrequencyTable,
        config: MatchConfig,
    ) -> Self {
        let exclude = config
            .frequency_limit
            .map(|limit| frequencies.tokens_above(limit))
            .unwrap_or_default();
        if !exclude.is_empty() {
            log::info!(
                "excluding {} over-frequent tokens from blocking keys",
                exclude.len()
            );
        }
        Self {
            contemporary,
            blocking,
            exclude,
            config,
        }
    }

    /// Links every historical record, streaming outcomes to `sink` in
    /// chunks and returning the in-memory linkage table.
    ///
    /// # Errors
    ///
    /// Returns a [`MatchError`] on a sink failure or when a blocking
    /// candidate id is missing from the contemporary snapshot.
    pub fn run<S: LinkSink>(
        &self,
        historical: &AddressCollection,
        sink: &mut S,
    ) -> Result<(LinkTable, MatchSummary), MatchError> {
        let mut table = LinkTable::new();
        let mut summary = MatchSummary::default();
        let mut buffer = ChunkBuffer::new(sink, self.config.chunk_size);

        for record in historical {
            let link = self.link_record(record)?;
            match link.status {
                MatchStatus::Matched => summary.matched += 1,
                _ => summary.unmatched += 1,
            }
            summary.total += 1;
            buffer.push(link.clone())?;
            table.insert(link);

            if summary.total % 10_000 == 0 {
                log::info!(
                    "matched {} of {} historical records ({} linked)",
                    summary.total,
                    historical.len(),
                    summary.matched
                );
            }
        }
        buffer.finish()?;

        log::info!(
            "round 1 complete: {} matched, {} unmatched of {}",
            summary.matched,
            summary.unmatched,
            summary.total
        );
        Ok((table, summary))
    }

    fn link_record(&self, record: &AddressRecord) -> Result<LinkRecord, MatchError> {
        let tokens = tokenize(record, self.config.query_fields);
        if tokens.is_empty() {
            return Ok(unmatched_link(record));
        }

        let filter = CandidateFilter {
            locality: record
                .locality
                .as_deref()
                .filter(|_| self.config.filter_locality),
            town: record.town.as_deref().filter(|_| self.config.filter_town),
        };
        let candidates = self.blocking.candidates(&tokens, &self.exclude, &filter);

        // A query with no locality or town of its own is compared
        // against the candidates' full text, so shared place tokens can
        // still contribute.
        let candidate_fields = if record.locality.is_none() && record.town.is_none() {
            FieldSelection::FULL_TEXT
        } else {
            FieldSelection::NAME_STREET
        };

        let best = best_candidate(
            &tokens,
            candidates,
            self.contemporary,
            candidate_fields,
            self.config.distance,
        )?;

        match best {
            Some((id, score)) if score >= self.config.threshold => {
                let candidate = self
                    .contemporary
                    .get(id)
                    .ok_or(MatchError::MissingRecord { id })?;
                Ok(matched_link(record, candidate, score))
            }
            _ => Ok(unmatched_link(record)),
        }
    }
}

/// Scores a query token set against each candidate and returns the
/// best-scoring one.
///
/// An exact similarity of 1 short-circuits the loop; ties keep the
/// first-encountered maximum in candidate iteration order (ascending
/// id), which makes the selection deterministic.
///
/// # Errors
///
/// Returns [`MatchError::MissingRecord`] when a candidate id is absent
/// from the collection snapshot.
pub(crate) fn best_candidate(
    tokens: &TokenSet,
    candidates: BTreeSet<RecordId>,
    collection: &AddressCollection,
    candidate_fields: FieldSelection,
    distance: DistanceKind,
) -> Result<Option<(RecordId, f64)>, MatchError> {
    let mut best: Option<(RecordId, f64)> = None;
    for id in candidates {
        let candidate = collection.get(id).ok_or(MatchError::MissingRecord { id })?;
        let candidate_tokens = tokenize(candidate, candidate_fields);
        let score = similarity(distance, tokens, &candidate_tokens);

        if (score - 1.0).abs() < f64::EPSILON {
            return Ok(Some((id, 1.0)));
        }
        if best.is_none_or(|(_, current)| score > current) {
            best = Some((id, score));
        }
    }
    Ok(best)
}

fn matched_link(record: &AddressRecord, candidate: &AddressRecord, score: f64) -> LinkRecord {
    LinkRecord {
        historical_id: record.id,
        contemporary_id: Some(candidate.id),
        score: score * 100.0,
        status: MatchStatus::Matched,
        number: record.number.clone(),
        district_code: record.district_code.clone(),
        assigned_code: None,
        density: None,
        start_year: record.start_year,
        event_count: record.event_count,
        easting: candidate.easting,
        northing: candidate.northing,
        cell: None,
    }
}

fn unmatched_link(record: &AddressRecord) -> LinkRecord {
    LinkRecord {
        historical_id: record.id,
        contemporary_id: None,
        score: 0.0,
        status: MatchStatus::Unmatched,
        number: record.number.clone(),
        district_code: record.district_code.clone(),
        assigned_code: None,
        density: None,
        start_year: record.start_year,
        event_count: record.event_count,
        easting: None,
        northing: None,
        cell: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::MemorySink;

    fn historical(id: RecordId, street: &str, district: &str) -> AddressRecord {
        AddressRecord {
            id,
            name: None,
            number: None,
            street: Some(street.into()),
            locality: None,
            town: None,
            easting: None,
            northing: None,
            district_code: Some(district.into()),
            start_year: Some(1881),
            event_count: 1,
        }
    }

    fn contemporary(id: RecordId, street: &str, e: f64, n: f64) -> AddressRecord {
        AddressRecord {
            id,
            name: None,
            number: None,
            street: Some(street.into()),
            locality: None,
            town: None,
            easting: Some(e),
            northing: Some(n),
            district_code: None,
            start_year: None,
            event_count: 1,
        }
    }

    fn run_match(
        historical_records: Vec<AddressRecord>,
        contemporary_records: Vec<AddressRecord>,
        config: MatchConfig,
    ) -> (LinkTable, MatchSummary, MemorySink) {
        let historical = AddressCollection::from_records(historical_records).unwrap();
        let contemporary = AddressCollection::from_records(contemporary_records).unwrap();
        let blocking = BlockingIndex::build(&contemporary);
        let frequencies = FrequencyTable::build(&contemporary, FieldSelection::FREQUENCY);
        let matcher = Matcher::new(&contemporary, &blocking, &frequencies, config);
        let mut sink = MemorySink::default();
        let (table, summary) = matcher.run(&historical, &mut sink).unwrap();
        (table, summary, sink)
    }

    #[test]
    fn exact_street_match_scores_one_hundred() {
        let (table, summary, _) = run_match(
            vec![historical(1, "main street", "A")],
            vec![contemporary(10, "main street", 1.0, 2.0)],
            MatchConfig::default(),
        );
        assert_eq!(summary.matched, 1);
        let link = table.get(1).unwrap();
        assert_eq!(link.contemporary_id, Some(10));
        assert!((link.score - 100.0).abs() < f64::EPSILON);
        assert_eq!(link.status, MatchStatus::Matched);
        assert_eq!(link.easting, Some(1.0));
    }

    #[test]
    fn below_threshold_yields_unmatched() {
        let (table, summary, _) = run_match(
            vec![historical(1, "main street", "A")],
            vec![contemporary(10, "main road", 1.0, 2.0)],
            MatchConfig::default(),
        );
        assert_eq!(summary.unmatched, 1);
        let link = table.get(1).unwrap();
        assert_eq!(link.contemporary_id, None);
        assert_eq!(link.status, MatchStatus::Unmatched);
        assert!(link.score.abs() < f64::EPSILON);
    }

    #[test]
    fn best_candidate_wins_over_weaker_ones() {
        let (table, _, _) = run_match(
            vec![historical(1, "castle street", "A")],
            vec![
                contemporary(10, "castle terrace", 0.0, 0.0),
                contemporary(11, "castle street", 5.0, 5.0),
                contemporary(12, "castle wynd", 9.0, 9.0),
            ],
            MatchConfig {
                threshold: 0.5,
                ..MatchConfig::default()
            },
        );
        assert_eq!(table.get(1).unwrap().contemporary_id, Some(11));
    }

    #[test]
    fn tie_keeps_first_encountered_candidate() {
        // Two identical candidate streets: the lower id is encountered
        // first and kept.
        let (table, _, _) = run_match(
            vec![historical(1, "main street", "A")],
            vec![
                contemporary(11, "main street", 5.0, 5.0),
                contemporary(10, "main street", 0.0, 0.0),
            ],
            MatchConfig::default(),
        );
        assert_eq!(table.get(1).unwrap().contemporary_id, Some(10));
    }

    #[test]
    fn empty_query_tokens_yield_unmatched_not_error() {
        let mut record = historical(1, "x", "A");
        record.street = None;
        let (table, summary, _) = run_match(
            vec![record],
            vec![contemporary(10, "main street", 1.0, 2.0)],
            MatchConfig::default(),
        );
        assert_eq!(summary.unmatched, 1);
        assert_eq!(table.get(1).unwrap().status, MatchStatus::Unmatched);
    }

    #[test]
    fn frequency_limit_excludes_common_tokens_from_blocking() {
        // "street" appears in every contemporary record; with a limit
        // of 2 it stops producing candidates, and "hilltop" is the only
        // discriminating token left.
        let config = MatchConfig {
            frequency_limit: Some(2),
            threshold: 0.5,
            ..MatchConfig::default()
        };
        let (table, _, _) = run_match(
            vec![historical(1, "hilltop street", "A")],
            vec![
                contemporary(10, "hilltop street", 0.0, 0.0),
                contemporary(11, "valley street", 1.0, 1.0),
                contemporary(12, "meadow street", 2.0, 2.0),
            ],
            config,
        );
        assert_eq!(table.get(1).unwrap().contemporary_id, Some(10));
    }

    #[test]
    fn results_stream_through_sink_in_order() {
        let records: Vec<AddressRecord> = (1..=5)
            .map(|id| historical(id, "main street", "A"))
            .collect();
        let (_, _, sink) = run_match(
            records,
            vec![contemporary(10, "main street", 1.0, 2.0)],
            MatchConfig {
                chunk_size: 2,
                ..MatchConfig::default()
            },
        );
        assert_eq!(sink.batch_sizes, vec![2, 2, 1]);
        let ids: Vec<RecordId> = sink.records.iter().map(|r| r.historical_id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
    }
}
