//! Field cleaning applied before tokenization.
//!
//! A deterministic pipeline applied symmetrically to both collections:
//! case folding, whitespace normalization, punctuation stripping, alias
//! substitution, and house-number extraction. Cleaning is idempotent —
//! cleaning an already-clean value changes nothing.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use placelink_models::AddressRecord;
use placelink_tokenize::{TokenSet, remove_digit_tokens, strip_leading_number};
use regex::Regex;

/// Punctuation that never contributes to address matching.
static PUNCTUATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[[:punct:]]+").expect("valid regex"));

/// Collapses runs of whitespace into single spaces.
static WHITESPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s{2,}").expect("valid regex"));

/// Which cleaning steps to apply to text fields.
#[derive(Debug, Clone, Copy)]
pub struct CleanOptions {
    /// Fold values to lowercase.
    pub lowercase: bool,
    /// Trim surrounding whitespace.
    pub trim: bool,
    /// Remove punctuation characters.
    pub strip_punctuation: bool,
}

impl Default for CleanOptions {
    fn default() -> Self {
        Self {
            lowercase: true,
            trim: true,
            strip_punctuation: true,
        }
    }
}

/// Alias → canonical-name substitutions applied token-wise.
pub type AliasTable = BTreeMap<String, String>;

/// Cleans one field value.
#[must_use]
pub fn clean_value(input: &str, options: &CleanOptions) -> String {
    let mut value = if options.lowercase {
        input.to_lowercase()
    } else {
        input.to_string()
    };
    if options.strip_punctuation {
        value = PUNCTUATION_RE.replace_all(&value, "").into_owned();
    }
    value = WHITESPACE_RE.replace_all(&value, " ").into_owned();
    if options.trim {
        value = value.trim().to_string();
    }
    value
}

/// Replaces each whitespace token that appears in the alias table with
/// its canonical form.
#[must_use]
pub fn replace_aliases(value: &str, aliases: &AliasTable) -> String {
    value
        .split_whitespace()
        .map(|token| aliases.get(token).map_or(token, String::as_str))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Moves a digit-bearing leading token out of a street value.
///
/// Returns the street with every digit-bearing token removed, plus the
/// extracted house number when the *first* token carried a digit.
#[must_use]
pub fn extract_house_number(street: &str) -> (String, Option<String>) {
    let tokens: TokenSet = street.split_whitespace().collect();
    let (_, number) = strip_leading_number(&tokens);
    let kept = remove_digit_tokens(&tokens);
    (kept.iter().collect::<Vec<_>>().join(" "), number)
}

/// Collapses records that are identical under the street/locality/town/
/// district/year grouping, accumulating the group size as the surviving
/// record's event count.
///
/// The first record of each group survives, in first-seen order — this
/// is where the density weights come from.
#[must_use]
pub fn collapse_duplicates(records: Vec<AddressRecord>) -> Vec<AddressRecord> {
    type GroupKey = (
        Option<String>,
        Option<String>,
        Option<String>,
        Option<String>,
        Option<i32>,
    );

    let mut order: Vec<GroupKey> = Vec::new();
    let mut groups: BTreeMap<GroupKey, AddressRecord> = BTreeMap::new();
    for record in records {
        let key: GroupKey = (
            record.street.clone(),
            record.locality.clone(),
            record.town.clone(),
            record.district_code.clone(),
            record.start_year,
        );
        if let Some(existing) = groups.get_mut(&key) {
            existing.event_count += 1;
        } else {
            order.push(key.clone());
            groups.insert(key, AddressRecord {
                event_count: 1,
                ..record
            });
        }
    }

    order
        .into_iter()
        .filter_map(|key| groups.remove(&key))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cleans_case_punctuation_and_whitespace() {
        let options = CleanOptions::default();
        assert_eq!(clean_value("  St. Mary's  Lane, ", &options), "st marys lane");
    }

    #[test]
    fn cleaning_is_idempotent() {
        let options = CleanOptions::default();
        let once = clean_value("12, High-Street  (rear)", &options);
        assert_eq!(clean_value(&once, &options), once);
    }

    #[test]
    fn cleaning_steps_are_individually_togglable() {
        let keep_case = CleanOptions {
            lowercase: false,
            ..CleanOptions::default()
        };
        assert_eq!(clean_value("High St.", &keep_case), "High St");

        let keep_punct = CleanOptions {
            strip_punctuation: false,
            ..CleanOptions::default()
        };
        assert_eq!(clean_value("High St.", &keep_punct), "high st.");
    }

    #[test]
    fn replaces_alias_tokens() {
        let aliases: AliasTable = [
            ("st".to_string(), "street".to_string()),
            ("rd".to_string(), "road".to_string()),
        ]
        .into();
        assert_eq!(replace_aliases("high st", &aliases), "high street");
        assert_eq!(replace_aliases("station rd", &aliases), "station road");
        assert_eq!(replace_aliases("castle wynd", &aliases), "castle wynd");
    }

    #[test]
    fn extracts_leading_house_number() {
        let (street, number) = extract_house_number("12 main street");
        assert_eq!(street, "main street");
        assert_eq!(number.as_deref(), Some("12"));
    }

    #[test]
    fn embedded_digit_tokens_are_dropped_but_not_extracted() {
        let (street, number) = extract_house_number("main 12a street");
        assert_eq!(street, "main street");
        assert_eq!(number, None);
    }

    fn record(id: u64, street: &str, year: Option<i32>) -> AddressRecord {
        AddressRecord {
            id,
            name: None,
            number: None,
            street: Some(street.into()),
            locality: None,
            town: None,
            easting: None,
            northing: None,
            district_code: Some("A".into()),
            start_year: year,
            event_count: 1,
        }
    }

    #[test]
    fn collapses_duplicates_and_counts_events() {
        let collapsed = collapse_duplicates(vec![
            record(1, "main street", Some(1881)),
            record(2, "main street", Some(1881)),
            record(3, "main street", Some(1891)),
            record(4, "main street", Some(1881)),
        ]);
        assert_eq!(collapsed.len(), 2);
        assert_eq!(collapsed[0].id, 1);
        assert_eq!(collapsed[0].event_count, 3);
        assert_eq!(collapsed[1].id, 3);
        assert_eq!(collapsed[1].event_count, 1);
    }
}
