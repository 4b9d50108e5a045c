#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Shared types for the placelink linkage pipeline.
//!
//! This crate contains only data types, selector enums, and the in-memory
//! collections the pipeline stages pass between each other. It has no
//! heavyweight dependencies (no geometry, no I/O).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Identifier of an address record within its collection.
pub type RecordId = u64;

/// A single address record from either the historical or the contemporary
/// collection.
///
/// Both collections share this shape but populate different subsets of
/// fields; every field besides `id` is individually nullable. Records are
/// read-only once loaded — the pipeline never mutates them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressRecord {
    /// Identifier unique within the collection.
    pub id: RecordId,
    /// Property or building name.
    pub name: Option<String>,
    /// House number.
    pub number: Option<String>,
    /// Street name.
    pub street: Option<String>,
    /// Locality (sub-town area).
    pub locality: Option<String>,
    /// Town name.
    pub town: Option<String>,
    /// Easting coordinate (projected grid).
    pub easting: Option<f64>,
    /// Northing coordinate (projected grid).
    pub northing: Option<f64>,
    /// Administrative district code.
    pub district_code: Option<String>,
    /// First year the record is attested.
    pub start_year: Option<i32>,
    /// Number of source events collapsed into this record.
    pub event_count: u32,
}

impl AddressRecord {
    /// Returns the record's coordinate pair when both components are
    /// present and finite.
    #[must_use]
    pub fn coord(&self) -> Option<(f64, f64)> {
        match (self.easting, self.northing) {
            (Some(e), Some(n)) if e.is_finite() && n.is_finite() => Some((e, n)),
            _ => None,
        }
    }
}

/// An immutable, id-indexed set of address records.
///
/// Built once per matching pass and treated as a read-only snapshot for
/// the remainder of that pass.
#[derive(Debug, Clone, Default)]
pub struct AddressCollection {
    records: Vec<AddressRecord>,
    by_id: BTreeMap<RecordId, usize>,
}

impl AddressCollection {
    /// Builds a collection from records.
    ///
    /// Returns the id of the first duplicate if two records share one.
    ///
    /// # Errors
    ///
    /// Returns `Err(id)` on a duplicate record id.
    pub fn from_records(records: Vec<AddressRecord>) -> Result<Self, RecordId> {
        let mut by_id = BTreeMap::new();
        for (idx, record) in records.iter().enumerate() {
            if by_id.insert(record.id, idx).is_some() {
                return Err(record.id);
            }
        }
        Ok(Self { records, by_id })
    }

    /// Looks up a record by id.
    #[must_use]
    pub fn get(&self, id: RecordId) -> Option<&AddressRecord> {
        self.by_id.get(&id).map(|&idx| &self.records[idx])
    }

    /// Iterates records in insertion order.
    pub fn iter(&self) -> std::slice::Iter<'_, AddressRecord> {
        self.records.iter()
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// `true` when the collection holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl<'a> IntoIterator for &'a AddressCollection {
    type Item = &'a AddressRecord;
    type IntoIter = std::slice::Iter<'a, AddressRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

/// Text fields of an [`AddressRecord`] that participate in tokenization,
/// in the fixed concatenation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressField {
    /// Property or building name.
    Name,
    /// House number.
    Number,
    /// Street name.
    Street,
    /// Locality.
    Locality,
    /// Town.
    Town,
}

impl AddressField {
    /// All fields in tokenization order.
    pub const ALL: [Self; 5] = [
        Self::Name,
        Self::Number,
        Self::Street,
        Self::Locality,
        Self::Town,
    ];

    /// The field's value on a record, if populated.
    #[must_use]
    pub fn value<'a>(self, record: &'a AddressRecord) -> Option<&'a str> {
        let value = match self {
            Self::Name => record.name.as_deref(),
            Self::Number => record.number.as_deref(),
            Self::Street => record.street.as_deref(),
            Self::Locality => record.locality.as_deref(),
            Self::Town => record.town.as_deref(),
        };
        value.filter(|v| !v.is_empty())
    }
}

/// Which text fields to include when tokenizing a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FieldSelection {
    /// Include the name field.
    pub name: bool,
    /// Include the house number field.
    pub number: bool,
    /// Include the street field.
    pub street: bool,
    /// Include the locality field.
    pub locality: bool,
    /// Include the town field.
    pub town: bool,
}

impl Default for FieldSelection {
    fn default() -> Self {
        Self::STREET
    }
}

impl FieldSelection {
    /// Street only — the round-1 query selection.
    pub const STREET: Self = Self {
        name: false,
        number: false,
        street: true,
        locality: false,
        town: false,
    };

    /// Name + street — the candidate and round-2 query selection.
    pub const NAME_STREET: Self = Self {
        name: true,
        number: false,
        street: true,
        locality: false,
        town: false,
    };

    /// Name + street + locality + town — the widened candidate selection
    /// used when the query record carries no locality/town of its own.
    pub const FULL_TEXT: Self = Self {
        name: true,
        number: false,
        street: true,
        locality: true,
        town: true,
    };

    /// Name + number + street + locality — the frequency-table selection.
    pub const FREQUENCY: Self = Self {
        name: true,
        number: true,
        street: true,
        locality: true,
        town: false,
    };

    /// Whether a given field is selected.
    #[must_use]
    pub const fn includes(self, field: AddressField) -> bool {
        match field {
            AddressField::Name => self.name,
            AddressField::Number => self.number,
            AddressField::Street => self.street,
            AddressField::Locality => self.locality,
            AddressField::Town => self.town,
        }
    }

    /// Selected fields in tokenization order.
    pub fn fields(self) -> impl Iterator<Item = AddressField> {
        AddressField::ALL
            .into_iter()
            .filter(move |f| self.includes(*f))
    }

    /// `true` when no field is selected.
    #[must_use]
    pub fn is_empty(self) -> bool {
        self.fields().next().is_none()
    }
}

/// Token-set similarity measure used to score a query against a
/// candidate.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum DistanceKind {
    /// Per-token nearest-neighbor normalized edit distance with a
    /// length-imbalance penalty.
    #[default]
    Levenshtein,
    /// Jaccard similarity of the two token sets.
    Jaccard,
    /// MASI set-agreement similarity.
    Masi,
    /// Best-pairing similarity ratio over the two token sets.
    SetRatio,
}

/// Policy for deriving a district's bounding box in the second matching
/// round.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum RegionBoxMethod {
    /// Union of the envelopes of tessellation cells already assigned to
    /// the district, clamped to the contemporary extent.
    #[default]
    AssignedCells,
    /// A second tessellation built over per-district centroid points;
    /// each district's box is its centroid cell's envelope, clamped to
    /// the contemporary extent.
    CentroidTessellation,
}

/// Outcome of linking one historical record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MatchStatus {
    /// Linked in the first round.
    Matched,
    /// No candidate reached the threshold in the first round.
    Unmatched,
    /// Re-linked in the spatially scoped second round.
    SpatiallyReassigned,
    /// Still unresolved after the second round.
    SpatiallyUnresolved,
}

impl MatchStatus {
    /// Numeric status code stored in the persisted linkage table.
    #[must_use]
    pub const fn code(self) -> u16 {
        match self {
            Self::Matched => 100,
            Self::Unmatched => 101,
            Self::SpatiallyReassigned => 200,
            Self::SpatiallyUnresolved => 201,
        }
    }

    /// Parses a persisted status code.
    #[must_use]
    pub const fn from_code(code: u16) -> Option<Self> {
        match code {
            100 => Some(Self::Matched),
            101 => Some(Self::Unmatched),
            200 => Some(Self::SpatiallyReassigned),
            201 => Some(Self::SpatiallyUnresolved),
            _ => None,
        }
    }
}

/// One row of the linkage table: a historical record paired with its
/// matched contemporary record (if any) plus the denormalized fields the
/// spatial stages need.
///
/// Created by the round-1 matcher; subsequently mutated only by the
/// region assigner (cell, density, assigned code) and the second-round
/// matcher (re-linking and status).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkRecord {
    /// Historical record id.
    pub historical_id: RecordId,
    /// Matched contemporary record id, when linked.
    pub contemporary_id: Option<RecordId>,
    /// Similarity score in [0, 100].
    pub score: f64,
    /// Link outcome.
    pub status: MatchStatus,
    /// House number copied from the historical record.
    pub number: Option<String>,
    /// District code copied from the historical record.
    pub district_code: Option<String>,
    /// District code resolved by spatial disambiguation.
    pub assigned_code: Option<String>,
    /// Local point density in [0, 100], once computed.
    pub density: Option<f64>,
    /// Start year copied from the historical record.
    pub start_year: Option<i32>,
    /// Event-count weight copied from the historical record.
    pub event_count: u32,
    /// Easting of the matched contemporary record.
    pub easting: Option<f64>,
    /// Northing of the matched contemporary record.
    pub northing: Option<f64>,
    /// Owning tessellation cell, once joined.
    pub cell: Option<usize>,
}

impl LinkRecord {
    /// The link's coordinate pair when both components are present and
    /// finite.
    #[must_use]
    pub fn coord(&self) -> Option<(f64, f64)> {
        match (self.easting, self.northing) {
            (Some(e), Some(n)) if e.is_finite() && n.is_finite() => Some((e, n)),
            _ => None,
        }
    }
}

/// The in-memory linkage table, keyed by historical record id.
///
/// This is the working copy of the system's durable output; sinks persist
/// it in chunks and the spatial stages mutate it in place.
#[derive(Debug, Clone, Default)]
pub struct LinkTable {
    records: Vec<LinkRecord>,
    by_historical: BTreeMap<RecordId, usize>,
}

impl LinkTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a link, replacing any previous link for the same
    /// historical record.
    pub fn insert(&mut self, record: LinkRecord) {
        if let Some(&idx) = self.by_historical.get(&record.historical_id) {
            self.records[idx] = record;
        } else {
            self.by_historical
                .insert(record.historical_id, self.records.len());
            self.records.push(record);
        }
    }

    /// Looks up the link for a historical record.
    #[must_use]
    pub fn get(&self, historical_id: RecordId) -> Option<&LinkRecord> {
        self.by_historical
            .get(&historical_id)
            .map(|&idx| &self.records[idx])
    }

    /// Mutable lookup.
    #[must_use]
    pub fn get_mut(&mut self, historical_id: RecordId) -> Option<&mut LinkRecord> {
        self.by_historical
            .get(&historical_id)
            .map(|&idx| &mut self.records[idx])
    }

    /// Iterates links in insertion order.
    pub fn iter(&self) -> std::slice::Iter<'_, LinkRecord> {
        self.records.iter()
    }

    /// Mutable iteration in insertion order.
    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, LinkRecord> {
        self.records.iter_mut()
    }

    /// Number of links.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// `true` when the table holds no links.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Count of links with a given status.
    #[must_use]
    pub fn count_status(&self, status: MatchStatus) -> usize {
        self.records.iter().filter(|r| r.status == status).count()
    }
}

impl<'a> IntoIterator for &'a LinkTable {
    type Item = &'a LinkRecord;
    type IntoIter = std::slice::Iter<'a, LinkRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: RecordId) -> AddressRecord {
        AddressRecord {
            id,
            name: None,
            number: None,
            street: Some("high street".into()),
            locality: None,
            town: None,
            easting: None,
            northing: None,
            district_code: None,
            start_year: None,
            event_count: 1,
        }
    }

    #[test]
    fn collection_rejects_duplicate_ids() {
        let result = AddressCollection::from_records(vec![record(1), record(1)]);
        assert_eq!(result.err(), Some(1));
    }

    #[test]
    fn coord_requires_both_components() {
        let mut r = record(1);
        assert_eq!(r.coord(), None);
        r.easting = Some(10.0);
        assert_eq!(r.coord(), None);
        r.northing = Some(20.0);
        assert_eq!(r.coord(), Some((10.0, 20.0)));
        r.northing = Some(f64::NAN);
        assert_eq!(r.coord(), None);
    }

    #[test]
    fn field_selection_orders_fields() {
        let fields: Vec<AddressField> = FieldSelection::FREQUENCY.fields().collect();
        assert_eq!(
            fields,
            vec![
                AddressField::Name,
                AddressField::Number,
                AddressField::Street,
                AddressField::Locality,
            ]
        );
    }

    #[test]
    fn status_codes_round_trip() {
        for status in [
            MatchStatus::Matched,
            MatchStatus::Unmatched,
            MatchStatus::SpatiallyReassigned,
            MatchStatus::SpatiallyUnresolved,
        ] {
            assert_eq!(MatchStatus::from_code(status.code()), Some(status));
        }
        assert_eq!(MatchStatus::from_code(0), None);
    }

    #[test]
    fn selector_enums_parse_kebab_case() {
        assert_eq!(
            "set-ratio".parse::<DistanceKind>().ok(),
            Some(DistanceKind::SetRatio)
        );
        assert_eq!(
            "centroid-tessellation".parse::<RegionBoxMethod>().ok(),
            Some(RegionBoxMethod::CentroidTessellation)
        );
        assert!("cosine".parse::<DistanceKind>().is_err());
    }

    #[test]
    fn link_table_insert_replaces() {
        let mut table = LinkTable::new();
        let link = LinkRecord {
            historical_id: 7,
            contemporary_id: None,
            score: 0.0,
            status: MatchStatus::Unmatched,
            number: None,
            district_code: None,
            assigned_code: None,
            density: None,
            start_year: None,
            event_count: 1,
            easting: None,
            northing: None,
            cell: None,
        };
        table.insert(link.clone());
        let relinked = LinkRecord {
            contemporary_id: Some(3),
            score: 91.0,
            status: MatchStatus::Matched,
            ..link
        };
        table.insert(relinked);
        assert_eq!(table.len(), 1);
        assert_eq!(table.get(7).unwrap().contemporary_id, Some(3));
        assert_eq!(table.count_status(MatchStatus::Matched), 1);
    }
}
