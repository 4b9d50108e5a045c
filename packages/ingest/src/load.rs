//! CSV loading of address collections.
//!
//! Rows are deserialized into a raw shape mirroring the source columns,
//! then cleaned and converted. Every field besides the id is nullable;
//! unparseable coordinates drop the coordinate, not the record.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use placelink_models::{AddressCollection, AddressRecord};
use serde::Deserialize;

use crate::IngestError;
use crate::clean::{
    AliasTable, CleanOptions, clean_value, collapse_duplicates, extract_house_number,
    replace_aliases,
};

/// How a collection is read and cleaned.
#[derive(Debug, Clone, Default)]
pub struct IngestOptions {
    /// CSV delimiter; `None` means comma.
    pub delimiter: Option<u8>,
    /// Cleaning steps applied to text fields.
    pub clean: CleanOptions,
    /// Alias substitutions applied to street values after cleaning.
    pub aliases: Option<AliasTable>,
    /// Move digit-bearing leading street tokens into the number field.
    pub extract_house_numbers: bool,
    /// Collapse duplicate addresses, accumulating event counts.
    pub collapse_duplicates: bool,
}

/// One raw CSV row, column names as in the source exports.
#[derive(Debug, Deserialize)]
struct RawRow {
    #[serde(rename = "Id")]
    id: u64,
    #[serde(rename = "Name", default)]
    name: Option<String>,
    #[serde(rename = "Num", default)]
    number: Option<String>,
    #[serde(rename = "Street", default)]
    street: Option<String>,
    #[serde(rename = "Locality", default)]
    locality: Option<String>,
    #[serde(rename = "Town", default)]
    town: Option<String>,
    #[serde(rename = "Easting", default)]
    easting: Option<String>,
    #[serde(rename = "Northing", default)]
    northing: Option<String>,
    #[serde(rename = "DistCode", default)]
    district_code: Option<String>,
    #[serde(rename = "StartYear", default)]
    start_year: Option<String>,
    #[serde(rename = "Events", default)]
    events: Option<u32>,
}

impl RawRow {
    fn into_record(self, options: &IngestOptions) -> AddressRecord {
        let clean_opt = |value: Option<String>| {
            value
                .map(|v| clean_value(&v, &options.clean))
                .filter(|v| !v.is_empty())
        };

        let name = clean_opt(self.name);
        let mut number = clean_opt(self.number);
        let mut street = clean_opt(self.street);

        if let (Some(aliases), Some(value)) = (options.aliases.as_ref(), street.as_deref()) {
            street = Some(replace_aliases(value, aliases)).filter(|v| !v.is_empty());
        }

        if options.extract_house_numbers {
            if let Some(value) = street.as_deref() {
                let (kept, extracted) = extract_house_number(value);
                street = Some(kept).filter(|v| !v.is_empty());
                if number.is_none() {
                    number = extracted;
                }
            }
        }

        AddressRecord {
            id: self.id,
            name,
            number,
            street,
            locality: clean_opt(self.locality),
            town: clean_opt(self.town),
            easting: self.easting.and_then(|v| v.trim().parse().ok()),
            northing: self.northing.and_then(|v| v.trim().parse().ok()),
            district_code: self
                .district_code
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty()),
            start_year: self.start_year.and_then(|v| v.trim().parse().ok()),
            event_count: self.events.unwrap_or(1).max(1),
        }
    }
}

/// Reads a collection from any CSV reader.
///
/// # Errors
///
/// Returns an [`IngestError`] on malformed CSV or duplicate record ids.
pub fn read_collection(
    input: impl Read,
    options: &IngestOptions,
) -> Result<AddressCollection, IngestError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(options.delimiter.unwrap_or(b','))
        .trim(csv::Trim::All)
        .from_reader(input);

    let mut records = Vec::new();
    for row in reader.deserialize::<RawRow>() {
        records.push(row?.into_record(options));
    }

    if options.collapse_duplicates {
        let before = records.len();
        records = collapse_duplicates(records);
        log::info!(
            "collapsed {before} rows into {} addresses",
            records.len()
        );
    }

    AddressCollection::from_records(records).map_err(|id| IngestError::DuplicateId { id })
}

/// Reads a collection from a CSV file.
///
/// # Errors
///
/// Returns an [`IngestError`] when the file cannot be opened or parsed.
pub fn load_collection(
    path: impl AsRef<Path>,
    options: &IngestOptions,
) -> Result<AddressCollection, IngestError> {
    let path = path.as_ref();
    let collection = read_collection(File::open(path)?, options)?;
    log::info!(
        "loaded {} records from {}",
        collection.len(),
        path.display()
    );
    Ok(collection)
}

/// One alias row: an abbreviation and its canonical form.
#[derive(Debug, Deserialize)]
struct AliasRow {
    #[serde(rename = "Alias")]
    alias: String,
    #[serde(rename = "Name")]
    name: String,
}

/// Reads an alias table from any CSV reader.
///
/// # Errors
///
/// Returns an [`IngestError`] on malformed CSV.
pub fn read_alias_table(input: impl Read) -> Result<AliasTable, IngestError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(input);
    let mut aliases = AliasTable::new();
    for row in reader.deserialize::<AliasRow>() {
        let row = row?;
        aliases.insert(row.alias, row.name);
    }
    Ok(aliases)
}

/// Reads an alias table from a CSV file with `Alias,Name` columns.
///
/// # Errors
///
/// Returns an [`IngestError`] when the file cannot be opened or parsed.
pub fn load_alias_table(path: impl AsRef<Path>) -> Result<AliasTable, IngestError> {
    read_alias_table(File::open(path)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CSV: &str = "\
Id,Name,Num,Street,Locality,Town,Easting,Northing,DistCode,StartYear,Events
1,Rose Cottage,,12 Main St.,Old Town,Aberdeen,392500.5,806300.25,644,1881,2
2,,,High Street,,Aberdeen,,not-a-number,644,,
3,,,,,,,,,,
";

    fn options() -> IngestOptions {
        IngestOptions {
            extract_house_numbers: true,
            ..IngestOptions::default()
        }
    }

    #[test]
    fn loads_and_cleans_records() {
        let collection = read_collection(CSV.as_bytes(), &options()).unwrap();
        assert_eq!(collection.len(), 3);

        let first = collection.get(1).unwrap();
        assert_eq!(first.name.as_deref(), Some("rose cottage"));
        assert_eq!(first.street.as_deref(), Some("main st"));
        assert_eq!(first.number.as_deref(), Some("12"));
        assert_eq!(first.coord(), Some((392_500.5, 806_300.25)));
        assert_eq!(first.district_code.as_deref(), Some("644"));
        assert_eq!(first.start_year, Some(1881));
        assert_eq!(first.event_count, 2);
    }

    #[test]
    fn bad_coordinates_drop_the_coordinate_not_the_record() {
        let collection = read_collection(CSV.as_bytes(), &options()).unwrap();
        let second = collection.get(2).unwrap();
        assert_eq!(second.street.as_deref(), Some("high street"));
        assert_eq!(second.coord(), None);
        assert_eq!(second.event_count, 1);
    }

    #[test]
    fn fully_empty_fields_become_none() {
        let collection = read_collection(CSV.as_bytes(), &options()).unwrap();
        let third = collection.get(3).unwrap();
        assert_eq!(third.name, None);
        assert_eq!(third.street, None);
        assert_eq!(third.district_code, None);
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let csv = "Id,Street\n5,main street\n5,other street\n";
        let result = read_collection(csv.as_bytes(), &IngestOptions::default());
        assert!(matches!(result, Err(IngestError::DuplicateId { id: 5 })));
    }

    #[test]
    fn aliases_apply_to_streets() {
        let aliases = read_alias_table("Alias,Name\nst,street\n".as_bytes()).unwrap();
        let options = IngestOptions {
            aliases: Some(aliases),
            ..IngestOptions::default()
        };
        let csv = "Id,Street\n1,high st\n";
        let collection = read_collection(csv.as_bytes(), &options).unwrap();
        assert_eq!(
            collection.get(1).unwrap().street.as_deref(),
            Some("high street")
        );
    }

    #[test]
    fn collapse_accumulates_events_across_rows() {
        let csv = "\
Id,Street,DistCode
1,main street,644
2,main street,644
3,other street,644
";
        let options = IngestOptions {
            collapse_duplicates: true,
            ..IngestOptions::default()
        };
        let collection = read_collection(csv.as_bytes(), &options).unwrap();
        assert_eq!(collection.len(), 2);
        assert_eq!(collection.get(1).unwrap().event_count, 2);
        assert_eq!(collection.get(3).unwrap().event_count, 1);
    }
}
