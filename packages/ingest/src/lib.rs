#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CSV ingestion for the linkage pipeline.
//!
//! Raw rows are deserialized, cleaned (case folding, punctuation
//! stripping, alias substitution, house-number extraction), optionally
//! collapsed into per-address records with event counts, and validated
//! into an [`placelink_models::AddressCollection`]. Cleaning is applied
//! identically to both collections so tokens compare byte-for-byte.

pub mod clean;
pub mod load;

use placelink_models::RecordId;

pub use clean::{
    AliasTable, CleanOptions, clean_value, collapse_duplicates, extract_house_number,
    replace_aliases,
};
pub use load::{IngestOptions, load_alias_table, load_collection, read_alias_table, read_collection};

/// Errors from loading a collection.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// Underlying I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A CSV row could not be parsed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Two rows shared a record id.
    #[error("duplicate record id {id} in input")]
    DuplicateId {
        /// The repeated id.
        id: RecordId,
    },
}
