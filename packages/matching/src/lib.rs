#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Record linkage between the historical and contemporary collections.
//!
//! Round 1 ([`Matcher`]) scores every historical record against a
//! blocked candidate set and persists the outcomes in bounded chunks
//! through an injected [`LinkSink`]. Round 2 ([`run_second_pass`])
//! revisits links that are still unmatched — or whose spatially
//! assigned district disagrees with their original code — against
//! contemporary candidates scoped to per-district bounding boxes
//! derived from the tessellation.

pub mod distance;
pub mod matcher;
pub mod second_pass;
pub mod sink;

use placelink_models::RecordId;

pub use distance::similarity;
pub use matcher::{MatchConfig, MatchSummary, Matcher};
pub use second_pass::{
    SecondPassConfig, SecondPassSummary, region_bounding_boxes, run_second_pass,
};
pub use sink::{ChunkBuffer, CsvSink, LinkSink, MemorySink, SinkError};

/// Errors from the matching rounds.
#[derive(Debug, thiserror::Error)]
pub enum MatchError {
    /// A link or candidate referenced a record id absent from the
    /// current collection snapshot — the caller passed mismatched
    /// inputs.
    #[error("record id {id} is absent from the collection snapshot")]
    MissingRecord {
        /// The dangling id.
        id: RecordId,
    },

    /// Two records in a collection subset shared an id.
    #[error("duplicate record id {id} in collection subset")]
    DuplicateRecord {
        /// The repeated id.
        id: RecordId,
    },

    /// Persistence failure from the injected sink.
    #[error(transparent)]
    Sink(#[from] SinkError),

    /// Tessellation failure while deriving second-round region boxes.
    #[error(transparent)]
    Geometry(#[from] placelink_spatial::GeometryError),
}
