#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Address tokenization for the linkage pipeline.
//!
//! Tokenization is applied symmetrically to both sides of a comparison:
//! the same record tokenized twice with the same field selection yields
//! the same ordered, duplicate-free token sequence. All functions here
//! are pure — no retained state, no mutation of the source record.

pub mod frequency;
pub mod token;

pub use frequency::FrequencyTable;
pub use token::{TokenSet, remove_digit_tokens, strip_leading_number, tokenize};
