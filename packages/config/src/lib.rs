#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! TOML run configuration.
//!
//! Loaded once before any processing begins: unknown selector values,
//! out-of-range thresholds, and non-positive radii are all rejected up
//! front so a pass never aborts halfway through on a bad setting.

use std::path::{Path, PathBuf};

use placelink_models::{DistanceKind, FieldSelection, RegionBoxMethod};
use serde::Deserialize;

/// Configuration errors, surfaced before processing begins.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("cannot read config: {0}")]
    Io(#[from] std::io::Error),

    /// The TOML failed to parse (including unknown selector values).
    #[error("cannot parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A threshold was outside [0, 1].
    #[error("{name} must be within 0..=1, got {value}")]
    ThresholdOutOfRange {
        /// Which setting.
        name: &'static str,
        /// The offending value.
        value: f64,
    },

    /// A radius or limit was not positive.
    #[error("{name} must be positive, got {value}")]
    NotPositive {
        /// Which setting.
        name: &'static str,
        /// The offending value.
        value: f64,
    },
}

/// Input file locations.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct InputConfig {
    /// Historical collection CSV.
    pub historical_csv: PathBuf,
    /// Contemporary collection CSV.
    pub contemporary_csv: PathBuf,
    /// Optional `Alias,Name` substitution CSV.
    #[serde(default)]
    pub alias_csv: Option<PathBuf>,
    /// CSV delimiter (single character); comma when omitted.
    #[serde(default)]
    pub delimiter: Option<char>,
}

/// Cleaning toggles applied at ingest time.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct CleaningConfig {
    /// Fold values to lowercase.
    pub lowercase: bool,
    /// Trim surrounding whitespace.
    pub trim: bool,
    /// Remove punctuation characters.
    pub strip_punctuation: bool,
    /// Move digit-bearing leading street tokens into the number field.
    pub extract_house_numbers: bool,
    /// Collapse duplicate addresses, accumulating event counts.
    pub collapse_duplicates: bool,
}

impl Default for CleaningConfig {
    fn default() -> Self {
        Self {
            lowercase: true,
            trim: true,
            strip_punctuation: true,
            extract_house_numbers: true,
            collapse_duplicates: true,
        }
    }
}

/// Round-1 matching settings.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct MatchingConfig {
    /// Token-set similarity measure.
    pub distance: DistanceKind,
    /// Minimum similarity (0..=1) to accept a match.
    pub threshold: f64,
    /// Fields tokenized on the query side.
    pub query_fields: FieldSelection,
    /// Blocking exclusion: skip tokens with a higher collection
    /// frequency than this.
    pub frequency_limit: Option<u32>,
    /// Require candidate locality to equal the query's.
    pub filter_locality: bool,
    /// Require candidate town to equal the query's.
    pub filter_town: bool,
    /// Links accumulated per sink flush.
    pub chunk_size: usize,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            distance: DistanceKind::Levenshtein,
            threshold: 0.9,
            query_fields: FieldSelection::STREET,
            frequency_limit: None,
            filter_locality: false,
            filter_town: false,
            chunk_size: 1000,
        }
    }
}

/// Spatial disambiguation settings.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct SpatialConfig {
    /// Neighbor radius for density computation, in coordinate units.
    pub density_radius: f64,
    /// Minimum matching score for a point to qualify.
    pub eval_limit: f64,
    /// Minimum density for a point to qualify.
    pub density_limit: f64,
    /// Override for the far-vertex distance of unbounded cells;
    /// defaults to twice the point-set span.
    pub tessellation_radius: Option<f64>,
}

impl Default for SpatialConfig {
    fn default() -> Self {
        Self {
            density_radius: 1000.0,
            eval_limit: 90.0,
            density_limit: 10.0,
            tessellation_radius: None,
        }
    }
}

/// Round-2 matching settings.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct SecondPassSection {
    /// Run the second round at all.
    pub enabled: bool,
    /// Token-set similarity measure.
    pub distance: DistanceKind,
    /// Minimum similarity; typically looser than round 1.
    pub threshold: f64,
    /// How district bounding boxes are derived.
    pub box_method: RegionBoxMethod,
    /// Query tokens must be longer than this many characters.
    pub min_token_len: usize,
}

impl Default for SecondPassSection {
    fn default() -> Self {
        Self {
            enabled: true,
            distance: DistanceKind::Levenshtein,
            threshold: 0.8,
            box_method: RegionBoxMethod::AssignedCells,
            min_token_len: 2,
        }
    }
}

/// Output file locations.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct OutputConfig {
    /// Destination for the persisted linkage table.
    pub links_csv: PathBuf,
    /// Optional destination for tessellation-cell assignments.
    #[serde(default)]
    pub cells_json: Option<PathBuf>,
}

/// The whole run configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RunConfig {
    /// Input files.
    pub input: InputConfig,
    /// Cleaning toggles.
    #[serde(default)]
    pub cleaning: CleaningConfig,
    /// Round-1 matching.
    #[serde(default)]
    pub matching: MatchingConfig,
    /// Spatial disambiguation.
    #[serde(default)]
    pub spatial: SpatialConfig,
    /// Round-2 matching.
    #[serde(default)]
    pub second_pass: SecondPassSection,
    /// Output files.
    pub output: OutputConfig,
}

impl RunConfig {
    /// Parses and validates a configuration string.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] on parse failure or out-of-range
    /// values.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads and validates a configuration file.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] when the file cannot be read, parsed,
    /// or validated.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::parse(&std::fs::read_to_string(path)?)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        check_threshold("matching.threshold", self.matching.threshold)?;
        check_threshold("secondPass.threshold", self.second_pass.threshold)?;
        check_positive("spatial.densityRadius", self.spatial.density_radius)?;
        if let Some(radius) = self.spatial.tessellation_radius {
            check_positive("spatial.tessellationRadius", radius)?;
        }
        Ok(())
    }
}

fn check_threshold(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::ThresholdOutOfRange { name, value })
    }
}

fn check_positive(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::NotPositive { name, value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
[input]
historicalCsv = "data/historical.csv"
contemporaryCsv = "data/contemporary.csv"

[output]
linksCsv = "out/links.csv"
"#;

    #[test]
    fn minimal_config_gets_defaults() {
        let config = RunConfig::parse(MINIMAL).unwrap();
        assert_eq!(config.matching.distance, DistanceKind::Levenshtein);
        assert!((config.matching.threshold - 0.9).abs() < f64::EPSILON);
        assert_eq!(config.matching.chunk_size, 1000);
        assert!(config.second_pass.enabled);
        assert_eq!(config.second_pass.box_method, RegionBoxMethod::AssignedCells);
        assert!(config.cleaning.collapse_duplicates);
    }

    #[test]
    fn selectors_parse_from_kebab_case() {
        let text = format!(
            "{MINIMAL}\n[matching]\ndistance = \"set-ratio\"\n\n[secondPass]\nboxMethod = \"centroid-tessellation\"\n"
        );
        let config = RunConfig::parse(&text).unwrap();
        assert_eq!(config.matching.distance, DistanceKind::SetRatio);
        assert_eq!(
            config.second_pass.box_method,
            RegionBoxMethod::CentroidTessellation
        );
    }

    #[test]
    fn unknown_selector_is_rejected_up_front() {
        let text = format!("{MINIMAL}\n[matching]\ndistance = \"cosine\"\n");
        assert!(matches!(RunConfig::parse(&text), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn out_of_range_threshold_is_rejected() {
        let text = format!("{MINIMAL}\n[matching]\nthreshold = 1.5\n");
        assert!(matches!(
            RunConfig::parse(&text),
            Err(ConfigError::ThresholdOutOfRange {
                name: "matching.threshold",
                ..
            })
        ));
    }

    #[test]
    fn non_positive_radius_is_rejected() {
        let text = format!("{MINIMAL}\n[spatial]\ndensityRadius = 0.0\n");
        assert!(matches!(
            RunConfig::parse(&text),
            Err(ConfigError::NotPositive { .. })
        ));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let text = format!("{MINIMAL}\n[matching]\nthresold = 0.9\n");
        assert!(matches!(RunConfig::parse(&text), Err(ConfigError::Parse(_))));
    }
}
