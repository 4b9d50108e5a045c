#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Spatial disambiguation for the linkage pipeline.
//!
//! Three stages, recomputed per matching pass:
//!
//! - **Tessellation** ([`voronoi`]): one bounded polygonal cell per
//!   distinct linked point, with unbounded hull cells reconstructed to
//!   finite polygons via synthetic far vertices.
//! - **Density** ([`density`]): weighted radius-neighbor counts over an
//!   R-tree, yielding a per-point density signal.
//! - **Assignment** ([`assign`]): point-in-cell join, per-district
//!   densities, per-cell district-code resolution, and propagation of
//!   resolved codes back onto the linked points.
//!
//! Geometric degeneracies (too few points, duplicates, collinear input)
//! are reported per offending point; callers pre-deduplicate coordinates
//! before tessellating.

pub mod assign;
pub mod density;
pub mod voronoi;

pub use assign::{AssignConfig, RegionAssignment, RegionCell, assign_region_codes, build_cells};
pub use density::point_density;
pub use voronoi::{GeometryError, MIN_SITES, Tessellation, VoronoiCell, tessellate};
