//! Density-based district-code assignment over tessellation cells.
//!
//! Joins linked points to their owning cells (exact point-in-polygon,
//! with an R-tree envelope prefilter), computes weighted per-district
//! point densities, resolves a single district code per cell, and
//! propagates resolved codes back onto the linked points.

use std::collections::BTreeMap;

use geo::{BoundingRect, Contains, Point, Polygon, Rect};
use placelink_models::{LinkTable, RecordId};
use rstar::{AABB, RTree, RTreeObject};
use serde::Serialize;

use crate::density::point_density;
use crate::voronoi::Tessellation;

/// Thresholds for density-based code resolution.
#[derive(Debug, Clone, Copy)]
pub struct AssignConfig {
    /// Neighbor radius for the density computation.
    pub density_radius: f64,
    /// Minimum matching score a point needs to qualify.
    pub eval_limit: f64,
    /// Minimum density a point needs to qualify.
    pub density_limit: f64,
}

/// A tessellation cell carrying its realized polygon and, once
/// resolved, its district code.
#[derive(Debug, Clone)]
pub struct RegionCell {
    /// Cell id (the site index within the tessellation).
    pub id: usize,
    /// Cell boundary.
    pub polygon: Polygon<f64>,
    /// District code resolved for this cell, if any.
    pub region: Option<String>,
    envelope: AABB<[f64; 2]>,
}

impl RegionCell {
    /// Wraps a polygon as an unresolved cell.
    #[must_use]
    pub fn new(id: usize, polygon: Polygon<f64>) -> Self {
        let envelope = polygon.bounding_rect().map_or_else(
            || AABB::from_point([0.0, 0.0]),
            |rect| AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]),
        );
        Self {
            id,
            polygon,
            region: None,
            envelope,
        }
    }

    /// Axis-aligned bounding box of the cell.
    #[must_use]
    pub fn bounds(&self) -> Rect<f64> {
        let lower = self.envelope.lower();
        let upper = self.envelope.upper();
        Rect::new(
            geo::Coord {
                x: lower[0],
                y: lower[1],
            },
            geo::Coord {
                x: upper[0],
                y: upper[1],
            },
        )
    }
}

/// Resolved outcome for one cell.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionAssignment {
    /// Cell id.
    pub cell: usize,
    /// Resolved district code, when a point qualified.
    pub code: Option<String>,
    /// Density of the winning point (0 when unresolved).
    pub density: f64,
}

/// Realizes every tessellation cell as an unresolved [`RegionCell`].
#[must_use]
pub fn build_cells(tessellation: &Tessellation) -> Vec<RegionCell> {
    tessellation
        .cells
        .iter()
        .map(|cell| RegionCell::new(cell.site, tessellation.cell_polygon(cell)))
        .collect()
}

/// Envelope-indexed reference to a cell for the R-tree.
struct CellEntry {
    index: usize,
    envelope: AABB<[f64; 2]>,
}

impl RTreeObject for CellEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// Joins every linked point to the cell containing it.
///
/// Cells tile the plane without overlap, so the first polygon containing
/// a point wins. Links without coordinates are left unjoined. Returns
/// the number of joined points.
pub fn join_points_to_cells(cells: &[RegionCell], links: &mut LinkTable) -> usize {
    let entries: Vec<CellEntry> = cells
        .iter()
        .enumerate()
        .map(|(index, cell)| CellEntry {
            index,
            envelope: cell.envelope,
        })
        .collect();
    let tree = RTree::bulk_load(entries);

    let mut joined = 0;
    for link in links.iter_mut() {
        link.cell = None;
        let Some((x, y)) = link.coord() else {
            continue;
        };
        let point = Point::new(x, y);
        let query = AABB::from_point([x, y]);
        for entry in tree.locate_in_envelope_intersecting(&query) {
            let cell = &cells[entry.index];
            if cell.polygon.contains(&point) {
                link.cell = Some(cell.id);
                joined += 1;
                break;
            }
        }
    }
    log::debug!("joined {joined} linked points into {} cells", cells.len());
    joined
}

/// Computes per-district weighted densities and writes them onto the
/// links.
///
/// Within each district, every point is replicated `event_count` times
/// so a record representing N historical events contributes N
/// observations. A record id surfacing under several districts keeps its
/// maximum density.
pub fn compute_densities(links: &mut LinkTable, radius: f64) {
    let mut by_district: BTreeMap<String, Vec<(RecordId, (f64, f64), u32)>> = BTreeMap::new();
    for link in links.iter() {
        let (Some(district), Some(coord)) = (link.district_code.as_ref(), link.coord()) else {
            continue;
        };
        by_district.entry(district.clone()).or_default().push((
            link.historical_id,
            coord,
            link.event_count.max(1),
        ));
    }

    let mut best: BTreeMap<RecordId, f64> = BTreeMap::new();
    for (district, members) in &by_district {
        let mut observations = Vec::new();
        let mut ids = Vec::new();
        for &(id, coord, events) in members {
            for _ in 0..events {
                observations.push(coord);
                ids.push(id);
            }
        }
        if observations.len() <= 1 {
            continue;
        }
        for (id, density) in point_density(&observations, &ids, radius) {
            let entry = best.entry(id).or_insert(density);
            if density > *entry {
                *entry = density;
            }
        }
        log::debug!(
            "district {district}: {} observations from {} points",
            observations.len(),
            members.len()
        );
    }

    for link in links.iter_mut() {
        link.density = best.get(&link.historical_id).copied();
    }
}

/// Resolves one district code per cell from its qualifying points.
///
/// A point qualifies when its score reaches `eval_limit` and its density
/// reaches `density_limit`. A single qualifier decides the cell; among
/// several, maximum density wins with maximum score as the secondary
/// tie-break. Cells without qualifiers stay unresolved.
pub fn resolve_cell_codes(
    cells: &mut [RegionCell],
    links: &LinkTable,
    config: &AssignConfig,
) -> Vec<RegionAssignment> {
    let mut by_cell: BTreeMap<usize, Vec<(f64, f64, Option<&String>)>> = BTreeMap::new();
    for link in links {
        let Some(cell) = link.cell else {
            continue;
        };
        by_cell.entry(cell).or_default().push((
            link.density.unwrap_or(0.0),
            link.score,
            link.district_code.as_ref(),
        ));
    }

    let mut assignments = Vec::with_capacity(cells.len());
    for cell in cells.iter_mut() {
        let mut winner: Option<(f64, f64, Option<&String>)> = None;
        if let Some(points) = by_cell.get(&cell.id) {
            for &(density, score, code) in points {
                if density < config.density_limit || score < config.eval_limit {
                    continue;
                }
                let better = winner.is_none_or(|(best_density, best_score, _)| {
                    (density, score) > (best_density, best_score)
                });
                if better {
                    winner = Some((density, score, code));
                }
            }
        }

        let (density, code) = winner.map_or((0.0, None), |(density, _, code)| {
            (density, code.cloned())
        });
        cell.region = code.clone();
        assignments.push(RegionAssignment {
            cell: cell.id,
            code,
            density,
        });
    }

    let resolved = assignments.iter().filter(|a| a.code.is_some()).count();
    log::debug!("resolved {resolved} of {} cells", assignments.len());
    assignments
}

/// Propagates each cell's resolved code onto every point the cell owns.
///
/// A point's assigned code is only overwritten when the cell's code is
/// non-null and not the `"0"`/empty placeholder; points in unresolved
/// cells are left for the second matching round. Returns the number of
/// updated points.
pub fn propagate_codes(cells: &[RegionCell], links: &mut LinkTable) -> usize {
    let codes: BTreeMap<usize, &String> = cells
        .iter()
        .filter_map(|cell| {
            cell.region
                .as_ref()
                .filter(|code| !code.is_empty() && code.as_str() != "0")
                .map(|code| (cell.id, code))
        })
        .collect();

    let mut updated = 0;
    for link in links.iter_mut() {
        if let Some(code) = link.cell.and_then(|cell| codes.get(&cell)) {
            link.assigned_code = Some((*code).clone());
            updated += 1;
        }
    }
    updated
}

/// Runs the full assignment: join, densities, per-cell resolution, and
/// propagation. Re-running with unchanged inputs yields identical
/// assignments.
pub fn assign_region_codes(
    cells: &mut [RegionCell],
    links: &mut LinkTable,
    config: &AssignConfig,
) -> Vec<RegionAssignment> {
    join_points_to_cells(cells, links);
    compute_densities(links, config.density_radius);
    let assignments = resolve_cell_codes(cells, links, config);
    propagate_codes(cells, links);
    assignments
}
