//! Round 2: spatially scoped re-matching of unresolved links.
//!
//! Links still unmatched after the first round — or whose spatially
//! assigned district disagrees with their original code — are re-scored
//! against contemporary candidates restricted to their district's
//! bounding box. Boxes come from the tessellation: either directly from
//! the envelopes of cells assigned to the district, or from a second
//! tessellation built over per-district centroid points. Round 2 only
//! rewrites existing links (statuses 200/201); it never creates records
//! and never sets a link back to unmatched.

use std::collections::BTreeMap;

use geo::{Centroid, Coord, Rect};
use placelink_models::{
    AddressCollection, AddressRecord, DistanceKind, FieldSelection, LinkTable, MatchStatus,
    RecordId, RegionBoxMethod,
};
use placelink_spatial::{RegionCell, build_cells, tessellate};
use placelink_tokenize::{TokenSet, tokenize};

use crate::MatchError;
use crate::matcher::best_candidate;

/// Round-2 matching configuration.
#[derive(Debug, Clone, Copy)]
pub struct SecondPassConfig {
    /// Token-set similarity measure.
    pub distance: DistanceKind,
    /// Minimum similarity (0..=1); typically looser than round 1.
    pub threshold: f64,
    /// How district bounding boxes are derived.
    pub box_method: RegionBoxMethod,
    /// Query tokens must be longer than this many characters.
    pub min_token_len: usize,
}

impl Default for SecondPassConfig {
    fn default() -> Self {
        Self {
            distance: DistanceKind::Levenshtein,
            threshold: 0.8,
            box_method: RegionBoxMethod::AssignedCells,
            min_token_len: 2,
        }
    }
}

/// Counts from one second-pass run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SecondPassSummary {
    /// Districts with a usable bounding box.
    pub districts: usize,
    /// Links that were eligible for re-matching.
    pub eligible: usize,
    /// Links rewritten to spatially-reassigned.
    pub reassigned: usize,
    /// Links left spatially-unresolved.
    pub unresolved: usize,
}

/// Derives one bounding box per district code present on the cells,
/// clamped to the contemporary extent.
///
/// # Errors
///
/// Propagates tessellation failures from the centroid method (which
/// needs at least four districts to tessellate).
pub fn region_bounding_boxes(
    cells: &[RegionCell],
    method: RegionBoxMethod,
    extent: Rect<f64>,
) -> Result<Vec<(String, Rect<f64>)>, MatchError> {
    match method {
        RegionBoxMethod::AssignedCells => Ok(assigned_cell_boxes(cells, extent)),
        RegionBoxMethod::CentroidTessellation => centroid_tessellation_boxes(cells, extent),
    }
}

fn assigned_cell_boxes(cells: &[RegionCell], extent: Rect<f64>) -> Vec<(String, Rect<f64>)> {
    let mut by_region: BTreeMap<&String, Rect<f64>> = BTreeMap::new();
    for cell in cells {
        let Some(region) = cell.region.as_ref() else {
            continue;
        };
        let bounds = cell.bounds();
        by_region
            .entry(region)
            .and_modify(|rect| *rect = union_rect(*rect, bounds))
            .or_insert(bounds);
    }

    by_region
        .into_iter()
        .filter_map(|(region, rect)| {
            clamp_rect(rect, extent).map(|clamped| (region.clone(), clamped))
        })
        .collect()
}

fn centroid_tessellation_boxes(
    cells: &[RegionCell],
    extent: Rect<f64>,
) -> Result<Vec<(String, Rect<f64>)>, MatchError> {
    // Mean centroid per district, over the district's cells whose
    // envelope lies inside the study extent (synthetic far vertices push
    // hull-cell envelopes outside it).
    let mut sums: BTreeMap<&String, (f64, f64, usize)> = BTreeMap::new();
    for cell in cells {
        let Some(region) = cell.region.as_ref() else {
            continue;
        };
        if !rect_within(cell.bounds(), extent) {
            continue;
        }
        let Some(centroid) = cell.polygon.centroid() else {
            continue;
        };
        let entry = sums.entry(region).or_insert((0.0, 0.0, 0));
        entry.0 += centroid.x();
        entry.1 += centroid.y();
        entry.2 += 1;
    }

    let regions: Vec<&String> = sums.keys().copied().collect();
    let sites: Vec<(f64, f64)> = sums
        .values()
        .map(|&(x, y, n)| (x / n as f64, y / n as f64))
        .collect();

    let tessellation = tessellate(&sites, None)?;
    let region_cells = build_cells(&tessellation);

    Ok(regions
        .into_iter()
        .zip(&region_cells)
        .filter_map(|(region, cell)| {
            clamp_rect(cell.bounds(), extent).map(|clamped| (region.clone(), clamped))
        })
        .collect())
}

/// Re-matches eligible links per district, mutating the table in place.
///
/// # Errors
///
/// Returns a [`MatchError`] when an eligible link's historical id is
/// missing from the historical snapshot (mismatched inputs) or when box
/// derivation fails geometrically.
pub fn run_second_pass(
    links: &mut LinkTable,
    historical: &AddressCollection,
    contemporary: &AddressCollection,
    cells: &[RegionCell],
    config: &SecondPassConfig,
) -> Result<SecondPassSummary, MatchError> {
    let mut summary = SecondPassSummary::default();

    let Some(extent) = collection_extent(contemporary) else {
        log::warn!("contemporary collection has no coordinates; skipping second pass");
        return Ok(summary);
    };

    let boxes = region_bounding_boxes(cells, config.box_method, extent)?;
    summary.districts = boxes.len();
    log::info!("second pass over {} district boxes", summary.districts);

    for (district, rect) in boxes {
        let eligible: Vec<RecordId> = links
            .iter()
            .filter(|link| {
                if link.district_code.as_deref() != Some(district.as_str()) {
                    return false;
                }
                match link.status {
                    MatchStatus::Unmatched | MatchStatus::SpatiallyUnresolved => true,
                    MatchStatus::Matched | MatchStatus::SpatiallyReassigned => link
                        .assigned_code
                        .as_ref()
                        .is_some_and(|assigned| Some(assigned) != link.district_code.as_ref()),
                }
            })
            .map(|link| link.historical_id)
            .collect();
        if eligible.is_empty() {
            continue;
        }

        let subset: Vec<AddressRecord> = contemporary
            .iter()
            .filter(|record| {
                record.coord().is_some_and(|(x, y)| {
                    x > rect.min().x && x < rect.max().x && y > rect.min().y && y < rect.max().y
                })
            })
            .cloned()
            .collect();
        let subset =
            AddressCollection::from_records(subset).map_err(|id| MatchError::DuplicateRecord { id })?;
        let blocking = placelink_blocking::BlockingIndex::build(&subset);
        log::debug!(
            "district {district}: {} eligible links, {} in-box candidates",
            eligible.len(),
            subset.len()
        );

        for id in eligible {
            summary.eligible += 1;
            let record = historical
                .get(id)
                .ok_or(MatchError::MissingRecord { id })?;

            let tokens: TokenSet = tokenize(record, FieldSelection::NAME_STREET)
                .iter()
                .filter(|token| token.chars().count() > config.min_token_len)
                .collect();

            let best = if tokens.is_empty() {
                None
            } else {
                best_candidate(
                    &tokens,
                    blocking.candidates(&tokens, &std::collections::BTreeSet::new(), &Default::default()),
                    &subset,
                    FieldSelection::NAME_STREET,
                    config.distance,
                )?
            };

            let Some(link) = links.get_mut(id) else {
                return Err(MatchError::MissingRecord { id });
            };
            match best {
                Some((candidate_id, score)) if score >= config.threshold => {
                    let candidate = subset
                        .get(candidate_id)
                        .ok_or(MatchError::MissingRecord { id: candidate_id })?;
                    link.contemporary_id = Some(candidate_id);
                    link.score = score * 100.0;
                    link.easting = candidate.easting;
                    link.northing = candidate.northing;
                    link.assigned_code = Some(district.clone());
                    link.status = MatchStatus::SpatiallyReassigned;
                    summary.reassigned += 1;
                }
                _ => {
                    link.status = MatchStatus::SpatiallyUnresolved;
                    summary.unresolved += 1;
                }
            }
        }
    }

    log::info!(
        "round 2 complete: {} reassigned, {} unresolved of {} eligible",
        summary.reassigned,
        summary.unresolved,
        summary.eligible
    );
    Ok(summary)
}

fn collection_extent(collection: &AddressCollection) -> Option<Rect<f64>> {
    let mut min = (f64::INFINITY, f64::INFINITY);
    let mut max = (f64::NEG_INFINITY, f64::NEG_INFINITY);
    let mut any = false;
    for record in collection {
        if let Some((x, y)) = record.coord() {
            min.0 = min.0.min(x);
            min.1 = min.1.min(y);
            max.0 = max.0.max(x);
            max.1 = max.1.max(y);
            any = true;
        }
    }
    any.then(|| {
        Rect::new(
            Coord { x: min.0, y: min.1 },
            Coord { x: max.0, y: max.1 },
        )
    })
}

fn union_rect(a: Rect<f64>, b: Rect<f64>) -> Rect<f64> {
    Rect::new(
        Coord {
            x: a.min().x.min(b.min().x),
            y: a.min().y.min(b.min().y),
        },
        Coord {
            x: a.max().x.max(b.max().x),
            y: a.max().y.max(b.max().y),
        },
    )
}

/// Intersection of a region box with the study extent; `None` when they
/// do not overlap.
fn clamp_rect(rect: Rect<f64>, extent: Rect<f64>) -> Option<Rect<f64>> {
    let min_x = rect.min().x.max(extent.min().x);
    let min_y = rect.min().y.max(extent.min().y);
    let max_x = rect.max().x.min(extent.max().x);
    let max_y = rect.max().y.min(extent.max().y);
    (min_x < max_x && min_y < max_y).then(|| {
        Rect::new(Coord { x: min_x, y: min_y }, Coord { x: max_x, y: max_y })
    })
}

fn rect_within(inner: Rect<f64>, outer: Rect<f64>) -> bool {
    inner.min().x > outer.min().x
        && inner.min().y > outer.min().y
        && inner.max().x < outer.max().x
        && inner.max().y < outer.max().y
}
