//! Radius-neighbor point density over a spatial index.

use placelink_models::RecordId;
use rstar::RTree;

/// Computes the local density of every observation point.
///
/// An R-tree is built over all observations; each point's density is the
/// share of observations lying within `radius` of it (the point itself
/// included), scaled to [0, 100]. `ids` pairs each observation with its
/// owning record — duplicate ids (replicated observations) keep the
/// first density value encountered, so the result carries one entry per
/// distinct record id, in first-seen order.
///
/// `points` and `ids` must be the same length; empty input yields an
/// empty result.
#[must_use]
pub fn point_density(
    points: &[(f64, f64)],
    ids: &[RecordId],
    radius: f64,
) -> Vec<(RecordId, f64)> {
    debug_assert_eq!(points.len(), ids.len());
    if points.is_empty() {
        return Vec::new();
    }

    let observations: Vec<[f64; 2]> = points.iter().map(|&(x, y)| [x, y]).collect();
    let tree = RTree::bulk_load(observations.clone());
    let total = ids.len() as f64;

    let mut result: Vec<(RecordId, f64)> = Vec::new();
    let mut seen = std::collections::BTreeSet::new();
    for (observation, &id) in observations.iter().zip(ids) {
        if !seen.insert(id) {
            continue;
        }
        let neighbors = tree
            .locate_within_distance(*observation, radius * radius)
            .count();
        result.push((id, (neighbors as f64 / total) * 100.0));
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_regression_fixture() {
        let points = [(1.0, 2.0), (3.0, 4.0), (4.0, 5.0), (100.0, 100.0)];
        let ids = [1, 2, 3, 4];
        let densities = point_density(&points, &ids, 3.0);
        assert_eq!(
            densities,
            vec![(1, 50.0), (2, 75.0), (3, 50.0), (4, 25.0)]
        );
    }

    #[test]
    fn replicated_observations_keep_first_density() {
        // One record weighted 3x, one weighted once: four observations.
        let points = [(0.0, 0.0), (0.0, 0.0), (0.0, 0.0), (10.0, 10.0)];
        let ids = [7, 7, 7, 8];
        let densities = point_density(&points, &ids, 1.0);
        assert_eq!(densities, vec![(7, 75.0), (8, 25.0)]);
    }

    #[test]
    fn radius_boundary_is_inclusive() {
        let points = [(0.0, 0.0), (3.0, 0.0), (7.0, 0.0), (20.0, 0.0)];
        let ids = [1, 2, 3, 4];
        let densities = point_density(&points, &ids, 3.0);
        // (0,0) and (3,0) are exactly radius apart and count each other.
        assert_eq!(densities[0], (1, 50.0));
        assert_eq!(densities[1], (2, 50.0));
    }

    #[test]
    fn empty_input_yields_empty_result() {
        assert!(point_density(&[], &[], 3.0).is_empty());
    }
}
