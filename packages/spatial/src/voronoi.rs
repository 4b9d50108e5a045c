//! Voronoi tessellation with bounded reconstruction of unbounded cells.
//!
//! The diagram is computed as the dual of a Bowyer–Watson Delaunay
//! triangulation: every surviving triangle's circumcenter is a Voronoi
//! vertex, and a site's cell collects the circumcenters of its incident
//! triangles. Hull sites own unbounded cells; those are closed off by
//! synthesizing, for every infinite ridge (hull edge), a far vertex at
//! `ridge_midpoint + direction * radius`, where `direction` is the
//! ridge's outward normal relative to the point-set centroid. Every
//! cell's vertices are then ordered counter-clockwise around their
//! centroid, yielding simple polygons.

use geo::{Coord, LineString, Polygon, Rect};

/// Minimum number of distinct sites for a meaningful tessellation.
pub const MIN_SITES: usize = 4;

/// Geometric failures, reported per offending entity.
#[derive(Debug, thiserror::Error)]
pub enum GeometryError {
    /// Fewer distinct input points than [`MIN_SITES`].
    #[error("tessellation requires at least {MIN_SITES} distinct points, got {0}")]
    TooFewPoints(usize),

    /// Two input points share a coordinate value.
    #[error("duplicate coordinate ({x}, {y}) at input index {index}; deduplicate points first")]
    DuplicatePoint {
        /// Index of the second occurrence in the input slice.
        index: usize,
        /// Easting of the duplicate.
        x: f64,
        /// Northing of the duplicate.
        y: f64,
    },

    /// All input points lie on one line; every cell would be an
    /// unbounded strip.
    #[error("input points are collinear; cells cannot be reconstructed")]
    CollinearInput,

    /// A reconstructed cell degenerated below a valid polygon.
    #[error("cell for site {site} at ({x}, {y}) has fewer than 3 vertices")]
    DegenerateCell {
        /// Site index within the deduplicated input.
        site: usize,
        /// Easting of the site.
        x: f64,
        /// Northing of the site.
        y: f64,
    },
}

/// One polygonal cell: the ordered vertex indices enclosing a site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoronoiCell {
    /// Index of the generating point in [`Tessellation::sites`].
    pub site: usize,
    /// Indices into [`Tessellation::vertices`], counter-clockwise.
    pub vertices: Vec<usize>,
}

/// A bounded partition of the plane, one cell per input point.
#[derive(Debug, Clone)]
pub struct Tessellation {
    /// Generating points, in input order.
    pub sites: Vec<(f64, f64)>,
    /// Cell-corner coordinates; finite circumcenters first, synthetic
    /// far vertices appended.
    pub vertices: Vec<(f64, f64)>,
    /// One cell per site, in site order.
    pub cells: Vec<VoronoiCell>,
}

impl Tessellation {
    /// Realizes a cell as a closed polygon.
    #[must_use]
    pub fn cell_polygon(&self, cell: &VoronoiCell) -> Polygon<f64> {
        let ring: Vec<Coord<f64>> = cell
            .vertices
            .iter()
            .map(|&v| {
                let (x, y) = self.vertices[v];
                Coord { x, y }
            })
            .collect();
        Polygon::new(LineString::from(ring), vec![])
    }

    /// Axis-aligned bounding box of a cell.
    #[must_use]
    pub fn cell_bounds(&self, cell: &VoronoiCell) -> Rect<f64> {
        let mut min = (f64::INFINITY, f64::INFINITY);
        let mut max = (f64::NEG_INFINITY, f64::NEG_INFINITY);
        for &v in &cell.vertices {
            let (x, y) = self.vertices[v];
            min.0 = min.0.min(x);
            min.1 = min.1.min(y);
            max.0 = max.0.max(x);
            max.1 = max.1.max(y);
        }
        Rect::new(
            Coord { x: min.0, y: min.1 },
            Coord { x: max.0, y: max.1 },
        )
    }
}

/// Computes the bounded Voronoi tessellation of a set of distinct
/// points.
///
/// `radius` is the distance at which synthetic far vertices are placed
/// for unbounded cells; it defaults to twice the point set's span.
///
/// # Errors
///
/// Returns a [`GeometryError`] when fewer than [`MIN_SITES`] points are
/// given, when two points coincide (the caller must pre-deduplicate by
/// coordinate value), when all points are collinear, or when a cell
/// degenerates below three vertices.
pub fn tessellate(
    points: &[(f64, f64)],
    radius: Option<f64>,
) -> Result<Tessellation, GeometryError> {
    if points.len() < MIN_SITES {
        return Err(GeometryError::TooFewPoints(points.len()));
    }
    check_distinct(points)?;

    let triangles = delaunay(points);
    if triangles.is_empty() {
        return Err(GeometryError::CollinearInput);
    }

    let radius = radius.unwrap_or_else(|| 2.0 * span(points));
    let center = centroid(points);

    // Circumcenters become the finite Voronoi vertices; each site's cell
    // is the set of circumcenters of its incident triangles.
    let mut vertices: Vec<(f64, f64)> = Vec::with_capacity(triangles.len());
    let mut cell_vertices: Vec<Vec<usize>> = vec![Vec::new(); points.len()];
    for tri in &triangles {
        let vertex = vertices.len();
        vertices.push(tri.circumcenter);
        for &site in &tri.sites {
            cell_vertices[site].push(vertex);
        }
    }

    // Hull edges are Delaunay edges with exactly one incident triangle;
    // each is an infinite Voronoi ridge between its two endpoint sites.
    for (a, b) in hull_edges(&triangles) {
        let far = far_vertex(points[a], points[b], center, radius);
        let vertex = vertices.len();
        vertices.push(far);
        cell_vertices[a].push(vertex);
        cell_vertices[b].push(vertex);
    }

    let mut cells = Vec::with_capacity(points.len());
    for (site, mut indices) in cell_vertices.into_iter().enumerate() {
        if indices.len() < 3 {
            let (x, y) = points[site];
            return Err(GeometryError::DegenerateCell { site, x, y });
        }
        sort_counter_clockwise(&mut indices, &vertices);
        cells.push(VoronoiCell {
            site,
            vertices: indices,
        });
    }

    log::debug!(
        "tessellated {} sites into {} cells ({} vertices)",
        points.len(),
        cells.len(),
        vertices.len()
    );

    Ok(Tessellation {
        sites: points.to_vec(),
        vertices,
        cells,
    })
}

fn check_distinct(points: &[(f64, f64)]) -> Result<(), GeometryError> {
    let mut seen = std::collections::BTreeSet::new();
    for (index, &(x, y)) in points.iter().enumerate() {
        if !seen.insert((x.to_bits(), y.to_bits())) {
            return Err(GeometryError::DuplicatePoint { index, x, y });
        }
    }
    Ok(())
}

/// Peak-to-peak spread over both coordinate axes taken together.
fn span(points: &[(f64, f64)]) -> f64 {
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for &(x, y) in points {
        min = min.min(x).min(y);
        max = max.max(x).max(y);
    }
    max - min
}

fn centroid(points: &[(f64, f64)]) -> (f64, f64) {
    let n = points.len() as f64;
    let (sx, sy) = points
        .iter()
        .fold((0.0, 0.0), |(sx, sy), &(x, y)| (sx + x, sy + y));
    (sx / n, sy / n)
}

/// Synthetic endpoint of an infinite ridge between sites `a` and `b`:
/// the ridge midpoint pushed outward (away from the point-set centroid)
/// along the ridge normal.
fn far_vertex(a: (f64, f64), b: (f64, f64), center: (f64, f64), radius: f64) -> (f64, f64) {
    let (tx, ty) = (b.0 - a.0, b.1 - a.1);
    let norm = tx.hypot(ty);
    let (tx, ty) = (tx / norm, ty / norm);
    // Normal of the tangent between the two sites.
    let (nx, ny) = (-ty, tx);
    let midpoint = ((a.0 + b.0) / 2.0, (a.1 + b.1) / 2.0);
    let dot = (midpoint.0 - center.0) * nx + (midpoint.1 - center.1) * ny;
    let sign = if dot < 0.0 { -1.0 } else { 1.0 };
    (
        midpoint.0 + sign * nx * radius,
        midpoint.1 + sign * ny * radius,
    )
}

fn sort_counter_clockwise(indices: &mut [usize], vertices: &[(f64, f64)]) {
    let n = indices.len() as f64;
    let (cx, cy) = indices
        .iter()
        .fold((0.0, 0.0), |(sx, sy), &v| {
            (sx + vertices[v].0, sy + vertices[v].1)
        });
    let (cx, cy) = (cx / n, cy / n);
    indices.sort_by(|&a, &b| {
        let angle_a = (vertices[a].1 - cy).atan2(vertices[a].0 - cx);
        let angle_b = (vertices[b].1 - cy).atan2(vertices[b].0 - cx);
        angle_a.total_cmp(&angle_b)
    });
}

/// A Delaunay triangle over site indices, with its circumcircle cached.
struct Triangle {
    sites: [usize; 3],
    circumcenter: (f64, f64),
    radius_sq: f64,
}

impl Triangle {
    fn new(sites: [usize; 3], points: &[(f64, f64)]) -> Self {
        let (ax, ay) = points[sites[0]];
        let (bx, by) = points[sites[1]];
        let (cx, cy) = points[sites[2]];

        let d = 2.0 * (ax * (by - cy) + bx * (cy - ay) + cx * (ay - by));
        if d.abs() < f64::EPSILON {
            // Collinear triple: treat the circumcircle as all-containing
            // so the triangle is invalidated by the next insertion.
            return Self {
                sites,
                circumcenter: (0.0, 0.0),
                radius_sq: f64::INFINITY,
            };
        }

        let a2 = ax.mul_add(ax, ay * ay);
        let b2 = bx.mul_add(bx, by * by);
        let c2 = cx.mul_add(cx, cy * cy);
        let ux = (a2 * (by - cy) + b2 * (cy - ay) + c2 * (ay - by)) / d;
        let uy = (a2 * (cx - bx) + b2 * (ax - cx) + c2 * (bx - ax)) / d;
        let radius_sq = (ax - ux).mul_add(ax - ux, (ay - uy) * (ay - uy));

        Self {
            sites,
            circumcenter: (ux, uy),
            radius_sq,
        }
    }

    fn circumcircle_contains(&self, point: (f64, f64)) -> bool {
        let dx = point.0 - self.circumcenter.0;
        let dy = point.1 - self.circumcenter.1;
        dx.mul_add(dx, dy * dy) <= self.radius_sq
    }
}

/// Bowyer–Watson incremental Delaunay triangulation.
///
/// Returns only triangles whose three corners are all real sites;
/// collinear input yields an empty set.
fn delaunay(points: &[(f64, f64)]) -> Vec<Triangle> {
    let n = points.len();

    // Super-triangle generously enclosing the input extent.
    let mut min = (f64::INFINITY, f64::INFINITY);
    let mut max = (f64::NEG_INFINITY, f64::NEG_INFINITY);
    for &(x, y) in points {
        min.0 = min.0.min(x);
        min.1 = min.1.min(y);
        max.0 = max.0.max(x);
        max.1 = max.1.max(y);
    }
    let size = (max.0 - min.0).max(max.1 - min.1).max(1.0);
    let mid = ((min.0 + max.0) / 2.0, (min.1 + max.1) / 2.0);

    let mut all: Vec<(f64, f64)> = points.to_vec();
    all.push((mid.0 - 20.0 * size, mid.1 - size));
    all.push((mid.0 + 20.0 * size, mid.1 - size));
    all.push((mid.0, mid.1 + 20.0 * size));

    let mut triangles = vec![Triangle::new([n, n + 1, n + 2], &all)];

    for site in 0..n {
        let point = all[site];

        let (bad, kept): (Vec<Triangle>, Vec<Triangle>) = triangles
            .into_iter()
            .partition(|t| t.circumcircle_contains(point));

        // The cavity boundary: edges of invalidated triangles that are
        // not shared between two invalidated triangles.
        let mut edge_counts: std::collections::BTreeMap<(usize, usize), usize> =
            std::collections::BTreeMap::new();
        for tri in &bad {
            for edge in tri_edges(&tri.sites) {
                *edge_counts.entry(edge).or_insert(0) += 1;
            }
        }

        triangles = kept;
        for ((a, b), count) in edge_counts {
            if count == 1 {
                triangles.push(Triangle::new([a, b, site], &all));
            }
        }
    }

    triangles
        .into_iter()
        .filter(|t| t.sites.iter().all(|&s| s < n))
        .collect()
}

fn tri_edges(sites: &[usize; 3]) -> [(usize, usize); 3] {
    let edge = |a: usize, b: usize| (a.min(b), a.max(b));
    [
        edge(sites[0], sites[1]),
        edge(sites[1], sites[2]),
        edge(sites[2], sites[0]),
    ]
}

/// Delaunay edges with exactly one incident triangle — the convex hull,
/// whose dual Voronoi ridges are infinite.
fn hull_edges(triangles: &[Triangle]) -> Vec<(usize, usize)> {
    let mut edge_counts: std::collections::BTreeMap<(usize, usize), usize> =
        std::collections::BTreeMap::new();
    for tri in triangles {
        for edge in tri_edges(&tri.sites) {
            *edge_counts.entry(edge).or_insert(0) += 1;
        }
    }
    edge_counts
        .into_iter()
        .filter(|&(_, count)| count == 1)
        .map(|(edge, _)| edge)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{Contains, Point};

    const SITES: [(f64, f64); 4] = [(0.0, 0.0), (4.0, 0.0), (1.0, 3.0), (5.0, 4.0)];

    #[test]
    fn four_sites_produce_four_cells() {
        let tess = tessellate(&SITES, None).unwrap();
        assert_eq!(tess.cells.len(), 4);
        for cell in &tess.cells {
            assert!(cell.vertices.len() >= 3);
        }
    }

    #[test]
    fn cell_bounds_cover_their_sites() {
        let tess = tessellate(&SITES, None).unwrap();
        for cell in &tess.cells {
            let bounds = tess.cell_bounds(cell);
            let (x, y) = tess.sites[cell.site];
            assert!(bounds.min().x <= x && x <= bounds.max().x);
            assert!(bounds.min().y <= y && y <= bounds.max().y);
        }
    }

    #[test]
    fn cells_contain_their_sites() {
        let tess = tessellate(&SITES, None).unwrap();
        for cell in &tess.cells {
            let polygon = tess.cell_polygon(cell);
            let (x, y) = tess.sites[cell.site];
            assert!(
                polygon.contains(&Point::new(x, y)),
                "cell {} does not contain its site",
                cell.site
            );
        }
    }

    #[test]
    fn interior_site_gets_finite_cell() {
        let sites = [
            (0.0, 0.0),
            (10.0, 0.0),
            (10.0, 10.0),
            (0.0, 10.0),
            (5.0, 5.0),
        ];
        let tess = tessellate(&sites, None).unwrap();
        let interior = &tess.cells[4];
        // All corner vertices of the interior cell are circumcenters
        // well inside the synthetic radius.
        let bounds = tess.cell_bounds(interior);
        assert!(bounds.max().x - bounds.min().x < 20.0);
        assert!(bounds.max().y - bounds.min().y < 20.0);
    }

    #[test]
    fn cells_are_counter_clockwise() {
        let tess = tessellate(&SITES, None).unwrap();
        for cell in &tess.cells {
            let mut area = 0.0;
            let ring = &cell.vertices;
            for i in 0..ring.len() {
                let (x1, y1) = tess.vertices[ring[i]];
                let (x2, y2) = tess.vertices[ring[(i + 1) % ring.len()]];
                area += x1 * y2 - x2 * y1;
            }
            assert!(area > 0.0, "cell {} is not counter-clockwise", cell.site);
        }
    }

    #[test]
    fn rejects_too_few_points() {
        let result = tessellate(&[(0.0, 0.0), (1.0, 1.0), (2.0, 0.0)], None);
        assert!(matches!(result, Err(GeometryError::TooFewPoints(3))));
    }

    #[test]
    fn rejects_duplicate_points() {
        let result = tessellate(
            &[(0.0, 0.0), (4.0, 0.0), (0.0, 0.0), (5.0, 4.0)],
            None,
        );
        match result {
            Err(GeometryError::DuplicatePoint { index, x, y }) => {
                assert_eq!(index, 2);
                assert!((x - 0.0).abs() < f64::EPSILON);
                assert!((y - 0.0).abs() < f64::EPSILON);
            }
            other => panic!("expected DuplicatePoint, got {other:?}"),
        }
    }

    #[test]
    fn rejects_collinear_points() {
        let result = tessellate(
            &[(0.0, 0.0), (1.0, 0.0), (2.0, 0.0), (3.0, 0.0)],
            None,
        );
        assert!(matches!(result, Err(GeometryError::CollinearInput)));
    }

    #[test]
    fn radius_override_pushes_far_vertices_out() {
        let near = tessellate(&SITES, Some(10.0)).unwrap();
        let far = tessellate(&SITES, Some(1000.0)).unwrap();
        let near_extent = near
            .vertices
            .iter()
            .map(|(x, y)| x.abs().max(y.abs()))
            .fold(0.0, f64::max);
        let far_extent = far
            .vertices
            .iter()
            .map(|(x, y)| x.abs().max(y.abs()))
            .fold(0.0, f64::max);
        assert!(far_extent > near_extent);
    }
}
