//! Geometry plumbing shared by every engine that is not itself spatial.
//!
//! All conversions and predicates delegate to the georust stack: `geozero`
//! for WKB/WKT decoding, `geo` for the predicates and measures, `rstar` for
//! the envelope R-tree used to shortlist candidates before exact refinement.
//! Nothing in here implements a spatial algorithm of its own.

use geo::{
    Area, BooleanOps, BoundingRect, Centroid, ConvexHull, EuclideanDistance, Geometry,
    Intersects, LineString, MultiPoint, MultiPolygon, Polygon, Within,
};
use geozero::{CoordDimensions, ToGeo, ToWkb};
use rstar::primitives::{GeomWithData, Rectangle};
use rstar::{RTree, AABB};

use crate::error::{BenchError, Result};

/// Decode a WKB payload into a geo geometry.
pub fn from_wkb(bytes: &[u8]) -> Result<Geometry<f64>> {
    Ok(geozero::wkb::Wkb(bytes).to_geo()?)
}

/// Encode a geometry as (x, y) WKB.
pub fn to_wkb(geom: &Geometry<f64>) -> Result<Vec<u8>> {
    Ok(geom.to_wkb(CoordDimensions::xy())?)
}

/// Parse a WKT literal, used for the fixed query constants.
pub fn from_wkt(text: &str) -> Result<Geometry<f64>> {
    Ok(geozero::wkt::Wkt(text).to_geo()?)
}

/// Planar distance between two geometries, in coordinate units (degrees).
///
/// Dispatches the combinations the dataset produces (points, polygons and
/// their multis); anything else falls back to centroid distance.
pub fn distance(a: &Geometry<f64>, b: &Geometry<f64>) -> f64 {
    match (a, b) {
        (Geometry::Point(p), Geometry::Point(q)) => p.euclidean_distance(q),
        (Geometry::Point(p), Geometry::Polygon(poly)) => p.euclidean_distance(poly),
        (Geometry::Polygon(poly), Geometry::Point(p)) => p.euclidean_distance(poly),
        (Geometry::Point(p), Geometry::MultiPolygon(mp)) => p.euclidean_distance(mp),
        (Geometry::MultiPolygon(mp), Geometry::Point(p)) => p.euclidean_distance(mp),
        (Geometry::Point(p), Geometry::LineString(l)) => p.euclidean_distance(l),
        (Geometry::LineString(l), Geometry::Point(p)) => p.euclidean_distance(l),
        (Geometry::Polygon(pa), Geometry::Polygon(pb)) => pa.euclidean_distance(pb),
        _ => match (a.centroid(), b.centroid()) {
            (Some(ca), Some(cb)) => ca.euclidean_distance(&cb),
            _ => f64::INFINITY,
        },
    }
}

pub fn dwithin(a: &Geometry<f64>, b: &Geometry<f64>, dist: f64) -> bool {
    distance(a, b) <= dist
}

pub fn within(a: &Geometry<f64>, b: &Geometry<f64>) -> bool {
    a.is_within(b)
}

pub fn intersects(a: &Geometry<f64>, b: &Geometry<f64>) -> bool {
    a.intersects(b)
}

pub fn area(geom: &Geometry<f64>) -> f64 {
    geom.unsigned_area()
}

/// Polygonal intersection. Non-areal inputs intersect into the empty
/// multipolygon, matching the area-of-intersection semantics the queries use.
pub fn intersection(a: &Geometry<f64>, b: &Geometry<f64>) -> Geometry<f64> {
    match (as_multi_polygon(a), as_multi_polygon(b)) {
        (Some(ma), Some(mb)) => Geometry::MultiPolygon(ma.intersection(&mb)),
        _ => Geometry::MultiPolygon(MultiPolygon(vec![])),
    }
}

fn as_multi_polygon(geom: &Geometry<f64>) -> Option<MultiPolygon<f64>> {
    match geom {
        Geometry::Polygon(p) => Some(MultiPolygon(vec![p.clone()])),
        Geometry::MultiPolygon(mp) => Some(mp.clone()),
        _ => None,
    }
}

/// Straight line between two point geometries; `None` if either is not a point.
pub fn make_line(a: &Geometry<f64>, b: &Geometry<f64>) -> Option<LineString<f64>> {
    match (a, b) {
        (Geometry::Point(p), Geometry::Point(q)) => {
            Some(LineString::from(vec![(p.x(), p.y()), (q.x(), q.y())]))
        }
        _ => None,
    }
}

pub fn length(geom: &Geometry<f64>) -> f64 {
    use geo::EuclideanLength;
    match geom {
        Geometry::Line(l) => l.euclidean_length(),
        Geometry::LineString(l) => l.euclidean_length(),
        Geometry::MultiLineString(l) => l.euclidean_length(),
        _ => 0.0,
    }
}

pub fn point_x(geom: &Geometry<f64>) -> Option<f64> {
    match geom {
        Geometry::Point(p) => Some(p.x()),
        _ => None,
    }
}

pub fn point_y(geom: &Geometry<f64>) -> Option<f64> {
    match geom {
        Geometry::Point(p) => Some(p.y()),
        _ => None,
    }
}

/// Collect point geometries into a multipoint, skipping anything else.
pub fn collect_points<'a, I>(geoms: I) -> MultiPoint<f64>
where
    I: IntoIterator<Item = &'a Geometry<f64>>,
{
    MultiPoint(
        geoms
            .into_iter()
            .filter_map(|g| match g {
                Geometry::Point(p) => Some(*p),
                _ => None,
            })
            .collect(),
    )
}

pub fn convex_hull(geom: &Geometry<f64>) -> Polygon<f64> {
    match geom {
        Geometry::MultiPoint(mp) => mp.convex_hull(),
        Geometry::Polygon(p) => p.convex_hull(),
        Geometry::MultiPolygon(mp) => mp.convex_hull(),
        Geometry::LineString(l) => l.convex_hull(),
        other => match other.bounding_rect() {
            Some(rect) => rect.to_polygon(),
            None => Polygon::new(LineString::from(Vec::<(f64, f64)>::new()), vec![]),
        },
    }
}

/// Area of the convex hull of a set of points; the q5 measure.
pub fn hull_area(points: &MultiPoint<f64>) -> f64 {
    points.convex_hull().unsigned_area()
}

type Envelope = GeomWithData<Rectangle<[f64; 2]>, usize>;

/// Keyed geometries behind an envelope R-tree. Probes shortlist by bounding
/// box and refine with the exact predicate, the way every library-side
/// spatial join here works.
pub struct SpatialIndex {
    tree: RTree<Envelope>,
    keys: Vec<i64>,
    geoms: Vec<Geometry<f64>>,
}

impl SpatialIndex {
    pub fn build(items: Vec<(i64, Geometry<f64>)>) -> Self {
        let mut keys = Vec::with_capacity(items.len());
        let mut geoms = Vec::with_capacity(items.len());
        let mut envelopes = Vec::with_capacity(items.len());
        for (idx, (key, geom)) in items.into_iter().enumerate() {
            if let Some(rect) = geom.bounding_rect() {
                envelopes.push(GeomWithData::new(
                    Rectangle::from_corners(
                        [rect.min().x, rect.min().y],
                        [rect.max().x, rect.max().y],
                    ),
                    idx,
                ));
            }
            keys.push(key);
            geoms.push(geom);
        }
        Self {
            tree: RTree::bulk_load(envelopes),
            keys,
            geoms,
        }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn key(&self, idx: usize) -> i64 {
        self.keys[idx]
    }

    pub fn geometry(&self, idx: usize) -> &Geometry<f64> {
        &self.geoms[idx]
    }

    /// Key of the indexed geometry containing `point`, lowest key on ties.
    pub fn containing_key(&self, point: &Geometry<f64>) -> Option<i64> {
        let (x, y) = match point {
            Geometry::Point(p) => (p.x(), p.y()),
            _ => return None,
        };
        self.tree
            .locate_in_envelope_intersecting(&AABB::from_point([x, y]))
            .filter(|e| within(point, &self.geoms[e.data]))
            .map(|e| self.keys[e.data])
            .min()
    }

    /// Indexes of geometries within `dist` of `geom` (exact, bbox-shortlisted).
    pub fn within_distance(&self, geom: &Geometry<f64>, dist: f64) -> Vec<usize> {
        let Some(rect) = geom.bounding_rect() else {
            return vec![];
        };
        let probe = AABB::from_corners(
            [rect.min().x - dist, rect.min().y - dist],
            [rect.max().x + dist, rect.max().y + dist],
        );
        self.tree
            .locate_in_envelope_intersecting(&probe)
            .filter(|e| dwithin(geom, &self.geoms[e.data], dist))
            .map(|e| e.data)
            .collect()
    }

    /// Intersecting index pairs `(i, j)` with `i < j` (exact).
    pub fn intersecting_pairs(&self) -> Vec<(usize, usize)> {
        let mut pairs = Vec::new();
        for candidate in self.tree.iter() {
            let i = candidate.data;
            let Some(rect) = self.geoms[i].bounding_rect() else {
                continue;
            };
            let probe = AABB::from_corners(
                [rect.min().x, rect.min().y],
                [rect.max().x, rect.max().y],
            );
            for other in self.tree.locate_in_envelope_intersecting(&probe) {
                let j = other.data;
                if i < j && intersects(&self.geoms[i], &self.geoms[j]) {
                    pairs.push((i, j));
                }
            }
        }
        pairs.sort_unstable();
        pairs
    }

    /// `k` nearest geometries to `point` by exact distance. The envelope tree
    /// shortlists `pool` candidates first, then the true geometries are
    /// measured, so the distances returned stay exact.
    pub fn nearest(&self, point: &Geometry<f64>, k: usize, pool: usize) -> Vec<(usize, f64)> {
        let (x, y) = match point {
            Geometry::Point(p) => (p.x(), p.y()),
            _ => return vec![],
        };
        let mut candidates: Vec<(usize, f64)> = self
            .tree
            .nearest_neighbor_iter(&[x, y])
            .take(pool.max(k))
            .map(|e| (e.data, distance(point, &self.geoms[e.data])))
            .collect();
        candidates.sort_by(|a, b| {
            a.1.partial_cmp(&b.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| self.keys[a.0].cmp(&self.keys[b.0]))
        });
        candidates.truncate(k);
        candidates
    }
}

/// Decode a required WKB value, mapping decode failures to a geometry error.
pub fn decode_required(bytes: Option<&[u8]>, what: &str) -> Result<Geometry<f64>> {
    match bytes {
        Some(b) => from_wkb(b),
        None => Err(BenchError::Geometry(format!("null {what} geometry"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::Point;

    fn point(x: f64, y: f64) -> Geometry<f64> {
        Geometry::Point(Point::new(x, y))
    }

    fn square(x0: f64, y0: f64, side: f64) -> Geometry<f64> {
        Geometry::Polygon(Polygon::new(
            LineString::from(vec![
                (x0, y0),
                (x0 + side, y0),
                (x0 + side, y0 + side),
                (x0, y0 + side),
                (x0, y0),
            ]),
            vec![],
        ))
    }

    #[test]
    fn wkb_roundtrip_preserves_points() {
        let p = point(-111.761, 34.8697);
        let wkb = to_wkb(&p).unwrap();
        let back = from_wkb(&wkb).unwrap();
        assert_eq!(point_x(&back), Some(-111.761));
        assert_eq!(point_y(&back), Some(34.8697));
    }

    #[test]
    fn wkt_constants_parse() {
        let g = from_wkt("POINT (-111.7610 34.8697)").unwrap();
        assert!(matches!(g, Geometry::Point(_)));
    }

    #[test]
    fn point_in_square_is_within() {
        let sq = square(0.0, 0.0, 2.0);
        assert!(within(&point(1.0, 1.0), &sq));
        assert!(!within(&point(3.0, 1.0), &sq));
    }

    #[test]
    fn distance_point_to_polygon_is_zero_inside() {
        let sq = square(0.0, 0.0, 2.0);
        assert_eq!(distance(&point(1.0, 1.0), &sq), 0.0);
        assert!((distance(&point(3.0, 1.0), &sq) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn intersection_area_of_overlapping_squares() {
        let a = square(0.0, 0.0, 2.0);
        let b = square(1.0, 1.0, 2.0);
        let overlap = area(&intersection(&a, &b));
        assert!((overlap - 1.0).abs() < 1e-9);
    }

    #[test]
    fn spatial_index_finds_container_and_neighbors() {
        let index = SpatialIndex::build(vec![
            (10, square(0.0, 0.0, 1.0)),
            (20, square(2.0, 0.0, 1.0)),
            (30, square(4.0, 0.0, 1.0)),
        ]);
        assert_eq!(index.containing_key(&point(0.5, 0.5)), Some(10));
        assert_eq!(index.containing_key(&point(9.0, 9.0)), None);

        let near = index.within_distance(&point(1.9, 0.5), 0.2);
        assert_eq!(near.len(), 1);
        assert_eq!(index.key(near[0]), 20);

        let nearest = index.nearest(&point(2.5, 0.5), 2, 8);
        assert_eq!(index.key(nearest[0].0), 20);
        assert_eq!(nearest[0].1, 0.0);
        assert_eq!(nearest.len(), 2);
    }

    #[test]
    fn intersecting_pairs_are_ordered_and_exact() {
        let index = SpatialIndex::build(vec![
            (1, square(0.0, 0.0, 2.0)),
            (2, square(1.0, 1.0, 2.0)),
            (3, square(10.0, 10.0, 1.0)),
        ]);
        assert_eq!(index.intersecting_pairs(), vec![(0, 1)]);
    }

    #[test]
    fn hull_area_of_unit_triangle() {
        let mp = MultiPoint(vec![
            Point::new(0.0, 0.0),
            Point::new(1.0, 0.0),
            Point::new(0.0, 1.0),
        ]);
        assert!((hull_area(&mp) - 0.5).abs() < 1e-9);
    }
}
