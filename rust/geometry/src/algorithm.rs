// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Low-level planar algorithms: orientation, areas, segment intersection and
//! point location.

use nalgebra::Point2;
use serde::{Deserialize, Serialize};

/// Coordinate tolerance used by all predicates.
pub const EPSILON: f64 = 1e-9;

/// Coordinate equality within [`EPSILON`].
#[inline]
pub fn points_equal(a: &Point2<f64>, b: &Point2<f64>) -> bool {
    (a.x - b.x).abs() <= EPSILON && (a.y - b.y).abs() <= EPSILON
}

/// Twice the signed area of triangle `abc`; positive when counter-clockwise.
#[inline]
pub fn orient2d(a: &Point2<f64>, b: &Point2<f64>, c: &Point2<f64>) -> f64 {
    (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x)
}

/// Signed area of a ring (shoelace).
/// Positive = counter-clockwise, negative = clockwise.
///
/// Accepts closed or open rings; a repeated closing point contributes nothing.
pub fn signed_area(ring: &[Point2<f64>]) -> f64 {
    if ring.len() < 3 {
        return 0.0;
    }

    let mut area = 0.0;
    let n = ring.len();

    for i in 0..n {
        let j = (i + 1) % n;
        area += ring[i].x * ring[j].y;
        area -= ring[j].x * ring[i].y;
    }

    area * 0.5
}

/// Direction of the vector `from -> to`, in radians within `(-pi, pi]`.
#[inline]
pub fn azimuth(from: &Point2<f64>, to: &Point2<f64>) -> f64 {
    (to.y - from.y).atan2(to.x - from.x)
}

/// Whether `p` lies on the closed segment `ab`.
pub fn point_on_segment(p: &Point2<f64>, a: &Point2<f64>, b: &Point2<f64>) -> bool {
    point_segment_distance(p, a, b) <= EPSILON
}

/// Euclidean distance from `p` to the closed segment `ab`.
pub fn point_segment_distance(p: &Point2<f64>, a: &Point2<f64>, b: &Point2<f64>) -> f64 {
    let ab = b - a;
    let len2 = ab.norm_squared();
    if len2 <= EPSILON * EPSILON {
        return (p - a).norm();
    }
    let t = ((p - a).dot(&ab) / len2).clamp(0.0, 1.0);
    let proj = a + ab * t;
    (p - proj).norm()
}

/// Result of intersecting two closed segments.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SegmentIntersection {
    None,
    Point(Point2<f64>),
    /// Collinear overlap of positive length, given by its two end points.
    Overlap(Point2<f64>, Point2<f64>),
}

/// Intersects segment `a1a2` with segment `b1b2`.
pub fn segment_intersection(
    a1: &Point2<f64>,
    a2: &Point2<f64>,
    b1: &Point2<f64>,
    b2: &Point2<f64>,
) -> SegmentIntersection {
    let d1 = orient2d(b1, b2, a1);
    let d2 = orient2d(b1, b2, a2);
    let d3 = orient2d(a1, a2, b1);
    let d4 = orient2d(a1, a2, b2);

    let len_a = (a2 - a1).norm();
    let len_b = (b2 - b1).norm();
    let tol_a = EPSILON * len_a.max(1.0);
    let tol_b = EPSILON * len_b.max(1.0);

    let collinear = d1.abs() <= tol_b && d2.abs() <= tol_b && d3.abs() <= tol_a && d4.abs() <= tol_a;
    if collinear {
        return collinear_overlap(a1, a2, b1, b2);
    }

    // Proper crossing
    if ((d1 > tol_b && d2 < -tol_b) || (d1 < -tol_b && d2 > tol_b))
        && ((d3 > tol_a && d4 < -tol_a) || (d3 < -tol_a && d4 > tol_a))
    {
        let t = d1 / (d1 - d2);
        let p = a1 + (a2 - a1) * t;
        return SegmentIntersection::Point(p);
    }

    // Touching at an endpoint
    for (p, a, b) in [(a1, b1, b2), (a2, b1, b2)] {
        if point_on_segment(p, a, b) {
            return SegmentIntersection::Point(*p);
        }
    }
    for (p, a, b) in [(b1, a1, a2), (b2, a1, a2)] {
        if point_on_segment(p, a, b) {
            return SegmentIntersection::Point(*p);
        }
    }

    SegmentIntersection::None
}

fn collinear_overlap(
    a1: &Point2<f64>,
    a2: &Point2<f64>,
    b1: &Point2<f64>,
    b2: &Point2<f64>,
) -> SegmentIntersection {
    let dir = a2 - a1;
    let len2 = dir.norm_squared();
    if len2 <= EPSILON * EPSILON {
        return if point_on_segment(a1, b1, b2) {
            SegmentIntersection::Point(*a1)
        } else {
            SegmentIntersection::None
        };
    }

    let param = |p: &Point2<f64>| (p - a1).dot(&dir) / len2;
    let (mut tb1, mut tb2) = (param(b1), param(b2));
    if tb1 > tb2 {
        std::mem::swap(&mut tb1, &mut tb2);
    }
    let lo = tb1.max(0.0);
    let hi = tb2.min(1.0);
    let tol = EPSILON / len2.sqrt();

    if hi < lo - tol {
        SegmentIntersection::None
    } else if hi - lo <= tol {
        SegmentIntersection::Point(a1 + dir * lo)
    } else {
        SegmentIntersection::Overlap(a1 + dir * lo, a1 + dir * hi)
    }
}

/// DE-9IM location of a point relative to a geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Location {
    Interior = 0,
    Boundary = 1,
    Exterior = 2,
}

/// Locates `p` relative to a closed ring, treated as the polygon it bounds.
pub fn point_in_ring(p: &Point2<f64>, ring: &[Point2<f64>]) -> Location {
    if ring.len() < 3 {
        return Location::Exterior;
    }

    for w in ring.windows(2) {
        if point_on_segment(p, &w[0], &w[1]) {
            return Location::Boundary;
        }
    }

    // Ray casting
    let mut inside = false;
    let n = ring.len();
    let mut j = n - 1;
    for i in 0..n {
        let pi = &ring[i];
        let pj = &ring[j];

        if ((pi.y > p.y) != (pj.y > p.y)) && (p.x < (pj.x - pi.x) * (p.y - pi.y) / (pj.y - pi.y) + pi.x)
        {
            inside = !inside;
        }
        j = i;
    }

    if inside {
        Location::Interior
    } else {
        Location::Exterior
    }
}

/// Locates `p` relative to a polygon with holes.
pub fn point_in_polygon(p: &Point2<f64>, poly: &crate::Polygon) -> Location {
    match point_in_ring(p, &poly.exterior.points) {
        Location::Interior => {}
        other => return other,
    }
    for hole in &poly.interiors {
        match point_in_ring(p, &hole.points) {
            Location::Interior => return Location::Exterior,
            Location::Boundary => return Location::Boundary,
            Location::Exterior => {}
        }
    }
    Location::Interior
}

/// Returns a copy of the ring wound counter-clockwise.
pub fn ensure_ccw(ring: &[Point2<f64>]) -> Vec<Point2<f64>> {
    if signed_area(ring) < 0.0 {
        ring.iter().rev().cloned().collect()
    } else {
        ring.to_vec()
    }
}

/// Returns a copy of the ring wound clockwise.
pub fn ensure_cw(ring: &[Point2<f64>]) -> Vec<Point2<f64>> {
    if signed_area(ring) > 0.0 {
        ring.iter().rev().cloned().collect()
    } else {
        ring.to_vec()
    }
}

/// Appends the first point when the ring is open.
pub fn close_ring(mut ring: Vec<Point2<f64>>) -> Vec<Point2<f64>> {
    if let (Some(first), Some(last)) = (ring.first().copied(), ring.last()) {
        if !points_equal(&first, last) {
            ring.push(first);
        }
    }
    ring
}

/// Removes consecutive duplicate points.
pub fn dedup_points(points: &[Point2<f64>]) -> Vec<Point2<f64>> {
    let mut out: Vec<Point2<f64>> = Vec::with_capacity(points.len());
    for p in points {
        if out.last().map_or(true, |last| !points_equal(last, p)) {
            out.push(*p);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn square() -> Vec<Point2<f64>> {
        vec![
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 0.0),
            Point2::new(1.0, 1.0),
            Point2::new(0.0, 1.0),
            Point2::new(0.0, 0.0),
        ]
    }

    #[test]
    fn test_signed_area_ccw() {
        assert_relative_eq!(signed_area(&square()), 1.0);
    }

    #[test]
    fn test_signed_area_cw() {
        let cw: Vec<_> = square().into_iter().rev().collect();
        assert_relative_eq!(signed_area(&cw), -1.0);
    }

    #[test]
    fn test_segment_crossing() {
        let r = segment_intersection(
            &Point2::new(0.0, 0.0),
            &Point2::new(2.0, 2.0),
            &Point2::new(0.0, 2.0),
            &Point2::new(2.0, 0.0),
        );
        match r {
            SegmentIntersection::Point(p) => {
                assert_relative_eq!(p.x, 1.0);
                assert_relative_eq!(p.y, 1.0);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_segment_touching_endpoint() {
        let r = segment_intersection(
            &Point2::new(0.0, 0.0),
            &Point2::new(1.0, 0.0),
            &Point2::new(1.0, 0.0),
            &Point2::new(1.0, 1.0),
        );
        assert_eq!(r, SegmentIntersection::Point(Point2::new(1.0, 0.0)));
    }

    #[test]
    fn test_segment_overlap() {
        let r = segment_intersection(
            &Point2::new(0.0, 0.0),
            &Point2::new(4.0, 0.0),
            &Point2::new(2.0, 0.0),
            &Point2::new(6.0, 0.0),
        );
        assert_eq!(
            r,
            SegmentIntersection::Overlap(Point2::new(2.0, 0.0), Point2::new(4.0, 0.0))
        );
    }

    #[test]
    fn test_segment_disjoint_parallel() {
        let r = segment_intersection(
            &Point2::new(0.0, 0.0),
            &Point2::new(4.0, 0.0),
            &Point2::new(0.0, 1.0),
            &Point2::new(4.0, 1.0),
        );
        assert_eq!(r, SegmentIntersection::None);
    }

    #[test]
    fn test_point_in_ring() {
        let ring = square();
        assert_eq!(point_in_ring(&Point2::new(0.5, 0.5), &ring), Location::Interior);
        assert_eq!(point_in_ring(&Point2::new(1.0, 0.5), &ring), Location::Boundary);
        assert_eq!(point_in_ring(&Point2::new(1.5, 0.5), &ring), Location::Exterior);
    }

    #[test]
    fn test_azimuth_quadrants() {
        let o = Point2::new(0.0, 0.0);
        assert_relative_eq!(azimuth(&o, &Point2::new(1.0, 0.0)), 0.0);
        assert_relative_eq!(azimuth(&o, &Point2::new(0.0, 1.0)), std::f64::consts::FRAC_PI_2);
    }

    #[test]
    fn test_dedup_points() {
        let pts = vec![Point2::new(0.0, 0.0), Point2::new(0.0, 0.0), Point2::new(1.0, 0.0)];
        assert_eq!(dedup_points(&pts).len(), 2);
    }
}
