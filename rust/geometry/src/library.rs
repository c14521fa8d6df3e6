// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The geometry capability consumed by the topology core.
//!
//! The core never computes predicates itself; it goes through
//! [`GeometryLibrary`]. [`PlanarGeometry`] is the bundled implementation for
//! 2D planar coordinates.

use std::fmt::Debug;

use nalgebra::Point2;

use crate::algorithm::{
    self, dedup_points, point_in_polygon, point_on_segment, point_segment_distance, points_equal,
    segment_intersection, Location, SegmentIntersection,
};
use crate::error::{Error, Result};
use crate::line_merge::line_merge;
use crate::overlay;
use crate::relate::{self, locate_on_line, IntersectionMatrix};
use crate::types::{Geometry, GeometryType, LineString, Polygon};

/// Geometry predicates and constructors the topology relies on.
pub trait GeometryLibrary: Debug + Send + Sync {
    /// OGC validity.
    fn is_valid(&self, geom: &Geometry) -> bool;

    /// OGC simplicity (no self-intersection other than a closing point).
    fn is_simple(&self, geom: &Geometry) -> bool;

    /// DE-9IM matrix of `a` relative to `b`.
    fn relate(&self, a: &Geometry, b: &Geometry) -> Result<IntersectionMatrix>;

    fn relate_matches(&self, matrix: &IntersectionMatrix, pattern: &str) -> Result<bool> {
        matrix.matches(pattern)
    }

    /// Point-set union of all inputs.
    fn union(&self, geoms: &[Geometry]) -> Result<Geometry>;

    fn intersection(&self, a: &Geometry, b: &Geometry) -> Result<Geometry>;

    /// Sews lines into maximal chains.
    fn line_merge(&self, lines: &[LineString]) -> Geometry;

    /// Bundles geometries into a multi geometry or collection without noding.
    fn collect(&self, geoms: Vec<Geometry>) -> Geometry;

    fn within(&self, a: &Geometry, b: &Geometry) -> Result<bool> {
        self.relate(a, b)?.matches("T*F**F***")
    }

    fn distance(&self, a: &Geometry, b: &Geometry) -> Result<f64>;

    fn empty(&self, kind: GeometryType) -> Geometry {
        Geometry::empty(kind)
    }

    /// Builds a polygon from a shell and holes, closing and orienting rings.
    fn build_polygon(&self, shell: LineString, holes: Vec<LineString>) -> Result<Polygon>;

    /// Splits a line at an interior point. `None` when the point is not on the
    /// line interior.
    fn split_line(&self, line: &LineString, at: &Point2<f64>) -> Option<(LineString, LineString)>;

    fn signed_area(&self, ring: &[Point2<f64>]) -> f64 {
        algorithm::signed_area(ring)
    }

    fn point_in_polygon(&self, p: &Point2<f64>, poly: &Polygon) -> Location {
        point_in_polygon(p, poly)
    }
}

/// Planar 2D implementation backed by i_overlay.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlanarGeometry;

impl PlanarGeometry {
    pub fn new() -> Self {
        Self
    }
}

fn finite(p: &Point2<f64>) -> bool {
    p.x.is_finite() && p.y.is_finite()
}

fn line_is_valid(line: &LineString) -> bool {
    line.points.iter().all(finite) && dedup_points(&line.points).len() >= 2
}

fn ring_is_valid(ring: &LineString) -> bool {
    ring.len() >= 4
        && ring.is_closed()
        && line_is_valid(ring)
        && line_is_simple(ring)
        && algorithm::signed_area(&ring.points).abs() > algorithm::EPSILON
}

fn polygon_is_valid(poly: &Polygon) -> bool {
    if poly.is_empty() {
        return true;
    }
    if !ring_is_valid(&poly.exterior) {
        return false;
    }
    poly.interiors.iter().all(|hole| {
        ring_is_valid(hole)
            && hole
                .points
                .iter()
                .all(|p| algorithm::point_in_ring(p, &poly.exterior.points) != Location::Exterior)
    })
}

fn line_is_simple(line: &LineString) -> bool {
    let pts = dedup_points(&line.points);
    let closed = line.is_closed();
    let n = pts.len();
    if n < 2 {
        return true;
    }
    let segs: Vec<(Point2<f64>, Point2<f64>)> = pts.windows(2).map(|w| (w[0], w[1])).collect();

    for i in 0..segs.len() {
        for j in (i + 1)..segs.len() {
            let (a1, a2) = segs[i];
            let (b1, b2) = segs[j];
            match segment_intersection(&a1, &a2, &b1, &b2) {
                SegmentIntersection::None => {}
                SegmentIntersection::Overlap(..) => return false,
                SegmentIntersection::Point(p) => {
                    let adjacent = j == i + 1 && points_equal(&p, &a2);
                    let closing = closed && i == 0 && j == segs.len() - 1 && points_equal(&p, &a1);
                    if !(adjacent || closing) {
                        return false;
                    }
                }
            }
        }
    }
    true
}

/// Vertices and segments of a geometry, plus its polygons for containment.
#[derive(Default)]
struct Parts {
    points: Vec<Point2<f64>>,
    segments: Vec<(Point2<f64>, Point2<f64>)>,
    polygons: Vec<Polygon>,
}

fn decompose(g: &Geometry, out: &mut Parts) {
    match g {
        Geometry::Point(p) => out.points.push(*p),
        Geometry::MultiPoint(pts) => out.points.extend(pts.iter().copied()),
        Geometry::LineString(l) => {
            out.points.extend(l.points.iter().copied());
            out.segments.extend(l.segments());
        }
        Geometry::MultiLineString(ls) => {
            for l in ls {
                decompose(&Geometry::LineString(l.clone()), out);
            }
        }
        Geometry::Polygon(p) => {
            for ring in p.rings() {
                out.points.extend(ring.points.iter().copied());
                out.segments.extend(ring.segments());
            }
            if !p.is_empty() {
                out.polygons.push(p.clone());
            }
        }
        Geometry::MultiPolygon(ps) => {
            for p in ps {
                decompose(&Geometry::Polygon(p.clone()), out);
            }
        }
        Geometry::GeometryCollection(parts) => {
            for part in parts {
                decompose(part, out);
            }
        }
    }
}

/// Points, lines and polygons of a geometry, recursively flattened.
fn flatten(g: &Geometry, pts: &mut Vec<Point2<f64>>, lines: &mut Vec<LineString>, polys: &mut Vec<Polygon>) {
    match g {
        Geometry::Point(p) => pts.push(*p),
        Geometry::MultiPoint(ps) => pts.extend(ps.iter().copied()),
        Geometry::LineString(l) if !l.is_empty() => lines.push(l.clone()),
        Geometry::MultiLineString(ls) => lines.extend(ls.iter().filter(|l| !l.is_empty()).cloned()),
        Geometry::Polygon(p) if !p.is_empty() => polys.push(p.clone()),
        Geometry::MultiPolygon(ps) => polys.extend(ps.iter().filter(|p| !p.is_empty()).cloned()),
        Geometry::GeometryCollection(parts) => {
            for part in parts {
                flatten(part, pts, lines, polys);
            }
        }
        _ => {}
    }
}

/// Collapses single-part results to the single geometry type.
fn assemble(points: Vec<Point2<f64>>, mut lines: Vec<LineString>, mut polys: Vec<Polygon>) -> Geometry {
    let mut parts = Vec::new();
    if !polys.is_empty() {
        parts.push(if polys.len() == 1 {
            Geometry::Polygon(polys.remove(0))
        } else {
            Geometry::MultiPolygon(polys)
        });
    }
    if !lines.is_empty() {
        parts.push(if lines.len() == 1 {
            Geometry::LineString(lines.remove(0))
        } else {
            Geometry::MultiLineString(lines)
        });
    }
    if !points.is_empty() {
        parts.push(if points.len() == 1 {
            Geometry::Point(points[0])
        } else {
            Geometry::MultiPoint(points)
        });
    }
    match parts.len() {
        0 => Geometry::GeometryCollection(Vec::new()),
        1 => parts.remove(0),
        _ => Geometry::GeometryCollection(parts),
    }
}

fn dedup_point_set(points: Vec<Point2<f64>>) -> Vec<Point2<f64>> {
    let mut out: Vec<Point2<f64>> = Vec::with_capacity(points.len());
    for p in points {
        if !out.iter().any(|q| points_equal(q, &p)) {
            out.push(p);
        }
    }
    out
}

fn same_line(a: &LineString, b: &LineString) -> bool {
    a == b || *a == b.reversed()
}

impl GeometryLibrary for PlanarGeometry {
    fn is_valid(&self, geom: &Geometry) -> bool {
        match geom {
            Geometry::Point(p) => finite(p),
            Geometry::MultiPoint(pts) => pts.iter().all(finite),
            Geometry::LineString(l) => l.is_empty() || line_is_valid(l),
            Geometry::MultiLineString(ls) => ls.iter().all(line_is_valid),
            Geometry::Polygon(p) => polygon_is_valid(p),
            Geometry::MultiPolygon(ps) => ps.iter().all(polygon_is_valid),
            Geometry::GeometryCollection(parts) => parts.iter().all(|g| self.is_valid(g)),
        }
    }

    fn is_simple(&self, geom: &Geometry) -> bool {
        match geom {
            Geometry::Point(_) => true,
            Geometry::MultiPoint(pts) => dedup_point_set(pts.clone()).len() == pts.len(),
            Geometry::LineString(l) => line_is_simple(l),
            Geometry::MultiLineString(ls) => ls.iter().all(line_is_simple),
            Geometry::Polygon(p) => p.rings().all(line_is_simple),
            Geometry::MultiPolygon(ps) => ps.iter().all(|p| p.rings().all(line_is_simple)),
            Geometry::GeometryCollection(parts) => parts.iter().all(|g| self.is_simple(g)),
        }
    }

    fn relate(&self, a: &Geometry, b: &Geometry) -> Result<IntersectionMatrix> {
        relate::relate(a, b)
    }

    fn union(&self, geoms: &[Geometry]) -> Result<Geometry> {
        let mut pts = Vec::new();
        let mut lines = Vec::new();
        let mut polys = Vec::new();
        for g in geoms {
            flatten(g, &mut pts, &mut lines, &mut polys);
        }

        let polys = overlay::union(&polys)?;

        let mut unique_lines: Vec<LineString> = Vec::with_capacity(lines.len());
        for line in lines {
            if !unique_lines.iter().any(|l| same_line(l, &line)) {
                unique_lines.push(line);
            }
        }
        let lines = line_merge(&unique_lines);

        let pts: Vec<Point2<f64>> = dedup_point_set(pts)
            .into_iter()
            .filter(|p| !lines.iter().any(|l| locate_on_line(p, l) != Location::Exterior))
            .filter(|p| !polys.iter().any(|poly| point_in_polygon(p, poly) != Location::Exterior))
            .collect();

        Ok(assemble(pts, lines, polys))
    }

    fn intersection(&self, a: &Geometry, b: &Geometry) -> Result<Geometry> {
        match (a, b) {
            (Geometry::Point(p), other) | (other, Geometry::Point(p)) => {
                let hit = match other {
                    Geometry::Point(q) => points_equal(p, q),
                    Geometry::LineString(l) => locate_on_line(p, l) != Location::Exterior,
                    Geometry::Polygon(poly) => point_in_polygon(p, poly) != Location::Exterior,
                    _ => {
                        return Err(Error::Unsupported {
                            op: "intersection",
                            a: a.geometry_type(),
                            b: b.geometry_type(),
                        })
                    }
                };
                Ok(if hit {
                    Geometry::Point(*p)
                } else {
                    Geometry::empty(GeometryType::Point)
                })
            }
            (Geometry::LineString(la), Geometry::LineString(lb)) => {
                let mut points = Vec::new();
                let mut pieces = Vec::new();
                for (a1, a2) in la.segments() {
                    for (b1, b2) in lb.segments() {
                        match segment_intersection(&a1, &a2, &b1, &b2) {
                            SegmentIntersection::None => {}
                            SegmentIntersection::Point(p) => points.push(p),
                            SegmentIntersection::Overlap(p, q) => {
                                pieces.push(LineString::new(vec![p, q]))
                            }
                        }
                    }
                }
                let lines = line_merge(&pieces);
                let points = dedup_point_set(points)
                    .into_iter()
                    .filter(|p| {
                        !lines
                            .iter()
                            .any(|l| l.segments().any(|(s, e)| point_on_segment(p, &s, &e)))
                    })
                    .collect();
                Ok(assemble(points, lines, Vec::new()))
            }
            _ => {
                let mut pa = Vec::new();
                let mut pb = Vec::new();
                let (mut sink_pts, mut sink_lines) = (Vec::new(), Vec::new());
                flatten(a, &mut sink_pts, &mut sink_lines, &mut pa);
                let only_areal_a = sink_pts.is_empty() && sink_lines.is_empty();
                flatten(b, &mut sink_pts, &mut sink_lines, &mut pb);
                if !(only_areal_a && sink_pts.is_empty() && sink_lines.is_empty()) {
                    return Err(Error::Unsupported {
                        op: "intersection",
                        a: a.geometry_type(),
                        b: b.geometry_type(),
                    });
                }
                let polys = overlay::intersection(&pa, &pb)?;
                if polys.is_empty() {
                    return Ok(Geometry::empty(GeometryType::MultiPolygon));
                }
                Ok(assemble(Vec::new(), Vec::new(), polys))
            }
        }
    }

    fn line_merge(&self, lines: &[LineString]) -> Geometry {
        let mut merged = line_merge(lines);
        match merged.len() {
            0 => Geometry::empty(GeometryType::MultiLineString),
            1 => Geometry::LineString(merged.remove(0)),
            _ => Geometry::MultiLineString(merged),
        }
    }

    fn collect(&self, geoms: Vec<Geometry>) -> Geometry {
        let geoms: Vec<Geometry> = geoms.into_iter().filter(|g| !g.is_empty()).collect();
        if geoms.is_empty() {
            return Geometry::GeometryCollection(Vec::new());
        }
        let dims: Vec<Option<u8>> = geoms.iter().map(|g| match g {
            Geometry::Point(_) | Geometry::MultiPoint(_) => Some(0),
            Geometry::LineString(_) | Geometry::MultiLineString(_) => Some(1),
            Geometry::Polygon(_) | Geometry::MultiPolygon(_) => Some(2),
            Geometry::GeometryCollection(_) => None,
        }).collect();
        let homogeneous = dims.iter().all(|d| d.is_some() && *d == dims[0]);
        if !homogeneous {
            return Geometry::GeometryCollection(geoms);
        }

        let mut pts = Vec::new();
        let mut lines = Vec::new();
        let mut polys = Vec::new();
        for g in &geoms {
            flatten(g, &mut pts, &mut lines, &mut polys);
        }
        match dims[0] {
            Some(0) => Geometry::MultiPoint(pts),
            Some(1) => Geometry::MultiLineString(lines),
            _ => Geometry::MultiPolygon(polys),
        }
    }

    fn distance(&self, a: &Geometry, b: &Geometry) -> Result<f64> {
        let mut pa = Parts::default();
        let mut pb = Parts::default();
        decompose(a, &mut pa);
        decompose(b, &mut pb);
        if pa.points.is_empty() || pb.points.is_empty() {
            return Err(Error::InvalidGeometry("distance to an empty geometry".to_string()));
        }

        for (a1, a2) in &pa.segments {
            for (b1, b2) in &pb.segments {
                if segment_intersection(a1, a2, b1, b2) != SegmentIntersection::None {
                    return Ok(0.0);
                }
            }
        }
        let inside = |pts: &[Point2<f64>], polys: &[Polygon]| {
            pts.iter()
                .any(|p| polys.iter().any(|poly| point_in_polygon(p, poly) != Location::Exterior))
        };
        if inside(&pa.points, &pb.polygons) || inside(&pb.points, &pa.polygons) {
            return Ok(0.0);
        }

        let mut best = f64::INFINITY;
        for p in &pa.points {
            for q in &pb.points {
                best = best.min((p - q).norm());
            }
            for (s, e) in &pb.segments {
                best = best.min(point_segment_distance(p, s, e));
            }
        }
        for q in &pb.points {
            for (s, e) in &pa.segments {
                best = best.min(point_segment_distance(q, s, e));
            }
        }
        Ok(best)
    }

    fn build_polygon(&self, shell: LineString, holes: Vec<LineString>) -> Result<Polygon> {
        let close = |ring: LineString| -> Result<LineString> {
            let ring = LineString::new(algorithm::close_ring(dedup_points(&ring.points)));
            if ring.len() < 4 {
                return Err(Error::InvalidGeometry(format!(
                    "ring needs at least 4 points, got {}",
                    ring.len()
                )));
            }
            Ok(ring)
        };
        let shell = close(shell)?;
        let holes = holes.into_iter().map(close).collect::<Result<Vec<_>>>()?;
        Ok(overlay::normalize(Polygon::new(shell, holes)))
    }

    fn split_line(&self, line: &LineString, at: &Point2<f64>) -> Option<(LineString, LineString)> {
        let pts = &line.points;
        if pts.len() < 2 {
            return None;
        }
        if line.start().map_or(true, |s| points_equal(s, at)) || line.end().map_or(true, |e| points_equal(e, at)) {
            return None;
        }
        for i in 0..pts.len() - 1 {
            if !point_on_segment(at, &pts[i], &pts[i + 1]) {
                continue;
            }
            if points_equal(at, &pts[i + 1]) {
                let first = pts[..=i + 1].to_vec();
                let second = pts[i + 1..].to_vec();
                return Some((LineString::new(first), LineString::new(second)));
            }
            let mut first = pts[..=i].to_vec();
            first.push(*at);
            let mut second = vec![*at];
            second.extend_from_slice(&pts[i + 1..]);
            return Some((LineString::new(first), LineString::new(second)));
        }
        None
    }
}
