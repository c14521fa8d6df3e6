// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! DE-9IM intersection matrices and the planar `relate` predicate.
//!
//! Supported operand pairs are the ones a planar topology needs: points,
//! single line strings and (multi)polygons. Lines follow the Mod-2 boundary
//! rule, so closed lines have an empty boundary.

use std::fmt;
use std::str::FromStr;

use nalgebra::Point2;
use serde::{Deserialize, Serialize};

use crate::algorithm::{
    point_in_polygon, points_equal, segment_intersection, Location, SegmentIntersection, EPSILON,
};
use crate::error::{Error, Result};
use crate::overlay;
use crate::types::{Geometry, LineString, Polygon};

/// Dimension of an intersection cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Dimension {
    /// `F`
    Empty,
    /// `0`
    Point,
    /// `1`
    Line,
    /// `2`
    Area,
}

impl Dimension {
    pub fn as_char(&self) -> char {
        match self {
            Dimension::Empty => 'F',
            Dimension::Point => '0',
            Dimension::Line => '1',
            Dimension::Area => '2',
        }
    }

    fn from_char(c: char) -> Option<Self> {
        match c {
            'F' | 'f' => Some(Dimension::Empty),
            '0' => Some(Dimension::Point),
            '1' => Some(Dimension::Line),
            '2' => Some(Dimension::Area),
            _ => None,
        }
    }
}

/// A 3x3 DE-9IM matrix indexed by (location in A, location in B).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IntersectionMatrix {
    cells: [[Dimension; 3]; 3],
}

impl Default for IntersectionMatrix {
    fn default() -> Self {
        Self {
            cells: [[Dimension::Empty; 3]; 3],
        }
    }
}

impl IntersectionMatrix {
    /// All cells empty except exterior/exterior, which is always 2 in the plane.
    pub fn new() -> Self {
        let mut m = Self::default();
        m.set(Location::Exterior, Location::Exterior, Dimension::Area);
        m
    }

    pub fn get(&self, a: Location, b: Location) -> Dimension {
        self.cells[a as usize][b as usize]
    }

    pub fn set(&mut self, a: Location, b: Location, dim: Dimension) {
        self.cells[a as usize][b as usize] = dim;
    }

    /// Raises a cell to at least `dim`.
    pub fn set_at_least(&mut self, a: Location, b: Location, dim: Dimension) {
        let cell = &mut self.cells[a as usize][b as usize];
        if dim > *cell {
            *cell = dim;
        }
    }

    pub fn transpose(&self) -> Self {
        let mut t = Self::default();
        for i in 0..3 {
            for j in 0..3 {
                t.cells[j][i] = self.cells[i][j];
            }
        }
        t
    }

    /// Matches the matrix against a 9-character pattern over `T F * 0 1 2`.
    pub fn matches(&self, pattern: &str) -> Result<bool> {
        let chars: Vec<char> = pattern.chars().collect();
        if chars.len() != 9 {
            return Err(Error::InvalidPattern(pattern.to_string()));
        }
        let mut ok = true;
        for (idx, c) in chars.iter().enumerate() {
            let cell = self.cells[idx / 3][idx % 3];
            let hit = match c {
                '*' => true,
                'T' | 't' => cell != Dimension::Empty,
                other => match Dimension::from_char(*other) {
                    Some(dim) => cell == dim,
                    None => return Err(Error::InvalidPattern(pattern.to_string())),
                },
            };
            ok &= hit;
        }
        Ok(ok)
    }
}

impl fmt::Display for IntersectionMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in &self.cells {
            for cell in row {
                write!(f, "{}", cell.as_char())?;
            }
        }
        Ok(())
    }
}

impl FromStr for IntersectionMatrix {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let chars: Vec<char> = s.chars().collect();
        if chars.len() != 9 {
            return Err(Error::InvalidPattern(s.to_string()));
        }
        let mut m = Self::default();
        for (idx, c) in chars.into_iter().enumerate() {
            let dim = Dimension::from_char(c).ok_or_else(|| Error::InvalidPattern(s.to_string()))?;
            m.cells[idx / 3][idx % 3] = dim;
        }
        Ok(m)
    }
}

// ============================================================================
// relate
// ============================================================================

/// Computes the DE-9IM matrix of `a` relative to `b`.
pub fn relate(a: &Geometry, b: &Geometry) -> Result<IntersectionMatrix> {
    let unsupported = || Error::Unsupported {
        op: "relate",
        a: a.geometry_type(),
        b: b.geometry_type(),
    };

    match (a, b) {
        (Geometry::Point(p), Geometry::Point(q)) => Ok(relate_point_point(p, q)),
        (Geometry::Point(p), Geometry::LineString(l)) => Ok(relate_point_line(p, l)),
        (Geometry::LineString(l), Geometry::Point(p)) => Ok(relate_point_line(p, l).transpose()),
        (Geometry::LineString(l1), Geometry::LineString(l2)) => Ok(relate_lines(l1, l2)),
        (Geometry::Point(p), g) if areal_parts(g).is_some() => {
            let polys = areal_parts(g).ok_or_else(unsupported)?;
            Ok(relate_point_areas(p, &polys))
        }
        (g, Geometry::Point(p)) if areal_parts(g).is_some() => {
            let polys = areal_parts(g).ok_or_else(unsupported)?;
            Ok(relate_point_areas(p, &polys).transpose())
        }
        _ => match (areal_parts(a), areal_parts(b)) {
            (Some(pa), Some(pb)) => relate_areas(&pa, &pb),
            _ => Err(unsupported()),
        },
    }
}

fn areal_parts(g: &Geometry) -> Option<Vec<Polygon>> {
    match g {
        Geometry::Polygon(p) => Some(if p.is_empty() { Vec::new() } else { vec![p.clone()] }),
        Geometry::MultiPolygon(ps) => Some(ps.iter().filter(|p| !p.is_empty()).cloned().collect()),
        _ => None,
    }
}

fn relate_point_point(p: &Point2<f64>, q: &Point2<f64>) -> IntersectionMatrix {
    let mut m = IntersectionMatrix::new();
    if points_equal(p, q) {
        m.set(Location::Interior, Location::Interior, Dimension::Point);
    } else {
        m.set(Location::Interior, Location::Exterior, Dimension::Point);
        m.set(Location::Exterior, Location::Interior, Dimension::Point);
    }
    m
}

/// Boundary points of a line under the Mod-2 rule.
pub fn line_boundary(line: &LineString) -> Vec<Point2<f64>> {
    if line.len() < 2 || line.is_closed() {
        return Vec::new();
    }
    match (line.start(), line.end()) {
        (Some(s), Some(e)) => vec![*s, *e],
        _ => Vec::new(),
    }
}

/// Locates a point relative to a line.
pub fn locate_on_line(p: &Point2<f64>, line: &LineString) -> Location {
    if line_boundary(line).iter().any(|b| points_equal(b, p)) {
        return Location::Boundary;
    }
    if line
        .segments()
        .any(|(a, b)| crate::algorithm::point_on_segment(p, &a, &b))
    {
        return Location::Interior;
    }
    Location::Exterior
}

fn relate_point_line(p: &Point2<f64>, line: &LineString) -> IntersectionMatrix {
    let mut m = IntersectionMatrix::new();
    let loc = locate_on_line(p, line);
    m.set(Location::Interior, loc, Dimension::Point);
    m.set(Location::Exterior, Location::Interior, Dimension::Line);
    if line_boundary(line).iter().any(|b| !points_equal(b, p)) {
        m.set(Location::Exterior, Location::Boundary, Dimension::Point);
    }
    m
}

fn relate_lines(a: &LineString, b: &LineString) -> IntersectionMatrix {
    let mut m = IntersectionMatrix::new();
    let mut points = Vec::new();
    let mut has_overlap = false;

    for (a1, a2) in a.segments() {
        for (b1, b2) in b.segments() {
            match segment_intersection(&a1, &a2, &b1, &b2) {
                SegmentIntersection::None => {}
                SegmentIntersection::Point(p) => points.push(p),
                SegmentIntersection::Overlap(p, q) => {
                    has_overlap = true;
                    points.push(p);
                    points.push(q);
                }
            }
        }
    }

    if has_overlap {
        m.set(Location::Interior, Location::Interior, Dimension::Line);
    }
    for p in &points {
        let la = locate_on_line(p, a);
        let lb = locate_on_line(p, b);
        if la != Location::Exterior && lb != Location::Exterior {
            m.set_at_least(la, lb, Dimension::Point);
        }
    }

    for p in line_boundary(a) {
        if locate_on_line(&p, b) == Location::Exterior {
            m.set(Location::Boundary, Location::Exterior, Dimension::Point);
        }
    }
    for p in line_boundary(b) {
        if locate_on_line(&p, a) == Location::Exterior {
            m.set(Location::Exterior, Location::Boundary, Dimension::Point);
        }
    }

    if !line_covered_by(a, b) {
        m.set(Location::Interior, Location::Exterior, Dimension::Line);
    }
    if !line_covered_by(b, a) {
        m.set(Location::Exterior, Location::Interior, Dimension::Line);
    }
    m
}

/// Whether every segment of `a` is covered by collinear overlaps with `b`.
fn line_covered_by(a: &LineString, b: &LineString) -> bool {
    for (a1, a2) in a.segments() {
        let dir = a2 - a1;
        let len2 = dir.norm_squared();
        if len2 <= EPSILON * EPSILON {
            continue;
        }
        let mut intervals: Vec<(f64, f64)> = Vec::new();
        for (b1, b2) in b.segments() {
            if let SegmentIntersection::Overlap(p, q) = segment_intersection(&a1, &a2, &b1, &b2) {
                let tp = (p - a1).dot(&dir) / len2;
                let tq = (q - a1).dot(&dir) / len2;
                intervals.push((tp.min(tq), tp.max(tq)));
            }
        }
        intervals.sort_by(|x, y| x.0.total_cmp(&y.0));
        let tol = EPSILON / len2.sqrt();
        let mut reach = 0.0;
        for (lo, hi) in intervals {
            if lo > reach + tol {
                return false;
            }
            reach = f64::max(reach, hi);
        }
        if reach < 1.0 - tol {
            return false;
        }
    }
    true
}

fn relate_point_areas(p: &Point2<f64>, polys: &[Polygon]) -> IntersectionMatrix {
    let mut m = IntersectionMatrix::new();
    let loc = polys
        .iter()
        .map(|poly| point_in_polygon(p, poly))
        .min_by_key(|l| *l as u8)
        .unwrap_or(Location::Exterior);
    m.set(Location::Interior, loc, Dimension::Point);
    if !polys.is_empty() {
        m.set(Location::Exterior, Location::Interior, Dimension::Area);
        m.set(Location::Exterior, Location::Boundary, Dimension::Line);
    }
    m
}

fn locate_in_areas(p: &Point2<f64>, polys: &[Polygon]) -> Location {
    let mut best = Location::Exterior;
    for poly in polys {
        match point_in_polygon(p, poly) {
            Location::Interior => return Location::Interior,
            Location::Boundary => best = Location::Boundary,
            Location::Exterior => {}
        }
    }
    best
}

/// Splits every ring segment of `of` at its intersections with the rings of
/// `against` and locates each piece (by its midpoint) in `against`.
///
/// Returns the set of locations hit and whether any ring contact occurred.
fn classify_boundary(of: &[Polygon], against: &[Polygon]) -> ([bool; 3], bool) {
    let mut hits = [false; 3];
    let mut contact = false;
    let against_rings: Vec<&LineString> = against.iter().flat_map(|p| p.rings()).collect();

    for ring in of.iter().flat_map(|p| p.rings()) {
        for (a1, a2) in ring.segments() {
            let dir = a2 - a1;
            let len2 = dir.norm_squared();
            if len2 <= EPSILON * EPSILON {
                continue;
            }
            let mut params = vec![0.0, 1.0];
            for other in &against_rings {
                for (b1, b2) in other.segments() {
                    match segment_intersection(&a1, &a2, &b1, &b2) {
                        SegmentIntersection::None => {}
                        SegmentIntersection::Point(p) => {
                            contact = true;
                            params.push((p - a1).dot(&dir) / len2);
                        }
                        SegmentIntersection::Overlap(p, q) => {
                            contact = true;
                            params.push((p - a1).dot(&dir) / len2);
                            params.push((q - a1).dot(&dir) / len2);
                        }
                    }
                }
            }
            params.sort_by(f64::total_cmp);
            for w in params.windows(2) {
                if w[1] - w[0] <= EPSILON {
                    continue;
                }
                let mid = a1 + dir * ((w[0] + w[1]) * 0.5);
                hits[locate_in_areas(&mid, against) as usize] = true;
            }
        }
    }
    (hits, contact)
}

fn relate_areas(a: &[Polygon], b: &[Polygon]) -> Result<IntersectionMatrix> {
    let mut m = IntersectionMatrix::new();
    if a.is_empty() || b.is_empty() {
        if !a.is_empty() {
            m.set(Location::Interior, Location::Exterior, Dimension::Area);
            m.set(Location::Boundary, Location::Exterior, Dimension::Line);
        }
        if !b.is_empty() {
            m.set(Location::Exterior, Location::Interior, Dimension::Area);
            m.set(Location::Exterior, Location::Boundary, Dimension::Line);
        }
        return Ok(m);
    }

    let scale = a.iter().chain(b.iter()).map(Polygon::area).sum::<f64>().max(1.0);
    let area_tol = EPSILON * scale;

    let inter: f64 = overlay::intersection(a, b)?.iter().map(Polygon::area).sum();
    let a_only: f64 = overlay::difference(a, b)?.iter().map(Polygon::area).sum();
    let b_only: f64 = overlay::difference(b, a)?.iter().map(Polygon::area).sum();

    if inter > area_tol {
        m.set(Location::Interior, Location::Interior, Dimension::Area);
    }
    if a_only > area_tol {
        m.set(Location::Interior, Location::Exterior, Dimension::Area);
    }
    if b_only > area_tol {
        m.set(Location::Exterior, Location::Interior, Dimension::Area);
    }

    let (a_hits, contact) = classify_boundary(a, b);
    let (b_hits, _) = classify_boundary(b, a);

    if a_hits[Location::Interior as usize] {
        m.set(Location::Boundary, Location::Interior, Dimension::Line);
    }
    if a_hits[Location::Exterior as usize] {
        m.set(Location::Boundary, Location::Exterior, Dimension::Line);
    }
    if b_hits[Location::Interior as usize] {
        m.set(Location::Interior, Location::Boundary, Dimension::Line);
    }
    if b_hits[Location::Exterior as usize] {
        m.set(Location::Exterior, Location::Boundary, Dimension::Line);
    }
    if a_hits[Location::Boundary as usize] || b_hits[Location::Boundary as usize] {
        m.set(Location::Boundary, Location::Boundary, Dimension::Line);
    } else if contact {
        m.set(Location::Boundary, Location::Boundary, Dimension::Point);
    }

    Ok(m)
}
