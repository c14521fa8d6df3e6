// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Planar geometry value types.
//!
//! Coordinates are `nalgebra::Point2<f64>`. Rings are stored closed (first
//! point repeated at the end). The `Display` impls produce WKT.

use std::fmt;

use nalgebra::Point2;
use serde::{Deserialize, Serialize};

use crate::algorithm::{points_equal, signed_area};

/// Geometry kind, including the empty forms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GeometryType {
    Point,
    LineString,
    Polygon,
    MultiPoint,
    MultiLineString,
    MultiPolygon,
    GeometryCollection,
}

impl GeometryType {
    /// Returns the WKT tag.
    pub fn as_str(&self) -> &'static str {
        match self {
            GeometryType::Point => "POINT",
            GeometryType::LineString => "LINESTRING",
            GeometryType::Polygon => "POLYGON",
            GeometryType::MultiPoint => "MULTIPOINT",
            GeometryType::MultiLineString => "MULTILINESTRING",
            GeometryType::MultiPolygon => "MULTIPOLYGON",
            GeometryType::GeometryCollection => "GEOMETRYCOLLECTION",
        }
    }
}

impl fmt::Display for GeometryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An ordered sequence of points.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LineString {
    pub points: Vec<Point2<f64>>,
}

impl LineString {
    pub fn new(points: Vec<Point2<f64>>) -> Self {
        Self { points }
    }

    /// Builds a line from `(x, y)` tuples.
    pub fn from_coords(coords: &[(f64, f64)]) -> Self {
        Self::new(coords.iter().map(|&(x, y)| Point2::new(x, y)).collect())
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn start(&self) -> Option<&Point2<f64>> {
        self.points.first()
    }

    pub fn end(&self) -> Option<&Point2<f64>> {
        self.points.last()
    }

    /// True when the line has at least two points and starts where it ends.
    pub fn is_closed(&self) -> bool {
        match (self.points.first(), self.points.last()) {
            (Some(a), Some(b)) => self.points.len() > 1 && points_equal(a, b),
            _ => false,
        }
    }

    /// Returns a copy with the point order reversed.
    pub fn reversed(&self) -> Self {
        Self::new(self.points.iter().rev().copied().collect())
    }

    /// Iterates over consecutive point pairs.
    pub fn segments(&self) -> impl Iterator<Item = (Point2<f64>, Point2<f64>)> + '_ {
        self.points.windows(2).map(|w| (w[0], w[1]))
    }

    pub fn length(&self) -> f64 {
        self.segments().map(|(a, b)| (b - a).norm()).sum()
    }

    pub fn bounding_rect(&self) -> Option<Rect> {
        Rect::from_points(&self.points)
    }
}

/// A polygon with a closed exterior ring and closed interior rings.
///
/// An empty exterior denotes the empty polygon.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Polygon {
    pub exterior: LineString,
    pub interiors: Vec<LineString>,
}

impl Polygon {
    pub fn new(exterior: LineString, interiors: Vec<LineString>) -> Self {
        Self {
            exterior,
            interiors,
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.exterior.is_empty()
    }

    /// Unsigned area (exterior minus holes).
    pub fn area(&self) -> f64 {
        let shell = signed_area(&self.exterior.points).abs();
        let holes: f64 = self
            .interiors
            .iter()
            .map(|ring| signed_area(&ring.points).abs())
            .sum();
        shell - holes
    }

    /// All rings, exterior first.
    pub fn rings(&self) -> impl Iterator<Item = &LineString> {
        std::iter::once(&self.exterior).chain(self.interiors.iter())
    }

    pub fn bounding_rect(&self) -> Option<Rect> {
        self.exterior.bounding_rect()
    }
}

/// Axis-aligned bounding rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub min: Point2<f64>,
    pub max: Point2<f64>,
}

impl Rect {
    pub fn new(min: Point2<f64>, max: Point2<f64>) -> Self {
        Self { min, max }
    }

    pub fn from_points(points: &[Point2<f64>]) -> Option<Self> {
        let first = points.first()?;
        let mut min = *first;
        let mut max = *first;
        for p in points.iter().skip(1) {
            min.x = min.x.min(p.x);
            min.y = min.y.min(p.y);
            max.x = max.x.max(p.x);
            max.y = max.y.max(p.y);
        }
        Some(Self { min, max })
    }

    pub fn union(&self, other: &Rect) -> Rect {
        Rect {
            min: Point2::new(self.min.x.min(other.min.x), self.min.y.min(other.min.y)),
            max: Point2::new(self.max.x.max(other.max.x), self.max.y.max(other.max.y)),
        }
    }

    /// Closed-interval overlap test (touching rectangles intersect).
    pub fn intersects(&self, other: &Rect) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
    }

    pub fn contains_point(&self, p: &Point2<f64>) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }

    /// Rectangle as a counter-clockwise polygon.
    pub fn to_polygon(&self) -> Polygon {
        Polygon::new(
            LineString::from_coords(&[
                (self.min.x, self.min.y),
                (self.max.x, self.min.y),
                (self.max.x, self.max.y),
                (self.min.x, self.max.y),
                (self.min.x, self.min.y),
            ]),
            Vec::new(),
        )
    }
}

/// Any planar geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Geometry {
    Point(Point2<f64>),
    LineString(LineString),
    Polygon(Polygon),
    MultiPoint(Vec<Point2<f64>>),
    MultiLineString(Vec<LineString>),
    MultiPolygon(Vec<Polygon>),
    GeometryCollection(Vec<Geometry>),
}

impl Geometry {
    /// The canonical empty geometry of a kind.
    ///
    /// There is no empty point value, so `Point` maps to an empty `MultiPoint`.
    pub fn empty(kind: GeometryType) -> Self {
        match kind {
            GeometryType::Point | GeometryType::MultiPoint => Geometry::MultiPoint(Vec::new()),
            GeometryType::LineString => Geometry::LineString(LineString::default()),
            GeometryType::Polygon => Geometry::Polygon(Polygon::empty()),
            GeometryType::MultiLineString => Geometry::MultiLineString(Vec::new()),
            GeometryType::MultiPolygon => Geometry::MultiPolygon(Vec::new()),
            GeometryType::GeometryCollection => Geometry::GeometryCollection(Vec::new()),
        }
    }

    pub fn geometry_type(&self) -> GeometryType {
        match self {
            Geometry::Point(_) => GeometryType::Point,
            Geometry::LineString(_) => GeometryType::LineString,
            Geometry::Polygon(_) => GeometryType::Polygon,
            Geometry::MultiPoint(_) => GeometryType::MultiPoint,
            Geometry::MultiLineString(_) => GeometryType::MultiLineString,
            Geometry::MultiPolygon(_) => GeometryType::MultiPolygon,
            Geometry::GeometryCollection(_) => GeometryType::GeometryCollection,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Geometry::Point(_) => false,
            Geometry::LineString(l) => l.is_empty(),
            Geometry::Polygon(p) => p.is_empty(),
            Geometry::MultiPoint(pts) => pts.is_empty(),
            Geometry::MultiLineString(lines) => lines.iter().all(LineString::is_empty),
            Geometry::MultiPolygon(polys) => polys.iter().all(Polygon::is_empty),
            Geometry::GeometryCollection(parts) => parts.iter().all(Geometry::is_empty),
        }
    }

    /// Topological dimension of the geometry (collections report their maximum).
    pub fn dimension(&self) -> Option<u8> {
        if self.is_empty() {
            return None;
        }
        match self {
            Geometry::Point(_) | Geometry::MultiPoint(_) => Some(0),
            Geometry::LineString(_) | Geometry::MultiLineString(_) => Some(1),
            Geometry::Polygon(_) | Geometry::MultiPolygon(_) => Some(2),
            Geometry::GeometryCollection(parts) => parts.iter().filter_map(|g| g.dimension()).max(),
        }
    }

    /// Number of top-level parts (1 for single geometries, 0 when empty).
    pub fn num_parts(&self) -> usize {
        if self.is_empty() {
            return 0;
        }
        match self {
            Geometry::MultiPoint(pts) => pts.len(),
            Geometry::MultiLineString(lines) => lines.len(),
            Geometry::MultiPolygon(polys) => polys.len(),
            Geometry::GeometryCollection(parts) => parts.len(),
            _ => 1,
        }
    }

    pub fn bounding_rect(&self) -> Option<Rect> {
        match self {
            Geometry::Point(p) => Some(Rect::new(*p, *p)),
            Geometry::LineString(l) => l.bounding_rect(),
            Geometry::Polygon(p) => p.bounding_rect(),
            Geometry::MultiPoint(pts) => Rect::from_points(pts),
            Geometry::MultiLineString(lines) => merge_rects(lines.iter().map(|l| l.bounding_rect())),
            Geometry::MultiPolygon(polys) => merge_rects(polys.iter().map(|p| p.bounding_rect())),
            Geometry::GeometryCollection(parts) => {
                merge_rects(parts.iter().map(|g| g.bounding_rect()))
            }
        }
    }

    /// Sum of polygonal areas.
    pub fn area(&self) -> f64 {
        match self {
            Geometry::Polygon(p) => p.area(),
            Geometry::MultiPolygon(polys) => polys.iter().map(Polygon::area).sum(),
            Geometry::GeometryCollection(parts) => parts.iter().map(Geometry::area).sum(),
            _ => 0.0,
        }
    }

    /// Sum of lineal lengths.
    pub fn length(&self) -> f64 {
        match self {
            Geometry::LineString(l) => l.length(),
            Geometry::MultiLineString(lines) => lines.iter().map(LineString::length).sum(),
            Geometry::GeometryCollection(parts) => parts.iter().map(Geometry::length).sum(),
            _ => 0.0,
        }
    }
}

fn merge_rects(rects: impl Iterator<Item = Option<Rect>>) -> Option<Rect> {
    rects.flatten().reduce(|a, b| a.union(&b))
}

impl From<Point2<f64>> for Geometry {
    fn from(p: Point2<f64>) -> Self {
        Geometry::Point(p)
    }
}

impl From<LineString> for Geometry {
    fn from(l: LineString) -> Self {
        Geometry::LineString(l)
    }
}

impl From<Polygon> for Geometry {
    fn from(p: Polygon) -> Self {
        Geometry::Polygon(p)
    }
}

// ============================================================================
// WKT output
// ============================================================================

fn write_coords(f: &mut fmt::Formatter<'_>, points: &[Point2<f64>]) -> fmt::Result {
    f.write_str("(")?;
    for (i, p) in points.iter().enumerate() {
        if i > 0 {
            f.write_str(",")?;
        }
        write!(f, "{} {}", p.x, p.y)?;
    }
    f.write_str(")")
}

fn write_polygon_body(f: &mut fmt::Formatter<'_>, poly: &Polygon) -> fmt::Result {
    f.write_str("(")?;
    for (i, ring) in poly.rings().enumerate() {
        if i > 0 {
            f.write_str(",")?;
        }
        write_coords(f, &ring.points)?;
    }
    f.write_str(")")
}

impl fmt::Display for LineString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("LINESTRING EMPTY");
        }
        f.write_str("LINESTRING")?;
        write_coords(f, &self.points)
    }
}

impl fmt::Display for Polygon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("POLYGON EMPTY");
        }
        f.write_str("POLYGON")?;
        write_polygon_body(f, self)
    }
}

impl fmt::Display for Geometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "{} EMPTY", self.geometry_type());
        }
        match self {
            Geometry::Point(p) => write!(f, "POINT({} {})", p.x, p.y),
            Geometry::LineString(l) => l.fmt(f),
            Geometry::Polygon(p) => p.fmt(f),
            Geometry::MultiPoint(pts) => {
                f.write_str("MULTIPOINT(")?;
                for (i, p) in pts.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{} {}", p.x, p.y)?;
                }
                f.write_str(")")
            }
            Geometry::MultiLineString(lines) => {
                f.write_str("MULTILINESTRING(")?;
                for (i, l) in lines.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write_coords(f, &l.points)?;
                }
                f.write_str(")")
            }
            Geometry::MultiPolygon(polys) => {
                f.write_str("MULTIPOLYGON(")?;
                for (i, p) in polys.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write_polygon_body(f, p)?;
                }
                f.write_str(")")
            }
            Geometry::GeometryCollection(parts) => {
                f.write_str("GEOMETRYCOLLECTION(")?;
                for (i, g) in parts.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    g.fmt(f)?;
                }
                f.write_str(")")
            }
        }
    }
}
