// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Polygon boolean operations
//!
//! This module provides 2D polygon boolean operations using the i_overlay crate.

use i_overlay::core::fill_rule::FillRule;
use i_overlay::core::overlay_rule::OverlayRule;
use i_overlay::float::single::SingleFloatOverlay;
use nalgebra::Point2;

use crate::algorithm::{close_ring, dedup_points, ensure_ccw, ensure_cw, signed_area, EPSILON};
use crate::error::Result;
use crate::types::{LineString, Polygon};

/// Union of a set of polygons.
///
/// Inputs are folded pairwise so overlapping inputs do not cancel out under
/// the even-odd fill rule.
pub fn union(polygons: &[Polygon]) -> Result<Vec<Polygon>> {
    let mut iter = polygons.iter().filter(|p| !p.is_empty());
    let first = match iter.next() {
        Some(p) => p,
        None => return Ok(Vec::new()),
    };

    let mut shapes: Vec<Vec<Vec<[f64; 2]>>> = vec![polygon_to_paths(first)];

    for poly in iter {
        let subject: Vec<Vec<[f64; 2]>> = shapes.into_iter().flatten().collect();
        let clip = polygon_to_paths(poly);
        shapes = subject.overlay(&clip, OverlayRule::Union, FillRule::EvenOdd);
    }

    Ok(shapes_to_polygons(shapes))
}

/// Intersection of two polygon sets.
pub fn intersection(a: &[Polygon], b: &[Polygon]) -> Result<Vec<Polygon>> {
    boolean(a, b, OverlayRule::Intersect)
}

/// Difference `a - b` of two polygon sets.
pub fn difference(a: &[Polygon], b: &[Polygon]) -> Result<Vec<Polygon>> {
    boolean(a, b, OverlayRule::Difference)
}

fn boolean(a: &[Polygon], b: &[Polygon], rule: OverlayRule) -> Result<Vec<Polygon>> {
    let subject = dissolved_paths(a)?;
    let clip = dissolved_paths(b)?;
    if subject.is_empty() {
        return Ok(Vec::new());
    }
    if clip.is_empty() {
        return Ok(match rule {
            OverlayRule::Intersect => Vec::new(),
            _ => a.iter().filter(|p| !p.is_empty()).cloned().map(normalize).collect(),
        });
    }

    let result = subject.overlay(&clip, rule, FillRule::EvenOdd);
    Ok(shapes_to_polygons(result))
}

/// Paths of a polygon set whose members do not overlap each other.
fn dissolved_paths(polygons: &[Polygon]) -> Result<Vec<Vec<[f64; 2]>>> {
    let parts: Vec<&Polygon> = polygons.iter().filter(|p| !p.is_empty()).collect();
    if parts.len() <= 1 {
        return Ok(parts.into_iter().flat_map(polygon_to_paths).collect());
    }
    Ok(union(polygons)?.iter().flat_map(polygon_to_paths).collect())
}

/// Exterior counter-clockwise and holes clockwise, both closed.
pub fn normalize(poly: Polygon) -> Polygon {
    let exterior = LineString::new(close_ring(ensure_ccw(&poly.exterior.points)));
    let interiors = poly
        .interiors
        .iter()
        .map(|ring| LineString::new(close_ring(ensure_cw(&ring.points))))
        .collect();
    Polygon::new(exterior, interiors)
}

// ============================================================================
// Internal Helper Functions
// ============================================================================

/// Convert a polygon to i_overlay path format (open contours)
fn polygon_to_paths(poly: &Polygon) -> Vec<Vec<[f64; 2]>> {
    let mut paths = Vec::with_capacity(1 + poly.interiors.len());

    // Outer boundary counter-clockwise
    paths.push(contour_to_path(&ensure_ccw(&open_ring(&poly.exterior.points))));

    // Holes clockwise; the even-odd fill rule does not depend on it
    for hole in &poly.interiors {
        paths.push(contour_to_path(&ensure_cw(&open_ring(&hole.points))));
    }

    paths
}

fn open_ring(ring: &[Point2<f64>]) -> Vec<Point2<f64>> {
    let mut pts = dedup_points(ring);
    if pts.len() > 1 {
        if let (Some(first), Some(last)) = (pts.first(), pts.last()) {
            if crate::algorithm::points_equal(first, last) {
                pts.pop();
            }
        }
    }
    pts
}

fn contour_to_path(contour: &[Point2<f64>]) -> Vec<[f64; 2]> {
    contour.iter().map(|p| [p.x, p.y]).collect()
}

/// Convert i_overlay result shapes back to polygons
///
/// i_overlay returns Vec<Vec<Vec<[f64; 2]>>> where:
/// - Outer Vec: list of shapes
/// - Middle Vec: list of contours per shape (first is outer, rest are holes)
/// - Inner Vec: list of points per contour
fn shapes_to_polygons(shapes: Vec<Vec<Vec<[f64; 2]>>>) -> Vec<Polygon> {
    let mut out = Vec::with_capacity(shapes.len());
    for shape in shapes {
        let mut contours = shape.into_iter().map(|c| {
            c.into_iter()
                .map(|p| Point2::new(p[0], p[1]))
                .collect::<Vec<_>>()
        });
        let outer = match contours.next() {
            Some(c) if signed_area(&c).abs() > EPSILON => c,
            _ => continue,
        };
        let holes: Vec<LineString> = contours
            .filter(|c| signed_area(c).abs() > EPSILON)
            .map(|c| LineString::new(close_ring(ensure_cw(&c))))
            .collect();
        out.push(Polygon::new(
            LineString::new(close_ring(ensure_ccw(&outer))),
            holes,
        ));
    }
    out
}
