// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Face geometry reconstruction from half-edge rings.

use std::collections::BTreeSet;

use nalgebra::Point2;
use rustc_hash::FxHashSet;
use topolite_geometry::algorithm::dedup_points;
use topolite_geometry::{GeometryLibrary, LineString, Location, Polygon, EPSILON};

use crate::error::{Error, Result};
use crate::ids::{DirectedEdge, FaceId};
use crate::primitives::Face;
use crate::store::{TopologyView, Transaction};
use crate::topology::Topology;
use crate::traversal::{ring_points, walk_ring};

/// Next half-edge on a boundary ring of `face`, skipping dangling edges.
///
/// A dangling edge has `face` on both sides. Skipping `n` means turning to the
/// next outgoing half-edge around its origin, which is `next(-n)`.
fn next_boundary_half_edge<V: TopologyView + ?Sized>(
    view: &V,
    dir: DirectedEdge,
    face: FaceId,
) -> Result<DirectedEdge> {
    let mut seen = FxHashSet::default();
    let mut next = view.next_half_edge(dir)?;
    loop {
        let edge = view.require_edge(next.edge())?;
        if edge.left_face != face || edge.right_face != face {
            return Ok(next);
        }
        if !seen.insert(next) {
            return Err(Error::invalid(format!(
                "face {face} boundary walk from {dir} loops over dangling edges"
            )));
        }
        next = edge.next(!next.is_forward());
    }
}

/// Boundary rings of a face as half-edge sequences.
fn boundary_rings<V: TopologyView + ?Sized>(
    view: &V,
    face: FaceId,
) -> Result<Vec<Vec<DirectedEdge>>> {
    let mut pending: BTreeSet<DirectedEdge> = BTreeSet::new();
    for edge in view.edges() {
        if edge.left_face == edge.right_face {
            continue;
        }
        if edge.left_face == face {
            pending.insert(DirectedEdge::forward(edge.id));
        } else if edge.right_face == face {
            pending.insert(DirectedEdge::backward(edge.id));
        }
    }

    let mut rings = Vec::new();
    while let Some(start) = pending.pop_first() {
        let mut ring = vec![start];
        let mut current = next_boundary_half_edge(view, start, face)?;
        while current != start {
            if !pending.remove(&current) {
                return Err(Error::invalid(format!(
                    "ring of face {face} through {start} leaves the face at {current}"
                )));
            }
            ring.push(current);
            current = next_boundary_half_edge(view, current, face)?;
        }
        rings.push(ring);
    }
    Ok(rings)
}

/// Polygon of a bounded face. Faces without rings give an empty polygon.
pub(crate) fn face_polygon<V: TopologyView + ?Sized>(
    view: &V,
    geometry: &dyn GeometryLibrary,
    face: FaceId,
) -> Result<Polygon> {
    let mut rings: Vec<(Vec<Point2<f64>>, f64)> = Vec::new();
    for ring in boundary_rings(view, face)? {
        let points = dedup_points(&ring_points(view, &ring)?);
        let area = geometry.signed_area(&points);
        if points.len() >= 4 && area.abs() > EPSILON {
            rings.push((points, area));
        }
    }

    let shell_index = rings
        .iter()
        .enumerate()
        .max_by(|a, b| a.1 .1.abs().total_cmp(&b.1 .1.abs()))
        .map(|(i, _)| i);
    let Some(shell_index) = shell_index else {
        return Ok(Polygon::empty());
    };

    let (shell, _) = rings.swap_remove(shell_index);
    let holes = rings
        .into_iter()
        .map(|(points, _)| LineString::new(points))
        .collect();
    Ok(geometry.build_polygon(LineString::new(shell), holes)?)
}

/// Signed edges of every ring with `face` on its left, dangling edges
/// included. Each ring starts at its lowest edge id.
pub(crate) fn face_edges<V: TopologyView + ?Sized>(
    view: &V,
    face: FaceId,
) -> Result<Vec<DirectedEdge>> {
    let mut pending: BTreeSet<DirectedEdge> = BTreeSet::new();
    for edge in view.edges() {
        if edge.left_face == face {
            pending.insert(DirectedEdge::forward(edge.id));
        }
        if edge.right_face == face {
            pending.insert(DirectedEdge::backward(edge.id));
        }
    }

    let mut rings: Vec<Vec<DirectedEdge>> = Vec::new();
    while let Some(start) = pending.pop_first() {
        let mut ring = walk_ring(view, start)?;
        for dir in &ring[1..] {
            if !pending.remove(dir) {
                return Err(Error::invalid(format!(
                    "ring of face {face} through {start} leaves the face at {dir}"
                )));
            }
        }
        if let Some(first) = ring
            .iter()
            .enumerate()
            .min_by_key(|(_, d)| (d.edge(), !d.is_forward()))
            .map(|(i, _)| i)
        {
            ring.rotate_left(first);
        }
        rings.push(ring);
    }
    rings.sort_by_key(|ring| ring.first().map(|d| d.edge()));
    Ok(rings.into_iter().flatten().collect())
}

/// Bounded face whose interior contains `point`, or the universal face.
pub(crate) fn locate_face<V: TopologyView + ?Sized>(
    view: &V,
    geometry: &dyn GeometryLibrary,
    point: &Point2<f64>,
) -> Result<FaceId> {
    for face in view.faces() {
        if face.id.is_universal() {
            continue;
        }
        let candidate = face.mbr.as_ref().is_some_and(|mbr| mbr.contains_point(point));
        if !candidate {
            continue;
        }
        let polygon = face_polygon(view, geometry, face.id)?;
        if geometry.point_in_polygon(point, &polygon) == Location::Interior {
            return Ok(face.id);
        }
    }
    Ok(FaceId::UNIVERSAL)
}

/// Recomputes the bounding rectangle of a bounded face.
pub(crate) fn refresh_face_mbr(
    tx: &mut Transaction,
    geometry: &dyn GeometryLibrary,
    face: FaceId,
) -> Result<()> {
    if face.is_universal() {
        return Ok(());
    }
    let polygon = face_polygon(tx, geometry, face)?;
    tx.put_face(Face {
        id: face,
        mbr: polygon.bounding_rect(),
    });
    Ok(())
}

impl Topology {
    /// Polygon of a bounded face: the largest ring is the shell, the others
    /// are holes.
    pub fn get_face_geometry(&self, face: FaceId) -> Result<Polygon> {
        if face.is_universal() {
            return Err(Error::malformed("the universal face has no geometry"));
        }
        let data = self.snapshot();
        data.require_face(face)?;
        face_polygon(data.as_ref(), self.geometry(), face)
    }

    /// Signed edges of the rings bounding `face`.
    pub fn get_face_edges(&self, face: FaceId) -> Result<Vec<DirectedEdge>> {
        let data = self.snapshot();
        data.require_face(face)?;
        face_edges(data.as_ref(), face)
    }

    /// Face whose interior contains `point`; the universal face when none does.
    pub fn face_containing_point(&self, point: Point2<f64>) -> Result<FaceId> {
        let data = self.snapshot();
        locate_face(data.as_ref(), self.geometry(), &point)
    }
}
