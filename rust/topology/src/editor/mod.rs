// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Edge Editor - atomic edits of nodes, edges and faces
//!
//! Every public operation runs inside [`Topology::edit`], so it either
//! commits completely or leaves the topology untouched. The submodules each
//! extend [`Topology`] with one family of edits; this module holds the
//! placement checks and relation helpers they share.

mod add;
mod change;
mod heal;
mod iso;
mod remove;
mod split;

use nalgebra::Point2;
use rustc_hash::FxHashSet;
use topolite_geometry::{Geometry, GeometryLibrary, LineString, EPSILON};

use crate::error::{Error, Result};
use crate::ids::{DirectedEdge, EdgeId, FaceId, LayerId, NodeId};
use crate::primitives::{Edge, Node, Relation};
use crate::store::{TopologyView, Transaction};

/// Rejects a point that coincides with a node or touches an edge.
///
/// `ignore_node` is the node being moved, `ignore_edge` the edge being split.
pub(crate) fn check_point_free<V: TopologyView + ?Sized>(
    view: &V,
    geometry: &dyn GeometryLibrary,
    point: &Point2<f64>,
    ignore_node: Option<NodeId>,
    ignore_edge: Option<EdgeId>,
) -> Result<()> {
    if !point.x.is_finite() || !point.y.is_finite() {
        return Err(Error::malformed(format!("invalid point {point}")));
    }
    for node in view.nodes() {
        if Some(node.id) == ignore_node {
            continue;
        }
        if (node.point - point).norm() <= EPSILON {
            return Err(Error::invalid(format!("coincident node {}", node.id)));
        }
    }
    let probe = Geometry::Point(*point);
    for edge in view.edges() {
        if Some(edge.id) == ignore_edge {
            continue;
        }
        let near = edge
            .geometry
            .bounding_rect()
            .is_some_and(|r| r.contains_point(point));
        if near && geometry.distance(&probe, &Geometry::LineString(edge.geometry.clone()))? <= EPSILON {
            return Err(Error::invalid(format!("point crosses edge {}", edge.id)));
        }
    }
    Ok(())
}

/// Checks that `line` can be stored as an edge from `start` to `end`.
///
/// The line must be valid and simple, start and end at the node points, miss
/// every other node, and meet other edges only at endpoints they share.
pub(crate) fn check_line_placement<V: TopologyView + ?Sized>(
    view: &V,
    geometry: &dyn GeometryLibrary,
    line: &LineString,
    start: &Node,
    end: &Node,
    exclude: Option<EdgeId>,
) -> Result<()> {
    let geom = Geometry::LineString(line.clone());
    if line.len() < 2 || !geometry.is_valid(&geom) {
        return Err(Error::invalid("invalid curve"));
    }
    if !geometry.is_simple(&geom) {
        return Err(Error::invalid("curve not simple"));
    }
    let (Some(first), Some(last)) = (line.start(), line.end()) else {
        return Err(Error::invalid("invalid curve"));
    };
    if (first - start.point).norm() > EPSILON {
        return Err(Error::invalid(format!(
            "start node {} not geometry start point",
            start.id
        )));
    }
    if (last - end.point).norm() > EPSILON {
        return Err(Error::invalid(format!(
            "end node {} not geometry end point",
            end.id
        )));
    }

    let Some(bounds) = line.bounding_rect() else {
        return Err(Error::invalid("invalid curve"));
    };

    for node in view.nodes() {
        if node.id == start.id || node.id == end.id || !bounds.contains_point(&node.point) {
            continue;
        }
        if geometry.distance(&Geometry::Point(node.point), &geom)? <= EPSILON {
            return Err(Error::invalid(format!("geometry crosses node {}", node.id)));
        }
    }

    let endpoints = [*first, *last];
    for edge in view.edges() {
        if Some(edge.id) == exclude {
            continue;
        }
        let overlaps = edge
            .geometry
            .bounding_rect()
            .is_some_and(|r| r.intersects(&bounds));
        if !overlaps {
            continue;
        }
        let other = Geometry::LineString(edge.geometry.clone());
        let shared = geometry.intersection(&geom, &other)?;
        check_shared_points(&shared, &endpoints, &edge)?;
    }
    Ok(())
}

/// Accepts an intersection made only of points that are endpoints of both lines.
fn check_shared_points(shared: &Geometry, endpoints: &[Point2<f64>; 2], edge: &Edge) -> Result<()> {
    let is_endpoint = |p: &Point2<f64>| {
        let of_new = endpoints.iter().any(|e| (e - p).norm() <= EPSILON);
        let of_edge = [edge.geometry.start(), edge.geometry.end()]
            .into_iter()
            .flatten()
            .any(|e| (e - p).norm() <= EPSILON);
        of_new && of_edge
    };
    let crossing = || Error::invalid(format!("geometry crosses edge {}", edge.id));
    match shared {
        Geometry::Point(p) => {
            if !is_endpoint(p) {
                return Err(crossing());
            }
        }
        Geometry::MultiPoint(points) => {
            if !points.iter().all(|p| is_endpoint(p)) {
                return Err(crossing());
            }
        }
        Geometry::LineString(l) if l.is_empty() => {}
        Geometry::MultiLineString(ls) if ls.is_empty() => {}
        Geometry::GeometryCollection(parts) if parts.is_empty() => {}
        _ => return Err(Error::invalid(format!("coincident edge {}", edge.id))),
    }
    Ok(())
}

/// Relation rows of level-0 layers, the only ones whose element types are
/// primitive codes.
fn primitive_relations<V: TopologyView + ?Sized>(view: &V) -> impl Iterator<Item = Relation> {
    let base: FxHashSet<LayerId> = view
        .layers()
        .into_iter()
        .filter(|l| l.level == 0)
        .map(|l| l.layer_id)
        .collect();
    view.relations()
        .into_iter()
        .filter(move |r| base.contains(&r.layer_id))
}

/// Relation rows naming an edge in either direction.
pub(crate) fn edge_relations<V: TopologyView + ?Sized>(view: &V, edge: EdgeId) -> Vec<Relation> {
    primitive_relations(view)
        .filter(|r| r.references_edge(edge))
        .collect()
}

pub(crate) fn face_relations<V: TopologyView + ?Sized>(view: &V, face: FaceId) -> Vec<Relation> {
    primitive_relations(view)
        .filter(|r| r.references_face(face))
        .collect()
}

pub(crate) fn node_relations<V: TopologyView + ?Sized>(view: &V, node: NodeId) -> Vec<Relation> {
    primitive_relations(view)
        .filter(|r| r.references_node(node))
        .collect()
}

/// Fails when any TopoGeometry uses the edge.
pub(crate) fn ensure_edge_unreferenced<V: TopologyView + ?Sized>(view: &V, edge: EdgeId) -> Result<()> {
    match edge_relations(view, edge).first() {
        Some(rel) => Err(Error::conflict(format!(
            "edge {edge} is referenced by topogeometry {} in layer {}",
            rel.topogeo_id, rel.layer_id
        ))),
        None => Ok(()),
    }
}

pub(crate) fn ensure_node_unreferenced<V: TopologyView + ?Sized>(view: &V, node: NodeId) -> Result<()> {
    match node_relations(view, node).first() {
        Some(rel) => Err(Error::conflict(format!(
            "node {node} is referenced by topogeometry {} in layer {}",
            rel.topogeo_id, rel.layer_id
        ))),
        None => Ok(()),
    }
}

/// Sets the face on the left of every half-edge of a ring.
pub(crate) fn label_ring(tx: &mut Transaction, ring: &[DirectedEdge], face: FaceId) -> Result<()> {
    for dir in ring {
        let mut edge = tx.require_edge(dir.edge())?;
        if edge.face_left_of(dir.is_forward()) != face {
            edge.set_face_left_of(dir.is_forward(), face);
            tx.put_edge(edge);
        }
    }
    Ok(())
}

/// New edge row with placeholder links; callers relink its endpoints.
pub(crate) fn new_edge(id: EdgeId, start: NodeId, end: NodeId, face: FaceId, geometry: LineString) -> Edge {
    Edge {
        id,
        start_node: start,
        end_node: end,
        next_left_edge: DirectedEdge::backward(id),
        next_right_edge: DirectedEdge::forward(id),
        left_face: face,
        right_face: face,
        geometry,
    }
}

/// Clears `containing_face` on nodes that now have edges.
pub(crate) fn attach_nodes(tx: &mut Transaction, nodes: &[NodeId]) -> Result<()> {
    for id in nodes {
        let mut node = tx.require_node(*id)?;
        if node.containing_face.is_some() {
            node.containing_face = None;
            tx.put_node(node);
        }
    }
    Ok(())
}

/// Marks nodes left without edges as isolated in `face`.
pub(crate) fn detach_nodes(tx: &mut Transaction, nodes: &[NodeId], face: FaceId) -> Result<()> {
    for id in nodes {
        if !tx.edges_at_node(*id).is_empty() {
            continue;
        }
        if let Some(mut node) = tx.node(*id) {
            if node.containing_face != Some(face) {
                node.containing_face = Some(face);
                tx.put_node(node);
            }
        }
    }
    Ok(())
}
