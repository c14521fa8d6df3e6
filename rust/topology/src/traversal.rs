// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Half-edge traversal: angular ordering at nodes, next-pointer linking and
//! ring walks.
//!
//! At every node the outgoing half-edges are sorted counter-clockwise by the
//! azimuth of their first segment. For consecutive half-edges `h[i]` and
//! `h[i+1]`, the half-edge arriving along `h[i+1]` continues with `h[i]`.
//! The wedge between `h[i]` and `h[i+1]` is the face on the left of `h[i]`.

use std::collections::BTreeMap;

use nalgebra::Point2;
use rustc_hash::FxHashSet;
use topolite_geometry::algorithm::{azimuth, points_equal};

use crate::error::{Error, Result};
use crate::ids::{DirectedEdge, EdgeId, FaceId, NodeId};
use crate::primitives::Edge;
use crate::store::{TopologyView, Transaction};

/// Azimuth of the first segment of a half-edge (zero-length steps skipped).
pub(crate) fn leaving_azimuth(edge: &Edge, forward: bool) -> f64 {
    let pts = &edge.geometry.points;
    let ordered: Box<dyn Iterator<Item = &Point2<f64>>> = if forward {
        Box::new(pts.iter())
    } else {
        Box::new(pts.iter().rev())
    };
    let mut iter = ordered;
    let origin = match iter.next() {
        Some(p) => *p,
        None => return 0.0,
    };
    for p in iter {
        if !points_equal(&origin, p) {
            return azimuth(&origin, p);
        }
    }
    0.0
}

/// Outgoing half-edges of `node` sorted counter-clockwise.
///
/// `replacement` substitutes an edge row (used to test a new geometry before
/// it is staged).
pub(crate) fn outgoing_half_edges<V: TopologyView + ?Sized>(
    view: &V,
    node: NodeId,
    replacement: Option<&Edge>,
) -> Result<Vec<(DirectedEdge, f64)>> {
    let mut out = Vec::new();
    for edge_id in view.edges_at_node(node) {
        let edge = match replacement {
            Some(r) if r.id == edge_id => r.clone(),
            _ => view.require_edge(edge_id)?,
        };
        if edge.start_node == node {
            out.push((DirectedEdge::forward(edge.id), leaving_azimuth(&edge, true)));
        }
        if edge.end_node == node {
            out.push((DirectedEdge::backward(edge.id), leaving_azimuth(&edge, false)));
        }
    }
    out.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
    Ok(out)
}

/// Cyclic order of half-edges at a node, rotated to start at the lowest id.
pub(crate) fn cyclic_order(half_edges: &[(DirectedEdge, f64)]) -> Vec<DirectedEdge> {
    let ids: Vec<DirectedEdge> = half_edges.iter().map(|(d, _)| *d).collect();
    let start = ids
        .iter()
        .enumerate()
        .min_by_key(|(_, d)| **d)
        .map_or(0, |(i, _)| i);
    ids[start..].iter().chain(ids[..start].iter()).copied().collect()
}

/// Face of the wedge a new half-edge with azimuth `angle` would fall into.
///
/// `None` when the node has no edges yet.
pub(crate) fn wedge_face<V: TopologyView + ?Sized>(
    view: &V,
    node: NodeId,
    angle: f64,
) -> Result<Option<FaceId>> {
    let out = outgoing_half_edges(view, node, None)?;
    let clockwise = out
        .iter()
        .rev()
        .find(|(_, a)| *a < angle)
        .or_else(|| out.last());
    match clockwise {
        Some((dir, _)) => {
            let edge = view.require_edge(dir.edge())?;
            Ok(Some(edge.face_left_of(dir.is_forward())))
        }
        None => Ok(None),
    }
}

/// Re-derives the next pointers of every half-edge arriving at `node`.
pub(crate) fn relink_node(tx: &mut Transaction, node: NodeId) -> Result<()> {
    let out = outgoing_half_edges(tx, node, None)?;
    if out.is_empty() {
        return Ok(());
    }

    let mut originals: BTreeMap<EdgeId, Edge> = BTreeMap::new();
    let mut rows: BTreeMap<EdgeId, Edge> = BTreeMap::new();
    let k = out.len();
    for i in 0..k {
        let target = out[i].0;
        let arriving = out[(i + 1) % k].0.reversed();
        let id = arriving.edge();
        if !rows.contains_key(&id) {
            let edge = tx.require_edge(id)?;
            originals.insert(id, edge.clone());
            rows.insert(id, edge);
        }
        if let Some(row) = rows.get_mut(&id) {
            row.set_next(arriving.is_forward(), target);
        }
    }

    for (id, row) in rows {
        if originals.get(&id) != Some(&row) {
            tx.put_edge(row);
        }
    }
    Ok(())
}

/// Relinks several nodes, each once.
pub(crate) fn relink_nodes(tx: &mut Transaction, nodes: &[NodeId]) -> Result<()> {
    let mut seen = FxHashSet::default();
    for node in nodes {
        if seen.insert(*node) {
            relink_node(tx, *node)?;
        }
    }
    Ok(())
}

/// Follows next pointers from `start` until it returns.
pub(crate) fn walk_ring<V: TopologyView + ?Sized>(
    view: &V,
    start: DirectedEdge,
) -> Result<Vec<DirectedEdge>> {
    let mut ring = vec![start];
    let mut seen = FxHashSet::default();
    seen.insert(start);
    let mut current = view.next_half_edge(start)?;
    while current != start {
        if !seen.insert(current) {
            return Err(Error::invalid(format!(
                "ring starting at {start} does not close"
            )));
        }
        ring.push(current);
        current = view.next_half_edge(current)?;
    }
    Ok(ring)
}

/// Concatenated coordinates of a ring of half-edges (closed when the ring is).
pub(crate) fn ring_points<V: TopologyView + ?Sized>(
    view: &V,
    ring: &[DirectedEdge],
) -> Result<Vec<Point2<f64>>> {
    let mut points: Vec<Point2<f64>> = Vec::new();
    for dir in ring {
        let edge = view.require_edge(dir.edge())?;
        let pts = edge.directed_points(dir.is_forward());
        let skip = usize::from(!points.is_empty());
        points.extend(pts.into_iter().skip(skip));
    }
    Ok(points)
}

/// A point strictly inside an edge, used to locate the edge against rings.
pub(crate) fn edge_probe(edge: &Edge) -> Point2<f64> {
    let pts = &edge.geometry.points;
    match (pts.first(), pts.get(1)) {
        (Some(a), Some(b)) => Point2::new((a.x + b.x) * 0.5, (a.y + b.y) * 0.5),
        (Some(a), None) => *a,
        _ => Point2::origin(),
    }
}
