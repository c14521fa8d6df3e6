// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use nalgebra::Point2;
use topolite_geometry::algorithm::point_in_ring;
use topolite_geometry::{LineString, Location};

use super::check_line_placement;
use crate::error::{Error, Result};
use crate::face::refresh_face_mbr;
use crate::ids::EdgeId;
use crate::primitives::Edge;
use crate::store::{TopologyView, Transaction};
use crate::topology::Topology;
use crate::traversal::{cyclic_order, outgoing_half_edges};

fn inside(p: &Point2<f64>, ring: &[Point2<f64>]) -> bool {
    point_in_ring(p, ring) == Location::Interior
}

/// Fails if a node other than the edge's own endpoints lies in the area
/// between the old and the new geometry.
fn check_swept_area(tx: &Transaction, old: &Edge, new: &LineString) -> Result<()> {
    let collides: Box<dyn Fn(&Point2<f64>) -> bool> = if old.is_closed() {
        let (before, after) = (old.geometry.points.clone(), new.points.clone());
        Box::new(move |p| inside(p, &before) != inside(p, &after))
    } else {
        let mut ring = old.geometry.points.clone();
        ring.extend(new.points.iter().rev().skip(1).copied());
        Box::new(move |p| inside(p, &ring))
    };
    for node in tx.nodes() {
        if node.id == old.start_node || node.id == old.end_node {
            continue;
        }
        if collides(&node.point) {
            return Err(Error::invalid(format!(
                "edge motion collision at node {}",
                node.id
            )));
        }
    }
    Ok(())
}

impl Topology {
    /// Replaces the geometry of an edge, keeping its endpoints, its place in
    /// the cyclic order around them and the faces of every other primitive.
    pub fn change_edge_geom(&self, edge: EdgeId, line: LineString) -> Result<()> {
        let geometry = self.geometry();
        self.edit("change_edge_geom", |tx| {
            let old = tx.require_edge(edge)?;
            let start = tx.require_node(old.start_node)?;
            let end = tx.require_node(old.end_node)?;
            check_line_placement(tx, geometry, &line, &start, &end, Some(edge))?;

            let updated = Edge {
                geometry: line.clone(),
                ..old.clone()
            };
            for node in [old.start_node, old.end_node] {
                let before = cyclic_order(&outgoing_half_edges(tx, node, None)?);
                let after = cyclic_order(&outgoing_half_edges(tx, node, Some(&updated))?);
                if before != after {
                    return Err(Error::invalid(format!(
                        "edge {edge} changes the order of edges around node {node}"
                    )));
                }
            }
            check_swept_area(tx, &old, &line)?;

            tx.put_edge(updated);
            refresh_face_mbr(tx, geometry, old.left_face)?;
            if old.right_face != old.left_face {
                refresh_face_mbr(tx, geometry, old.right_face)?;
            }
            tracing::debug!(topology = %self.name(), edge = %edge, "edge geometry changed");
            Ok(())
        })
    }
}
