// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Isolated nodes and isolated edges.

use nalgebra::Point2;
use topolite_geometry::LineString;

use super::{
    attach_nodes, check_line_placement, check_point_free, ensure_edge_unreferenced,
    ensure_node_unreferenced, new_edge,
};
use crate::error::{Error, Result};
use crate::face::locate_face;
use crate::ids::{EdgeId, FaceId, NodeId};
use crate::primitives::Node;
use crate::store::TopologyView;
use crate::topology::Topology;

impl Topology {
    /// Adds a node with no incident edges.
    ///
    /// With `face` given, the point must lie inside that face; with `None`
    /// the containing face is computed.
    pub fn add_iso_node(&self, face: Option<FaceId>, point: Point2<f64>) -> Result<NodeId> {
        let geometry = self.geometry();
        self.edit("add_iso_node", |tx| {
            if let Some(face) = face {
                tx.require_face(face)?;
            }
            check_point_free(tx, geometry, &point, None, None)?;
            let containing = locate_face(tx, geometry, &point)?;
            if let Some(face) = face {
                if face != containing {
                    return Err(Error::invalid(format!(
                        "not within face {face} (point lies in face {containing})"
                    )));
                }
            }

            let id = self.sequences.next_node();
            tx.put_node(Node {
                id,
                point,
                containing_face: Some(containing),
            });
            Ok(id)
        })
    }

    /// Moves an isolated node within its containing face.
    pub fn move_iso_node(&self, node: NodeId, point: Point2<f64>) -> Result<()> {
        let geometry = self.geometry();
        self.edit("move_iso_node", |tx| {
            let mut row = tx.require_node(node)?;
            let Some(face) = row.containing_face else {
                return Err(Error::conflict(format!("node {node} is not isolated")));
            };
            check_point_free(tx, geometry, &point, Some(node), None)?;
            let target = locate_face(tx, geometry, &point)?;
            if target != face {
                return Err(Error::invalid(format!(
                    "cannot move isolated node {node} from face {face} to face {target}"
                )));
            }
            row.point = point;
            tx.put_node(row);
            Ok(())
        })
    }

    /// Removes a node that has no edges and no TopoGeometry references.
    pub fn remove_iso_node(&self, node: NodeId) -> Result<()> {
        self.edit("remove_iso_node", |tx| {
            tx.require_node(node)?;
            if !tx.edges_at_node(node).is_empty() {
                return Err(Error::conflict(format!("node {node} is not isolated")));
            }
            ensure_node_unreferenced(tx, node)?;
            tx.delete_node(node);
            Ok(())
        })
    }

    /// Connects two isolated nodes of the same face with a new edge.
    ///
    /// The edge takes that face on both sides and links only to itself.
    pub fn add_iso_edge(&self, start: NodeId, end: NodeId, line: LineString) -> Result<EdgeId> {
        let geometry = self.geometry();
        self.edit("add_iso_edge", |tx| {
            if start == end {
                return Err(Error::malformed(format!(
                    "start and end node are the same ({start})"
                )));
            }
            let s = tx.require_node(start)?;
            let e = tx.require_node(end)?;
            let (Some(face), Some(end_face)) = (s.containing_face, e.containing_face) else {
                return Err(Error::conflict(format!(
                    "nodes {start} and {end} must both be isolated"
                )));
            };
            if face != end_face {
                return Err(Error::invalid(format!(
                    "nodes {start} and {end} are in different faces ({face}, {end_face})"
                )));
            }
            check_line_placement(tx, geometry, &line, &s, &e, None)?;

            let id = self.sequences.next_edge();
            tx.put_edge(new_edge(id, start, end, face, line));
            attach_nodes(tx, &[start, end])?;
            Ok(id)
        })
    }

    /// Removes an edge whose endpoints have no other edges.
    ///
    /// Both nodes become isolated in the face the edge was in.
    pub fn remove_iso_edge(&self, edge: EdgeId) -> Result<()> {
        self.edit("remove_iso_edge", |tx| {
            let row = tx.require_edge(edge)?;
            let alone = |node: NodeId| tx.edges_at_node(node) == vec![edge];
            if !alone(row.start_node) || !alone(row.end_node) || row.left_face != row.right_face {
                return Err(Error::conflict(format!("edge {edge} is not isolated")));
            }
            ensure_edge_unreferenced(tx, edge)?;

            tx.delete_edge(edge);
            for id in [row.start_node, row.end_node] {
                let mut node = tx.require_node(id)?;
                node.containing_face = Some(row.left_face);
                tx.put_node(node);
            }
            Ok(())
        })
    }
}
