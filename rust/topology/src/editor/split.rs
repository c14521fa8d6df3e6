// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Splitting an edge at a new node.

use nalgebra::Point2;
use topolite_geometry::{GeometryLibrary, LineString};

use super::{check_point_free, edge_relations, ensure_edge_unreferenced};
use crate::error::{Error, Result};
use crate::ids::{EdgeId, NodeId};
use crate::primitives::{Edge, Node, Relation};
use crate::store::{TopologyView, Transaction};
use crate::topology::Topology;
use crate::traversal::relink_nodes;

/// The two halves of an edge split at `point`.
fn halves(
    tx: &Transaction,
    geometry: &dyn GeometryLibrary,
    edge: &Edge,
    point: &Point2<f64>,
) -> Result<(LineString, LineString)> {
    check_point_free(tx, geometry, point, None, Some(edge.id))?;
    geometry
        .split_line(&edge.geometry, point)
        .ok_or_else(|| Error::invalid(format!("point {point} is not on the interior of edge {}", edge.id)))
}

fn half_edge(template: &Edge, id: EdgeId, start: NodeId, end: NodeId, geometry: LineString) -> Edge {
    Edge {
        id,
        start_node: start,
        end_node: end,
        geometry,
        ..template.clone()
    }
}

impl Topology {
    /// Splits an edge at `point`. The edge keeps its id for the part before
    /// the new node; a new edge carries the rest. TopoGeometries that used
    /// the edge use both parts afterwards.
    pub fn mod_edge_split(&self, edge: EdgeId, point: Point2<f64>) -> Result<NodeId> {
        let geometry = self.geometry();
        self.edit("mod_edge_split", |tx| {
            let old = tx.require_edge(edge)?;
            let (first, second) = halves(tx, geometry, &old, &point)?;

            let node = self.sequences.next_node();
            let new_id = self.sequences.next_edge();
            tx.put_node(Node {
                id: node,
                point,
                containing_face: None,
            });
            tx.put_edge(half_edge(&old, edge, old.start_node, node, first));
            tx.put_edge(half_edge(&old, new_id, node, old.end_node, second));
            relink_nodes(tx, &[old.start_node, node, old.end_node])?;

            for rel in edge_relations(tx, edge) {
                tx.add_relation(Relation {
                    element_id: rel.element_id.signum() * new_id.0,
                    ..rel
                });
            }
            tracing::debug!(topology = %self.name(), edge = %edge, node = %node, new_edge = %new_id, "edge split");
            Ok(node)
        })
    }

    /// Replaces an edge by two new edges meeting at a new node at `point`.
    ///
    /// The first new id is the part from the old start node. Edges used by a
    /// TopoGeometry cannot be split this way.
    pub fn new_edges_split(&self, edge: EdgeId, point: Point2<f64>) -> Result<NodeId> {
        let geometry = self.geometry();
        self.edit("new_edges_split", |tx| {
            let old = tx.require_edge(edge)?;
            ensure_edge_unreferenced(tx, edge)?;
            let (first, second) = halves(tx, geometry, &old, &point)?;

            let node = self.sequences.next_node();
            let first_id = self.sequences.next_edge();
            let second_id = self.sequences.next_edge();
            tx.put_node(Node {
                id: node,
                point,
                containing_face: None,
            });
            tx.delete_edge(edge);
            tx.put_edge(half_edge(&old, first_id, old.start_node, node, first));
            tx.put_edge(half_edge(&old, second_id, node, old.end_node, second));
            relink_nodes(tx, &[old.start_node, node, old.end_node])?;
            Ok(node)
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::catalog::Catalog;
    use crate::error::ErrorKind;
    use crate::ids::{EdgeId, FaceId};
    use crate::store::TopologyView;
    use nalgebra::Point2;
    use topolite_geometry::LineString;

    #[test]
    fn test_mod_split_then_new_split() {
        let catalog = Catalog::with_defaults();
        catalog.create_topology("split", 0, 0.0, false).unwrap();
        let topo = catalog.topology("split").unwrap();
        let a = topo.add_iso_node(None, Point2::new(0.0, 0.0)).unwrap();
        let b = topo.add_iso_node(None, Point2::new(10.0, 0.0)).unwrap();
        let e = topo
            .add_iso_edge(a, b, LineString::from_coords(&[(0.0, 0.0), (10.0, 0.0)]))
            .unwrap();

        let n = topo.mod_edge_split(e, Point2::new(4.0, 0.0)).unwrap();
        let data = topo.snapshot();
        let first = data.edge(e).unwrap();
        let second = data.edge(EdgeId(2)).unwrap();
        assert_eq!(first.end_node, n);
        assert_eq!(second.start_node, n);
        assert_eq!(second.end_node, b);
        assert_eq!(first.next_left_edge.0, 2);
        assert_eq!(second.next_right_edge.0, -1);
        assert_eq!(data.node(n).unwrap().containing_face, None);
        assert_eq!(second.left_face, FaceId::UNIVERSAL);

        let m = topo.new_edges_split(EdgeId(2), Point2::new(7.0, 0.0)).unwrap();
        let data = topo.snapshot();
        assert!(data.edge(EdgeId(2)).is_none());
        assert_eq!(data.edge(EdgeId(3)).unwrap().end_node, m);
        assert_eq!(data.edge(EdgeId(4)).unwrap().start_node, m);
        assert_eq!(data.edges().len(), 3);
    }

    #[test]
    fn test_split_rejects_point_off_edge_and_on_node() {
        let catalog = Catalog::with_defaults();
        catalog.create_topology("split", 0, 0.0, false).unwrap();
        let topo = catalog.topology("split").unwrap();
        let a = topo.add_iso_node(None, Point2::new(0.0, 0.0)).unwrap();
        let b = topo.add_iso_node(None, Point2::new(10.0, 0.0)).unwrap();
        let e = topo
            .add_iso_edge(a, b, LineString::from_coords(&[(0.0, 0.0), (10.0, 0.0)]))
            .unwrap();
        let off = topo.mod_edge_split(e, Point2::new(4.0, 1.0)).unwrap_err();
        assert_eq!(off.kind(), ErrorKind::GeometricInvalidity);
        let on_node = topo.mod_edge_split(e, Point2::new(10.0, 0.0)).unwrap_err();
        assert_eq!(on_node.kind(), ErrorKind::GeometricInvalidity);
        assert_eq!(topo.snapshot().edges().len(), 1);
    }
}
