// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Healing two edges that meet at a node of degree two.

use std::collections::BTreeSet;

use topolite_geometry::LineString;

use super::{edge_relations, ensure_edge_unreferenced, ensure_node_unreferenced};
use crate::error::{Error, Result};
use crate::ids::{EdgeId, LayerId, NodeId, TopoGeomId};
use crate::primitives::{Edge, Relation};
use crate::store::{TopologyView, Transaction};
use crate::topology::Topology;
use crate::traversal::relink_nodes;

/// The pair of edges being healed, with the node they share.
struct HealPair {
    first: Edge,
    second: Edge,
    node: NodeId,
}

/// Result of joining `second` onto `first` through their shared node,
/// oriented along `first`.
struct Joined {
    start: NodeId,
    end: NodeId,
    geometry: LineString,
    /// Whether `second` runs against the joined direction.
    second_flipped: bool,
}

fn heal_pair(tx: &Transaction, e1: EdgeId, e2: EdgeId) -> Result<HealPair> {
    if e1 == e2 {
        return Err(Error::malformed(format!("cannot heal edge {e1} with itself")));
    }
    let first = tx.require_edge(e1)?;
    let second = tx.require_edge(e2)?;
    for edge in [&first, &second] {
        if edge.is_closed() {
            return Err(Error::malformed(format!("edge {} is closed, cannot heal", edge.id)));
        }
    }

    let candidates: BTreeSet<NodeId> = [first.start_node, first.end_node]
        .into_iter()
        .filter(|n| *n == second.start_node || *n == second.end_node)
        .collect();
    let Some(&shared) = candidates.first() else {
        return Err(Error::malformed(format!("non-connected edges {e1} and {e2}")));
    };
    let pair = [e1.min(e2), e1.max(e2)];
    let node = candidates
        .iter()
        .copied()
        .find(|n| tx.edges_at_node(*n) == pair)
        .ok_or_else(|| {
            Error::conflict(format!(
                "other edges connected to node {shared} ({})",
                tx.edges_at_node(shared)
                    .iter()
                    .filter(|e| !pair.contains(e))
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(", ")
            ))
        })?;
    ensure_node_unreferenced(tx, node)?;
    Ok(HealPair { first, second, node })
}

fn join(first: &Edge, second: &Edge, node: NodeId) -> Joined {
    if first.end_node == node {
        // first, then second leaving the node
        let second_flipped = second.end_node == node;
        let mut points = first.geometry.points.clone();
        points.extend(second.directed_points(!second_flipped).into_iter().skip(1));
        Joined {
            start: first.start_node,
            end: second.destination(!second_flipped),
            geometry: LineString::new(points),
            second_flipped,
        }
    } else {
        // second arriving at the node, then first
        let second_flipped = second.start_node == node;
        let mut points = second.directed_points(!second_flipped);
        points.extend(first.geometry.points.iter().skip(1).copied());
        Joined {
            start: second.origin(!second_flipped),
            end: first.end_node,
            geometry: LineString::new(points),
            second_flipped,
        }
    }
}

fn owners(rels: &[Relation]) -> BTreeSet<(LayerId, TopoGeomId)> {
    rels.iter().map(|r| (r.layer_id, r.topogeo_id)).collect()
}

impl Topology {
    /// Merges two edges sharing a degree-two node into the lower id.
    ///
    /// The surviving edge keeps its direction; the shared node and the
    /// other edge are removed. Returns the surviving id.
    pub fn mod_edge_heal(&self, e1: EdgeId, e2: EdgeId) -> Result<EdgeId> {
        self.edit("mod_edge_heal", |tx| {
            let HealPair { first, second, node } = heal_pair(tx, e1, e2)?;
            let (kept, other) = if first.id < second.id {
                (first, second)
            } else {
                (second, first)
            };

            let kept_rels = edge_relations(tx, kept.id);
            let other_rels = edge_relations(tx, other.id);
            let (a, b) = (owners(&kept_rels), owners(&other_rels));
            if let Some((layer, tg)) = a.symmetric_difference(&b).next() {
                return Err(Error::conflict(format!(
                    "topogeometry {tg} in layer {layer} references only one of edges {} and {}",
                    kept.id, other.id
                )));
            }

            let joined = join(&kept, &other, node);
            tx.delete_edge(other.id);
            tx.delete_node(node);
            tx.put_edge(Edge {
                start_node: joined.start,
                end_node: joined.end,
                geometry: joined.geometry,
                ..kept.clone()
            });

            for rel in other_rels {
                tx.remove_relation(rel);
                let sign = if joined.second_flipped { -rel.element_id.signum() } else { rel.element_id.signum() };
                tx.add_relation(Relation {
                    element_id: sign * kept.id.0,
                    ..rel
                });
            }
            relink_nodes(tx, &[joined.start, joined.end])?;
            tracing::debug!(topology = %self.name(), kept = %kept.id, removed = %other.id, node = %node, "edges healed");
            Ok(kept.id)
        })
    }

    /// Replaces two edges sharing a degree-two node by one new edge running
    /// in the direction of `e1`. Edges used by a TopoGeometry are refused.
    pub fn new_edge_heal(&self, e1: EdgeId, e2: EdgeId) -> Result<EdgeId> {
        self.edit("new_edge_heal", |tx| {
            let HealPair { first, second, node } = heal_pair(tx, e1, e2)?;
            ensure_edge_unreferenced(tx, first.id)?;
            ensure_edge_unreferenced(tx, second.id)?;

            let joined = join(&first, &second, node);
            let id = self.sequences.next_edge();
            tx.delete_edge(first.id);
            tx.delete_edge(second.id);
            tx.delete_node(node);
            tx.put_edge(Edge {
                id,
                start_node: joined.start,
                end_node: joined.end,
                geometry: joined.geometry,
                ..first
            });
            relink_nodes(tx, &[joined.start, joined.end])?;
            Ok(id)
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::catalog::Catalog;
    use crate::error::ErrorKind;
    use crate::ids::{EdgeId, NodeId};
    use crate::store::TopologyView;
    use crate::topology::Topology;
    use nalgebra::Point2;
    use std::sync::Arc;
    use topolite_geometry::LineString;

    /// a(0,0) -1-> b(5,0) <-2- c(10,0)
    fn chain() -> (Arc<Topology>, [NodeId; 3]) {
        let catalog = Catalog::with_defaults();
        catalog.create_topology("heal", 0, 0.0, false).unwrap();
        let topo = catalog.topology("heal").unwrap();
        let a = topo.add_iso_node(None, Point2::new(0.0, 0.0)).unwrap();
        let b = topo.add_iso_node(None, Point2::new(5.0, 0.0)).unwrap();
        let c = topo.add_iso_node(None, Point2::new(10.0, 0.0)).unwrap();
        topo.add_iso_edge(a, b, LineString::from_coords(&[(0.0, 0.0), (5.0, 0.0)]))
            .unwrap();
        topo.add_edge_mod_face(c, b, LineString::from_coords(&[(10.0, 0.0), (5.0, 0.0)]), None)
            .unwrap();
        (topo, [a, b, c])
    }

    #[test]
    fn test_mod_heal_keeps_lower_id_and_direction() {
        let (topo, [a, b, c]) = chain();
        let kept = topo.mod_edge_heal(EdgeId(2), EdgeId(1)).unwrap();
        assert_eq!(kept, EdgeId(1));
        let data = topo.snapshot();
        assert!(data.node(b).is_none());
        assert!(data.edge(EdgeId(2)).is_none());
        let edge = data.edge(EdgeId(1)).unwrap();
        assert_eq!((edge.start_node, edge.end_node), (a, c));
        assert_eq!(
            edge.geometry,
            LineString::from_coords(&[(0.0, 0.0), (5.0, 0.0), (10.0, 0.0)])
        );
        assert_eq!(edge.next_left_edge.0, -1);
        assert_eq!(edge.next_right_edge.0, 1);
    }

    #[test]
    fn test_new_heal_follows_first_edge() {
        let (topo, [a, _, c]) = chain();
        let id = topo.new_edge_heal(EdgeId(2), EdgeId(1)).unwrap();
        assert_eq!(id, EdgeId(3));
        let edge = topo.snapshot().edge(id).unwrap();
        assert_eq!((edge.start_node, edge.end_node), (c, a));
    }

    #[test]
    fn test_heal_rejections() {
        let (topo, _) = chain();
        assert_eq!(
            topo.mod_edge_heal(EdgeId(1), EdgeId(1)).unwrap_err().kind(),
            ErrorKind::MalformedInput
        );
        let d = topo.add_iso_node(None, Point2::new(5.0, 5.0)).unwrap();
        let b = NodeId(2);
        topo.add_edge_mod_face(b, d, LineString::from_coords(&[(5.0, 0.0), (5.0, 5.0)]), None)
            .unwrap();
        let err = topo.mod_edge_heal(EdgeId(1), EdgeId(2)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ReferentialConflict);
        assert_eq!(topo.snapshot().edges().len(), 3);
    }

    #[test]
    fn test_heal_non_connected() {
        let catalog = Catalog::with_defaults();
        catalog.create_topology("heal", 0, 0.0, false).unwrap();
        let topo = catalog.topology("heal").unwrap();
        let mut ids = Vec::new();
        for y in [0.0, 5.0] {
            let s = topo.add_iso_node(None, Point2::new(0.0, y)).unwrap();
            let e = topo.add_iso_node(None, Point2::new(5.0, y)).unwrap();
            ids.push(
                topo.add_iso_edge(s, e, LineString::from_coords(&[(0.0, y), (5.0, y)]))
                    .unwrap(),
            );
        }
        let err = topo.mod_edge_heal(ids[0], ids[1]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedInput);
    }
}
