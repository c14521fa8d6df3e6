// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Adding edges between existing nodes, splitting faces when a ring closes.

use nalgebra::Point2;
use rustc_hash::FxHashSet;
use topolite_geometry::algorithm::point_in_ring;
use topolite_geometry::{GeometryLibrary, LineString, Location, EPSILON};

use super::{attach_nodes, check_line_placement, face_relations, label_ring, new_edge};
use crate::error::{Error, Result};
use crate::face::refresh_face_mbr;
use crate::ids::{DirectedEdge, EdgeId, FaceId, NodeId};
use crate::primitives::{Face, Relation};
use crate::store::{TopologyView, Transaction};
use crate::topology::Topology;
use crate::traversal::{edge_probe, leaving_azimuth, relink_nodes, ring_points, walk_ring, wedge_face};

/// How a face split by a new edge is relabelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SplitMode {
    /// The split face keeps one side, a new face takes the other.
    ModFace,
    /// Both sides get new faces and the split face is deleted.
    NewFaces,
}

/// One side of a new edge after a split.
struct Side {
    ring: Vec<DirectedEdge>,
    points: Vec<Point2<f64>>,
    bounded: bool,
    face: Option<FaceId>,
}

impl Side {
    fn contains(&self, p: &Point2<f64>) -> bool {
        self.bounded && point_in_ring(p, &self.points) != Location::Exterior
    }
}

impl Topology {
    /// Adds an edge between two nodes. When it splits a face, the split face
    /// keeps one side and a new face is created on the other.
    ///
    /// `adjacent_hint` may name an edge incident to either endpoint.
    pub fn add_edge_mod_face(
        &self,
        start: NodeId,
        end: NodeId,
        line: LineString,
        adjacent_hint: Option<EdgeId>,
    ) -> Result<EdgeId> {
        self.add_edge("add_edge_mod_face", start, end, line, adjacent_hint, SplitMode::ModFace)
    }

    /// Adds an edge between two nodes. When it splits a bounded face, the face
    /// is replaced by two new faces.
    pub fn add_edge_new_faces(
        &self,
        start: NodeId,
        end: NodeId,
        line: LineString,
        adjacent_hint: Option<EdgeId>,
    ) -> Result<EdgeId> {
        self.add_edge("add_edge_new_faces", start, end, line, adjacent_hint, SplitMode::NewFaces)
    }

    fn add_edge(
        &self,
        op: &'static str,
        start: NodeId,
        end: NodeId,
        line: LineString,
        adjacent_hint: Option<EdgeId>,
        mode: SplitMode,
    ) -> Result<EdgeId> {
        let geometry = self.geometry();
        self.edit(op, |tx| {
            let s = tx.require_node(start)?;
            let e = tx.require_node(end)?;
            check_line_placement(tx, geometry, &line, &s, &e, None)?;
            if let Some(hint) = adjacent_hint {
                let h = tx.require_edge(hint)?;
                let touches = [h.start_node, h.end_node]
                    .iter()
                    .any(|n| *n == start || *n == end);
                if !touches {
                    return Err(Error::malformed(format!(
                        "edge {hint} is not incident to node {start} or {end}"
                    )));
                }
            }

            let id = self.sequences.next_edge();
            let mut edge = new_edge(id, start, end, FaceId::UNIVERSAL, line);
            let face_at_start = match wedge_face(tx, start, leaving_azimuth(&edge, true))? {
                Some(face) => face,
                None => s.containing_face.ok_or_else(|| {
                    Error::invalid(format!("node {start} has neither edges nor a containing face"))
                })?,
            };
            let face_at_end = match wedge_face(tx, end, leaving_azimuth(&edge, false))? {
                Some(face) => face,
                None => e.containing_face.ok_or_else(|| {
                    Error::invalid(format!("node {end} has neither edges nor a containing face"))
                })?,
            };
            if face_at_start != face_at_end {
                return Err(Error::invalid(format!(
                    "side-location conflict: new edge starts in face {face_at_start} and ends in face {face_at_end}"
                )));
            }
            let face = face_at_start;
            edge.left_face = face;
            edge.right_face = face;

            tx.put_edge(edge);
            attach_nodes(tx, &[start, end])?;
            relink_nodes(tx, &[start, end])?;

            self.split_face(tx, geometry, id, face, mode)?;
            Ok(id)
        })
    }

    /// Splits `face` if the new edge closed a ring.
    fn split_face(
        &self,
        tx: &mut Transaction,
        geometry: &dyn GeometryLibrary,
        id: EdgeId,
        face: FaceId,
        mode: SplitMode,
    ) -> Result<()> {
        let left_ring = walk_ring(tx, DirectedEdge::forward(id))?;
        if left_ring.contains(&DirectedEdge::backward(id)) {
            // Both sides on one ring: the edge dangles or bridges within `face`
            return Ok(());
        }
        let right_ring = walk_ring(tx, DirectedEdge::backward(id))?;

        let mut left = side(tx, geometry, left_ring)?;
        let mut right = side(tx, geometry, right_ring)?;
        if !left.bounded && !right.bounded {
            return Ok(());
        }

        if mode == SplitMode::NewFaces && !face.is_universal() {
            left.face = Some(self.sequences.next_face());
            right.face = Some(self.sequences.next_face());
        } else if left.bounded {
            left.face = Some(self.sequences.next_face());
        } else {
            right.face = Some(self.sequences.next_face());
        }

        for s in [&left, &right] {
            if let Some(new_face) = s.face {
                tx.put_face(Face { id: new_face, mbr: None });
                label_ring(tx, &s.ring, new_face)?;
            }
        }

        // Remaining members of the split face go to the side they lie in
        let side_face = |p: &Point2<f64>| {
            let chosen = if left.contains(p) {
                &left
            } else if right.contains(p) {
                &right
            } else if !left.bounded {
                &left
            } else {
                &right
            };
            chosen.face.unwrap_or(face)
        };
        let on_ring: FxHashSet<DirectedEdge> =
            left.ring.iter().chain(right.ring.iter()).copied().collect();
        for mut member in tx.edges() {
            let mut changed = false;
            for forward in [true, false] {
                let dir = DirectedEdge::new(member.id, forward);
                if member.face_left_of(forward) != face || on_ring.contains(&dir) {
                    continue;
                }
                let target = side_face(&edge_probe(&member));
                if target != face {
                    member.set_face_left_of(forward, target);
                    changed = true;
                }
            }
            if changed {
                tx.put_edge(member);
            }
        }
        for mut node in tx.nodes() {
            if node.containing_face != Some(face) {
                continue;
            }
            let target = side_face(&node.point);
            if target != face {
                node.containing_face = Some(target);
                tx.put_node(node);
            }
        }

        let created: Vec<FaceId> = [left.face, right.face].into_iter().flatten().collect();
        let replaced = mode == SplitMode::NewFaces && !face.is_universal();
        if !face.is_universal() {
            for rel in face_relations(tx, face) {
                if replaced {
                    tx.remove_relation(rel);
                }
                for new_face in &created {
                    tx.add_relation(Relation {
                        element_id: new_face.0,
                        ..rel
                    });
                }
            }
        }

        if replaced {
            tx.delete_face(face);
        } else {
            refresh_face_mbr(tx, geometry, face)?;
        }
        for new_face in &created {
            refresh_face_mbr(tx, geometry, *new_face)?;
        }
        tracing::debug!(topology = %self.name(), edge = %id, split = %face, created = ?created, "face split");
        Ok(())
    }
}

fn side(tx: &Transaction, geometry: &dyn GeometryLibrary, ring: Vec<DirectedEdge>) -> Result<Side> {
    let points = ring_points(tx, &ring)?;
    let area = geometry.signed_area(&points);
    Ok(Side {
        ring,
        points,
        bounded: area > EPSILON,
        face: None,
    })
}

#[cfg(test)]
mod tests {
    use crate::catalog::Catalog;
    use crate::error::ErrorKind;
    use crate::ids::{EdgeId, FaceId, NodeId};
    use crate::store::TopologyView;
    use crate::topology::Topology;
    use approx::assert_relative_eq;
    use nalgebra::Point2;
    use std::sync::Arc;
    use topolite_geometry::LineString;

    fn topology() -> Arc<Topology> {
        let catalog = Catalog::with_defaults();
        catalog.create_topology("add", 0, 0.0, false).unwrap();
        catalog.topology("add").unwrap()
    }

    fn line(coords: &[(f64, f64)]) -> LineString {
        LineString::from_coords(coords)
    }

    /// Open square path 0,0 -> 10,0 -> 10,10 -> 0,10 with nodes at the corners.
    fn open_square(topo: &Topology) -> [NodeId; 4] {
        let a = topo.add_iso_node(None, Point2::new(0.0, 0.0)).unwrap();
        let b = topo.add_iso_node(None, Point2::new(10.0, 0.0)).unwrap();
        let c = topo.add_iso_node(None, Point2::new(10.0, 10.0)).unwrap();
        let d = topo.add_iso_node(None, Point2::new(0.0, 10.0)).unwrap();
        topo.add_iso_edge(a, b, line(&[(0.0, 0.0), (10.0, 0.0)])).unwrap();
        topo.add_edge_mod_face(b, c, line(&[(10.0, 0.0), (10.0, 10.0)]), None).unwrap();
        topo.add_edge_mod_face(c, d, line(&[(10.0, 10.0), (0.0, 10.0)]), None).unwrap();
        [a, b, c, d]
    }

    #[test]
    fn test_dangling_edge_keeps_universal_face() {
        let topo = topology();
        open_square(&topo);
        let data = topo.snapshot();
        assert_eq!(data.faces().len(), 1);
        assert!(data
            .edges()
            .iter()
            .all(|e| e.left_face == FaceId::UNIVERSAL && e.right_face == FaceId::UNIVERSAL));
    }

    #[test]
    fn test_closing_edge_creates_face() {
        let topo = topology();
        let [a, _, _, d] = open_square(&topo);
        let e = topo
            .add_edge_mod_face(d, a, line(&[(0.0, 10.0), (0.0, 0.0)]), None)
            .unwrap();

        let data = topo.snapshot();
        assert_eq!(data.faces().len(), 2);
        let edge = data.edge(e).unwrap();
        // The square interior is on the left of the closing edge walked downwards
        assert_eq!(edge.left_face, FaceId(1));
        assert_eq!(edge.right_face, FaceId::UNIVERSAL);

        let poly = topo.get_face_geometry(FaceId(1)).unwrap();
        assert_relative_eq!(poly.area(), 100.0, epsilon = 1e-9);
        let mbr = data.face(FaceId(1)).unwrap().mbr.unwrap();
        assert_relative_eq!(mbr.max.x, 10.0);
    }

    #[test]
    fn test_new_faces_replaces_bounded_face() {
        let topo = topology();
        let [a, _, c, d] = open_square(&topo);
        topo.add_edge_new_faces(d, a, line(&[(0.0, 10.0), (0.0, 0.0)]), None).unwrap();
        // Diagonal splits the square into two triangles
        topo.add_edge_new_faces(a, c, line(&[(0.0, 0.0), (10.0, 10.0)]), None).unwrap();

        let data = topo.snapshot();
        let bounded: Vec<FaceId> = data
            .faces()
            .iter()
            .map(|f| f.id)
            .filter(|f| !f.is_universal())
            .collect();
        assert_eq!(bounded, vec![FaceId(2), FaceId(3)]);
        for face in bounded {
            assert_relative_eq!(topo.get_face_geometry(face).unwrap().area(), 50.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_adjacent_hint_checked() {
        let topo = topology();
        let [a, _, c, d] = open_square(&topo);
        let missing = topo
            .add_edge_mod_face(d, a, line(&[(0.0, 10.0), (0.0, 0.0)]), Some(EdgeId(99)))
            .unwrap_err();
        assert_eq!(missing.kind(), ErrorKind::NotFound);

        let far = topo.add_iso_node(None, Point2::new(30.0, 30.0)).unwrap();
        let far_end = topo.add_iso_node(None, Point2::new(40.0, 30.0)).unwrap();
        let far_edge = topo
            .add_iso_edge(far, far_end, line(&[(30.0, 30.0), (40.0, 30.0)]))
            .unwrap();
        let err = topo
            .add_edge_mod_face(a, c, line(&[(0.0, 0.0), (10.0, 10.0)]), Some(far_edge))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedInput);
    }

    #[test]
    fn test_isolated_node_moves_to_new_face() {
        let topo = topology();
        let [a, _, _, d] = open_square(&topo);
        let inner = topo.add_iso_node(None, Point2::new(5.0, 5.0)).unwrap();
        let outer = topo.add_iso_node(None, Point2::new(20.0, 5.0)).unwrap();
        topo.add_edge_mod_face(d, a, line(&[(0.0, 10.0), (0.0, 0.0)]), None).unwrap();

        let data = topo.snapshot();
        assert_eq!(data.node(inner).unwrap().containing_face, Some(FaceId(1)));
        assert_eq!(data.node(outer).unwrap().containing_face, Some(FaceId::UNIVERSAL));
        assert_eq!(topo.face_containing_point(Point2::new(5.0, 5.0)).unwrap(), FaceId(1));
    }

    #[test]
    fn test_crossing_edge_rejected() {
        let topo = topology();
        let [_, _, c, _] = open_square(&topo);
        let p = topo.add_iso_node(None, Point2::new(5.0, -5.0)).unwrap();
        let err = topo
            .add_edge_mod_face(p, c, line(&[(5.0, -5.0), (10.0, 10.0)]), None)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::GeometricInvalidity);
        assert_eq!(topo.snapshot().edges().len(), 3);
    }
}
