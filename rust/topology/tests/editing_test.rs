// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! End-to-end edits through the public API: face bookkeeping, ring
//! closure, split/heal and atomicity of rejected operations.

use std::sync::Arc;

use approx::assert_relative_eq;
use nalgebra::Point2;
use topolite_geometry::LineString;
use topolite_topology::{
    Catalog, DirectedEdge, EdgeId, ErrorKind, FaceId, NodeId, TopoElement, Topology, TopologyView,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn line(coords: &[(f64, f64)]) -> LineString {
    LineString::from_coords(coords)
}

fn node(topo: &Topology, x: f64, y: f64) -> NodeId {
    topo.add_iso_node(None, Point2::new(x, y)).unwrap()
}

/// Two unit-10 squares side by side: face 1 on the left, face 2 on the right.
fn two_squares(catalog: &Catalog, name: &str) -> Arc<Topology> {
    catalog.create_topology(name, 0, 0.0, false).unwrap();
    let topo = catalog.topology(name).unwrap();
    let a = node(&topo, 0.0, 0.0);
    let b = node(&topo, 10.0, 0.0);
    let c = node(&topo, 10.0, 10.0);
    let d = node(&topo, 0.0, 10.0);
    let e = node(&topo, 20.0, 0.0);
    let f = node(&topo, 20.0, 10.0);

    topo.add_iso_edge(a, b, line(&[(0.0, 0.0), (10.0, 0.0)])).unwrap();
    topo.add_edge_mod_face(b, c, line(&[(10.0, 0.0), (10.0, 10.0)]), None).unwrap();
    topo.add_edge_mod_face(c, d, line(&[(10.0, 10.0), (0.0, 10.0)]), None).unwrap();
    topo.add_edge_mod_face(d, a, line(&[(0.0, 10.0), (0.0, 0.0)]), None).unwrap();
    topo.add_edge_mod_face(b, e, line(&[(10.0, 0.0), (20.0, 0.0)]), None).unwrap();
    topo.add_edge_mod_face(e, f, line(&[(20.0, 0.0), (20.0, 10.0)]), None).unwrap();
    topo.add_edge_mod_face(f, c, line(&[(20.0, 10.0), (10.0, 10.0)]), None).unwrap();
    topo
}

#[test]
fn test_two_squares_faces() {
    init_tracing();
    let catalog = Catalog::with_defaults();
    let topo = two_squares(&catalog, "squares");

    let summary = topo.summary();
    assert_eq!(summary.nodes, 6);
    assert_eq!(summary.edges, 7);
    assert_eq!(summary.faces, 2);
    assert_eq!(summary.isolated_nodes, 0);

    for face in [FaceId(1), FaceId(2)] {
        assert_relative_eq!(topo.get_face_geometry(face).unwrap().area(), 100.0, epsilon = 1e-9);
    }
    assert_eq!(topo.face_containing_point(Point2::new(5.0, 5.0)).unwrap(), FaceId(1));
    assert_eq!(topo.face_containing_point(Point2::new(15.0, 5.0)).unwrap(), FaceId(2));
    assert_eq!(topo.face_containing_point(Point2::new(50.0, 5.0)).unwrap(), FaceId::UNIVERSAL);

    // Shared edge b-c has the left square on its left
    let shared = topo.snapshot().edge(EdgeId(2)).unwrap();
    assert_eq!(shared.left_face, FaceId(1));
    assert_eq!(shared.right_face, FaceId(2));
    assert!(topo.validate().is_empty());
}

#[test]
fn test_every_ring_closes_on_one_face() {
    let catalog = Catalog::with_defaults();
    let topo = two_squares(&catalog, "rings");
    let data = topo.snapshot();
    let edges = data.edges();
    let limit = 2 * edges.len();

    for edge in &edges {
        for forward in [true, false] {
            let start = DirectedEdge::new(edge.id, forward);
            let face = edge.face_left_of(forward);
            let mut cur = start;
            let mut steps = 0;
            loop {
                cur = data.next_half_edge(cur).unwrap();
                steps += 1;
                let next = data.edge(cur.edge()).unwrap();
                assert_eq!(next.face_left_of(cur.is_forward()), face, "ring of {start}");
                if cur == start {
                    break;
                }
                assert!(steps <= limit, "ring of {start} does not close");
            }
        }
    }
}

#[test]
fn test_face_geometry_is_stable() {
    let catalog = Catalog::with_defaults();
    let topo = two_squares(&catalog, "stable");
    let first = topo.get_face_geometry(FaceId(2)).unwrap();
    let second = topo.get_face_geometry(FaceId(2)).unwrap();
    assert_eq!(first, second);

    let mut ring = topo.get_face_edges(FaceId(2)).unwrap();
    ring.sort();
    assert_eq!(ring.len(), 4);
}

#[test]
fn test_add_then_remove_restores_faces() {
    let catalog = Catalog::with_defaults();
    let topo = two_squares(&catalog, "roundtrip");
    let before = topo.summary().faces;

    let a = topo.get_node_by_point(Point2::new(0.0, 0.0), 0.0).unwrap().unwrap();
    let c = topo.get_node_by_point(Point2::new(10.0, 10.0), 0.0).unwrap().unwrap();
    let diagonal = topo
        .add_edge_mod_face(a, c, line(&[(0.0, 0.0), (10.0, 10.0)]), None)
        .unwrap();
    assert_eq!(topo.summary().faces, before + 1);

    let kept = topo.rem_edge_mod_face(diagonal).unwrap();
    assert!(!kept.is_universal());
    assert_eq!(topo.summary().faces, before);
    assert_relative_eq!(topo.get_face_geometry(kept).unwrap().area(), 100.0, epsilon = 1e-9);
    assert!(topo.validate().is_empty());
}

#[test]
fn test_removing_outer_edge_merges_into_universal() {
    let catalog = Catalog::with_defaults();
    let topo = two_squares(&catalog, "outer");
    // e-f is on the outer boundary of the right square
    let merged = topo.rem_edge_new_face(EdgeId(6)).unwrap();
    assert_eq!(merged, None);
    assert_eq!(topo.summary().faces, 1);
    assert!(topo.snapshot().face(FaceId(2)).is_none());
}

#[test]
fn test_split_then_heal_restores_edge() {
    let catalog = Catalog::with_defaults();
    catalog.create_topology("heal", 0, 0.0, false).unwrap();
    let topo = catalog.topology("heal").unwrap();
    let a = node(&topo, 0.0, 0.0);
    let b = node(&topo, 10.0, 0.0);
    let e = topo.add_iso_edge(a, b, line(&[(0.0, 0.0), (10.0, 0.0)])).unwrap();

    let mid = topo.mod_edge_split(e, Point2::new(4.0, 0.0)).unwrap();
    assert_eq!(topo.summary().edges, 2);
    let other = topo
        .snapshot()
        .edges_at_node(mid)
        .into_iter()
        .find(|id| *id != e)
        .unwrap();

    let healed = topo.mod_edge_heal(e, other).unwrap();
    assert_eq!(healed, e);

    let data = topo.snapshot();
    let edge = data.edge(e).unwrap();
    assert_eq!((edge.start_node, edge.end_node), (a, b));
    assert_eq!(edge.geometry, line(&[(0.0, 0.0), (4.0, 0.0), (10.0, 0.0)]));
    assert!(data.node(mid).is_none());
    assert_eq!(data.edges().len(), 1);
    assert_eq!(edge.next_left_edge, DirectedEdge::backward(e));
    assert_eq!(edge.next_right_edge, DirectedEdge::forward(e));
}

#[test]
fn test_heal_refused_when_one_side_is_referenced() {
    let catalog = Catalog::with_defaults();
    catalog.create_topology("owners", 0, 0.0, false).unwrap();
    let topo = catalog.topology("owners").unwrap();
    let a = node(&topo, 0.0, 0.0);
    let b = node(&topo, 10.0, 0.0);
    let e = topo.add_iso_edge(a, b, line(&[(0.0, 0.0), (10.0, 0.0)])).unwrap();
    topo.mod_edge_split(e, Point2::new(5.0, 0.0)).unwrap();

    let layer = catalog
        .add_topo_geometry_column("owners", "public", "roads", "geom", "LINE", None)
        .unwrap();
    catalog
        .create_topo_geom("owners", 2, layer, &[TopoElement::edge(DirectedEdge::forward(e))])
        .unwrap();

    let version = topo.version();
    let err = topo.mod_edge_heal(e, EdgeId(2)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ReferentialConflict);
    assert_eq!(topo.version(), version);
    assert_eq!(topo.summary().edges, 2);
}

#[test]
fn test_rejected_edit_changes_nothing() {
    let catalog = Catalog::with_defaults();
    let topo = two_squares(&catalog, "atomic");
    let before = topo.snapshot();
    let version = topo.version();

    // Crosses the shared edge b-c
    let a = topo.get_node_by_point(Point2::new(0.0, 0.0), 0.0).unwrap().unwrap();
    let f = topo.get_node_by_point(Point2::new(20.0, 10.0), 0.0).unwrap().unwrap();
    let err = topo
        .add_edge_new_faces(a, f, line(&[(0.0, 0.0), (20.0, 10.0)]), None)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::GeometricInvalidity);

    // A node on an existing edge
    let err = topo.add_iso_node(None, Point2::new(5.0, 0.0)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::GeometricInvalidity);

    assert_eq!(topo.version(), version);
    let after = topo.snapshot();
    assert_eq!(after.edges(), before.edges());
    assert_eq!(after.faces(), before.faces());
    assert_eq!(after.nodes(), before.nodes());
}

#[test]
fn test_change_edge_geom_keeps_faces() {
    let catalog = Catalog::with_defaults();
    let topo = two_squares(&catalog, "reshape");
    // Bow the outer edge e-f outwards
    topo.change_edge_geom(EdgeId(6), line(&[(20.0, 0.0), (25.0, 5.0), (20.0, 10.0)]))
        .unwrap();
    assert_relative_eq!(topo.get_face_geometry(FaceId(2)).unwrap().area(), 125.0, epsilon = 1e-9);
    assert_relative_eq!(topo.get_face_geometry(FaceId(1)).unwrap().area(), 100.0, epsilon = 1e-9);
    assert!(topo.validate().is_empty());
}
