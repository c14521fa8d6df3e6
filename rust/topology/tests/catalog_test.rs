// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Layers, TopoGeometries, realization and concurrent editors.

use std::sync::Arc;

use approx::assert_relative_eq;
use nalgebra::Point2;
use topolite_geometry::{Geometry, GeometryLibrary, LineString, PlanarGeometry};
use topolite_topology::{
    Catalog, ColumnRef, DirectedEdge, EdgeId, ErrorKind, FaceId, LayerId, TopoElement, TopoGeomId,
    Topology, TopologyView,
};

fn line(coords: &[(f64, f64)]) -> LineString {
    LineString::from_coords(coords)
}

/// Two adjacent squares, faces 1 and 2.
fn parcels(catalog: &Catalog) -> Arc<Topology> {
    catalog.create_topology("parcels", 3857, 0.0, false).unwrap();
    let topo = catalog.topology("parcels").unwrap();
    let pts = [(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0), (20.0, 0.0), (20.0, 10.0)];
    let n: Vec<_> = pts
        .iter()
        .map(|&(x, y)| topo.add_iso_node(None, Point2::new(x, y)).unwrap())
        .collect();
    topo.add_iso_edge(n[0], n[1], line(&[pts[0], pts[1]])).unwrap();
    for (s, e) in [(1, 2), (2, 3), (3, 0), (1, 4), (4, 5), (5, 2)] {
        topo.add_edge_mod_face(n[s], n[e], line(&[pts[s], pts[e]]), None).unwrap();
    }
    topo
}

#[test]
fn test_city_road() {
    let catalog = Catalog::with_defaults();
    catalog.create_topology("city", 4326, 0.0, false).unwrap();
    let topo = catalog.topology("city").unwrap();
    let a = topo.add_iso_node(None, Point2::new(0.0, 0.0)).unwrap();
    let b = topo.add_iso_node(None, Point2::new(10.0, 0.0)).unwrap();
    let road = topo.add_iso_edge(a, b, line(&[(0.0, 0.0), (10.0, 0.0)])).unwrap();

    let layer = catalog
        .add_topo_geometry_column("city", "public", "roads", "geom", "LINE", None)
        .unwrap();
    let tg = catalog
        .create_topo_geom("city", 2, layer, &[TopoElement::new(road.0, 2)])
        .unwrap();
    assert_eq!(tg.id, TopoGeomId(1));

    let geom = catalog.geometry(&tg).unwrap();
    assert_eq!(geom, Geometry::LineString(line(&[(0.0, 0.0), (10.0, 0.0)])));
    assert!(catalog.validate_topology("city").unwrap().is_empty());

    let column = ColumnRef::new("public", "roads", "geom");
    catalog.set_feature(&column, 7, Some(tg)).unwrap();
    assert_eq!(catalog.feature(&column, 7).unwrap(), Some(tg));
}

#[test]
fn test_layer_rejects_wrong_feature_type() {
    let catalog = Catalog::with_defaults();
    parcels(&catalog);
    let layer = catalog
        .add_topo_geometry_column("parcels", "public", "lots", "topo", "POLYGON", None)
        .unwrap();
    let err = catalog
        .create_topo_geom("parcels", 1, layer, &[TopoElement::new(1, 1)])
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TypeMismatch);

    // An edge in a polygon TopoGeometry is refused as well
    let err = catalog
        .create_topo_geom("parcels", 3, layer, &[TopoElement::new(1, 2)])
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TypeMismatch);
}

#[test]
fn test_failed_create_writes_no_rows() {
    let catalog = Catalog::with_defaults();
    let topo = parcels(&catalog);
    let layer = catalog
        .add_topo_geometry_column("parcels", "public", "poi", "topo", "POINT", None)
        .unwrap();
    let err = catalog
        .create_topo_geom("parcels", 1, layer, &[TopoElement::new(1, 1), TopoElement::new(99, 1)])
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(topo.snapshot().relations().is_empty());
    assert!(!topo.topo_geometry_exists(layer, TopoGeomId(1)));
}

#[test]
fn test_hierarchical_geometry_is_union_of_children() {
    let catalog = Catalog::with_defaults();
    parcels(&catalog);
    let lots = catalog
        .add_topo_geometry_column("parcels", "public", "lots", "topo", "POLYGON", None)
        .unwrap();
    let blocks = catalog
        .add_topo_geometry_column("parcels", "public", "blocks", "topo", "POLYGON", Some(lots))
        .unwrap();

    let left = catalog
        .create_topo_geom("parcels", 3, lots, &[TopoElement::face(FaceId(1))])
        .unwrap();
    let right = catalog
        .create_topo_geom("parcels", 3, lots, &[TopoElement::face(FaceId(2))])
        .unwrap();
    let block = catalog
        .create_topo_geom(
            "parcels",
            3,
            blocks,
            &[TopoElement::child(lots, left.id), TopoElement::child(lots, right.id)],
        )
        .unwrap();

    let parts = [catalog.geometry(&left).unwrap(), catalog.geometry(&right).unwrap()];
    let expected = PlanarGeometry::new().union(&parts).unwrap();
    let geom = catalog.geometry(&block).unwrap();
    assert_eq!(geom, expected);
    assert_relative_eq!(geom.area(), 200.0, epsilon = 1e-9);

    let mut elements = catalog.get_topo_geom_elements("parcels", blocks, block.id).unwrap();
    elements.sort();
    assert_eq!(elements, vec![TopoElement::face(FaceId(1)), TopoElement::face(FaceId(2))]);

    // The child layer cannot go while the parent uses it
    let err = catalog
        .drop_topo_geometry_column(&ColumnRef::new("public", "lots", "topo"))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ReferentialConflict);
    catalog
        .drop_topo_geometry_column(&ColumnRef::new("public", "blocks", "topo"))
        .unwrap();
    catalog
        .drop_topo_geometry_column(&ColumnRef::new("public", "lots", "topo"))
        .unwrap();
}

#[test]
fn test_face_split_carries_topo_geometry() {
    let catalog = Catalog::with_defaults();
    let topo = parcels(&catalog);
    let lots = catalog
        .add_topo_geometry_column("parcels", "public", "lots", "topo", "POLYGON", None)
        .unwrap();
    let lot = catalog
        .create_topo_geom("parcels", 3, lots, &[TopoElement::face(FaceId(1))])
        .unwrap();

    let a = topo.get_node_by_point(Point2::new(0.0, 0.0), 0.0).unwrap().unwrap();
    let c = topo.get_node_by_point(Point2::new(10.0, 10.0), 0.0).unwrap().unwrap();
    topo.add_edge_new_faces(a, c, line(&[(0.0, 0.0), (10.0, 10.0)]), None)
        .unwrap();

    // Face 1 is gone and both halves belong to the lot
    assert!(topo.snapshot().face(FaceId(1)).is_none());
    let elements = topo.get_topo_geom_elements(lots, lot.id).unwrap();
    assert_eq!(elements.len(), 2);
    assert_relative_eq!(catalog.geometry(&lot).unwrap().area(), 100.0, epsilon = 1e-6);

    // The lot owns both halves, so removing the diagonal merges them back
    let merged = topo.rem_edge_new_face(EdgeId(8)).unwrap();
    assert!(merged.is_some());
    assert_relative_eq!(catalog.geometry(&lot).unwrap().area(), 100.0, epsilon = 1e-6);
}

#[test]
fn test_lineal_feature_survives_split() {
    let catalog = Catalog::with_defaults();
    let topo = parcels(&catalog);
    let streets = catalog
        .add_topo_geometry_column("parcels", "public", "streets", "topo", "LINE", None)
        .unwrap();
    let street = catalog
        .create_topo_geom(
            "parcels",
            2,
            streets,
            &[
                TopoElement::edge(DirectedEdge::forward(EdgeId(1))),
                TopoElement::edge(DirectedEdge::forward(EdgeId(5))),
            ],
        )
        .unwrap();
    topo.mod_edge_split(EdgeId(5), Point2::new(15.0, 0.0)).unwrap();

    let geom = catalog.geometry(&street).unwrap();
    assert_relative_eq!(geom.length(), 20.0, epsilon = 1e-9);
    assert_eq!(topo.get_topo_geom_elements(streets, street.id).unwrap().len(), 3);
    assert!(topo.validate().is_empty());
}

#[test]
fn test_drop_topology_frees_columns() {
    let catalog = Catalog::with_defaults();
    parcels(&catalog);
    catalog
        .add_topo_geometry_column("parcels", "public", "lots", "topo", "POLYGON", None)
        .unwrap();
    catalog.drop_topology("parcels").unwrap();
    assert_eq!(catalog.topology("parcels").unwrap_err().kind(), ErrorKind::NotFound);
    assert!(catalog.topologies().is_empty());

    // Same names can be reused afterwards
    catalog.create_topology("parcels", 3857, 0.0, false).unwrap();
    let layer = catalog
        .add_topo_geometry_column("parcels", "public", "lots", "topo", "POLYGON", None)
        .unwrap();
    assert_eq!(layer, LayerId(1));
}

#[test]
fn test_dropping_column_takes_its_values() {
    let catalog = Catalog::with_defaults();
    let topo = parcels(&catalog);
    let lots = catalog
        .add_topo_geometry_column("parcels", "public", "lots", "topo", "POLYGON", None)
        .unwrap();
    let column = ColumnRef::new("public", "lots", "topo");
    let lot = catalog
        .create_topo_geom("parcels", 3, lots, &[TopoElement::face(FaceId(1))])
        .unwrap();
    catalog.set_feature(&column, 1, Some(lot)).unwrap();

    let dropped = catalog.drop_topo_geometry_column(&column).unwrap();
    assert_eq!(dropped.layer_id, lots);
    assert_eq!(catalog.feature(&column, 1).unwrap_err().kind(), ErrorKind::NotFound);
    assert!(topo.layers().is_empty());
    assert!(topo.snapshot().relations().is_empty());

    // A fresh column under the same name starts without values
    catalog
        .add_topo_geometry_column("parcels", "public", "lots", "topo", "POLYGON", None)
        .unwrap();
    assert!(catalog.features(&column).unwrap().is_empty());
}

#[test]
fn test_drop_topology_takes_every_column() {
    let catalog = Catalog::with_defaults();
    let topo = parcels(&catalog);
    let lots = catalog
        .add_topo_geometry_column("parcels", "public", "lots", "topo", "POLYGON", None)
        .unwrap();
    catalog
        .add_topo_geometry_column("parcels", "public", "blocks", "topo", "POLYGON", Some(lots))
        .unwrap();
    let column = ColumnRef::new("public", "lots", "topo");
    let lot = catalog
        .create_topo_geom("parcels", 3, lots, &[TopoElement::face(FaceId(2))])
        .unwrap();
    catalog.set_feature(&column, 1, Some(lot)).unwrap();

    catalog.drop_topology("parcels").unwrap();
    assert!(topo.layers().is_empty());
    for table in ["lots", "blocks"] {
        let err = catalog.features(&ColumnRef::new("public", table, "topo")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}

#[test]
fn test_concurrent_editors_all_land() {
    let catalog = Catalog::with_defaults();
    catalog.create_topology("busy", 0, 0.0, false).unwrap();
    let topo = catalog.topology("busy").unwrap();

    std::thread::scope(|scope| {
        for worker in 0..4_i32 {
            let topo = Arc::clone(&topo);
            scope.spawn(move || {
                for i in 0..10_i32 {
                    let point = Point2::new(f64::from(worker) * 100.0, f64::from(i) * 10.0);
                    loop {
                        match topo.add_iso_node(None, point) {
                            Ok(_) => break,
                            Err(err) if err.is_retryable() => continue,
                            Err(err) => panic!("unexpected error: {err}"),
                        }
                    }
                }
            });
        }
    });

    let nodes = topo.snapshot().nodes();
    assert_eq!(nodes.len(), 40);
    assert!(nodes.iter().all(|n| n.containing_face == Some(FaceId::UNIVERSAL)));
    let mut ids: Vec<i64> = nodes.iter().map(|n| n.id.0).collect();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), 40);
}
