// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Geometry Realizer: turns a TopoGeometry into a concrete geometry.

use std::collections::BTreeSet;

use topolite_geometry::{Geometry, GeometryLibrary, GeometryType, LineString};

use crate::error::{Error, Result};
use crate::face::face_polygon;
use crate::ids::{EdgeId, EntityRef, FaceId, FeatureType, NodeId, PrimitiveType, TopoGeomId};
use crate::primitives::{Layer, Relation, TopoGeometry};
use crate::store::{TopologyData, TopologyView};
use crate::topology::Topology;

/// Canonical empty result for a feature type.
fn empty_of(kind: FeatureType) -> Geometry {
    Geometry::empty(match kind {
        FeatureType::Point => GeometryType::MultiPoint,
        FeatureType::Line => GeometryType::MultiLineString,
        FeatureType::Polygon => GeometryType::MultiPolygon,
        FeatureType::Collection => GeometryType::GeometryCollection,
    })
}

struct Realizer<'a> {
    data: &'a TopologyData,
    geometry: &'a dyn GeometryLibrary,
    max_depth: usize,
}

impl Realizer<'_> {
    fn realize(&self, layer: &Layer, tg: TopoGeomId, kind: FeatureType, depth: usize) -> Result<Geometry> {
        if depth > self.max_depth {
            return Err(Error::malformed(format!(
                "layer hierarchy deeper than {} at layer {}",
                self.max_depth, layer.layer_id
            )));
        }
        let rows = self.data.relations_of(layer.layer_id, tg);

        let parts = match layer.child_id {
            Some(child) => {
                let child_layer = self.data.require_layer(child)?;
                let mut parts = Vec::with_capacity(rows.len());
                for rel in &rows {
                    let part = self.realize(
                        &child_layer,
                        TopoGeomId(rel.element_id),
                        child_layer.feature_type,
                        depth + 1,
                    )?;
                    if !part.is_empty() {
                        parts.push(part);
                    }
                }
                parts
            }
            None => self.primitive_parts(&rows, kind)?,
        };

        if parts.is_empty() {
            return Ok(empty_of(kind));
        }
        let out = self.geometry.union(&parts)?;
        Ok(if out.is_empty() { empty_of(kind) } else { out })
    }

    /// Geometries of the level-0 rows that matter for `kind`.
    fn primitive_parts(&self, rows: &[Relation], kind: FeatureType) -> Result<Vec<Geometry>> {
        let wants = |p: PrimitiveType| kind == FeatureType::Collection || p.feature_type() == kind;
        let mut parts = Vec::new();

        let mut edges = BTreeSet::new();
        for rel in rows {
            match rel.primitive() {
                Some(PrimitiveType::Node) if wants(PrimitiveType::Node) => {
                    let node = self.data.require_node(NodeId(rel.element_id))?;
                    parts.push(Geometry::Point(node.point));
                }
                Some(PrimitiveType::Edge) if wants(PrimitiveType::Edge) => {
                    edges.insert(EdgeId(rel.element_id.abs()));
                }
                Some(PrimitiveType::Face) if wants(PrimitiveType::Face) => {
                    let polygon = face_polygon(self.data, self.geometry, FaceId(rel.element_id))?;
                    if !polygon.is_empty() {
                        parts.push(Geometry::Polygon(polygon));
                    }
                }
                _ => {}
            }
        }

        if !edges.is_empty() {
            let lines: Vec<LineString> = edges
                .into_iter()
                .map(|id| self.data.require_edge(id).map(|e| e.geometry))
                .collect::<Result<_>>()?;
            parts.push(self.geometry.line_merge(&lines));
        }
        Ok(parts)
    }
}

impl Topology {
    /// Concrete geometry of a TopoGeometry.
    ///
    /// Faces are unioned into polygons, edges line-merged, nodes collected;
    /// hierarchical TopoGeometries are the union of their children. An empty
    /// TopoGeometry gives the empty geometry of its type.
    pub fn realize(&self, tg: &TopoGeometry) -> Result<Geometry> {
        if tg.topology_id != self.id() {
            return Err(Error::NotFound(EntityRef::TopoGeometry(tg.layer_id, tg.id)));
        }
        let data = self.snapshot();
        let layer = data.require_layer(tg.layer_id)?;
        let realizer = Realizer {
            data: data.as_ref(),
            geometry: self.geometry(),
            max_depth: self.config().max_hierarchy_depth,
        };
        realizer.realize(&layer, tg.id, tg.kind, 0)
    }
}

#[cfg(test)]
mod tests {
    use crate::catalog::Catalog;
    use crate::error::ErrorKind;
    use crate::ids::{FeatureType, LayerId, TopoGeomId, TopologyId};
    use crate::primitives::{TopoElement, TopoGeometry};
    use nalgebra::Point2;
    use topolite_geometry::{Geometry, LineString};

    #[test]
    fn test_empty_topo_geometries() {
        let catalog = Catalog::with_defaults();
        catalog.create_topology("empty", 0, 0.0, false).unwrap();
        let topo = catalog.topology("empty").unwrap();
        let expected = [
            (FeatureType::Point, Geometry::MultiPoint(vec![])),
            (FeatureType::Line, Geometry::MultiLineString(vec![])),
            (FeatureType::Polygon, Geometry::MultiPolygon(vec![])),
            (FeatureType::Collection, Geometry::GeometryCollection(vec![])),
        ];
        for (i, (kind, empty)) in expected.into_iter().enumerate() {
            let layer = topo
                .add_layer("s", &format!("t{i}"), "c", kind, None)
                .unwrap();
            let tg = topo.create_topo_geom(kind.code(), layer.layer_id, &[]).unwrap();
            assert_eq!(topo.realize(&tg).unwrap(), empty);
        }
    }

    #[test]
    fn test_lines_merge_through_shared_node() {
        let catalog = Catalog::with_defaults();
        catalog.create_topology("roads", 0, 0.0, false).unwrap();
        let topo = catalog.topology("roads").unwrap();
        let a = topo.add_iso_node(None, Point2::new(0.0, 0.0)).unwrap();
        let b = topo.add_iso_node(None, Point2::new(10.0, 0.0)).unwrap();
        let e = topo
            .add_iso_edge(a, b, LineString::from_coords(&[(0.0, 0.0), (10.0, 0.0)]))
            .unwrap();
        topo.mod_edge_split(e, Point2::new(4.0, 0.0)).unwrap();

        let layer = topo.add_layer("public", "roads", "geom", FeatureType::Line, None).unwrap();
        let tg = topo
            .create_topo_geom(2, layer.layer_id, &[TopoElement::new(1, 2), TopoElement::new(-2, 2)])
            .unwrap();
        let geom = topo.realize(&tg).unwrap();
        let Geometry::LineString(line) = &geom else {
            panic!("expected a single line, got {geom}");
        };
        assert_eq!(line.len(), 3);
    }

    #[test]
    fn test_foreign_topo_geometry() {
        let catalog = Catalog::with_defaults();
        catalog.create_topology("here", 0, 0.0, false).unwrap();
        let topo = catalog.topology("here").unwrap();
        let foreign = TopoGeometry {
            topology_id: TopologyId(99),
            layer_id: LayerId(1),
            id: TopoGeomId(1),
            kind: FeatureType::Point,
        };
        assert_eq!(topo.realize(&foreign).unwrap_err().kind(), ErrorKind::NotFound);
    }
}
