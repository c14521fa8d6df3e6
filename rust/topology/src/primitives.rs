// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Row types of a topology: primitives, layers, relations and TopoGeometries.

use nalgebra::Point2;
use serde::{Deserialize, Serialize};
use topolite_geometry::{LineString, Rect};

use crate::ids::{
    DirectedEdge, EdgeId, FaceId, FeatureType, LayerId, NodeId, PrimitiveType, TopoGeomId,
    TopologyId,
};

/// Topology-level metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopologyInfo {
    pub id: TopologyId,
    pub name: String,
    pub srid: i32,
    /// Distance tolerance; `0` means exact.
    pub precision: f64,
    /// Recorded only; all computation is planar 2D.
    pub has_z: bool,
}

/// A point primitive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub point: Point2<f64>,
    /// Set only while the node has no incident edges.
    pub containing_face: Option<FaceId>,
}

/// A line primitive with its half-edge linkage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub id: EdgeId,
    pub start_node: NodeId,
    pub end_node: NodeId,
    /// Next half-edge on the ring that has `left_face` on its left.
    pub next_left_edge: DirectedEdge,
    /// Next half-edge on the ring that has `right_face` on its left.
    pub next_right_edge: DirectedEdge,
    pub left_face: FaceId,
    pub right_face: FaceId,
    pub geometry: LineString,
}

impl Edge {
    pub fn is_closed(&self) -> bool {
        self.start_node == self.end_node
    }

    /// Node the half-edge `dir` leaves from.
    pub fn origin(&self, forward: bool) -> NodeId {
        if forward {
            self.start_node
        } else {
            self.end_node
        }
    }

    /// Node the half-edge `dir` arrives at.
    pub fn destination(&self, forward: bool) -> NodeId {
        self.origin(!forward)
    }

    /// Next pointer of a half-edge of this edge.
    pub fn next(&self, forward: bool) -> DirectedEdge {
        if forward {
            self.next_left_edge
        } else {
            self.next_right_edge
        }
    }

    pub fn set_next(&mut self, forward: bool, next: DirectedEdge) {
        if forward {
            self.next_left_edge = next;
        } else {
            self.next_right_edge = next;
        }
    }

    /// Face on the left of a half-edge of this edge.
    pub fn face_left_of(&self, forward: bool) -> FaceId {
        if forward {
            self.left_face
        } else {
            self.right_face
        }
    }

    pub fn set_face_left_of(&mut self, forward: bool, face: FaceId) {
        if forward {
            self.left_face = face;
        } else {
            self.right_face = face;
        }
    }

    /// Geometry points in the direction of the half-edge.
    pub fn directed_points(&self, forward: bool) -> Vec<Point2<f64>> {
        if forward {
            self.geometry.points.clone()
        } else {
            self.geometry.points.iter().rev().copied().collect()
        }
    }

    /// Whether the edge touches `face` on either side.
    pub fn bounds_face(&self, face: FaceId) -> bool {
        self.left_face == face || self.right_face == face
    }
}

/// An area primitive. The universal face has no bounding rectangle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Face {
    pub id: FaceId,
    pub mbr: Option<Rect>,
}

/// A feature column bound to a topology.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Layer {
    pub topology_id: TopologyId,
    pub layer_id: LayerId,
    pub schema_name: String,
    pub table_name: String,
    pub feature_column: String,
    pub feature_type: FeatureType,
    /// `0` for primitive-based layers, `child.level + 1` otherwise.
    pub level: u32,
    pub child_id: Option<LayerId>,
}

impl Layer {
    /// `schema.table.column`
    pub fn qualified_name(&self) -> String {
        format!(
            "{}.{}.{}",
            self.schema_name, self.table_name, self.feature_column
        )
    }
}

/// One element row of a TopoGeometry.
///
/// For level-0 layers `element_type` is a [`PrimitiveType`] code and
/// `element_id` the primitive id (signed for edges). For hierarchical layers
/// `element_type` is the child layer id and `element_id` a TopoGeometry id in
/// that layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Relation {
    pub layer_id: LayerId,
    pub topogeo_id: TopoGeomId,
    pub element_type: i64,
    pub element_id: i64,
}

impl Relation {
    pub fn primitive(&self) -> Option<PrimitiveType> {
        PrimitiveType::from_code(self.element_type)
    }

    /// Whether this row references the given edge in either direction.
    pub fn references_edge(&self, edge: EdgeId) -> bool {
        self.element_type == PrimitiveType::Edge.code() && self.element_id.abs() == edge.0
    }

    pub fn references_face(&self, face: FaceId) -> bool {
        self.element_type == PrimitiveType::Face.code() && self.element_id == face.0
    }

    pub fn references_node(&self, node: NodeId) -> bool {
        self.element_type == PrimitiveType::Node.code() && self.element_id == node.0
    }
}

/// An `(element id, element type)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TopoElement {
    pub id: i64,
    pub kind: i64,
}

impl TopoElement {
    pub fn new(id: i64, kind: i64) -> Self {
        Self { id, kind }
    }

    pub fn node(id: NodeId) -> Self {
        Self::new(id.0, PrimitiveType::Node.code())
    }

    pub fn edge(dir: DirectedEdge) -> Self {
        Self::new(dir.0, PrimitiveType::Edge.code())
    }

    pub fn face(id: FaceId) -> Self {
        Self::new(id.0, PrimitiveType::Face.code())
    }

    /// Element of a hierarchical TopoGeometry.
    pub fn child(child_layer: LayerId, id: TopoGeomId) -> Self {
        Self::new(id.0, child_layer.0)
    }

    /// `(0, 0)` is accepted and ignored by `create_topo_geom`.
    pub fn is_placeholder(&self) -> bool {
        self.kind == 0
    }
}

/// A feature value: a handle to the relation rows of `(layer_id, id)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TopoGeometry {
    pub topology_id: TopologyId,
    pub layer_id: LayerId,
    pub id: TopoGeomId,
    pub kind: FeatureType,
}
