// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Topology Validator
//!
//! A read-only scan of one committed snapshot. Edits committed while the scan
//! runs are not seen and are not blocked.

use std::fmt;

use nalgebra::Point2;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use topolite_geometry::{Geometry, GeometryLibrary, Polygon, Rect, EPSILON};

use crate::face::face_polygon;
use crate::ids::{EdgeId, FaceId};
use crate::primitives::Edge;
use crate::store::{TopologyData, TopologyView};
use crate::topology::Topology;

/// What a diagnostic reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    CoincidentNodes,
    EdgeCrossesNode,
    InvalidEdge,
    EdgeNotSimple,
    EdgeCrossesEdge,
    EdgeStartNodeMismatch,
    EdgeEndNodeMismatch,
    FaceWithoutEdges,
    FaceHasNoRings,
    FaceOverlapsFace,
    FaceWithinFace,
}

impl DiagnosticKind {
    pub fn message(&self) -> &'static str {
        match self {
            DiagnosticKind::CoincidentNodes => "coincident nodes",
            DiagnosticKind::EdgeCrossesNode => "edge crosses node",
            DiagnosticKind::InvalidEdge => "invalid edge",
            DiagnosticKind::EdgeNotSimple => "edge not simple",
            DiagnosticKind::EdgeCrossesEdge => "edge crosses edge",
            DiagnosticKind::EdgeStartNodeMismatch => "edge start node geometry mis-match",
            DiagnosticKind::EdgeEndNodeMismatch => "edge end node geometry mis-match",
            DiagnosticKind::FaceWithoutEdges => "face without edges",
            DiagnosticKind::FaceHasNoRings => "face has no rings",
            DiagnosticKind::FaceOverlapsFace => "face overlaps face",
            DiagnosticKind::FaceWithinFace => "face within face",
        }
    }
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// One inconsistency found by [`Topology::validate`].
///
/// `id1`/`id2` name the primitives involved; their kind depends on `kind`
/// (node/edge for `EdgeCrossesNode`, edge/node for the mis-matches, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub id1: i64,
    pub id2: Option<i64>,
}

impl Diagnostic {
    fn new(kind: DiagnosticKind, id1: i64, id2: Option<i64>) -> Self {
        Self { kind, id1, id2 }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.id2 {
            Some(id2) => write!(f, "{} ({}, {})", self.kind, self.id1, id2),
            None => write!(f, "{} ({})", self.kind, self.id1),
        }
    }
}

struct Scan<'a> {
    data: &'a TopologyData,
    geometry: &'a dyn GeometryLibrary,
    tolerance: f64,
    out: Vec<Diagnostic>,
    /// Faces bounded by invalid edges; their rings cannot be rebuilt.
    invalid_faces: FxHashSet<FaceId>,
    invalid_edges: FxHashSet<EdgeId>,
}

impl Scan<'_> {
    fn push(&mut self, kind: DiagnosticKind, id1: i64, id2: Option<i64>) {
        self.out.push(Diagnostic::new(kind, id1, id2));
    }

    fn coincident_nodes(&mut self) {
        let mut nodes = self.data.nodes();
        nodes.sort_by(|a, b| a.point.x.total_cmp(&b.point.x).then(a.id.cmp(&b.id)));
        for (i, a) in nodes.iter().enumerate() {
            for b in &nodes[i + 1..] {
                if b.point.x - a.point.x > self.tolerance {
                    break;
                }
                if (b.point - a.point).norm() <= self.tolerance {
                    let (lo, hi) = if a.id < b.id { (a.id, b.id) } else { (b.id, a.id) };
                    self.push(DiagnosticKind::CoincidentNodes, lo.0, Some(hi.0));
                }
            }
        }
    }

    fn edge_crosses_node(&mut self) {
        let edges = self.data.edges();
        for node in self.data.nodes() {
            for edge in &edges {
                if edge.start_node == node.id || edge.end_node == node.id {
                    continue;
                }
                if !edge.geometry.bounding_rect().is_some_and(|r| r.contains_point(&node.point)) {
                    continue;
                }
                let at_end = [edge.geometry.start(), edge.geometry.end()]
                    .into_iter()
                    .flatten()
                    .any(|p| (p - node.point).norm() <= EPSILON);
                if at_end {
                    continue;
                }
                let d = self
                    .geometry
                    .distance(&Geometry::Point(node.point), &Geometry::LineString(edge.geometry.clone()));
                if d.is_ok_and(|d| d <= EPSILON) {
                    self.push(DiagnosticKind::EdgeCrossesNode, node.id.0, Some(edge.id.0));
                }
            }
        }
    }

    fn edge_validity(&mut self) {
        for edge in self.data.edges() {
            let geom = Geometry::LineString(edge.geometry.clone());
            let kind = if !self.geometry.is_valid(&geom) {
                DiagnosticKind::InvalidEdge
            } else if !self.geometry.is_simple(&geom) {
                DiagnosticKind::EdgeNotSimple
            } else {
                continue;
            };
            self.push(kind, edge.id.0, None);
            self.invalid_edges.insert(edge.id);
            self.invalid_faces.insert(edge.left_face);
            self.invalid_faces.insert(edge.right_face);
        }
    }

    fn edge_crosses_edge(&mut self) {
        let edges: Vec<Edge> = self
            .data
            .edges()
            .into_iter()
            .filter(|e| !self.invalid_edges.contains(&e.id))
            .collect();
        let bounds: Vec<Option<Rect>> = edges.iter().map(|e| e.geometry.bounding_rect()).collect();
        for i in 0..edges.len() {
            for j in i + 1..edges.len() {
                let overlap = match (&bounds[i], &bounds[j]) {
                    (Some(a), Some(b)) => a.intersects(b),
                    _ => false,
                };
                if overlap && self.edges_cross(&edges[i], &edges[j]) {
                    self.push(DiagnosticKind::EdgeCrossesEdge, edges[i].id.0, Some(edges[j].id.0));
                }
            }
        }
    }

    /// Whether two edges meet anywhere but at shared endpoints. Closed lines
    /// have no boundary, so endpoint contacts with them show up as interior
    /// intersections and are checked against the closed line's start point.
    /// Two closed lines may only touch at the start point they share.
    fn edges_cross(&self, e1: &Edge, e2: &Edge) -> bool {
        let g1 = Geometry::LineString(e1.geometry.clone());
        let g2 = Geometry::LineString(e2.geometry.clone());
        let Ok(im) = self.geometry.relate(&g1, &g2) else {
            return true;
        };
        let matches = |pattern: &str| self.geometry.relate_matches(&im, pattern).unwrap_or(false);
        if matches("FF1F**1*2") {
            return false;
        }
        let touches_only_at = |start: Option<&Point2<f64>>| {
            let Some(start) = start else { return false };
            match self.geometry.intersection(&g1, &g2) {
                Ok(Geometry::Point(p)) => (p - start).norm() <= EPSILON,
                _ => false,
            }
        };
        if matches("FF10F01F2") && touches_only_at(e2.geometry.start()) {
            return false;
        }
        if matches("F01FFF102") && touches_only_at(e1.geometry.start()) {
            return false;
        }
        let same_start = match (e1.geometry.start(), e2.geometry.start()) {
            (Some(a), Some(b)) => (a - b).norm() <= EPSILON,
            _ => false,
        };
        if matches("0F1FFF1F2") && same_start && touches_only_at(e1.geometry.start()) {
            return false;
        }
        true
    }

    fn node_mismatch(&mut self) {
        for edge in self.data.edges() {
            let checks = [
                (edge.start_node, edge.geometry.start(), DiagnosticKind::EdgeStartNodeMismatch),
                (edge.end_node, edge.geometry.end(), DiagnosticKind::EdgeEndNodeMismatch),
            ];
            for (node_id, point, kind) in checks {
                let matches = match (self.data.node(node_id), point) {
                    (Some(node), Some(p)) => (node.point - p).norm() <= EPSILON,
                    _ => false,
                };
                if !matches {
                    self.push(kind, edge.id.0, Some(node_id.0));
                }
            }
        }
    }

    /// Per-face checks; returns the rebuilt polygons of the sound faces.
    fn faces(&mut self) -> Vec<(FaceId, Polygon, Rect)> {
        let edges = self.data.edges();
        let mut polygons = Vec::new();
        for face in self.data.faces() {
            if face.id.is_universal() {
                continue;
            }
            if !edges.iter().any(|e| e.bounds_face(face.id)) {
                self.push(DiagnosticKind::FaceWithoutEdges, face.id.0, None);
                continue;
            }
            if self.invalid_faces.contains(&face.id) {
                continue;
            }
            match face_polygon(self.data, self.geometry, face.id) {
                Ok(polygon) if !polygon.is_empty() => {
                    if let Some(bounds) = polygon.bounding_rect() {
                        polygons.push((face.id, polygon, bounds));
                    }
                }
                _ => self.push(DiagnosticKind::FaceHasNoRings, face.id.0, None),
            }
        }
        polygons
    }

    fn face_pairs(&mut self, polygons: &[(FaceId, Polygon, Rect)]) {
        let geometry = self.geometry;
        for (i, (f1, p1, b1)) in polygons.iter().enumerate() {
            for (f2, p2, b2) in &polygons[i + 1..] {
                if !b1.intersects(b2) {
                    continue;
                }
                let Ok(im) = geometry.relate(&Geometry::Polygon(p1.clone()), &Geometry::Polygon(p2.clone()))
                else {
                    continue;
                };
                let matches = |pattern: &str| geometry.relate_matches(&im, pattern).unwrap_or(false);
                if matches("T*T***T**") {
                    self.push(DiagnosticKind::FaceOverlapsFace, f1.0, Some(f2.0));
                } else if matches("T*F**F***") {
                    self.push(DiagnosticKind::FaceWithinFace, f1.0, Some(f2.0));
                } else if matches("T*****FF*") {
                    self.push(DiagnosticKind::FaceWithinFace, f2.0, Some(f1.0));
                }
            }
        }
    }
}

/// Runs every check on `data`. `precision` is the coincident-node tolerance
/// (0 means exact within [`EPSILON`]).
pub(crate) fn validate_data(data: &TopologyData, geometry: &dyn GeometryLibrary, precision: f64) -> Vec<Diagnostic> {
    let mut scan = Scan {
        data,
        geometry,
        tolerance: if precision > 0.0 { precision } else { EPSILON },
        out: Vec::new(),
        invalid_faces: FxHashSet::default(),
        invalid_edges: FxHashSet::default(),
    };
    scan.coincident_nodes();
    scan.edge_crosses_node();
    scan.edge_validity();
    scan.edge_crosses_edge();
    scan.node_mismatch();
    let polygons = scan.faces();
    scan.face_pairs(&polygons);
    scan.out
}

impl Topology {
    /// Checks the last committed state and returns every inconsistency found.
    /// A consistent topology gives an empty list.
    pub fn validate(&self) -> Vec<Diagnostic> {
        let data = self.snapshot();
        let out = validate_data(&data, self.geometry(), self.precision());
        tracing::debug!(topology = %self.name(), diagnostics = out.len(), "topology validated");
        out
    }
}
