// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Point lookups and a topology summary.

use std::collections::BTreeSet;
use std::fmt;

use nalgebra::Point2;
use serde::{Deserialize, Serialize};
use topolite_geometry::{Geometry, EPSILON};

use crate::error::{Error, Result};
use crate::ids::{EdgeId, FeatureType, LayerId, NodeId, TopoGeomId};
use crate::store::TopologyView;
use crate::topology::Topology;

/// Per-layer line of a [`TopologySummary`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerSummary {
    pub layer_id: LayerId,
    pub column: String,
    pub feature_type: FeatureType,
    pub level: u32,
    pub child_id: Option<LayerId>,
    pub topogeometries: usize,
}

/// Counts of the rows of one topology.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopologySummary {
    pub name: String,
    pub srid: i32,
    pub precision: f64,
    pub nodes: usize,
    pub isolated_nodes: usize,
    pub edges: usize,
    /// Bounded faces; the universal face is not counted.
    pub faces: usize,
    pub relations: usize,
    pub layers: Vec<LayerSummary>,
}

impl fmt::Display for TopologySummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Topology {} (srid {}, precision {})",
            self.name, self.srid, self.precision
        )?;
        writeln!(f, "{} nodes, {} isolated", self.nodes, self.isolated_nodes)?;
        writeln!(f, "{} edges, {} faces", self.edges, self.faces)?;
        writeln!(f, "{} relations", self.relations)?;
        for layer in &self.layers {
            write!(
                f,
                "Layer {}, type {} ({}), {} topogeoms",
                layer.layer_id,
                layer.feature_type,
                layer.feature_type.code(),
                layer.topogeometries
            )?;
            if let Some(child) = layer.child_id {
                write!(f, ", hierarchy level {}, child layer {}", layer.level, child)?;
            }
            writeln!(f)?;
            writeln!(f, " Column: {}", layer.column)?;
        }
        Ok(())
    }
}

fn tolerance(tol: f64) -> Result<f64> {
    if !tol.is_finite() || tol < 0.0 {
        return Err(Error::malformed(format!("tolerance must be a non-negative number, got {tol}")));
    }
    Ok(tol.max(EPSILON))
}

impl Topology {
    /// The node within `tol` of `point`, if any.
    ///
    /// More than one candidate is an error; use a smaller tolerance.
    pub fn get_node_by_point(&self, point: Point2<f64>, tol: f64) -> Result<Option<NodeId>> {
        let tol = tolerance(tol)?;
        let hits: Vec<NodeId> = self
            .snapshot()
            .nodes()
            .into_iter()
            .filter(|n| (n.point - point).norm() <= tol)
            .map(|n| n.id)
            .collect();
        match hits.as_slice() {
            [] => Ok(None),
            [one] => Ok(Some(*one)),
            many => Err(Error::malformed(format!(
                "two or more nodes found within {tol} of {point}: {many:?}"
            ))),
        }
    }

    /// The edge within `tol` of `point`, if any.
    pub fn get_edge_by_point(&self, point: Point2<f64>, tol: f64) -> Result<Option<EdgeId>> {
        let tol = tolerance(tol)?;
        let probe = Geometry::Point(point);
        let mut hits = Vec::new();
        for edge in self.snapshot().edges() {
            let near = edge.geometry.bounding_rect().is_some_and(|r| {
                point.x >= r.min.x - tol
                    && point.x <= r.max.x + tol
                    && point.y >= r.min.y - tol
                    && point.y <= r.max.y + tol
            });
            if near && self.geometry().distance(&probe, &Geometry::LineString(edge.geometry))? <= tol {
                hits.push(edge.id);
            }
        }
        match hits.as_slice() {
            [] => Ok(None),
            [one] => Ok(Some(*one)),
            many => Err(Error::malformed(format!(
                "two or more edges found within {tol} of {point}: {many:?}"
            ))),
        }
    }

    pub fn summary(&self) -> TopologySummary {
        let data = self.snapshot();
        let nodes = data.nodes();
        let relations = data.relations();
        let layers = data
            .layers()
            .into_iter()
            .map(|layer| {
                let ids: BTreeSet<TopoGeomId> = relations
                    .iter()
                    .filter(|r| r.layer_id == layer.layer_id)
                    .map(|r| r.topogeo_id)
                    .collect();
                LayerSummary {
                    layer_id: layer.layer_id,
                    column: layer.qualified_name(),
                    feature_type: layer.feature_type,
                    level: layer.level,
                    child_id: layer.child_id,
                    topogeometries: ids.len(),
                }
            })
            .collect();
        TopologySummary {
            name: self.name().to_string(),
            srid: self.srid(),
            precision: self.precision(),
            nodes: nodes.len(),
            isolated_nodes: nodes.iter().filter(|n| n.containing_face.is_some()).count(),
            edges: data.edges().len(),
            faces: data.faces().iter().filter(|f| !f.id.is_universal()).count(),
            relations: relations.len(),
            layers,
        }
    }
}
