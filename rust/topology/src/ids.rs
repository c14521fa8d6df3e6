// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Identifier and type-code newtypes.
//!
//! All ids are integers issued by monotonically increasing sequences, so a
//! numerically lower id is always the older entity.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        pub struct $name(pub i64);

        impl $name {
            pub fn get(self) -> i64 {
                self.0
            }
        }

        impl From<i64> for $name {
            fn from(v: i64) -> Self {
                Self(v)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_type!(
    /// Id of a topology in the catalog.
    TopologyId
);
id_type!(
    /// Id of a node (point primitive).
    NodeId
);
id_type!(
    /// Id of an edge (line primitive).
    EdgeId
);
id_type!(
    /// Id of a face (area primitive). `0` is the universal face.
    FaceId
);
id_type!(
    /// Id of a layer, unique within its topology.
    LayerId
);
id_type!(
    /// Id of a TopoGeometry, unique within its layer.
    TopoGeomId
);

impl FaceId {
    /// The unbounded face outside all edges.
    pub const UNIVERSAL: FaceId = FaceId(0);

    pub fn is_universal(self) -> bool {
        self.0 == 0
    }
}

/// A signed edge reference: positive walks the edge in its stored direction,
/// negative walks it reversed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DirectedEdge(pub i64);

impl DirectedEdge {
    pub fn forward(edge: EdgeId) -> Self {
        DirectedEdge(edge.0)
    }

    pub fn backward(edge: EdgeId) -> Self {
        DirectedEdge(-edge.0)
    }

    pub fn new(edge: EdgeId, forward: bool) -> Self {
        if forward {
            Self::forward(edge)
        } else {
            Self::backward(edge)
        }
    }

    pub fn edge(self) -> EdgeId {
        EdgeId(self.0.abs())
    }

    pub fn is_forward(self) -> bool {
        self.0 > 0
    }

    pub fn reversed(self) -> Self {
        DirectedEdge(-self.0)
    }
}

impl fmt::Display for DirectedEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Reference to any addressable entity, used in error messages.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EntityRef {
    Topology(String),
    Node(NodeId),
    Edge(EdgeId),
    Face(FaceId),
    Layer(LayerId),
    TopoGeometry(LayerId, TopoGeomId),
    FeatureColumn(String),
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityRef::Topology(name) => write!(f, "topology {name:?}"),
            EntityRef::Node(id) => write!(f, "node {id}"),
            EntityRef::Edge(id) => write!(f, "edge {id}"),
            EntityRef::Face(id) => write!(f, "face {id}"),
            EntityRef::Layer(id) => write!(f, "layer {id}"),
            EntityRef::TopoGeometry(layer, id) => write!(f, "topogeometry {id} in layer {layer}"),
            EntityRef::FeatureColumn(name) => write!(f, "feature column {name}"),
        }
    }
}

/// Kind of features a layer accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FeatureType {
    Point = 1,
    Line = 2,
    Polygon = 3,
    Collection = 4,
}

impl FeatureType {
    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn from_code(code: i32) -> Result<Self> {
        match code {
            1 => Ok(FeatureType::Point),
            2 => Ok(FeatureType::Line),
            3 => Ok(FeatureType::Polygon),
            4 => Ok(FeatureType::Collection),
            other => Err(Error::malformed(format!(
                "invalid TopoGeometry type {other} (must be 1:[multi]point, 2:[multi]line, \
                 3:[multi]poly or 4:collection)"
            ))),
        }
    }

    /// Parses a layer type name.
    ///
    /// Matching is a case-insensitive substring test, so geometry type names
    /// such as `MULTIPOLYGON` or `LINESTRING` resolve too; the OGC names
    /// `PUNTAL`, `LINEAL`, `AREAL` and `GEOMETRY` are accepted as synonyms.
    pub fn from_name(name: &str) -> Result<Self> {
        let upper = name.to_ascii_uppercase();
        if upper.contains("POINT") || upper == "PUNTAL" {
            Ok(FeatureType::Point)
        } else if upper.contains("LINE") || upper == "LINEAL" {
            Ok(FeatureType::Line)
        } else if upper.contains("POLYGON") || upper == "AREAL" {
            Ok(FeatureType::Polygon)
        } else if upper.contains("COLLECTION") || upper == "GEOMETRY" {
            Ok(FeatureType::Collection)
        } else {
            Err(Error::malformed(format!(
                "layer type must be one of POINT,LINE,POLYGON,COLLECTION, got {name:?}"
            )))
        }
    }

    /// Whether a layer of this type accepts features of `other`.
    pub fn accepts(self, other: FeatureType) -> bool {
        self == FeatureType::Collection || self == other
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FeatureType::Point => "POINT",
            FeatureType::Line => "LINE",
            FeatureType::Polygon => "POLYGON",
            FeatureType::Collection => "COLLECTION",
        }
    }
}

impl fmt::Display for FeatureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Type code of a level-0 relation element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PrimitiveType {
    Node = 1,
    Edge = 2,
    Face = 3,
}

impl PrimitiveType {
    pub fn code(self) -> i64 {
        self as i64
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(PrimitiveType::Node),
            2 => Some(PrimitiveType::Edge),
            3 => Some(PrimitiveType::Face),
            _ => None,
        }
    }

    /// The feature type a primitive of this kind realises as.
    pub fn feature_type(self) -> FeatureType {
        match self {
            PrimitiveType::Node => FeatureType::Point,
            PrimitiveType::Edge => FeatureType::Line,
            PrimitiveType::Face => FeatureType::Polygon,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feature_type_names() {
        assert_eq!(FeatureType::from_name("POINT").unwrap(), FeatureType::Point);
        assert_eq!(FeatureType::from_name("multipoint").unwrap(), FeatureType::Point);
        assert_eq!(FeatureType::from_name("LineString").unwrap(), FeatureType::Line);
        assert_eq!(FeatureType::from_name("MULTIPOLYGON").unwrap(), FeatureType::Polygon);
        assert_eq!(FeatureType::from_name("GEOMETRYCOLLECTION").unwrap(), FeatureType::Collection);
        assert_eq!(FeatureType::from_name("areal").unwrap(), FeatureType::Polygon);
        assert_eq!(FeatureType::from_name("GEOMETRY").unwrap(), FeatureType::Collection);
        assert!(FeatureType::from_name("SURFACE").is_err());
    }

    #[test]
    fn test_feature_type_codes() {
        assert_eq!(FeatureType::from_code(3).unwrap(), FeatureType::Polygon);
        assert!(FeatureType::from_code(0).is_err());
        assert!(FeatureType::from_code(5).is_err());
    }

    #[test]
    fn test_collection_accepts_everything() {
        assert!(FeatureType::Collection.accepts(FeatureType::Point));
        assert!(FeatureType::Line.accepts(FeatureType::Line));
        assert!(!FeatureType::Line.accepts(FeatureType::Polygon));
    }

    #[test]
    fn test_directed_edge() {
        let d = DirectedEdge::backward(EdgeId(4));
        assert_eq!(d.0, -4);
        assert_eq!(d.edge(), EdgeId(4));
        assert!(!d.is_forward());
        assert_eq!(d.reversed(), DirectedEdge::forward(EdgeId(4)));
    }
}
