// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! # Topolite Topology
//!
//! Planar topology: nodes, edges and faces that tile the plane, with
//! layered topological features (TopoGeometries) built on top of them.
//!
//! Edges are stored as a doubly connected edge list. Every edge carries
//! signed `next_left_edge` / `next_right_edge` pointers and the faces on its
//! two sides, so walking the pointers from any edge goes around the ring of
//! the face on its left. Face 0 is the universal face outside everything.
//!
//! A [`Catalog`] holds named [`Topology`] instances. Each topology is
//! edited through atomic operations (isolated nodes and edges, face-splitting
//! edge insertion, face-merging removal, split, heal and geometry change),
//! each of which either commits whole or leaves the topology untouched.
//! Concurrent edits are checked optimistically at commit and fail with a
//! retryable [`Error::ConcurrencyConflict`].
//!
//! ## Example
//!
//! ```
//! use nalgebra::Point2;
//! use topolite_geometry::LineString;
//! use topolite_topology::{Catalog, TopoElement};
//!
//! let catalog = Catalog::with_defaults();
//! catalog.create_topology("city", 4326, 0.0, false)?;
//! let topo = catalog.topology("city")?;
//!
//! let a = topo.add_iso_node(None, Point2::new(0.0, 0.0))?;
//! let b = topo.add_iso_node(None, Point2::new(10.0, 0.0))?;
//! let road = topo.add_iso_edge(a, b, LineString::from_coords(&[(0.0, 0.0), (10.0, 0.0)]))?;
//!
//! let layer = catalog.add_topo_geometry_column("city", "public", "roads", "geom", "LINE", None)?;
//! let tg = catalog.create_topo_geom("city", 2, layer, &[TopoElement::new(road.0, 2)])?;
//! assert_eq!(catalog.geometry(&tg)?.to_string(), "LINESTRING(0 0,10 0)");
//! # Ok::<(), topolite_topology::Error>(())
//! ```

pub mod catalog;
pub mod config;
mod editor;
pub mod error;
pub mod face;
pub mod ids;
pub mod layer;
pub mod primitives;
pub mod query;
pub mod realize;
pub mod store;
pub mod topology;
mod traversal;
pub mod validate;

pub use catalog::{Catalog, ColumnRef};
pub use config::CatalogConfig;
pub use error::{Error, ErrorKind, Result};
pub use ids::{
    DirectedEdge, EdgeId, EntityRef, FaceId, FeatureType, LayerId, NodeId, PrimitiveType,
    TopoGeomId, TopologyId,
};
pub use primitives::{Edge, Face, Layer, Node, Relation, TopoElement, TopoGeometry, TopologyInfo};
pub use query::{LayerSummary, TopologySummary};
pub use store::{TopologyData, TopologyView};
pub use topology::Topology;
pub use validate::{Diagnostic, DiagnosticKind};
