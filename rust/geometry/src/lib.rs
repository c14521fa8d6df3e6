// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Topolite Geometry
//!
//! Planar geometry values and the predicates a planar topology needs:
//! validity, simplicity, DE-9IM relate, polygon overlay through i_overlay,
//! line merging and nalgebra for coordinates.

pub mod algorithm;
pub mod error;
pub mod library;
pub mod line_merge;
pub mod overlay;
pub mod relate;
pub mod types;

// Re-export nalgebra types for convenience
pub use nalgebra::{Point2, Vector2};

pub use algorithm::{Location, EPSILON};
pub use error::{Error, Result};
pub use library::{GeometryLibrary, PlanarGeometry};
pub use relate::{Dimension, IntersectionMatrix};
pub use types::{Geometry, GeometryType, LineString, Polygon, Rect};
