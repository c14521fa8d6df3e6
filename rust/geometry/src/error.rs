// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use thiserror::Error;

use crate::types::GeometryType;

/// Result type for geometry operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during geometry processing
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("Invalid DE-9IM pattern: {0:?}")]
    InvalidPattern(String),

    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("Unsupported operation {op} for {a} and {b}")]
    Unsupported {
        op: &'static str,
        a: GeometryType,
        b: GeometryType,
    },

    #[error("Boolean operation failed: {0}")]
    Overlay(String),
}
