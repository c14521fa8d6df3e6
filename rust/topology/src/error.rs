// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for topology operations.

use std::fmt;

use crate::ids::EntityRef;

/// Result type alias for topology operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during topology operations.
///
/// Every failing operation leaves the topology unchanged.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    /// A referenced topology, layer, node, edge, face or TopoGeometry does not exist.
    #[error("{0} not found")]
    NotFound(EntityRef),

    /// An element or TopoGeometry type is not accepted by the target layer.
    #[error("type mismatch: {0}")]
    TypeMismatch(String),

    /// The operation would break a TopoGeometry, a layer hierarchy or a
    /// uniqueness rule.
    #[error("referential conflict: {0}")]
    ReferentialConflict(String),

    /// Arguments are malformed (bad codes, empty names, invalid patterns).
    #[error("malformed input: {0}")]
    MalformedInput(String),

    /// The geometry would violate a planar topology invariant.
    #[error("geometric invalidity: {0}")]
    GeometricInvalidity(String),

    /// A concurrent edit committed first; the operation may be retried.
    #[error("concurrency conflict on topology {topology}: {detail}")]
    ConcurrencyConflict { topology: String, detail: String },
}

/// Fieldless error category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    TypeMismatch,
    ReferentialConflict,
    MalformedInput,
    GeometricInvalidity,
    ConcurrencyConflict,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::NotFound => "NotFound",
            ErrorKind::TypeMismatch => "TypeMismatch",
            ErrorKind::ReferentialConflict => "ReferentialConflict",
            ErrorKind::MalformedInput => "MalformedInput",
            ErrorKind::GeometricInvalidity => "GeometricInvalidity",
            ErrorKind::ConcurrencyConflict => "ConcurrencyConflict",
        };
        f.write_str(s)
    }
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::TypeMismatch(_) => ErrorKind::TypeMismatch,
            Error::ReferentialConflict(_) => ErrorKind::ReferentialConflict,
            Error::MalformedInput(_) => ErrorKind::MalformedInput,
            Error::GeometricInvalidity(_) => ErrorKind::GeometricInvalidity,
            Error::ConcurrencyConflict { .. } => ErrorKind::ConcurrencyConflict,
        }
    }

    /// Only concurrency conflicts are worth retrying unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::ConcurrencyConflict { .. })
    }

    pub(crate) fn malformed(msg: impl Into<String>) -> Self {
        Error::MalformedInput(msg.into())
    }

    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Error::GeometricInvalidity(msg.into())
    }

    pub(crate) fn conflict(msg: impl Into<String>) -> Self {
        Error::ReferentialConflict(msg.into())
    }

    pub(crate) fn mismatch(msg: impl Into<String>) -> Self {
        Error::TypeMismatch(msg.into())
    }
}

impl From<topolite_geometry::Error> for Error {
    fn from(err: topolite_geometry::Error) -> Self {
        Error::MalformedInput(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::{EdgeId, EntityRef};

    #[test]
    fn test_not_found_message_names_entity() {
        let err = Error::NotFound(EntityRef::Edge(EdgeId(7)));
        assert_eq!(err.to_string(), "edge 7 not found");
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_only_conflicts_retry() {
        let conflict = Error::ConcurrencyConflict {
            topology: "city".into(),
            detail: "edge 3".into(),
        };
        assert!(conflict.is_retryable());
        assert!(!Error::malformed("x").is_retryable());
    }

    #[test]
    fn test_geometry_error_maps_to_malformed() {
        let err: Error = topolite_geometry::Error::InvalidPattern("xx".into()).into();
        assert_eq!(err.kind(), ErrorKind::MalformedInput);
    }
}
