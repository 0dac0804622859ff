//! Error types for the tabulation core.
//!
//! Validation failures are reported before anything is persisted. Persistence
//! failures keep their original cause. Malformed alignment data is only an
//! error on the strict codec path; the lenient path logs and carries on.

use crate::core::types::{EntityId, EntityKind};
use thiserror::Error;

/// Problems detected before a change is persisted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("protosegment '{symbol}' already exists in zone {zone}")]
    DuplicateProtosegment { symbol: String, zone: String },

    #[error("a view named '{0}' already exists in this collection")]
    DuplicateViewName(String),

    #[error("variety {field} '{value}' is already used in this collection")]
    DuplicateVariety { field: &'static str, value: String },

    #[error("threshold must be between 0 and 100 percent, got {0}")]
    ThresholdOutOfRange(u32),

    #[error("view '{view}' has {tabulated} tabulated group(s); membership and threshold are locked")]
    TabulationLocked { view: String, tabulated: usize },

    #[error("variety {variety} is not a member of view {view}")]
    NotAViewMember { variety: EntityId, view: EntityId },

    #[error("group '{0}' is tabulated; retabulate it first")]
    GroupTabulated(String),

    #[error("{kind} {id} belongs to view {actual}, not view {expected}")]
    WrongView {
        kind: EntityKind,
        id: EntityId,
        expected: EntityId,
        actual: EntityId,
    },

    #[error("{0}")]
    Other(String),
}

/// Errors returned by core operations.
#[derive(Debug, Error)]
pub enum CorrError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("{kind} {id} not found")]
    NotFound { kind: EntityKind, id: EntityId },

    #[error("persistence failure while {context}: {source}")]
    Persistence {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("alignment vector '{vector}' does not fit datum '{raw}': {detail}")]
    MalformedData {
        raw: String,
        vector: String,
        detail: String,
    },

    #[error("configuration error: {0}")]
    Config(String),
}

impl CorrError {
    pub fn not_found(kind: EntityKind, id: EntityId) -> Self {
        CorrError::NotFound { kind, id }
    }

    pub fn persistence<E>(context: impl Into<String>, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        CorrError::Persistence {
            context: context.into(),
            source: Box::new(source),
        }
    }

    /// True for errors the caller should show to the user and then carry on.
    pub fn is_validation(&self) -> bool {
        matches!(self, CorrError::Validation(_))
    }
}

impl From<std::io::Error> for CorrError {
    fn from(e: std::io::Error) -> Self {
        CorrError::persistence("performing file I/O", e)
    }
}

impl From<bincode::Error> for CorrError {
    fn from(e: bincode::Error) -> Self {
        CorrError::persistence("encoding snapshot", e)
    }
}

pub type CorrResult<T> = Result<T, CorrError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn persistence_error_keeps_source() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = CorrError::persistence("writing snapshot", io);
        assert!(err.to_string().contains("writing snapshot"));
        assert!(err.source().unwrap().to_string().contains("denied"));
    }

    #[test]
    fn locked_view_message_names_view() {
        let err: CorrError = ValidationError::TabulationLocked {
            view: "Main".into(),
            tabulated: 3,
        }
        .into();
        assert!(err.is_validation());
        assert!(err.to_string().contains("'Main' has 3 tabulated"));
    }

    #[test]
    fn not_found_message() {
        let err = CorrError::not_found(EntityKind::Cluster, 7);
        assert_eq!(err.to_string(), "cluster 7 not found");
    }
}
