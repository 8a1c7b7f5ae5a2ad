// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Engine error types.

use nupic_types::TypesError;

/// Coarse grouping of errors by what went wrong
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Bad names, unknown types, missing endpoints or parameters
    Configuration,
    /// Graph shape problems: outgoing links, dimension negotiation
    Topology,
    /// Buffer binding and element type problems
    Resource,
    /// Runtime / network / factory lifecycle violations
    Lifecycle,
    /// Checkpoint streams and the file system
    Io,
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Duplicate name: {0}")]
    DuplicateName(String),

    #[error("Invalid name: {0}")]
    InvalidName(String),

    #[error("Unknown endpoint: {0}")]
    UnknownEndpoint(String),

    #[error("Unknown region type: {0}")]
    UnknownRegionType(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Out of range: {0}")]
    OutOfRange(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Invalid link policy: {0}")]
    InvalidLinkPolicy(String),

    #[error("Region '{region}' still feeds {links} link(s)")]
    RegionHasOutgoingLinks { region: String, links: usize },

    #[error("Dimensions unresolvable: {0}")]
    DimensionsUnresolvable(String),

    #[error("Incompatible dimensions: {0}")]
    IncompatibleDimensions(String),

    #[error("Runtime not initialized")]
    NotInitialized,

    #[error("Cannot shut down: {count} network(s) still alive")]
    NetworksStillAlive { count: usize },

    #[error("Failed to construct region type '{type_name}': {source}")]
    ImplementationConstructionFailed {
        type_name: String,
        #[source]
        source: Box<EngineError>,
    },

    #[error("Factory cache still referenced: {specs} spec(s), {modules} module(s)")]
    OutstandingReferences { specs: usize, modules: usize },

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Region '{region}' failed at iteration {iteration}: {source}")]
    RunFailed {
        region: String,
        iteration: u64,
        #[source]
        source: Box<EngineError>,
    },

    #[error("Region computation failed: {0}")]
    Compute(String),

    #[error("Checkpoint stream already open: {0}")]
    StreamAlreadyOpen(String),

    #[error("Checkpoint stream mode mismatch: {0}")]
    WrongStreamMode(String),

    #[error("Bad checkpoint: {0}")]
    BadCheckpoint(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Types(#[from] TypesError),
}

impl EngineError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            EngineError::DuplicateName(_)
            | EngineError::InvalidName(_)
            | EngineError::UnknownEndpoint(_)
            | EngineError::UnknownRegionType(_)
            | EngineError::NotFound(_)
            | EngineError::OutOfRange(_)
            | EngineError::InvalidParameter(_)
            | EngineError::InvalidLinkPolicy(_) => ErrorCategory::Configuration,

            EngineError::RegionHasOutgoingLinks { .. }
            | EngineError::DimensionsUnresolvable(_)
            | EngineError::IncompatibleDimensions(_) => ErrorCategory::Topology,

            EngineError::NotInitialized
            | EngineError::NetworksStillAlive { .. }
            | EngineError::ImplementationConstructionFailed { .. }
            | EngineError::OutstandingReferences { .. }
            | EngineError::InvalidState(_)
            | EngineError::RunFailed { .. }
            | EngineError::Compute(_) => ErrorCategory::Lifecycle,

            EngineError::StreamAlreadyOpen(_)
            | EngineError::WrongStreamMode(_)
            | EngineError::BadCheckpoint(_)
            | EngineError::Serialization(_)
            | EngineError::Io(_) => ErrorCategory::Io,

            EngineError::Types(inner) => match inner {
                TypesError::DuplicateName(_)
                | TypesError::NotFound(_)
                | TypesError::OutOfRange { .. }
                | TypesError::TooLarge { .. } => ErrorCategory::Configuration,
                TypesError::InvalidDimensions(_) => ErrorCategory::Topology,
                TypesError::AlreadyBound
                | TypesError::InvalidType(_)
                | TypesError::TypeMismatch { .. }
                | TypesError::ReadOnly
                | TypesError::Unbound => ErrorCategory::Resource,
            },
        }
    }
}

impl From<bincode::Error> for EngineError {
    fn from(err: bincode::Error) -> Self {
        EngineError::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        EngineError::Serialization(err.to_string())
    }
}

pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categories() {
        assert_eq!(
            EngineError::DuplicateName("a".into()).category(),
            ErrorCategory::Configuration
        );
        assert_eq!(
            EngineError::RegionHasOutgoingLinks {
                region: "a".into(),
                links: 1
            }
            .category(),
            ErrorCategory::Topology
        );
        assert_eq!(
            EngineError::from(TypesError::AlreadyBound).category(),
            ErrorCategory::Resource
        );
        assert_eq!(
            EngineError::NetworksStillAlive { count: 2 }.category(),
            ErrorCategory::Lifecycle
        );
        assert_eq!(
            EngineError::StreamAlreadyOpen("main".into()).category(),
            ErrorCategory::Io
        );
    }

    #[test]
    fn test_run_failure_keeps_source() {
        let err = EngineError::RunFailed {
            region: "B".into(),
            iteration: 3,
            source: Box::new(EngineError::Compute("boom".into())),
        };
        let message = err.to_string();
        assert!(message.contains("'B'"));
        assert!(message.contains("iteration 3"));
        assert!(message.contains("boom"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
