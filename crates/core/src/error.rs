//! Error taxonomy for stub building, persistence and registration.

use thiserror::Error;

/// Problems in the light tree handed to the stub builder.
///
/// These point at a parser or grammar bug, never at a corrupt index.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StructuralViolation {
    #[error("required child `{child_kind}` missing under `{parent_kind}`")]
    MissingRequiredChild {
        parent_kind: &'static str,
        child_kind: &'static str,
    },

    #[error("root node `{kind}` has no registered element type")]
    UnregisteredRoot { kind: &'static str },

    #[error("light tree builder finished with unbalanced nodes")]
    UnbalancedBuilder,

    #[error("light node {node} does not exist")]
    InvalidNode { node: u32 },

    #[error("stubs nested deeper than {limit} levels")]
    NestingTooDeep { limit: usize },
}

/// Main error type for the stub engine
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StubError {
    #[error("structural violation: {0}")]
    StructuralViolation(#[from] StructuralViolation),

    #[error("unknown element type id {id}")]
    UnknownTypeId { id: u32 },

    #[error("truncated stub stream: needed {needed} byte(s), {remaining} remaining")]
    TruncatedStream { needed: usize, remaining: usize },

    #[error("stub format version mismatch: expected {expected:#018x}, found {found:#018x}")]
    VersionMismatch { expected: u64, found: u64 },

    #[error("malformed stub stream: {reason}")]
    MalformedStream { reason: String },

    #[error("element type `{name}` registered twice")]
    DuplicateRegistration { name: String },

    #[error("stub build cancelled")]
    Cancelled,

    #[error("source unit `{unit}` unavailable: {message}")]
    Source { unit: String, message: String },
}

impl StubError {
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedStream {
            reason: reason.into(),
        }
    }

    /// Persisted data can't be trusted; discard it and rebuild from source.
    pub fn is_integrity_failure(&self) -> bool {
        matches!(
            self,
            Self::UnknownTypeId { .. }
                | Self::TruncatedStream { .. }
                | Self::VersionMismatch { .. }
                | Self::MalformedStream { .. }
        )
    }

    pub fn is_structural(&self) -> bool {
        matches!(self, Self::StructuralViolation(_))
    }
}

/// Result type alias for stub engine operations
pub type Result<T> = std::result::Result<T, StubError>;
