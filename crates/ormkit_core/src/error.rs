//! Error types for ormkit core.

use crate::collection::ShapeKind;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in persistent collection operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The collection was used outside its owning unit of work.
    #[error("collection cannot be accessed outside its owning unit of work: {message}")]
    Lifecycle {
        /// What was attempted.
        message: String,
    },

    /// Index outside the collection's bounds.
    #[error("index {index} out of bounds for length {len}")]
    Bounds {
        /// The requested index.
        index: usize,
        /// The collection length at the time of the call.
        len: usize,
    },

    /// The loader or cache region failed while initializing.
    #[error("source unavailable: {message}")]
    SourceUnavailable {
        /// Description of the failure.
        message: String,
    },

    /// Internal consistency was broken. Not recoverable.
    #[error("invariant violation: {message}")]
    InvariantViolation {
        /// Description of the broken invariant.
        message: String,
    },

    /// Operation not permitted in current state.
    #[error("invalid operation: {message}")]
    InvalidOperation {
        /// Description of why operation is invalid.
        message: String,
    },

    /// A role was used with a wrapper of a different shape.
    #[error("shape mismatch: expected {expected}, found {found}")]
    ShapeMismatch {
        /// Shape required by the operation.
        expected: ShapeKind,
        /// Shape actually configured.
        found: ShapeKind,
    },

    /// An externalized value could not be converted to an element or key.
    #[error("conversion failed: {message}")]
    Conversion {
        /// Description of the conversion failure.
        message: String,
    },

    /// A cache entry does not describe a collection.
    #[error("malformed cache entry: {message}")]
    MalformedEntry {
        /// Description of the problem.
        message: String,
    },

    /// Codec error.
    #[error("codec error: {0}")]
    Codec(#[from] ormkit_codec::CodecError),

    /// Cache region error.
    #[error("cache error: {0}")]
    Cache(#[from] ormkit_cache::CacheError),
}

impl CoreError {
    /// Creates a lifecycle error.
    pub fn lifecycle(message: impl Into<String>) -> Self {
        Self::Lifecycle {
            message: message.into(),
        }
    }

    /// Creates a bounds error.
    pub fn bounds(index: usize, len: usize) -> Self {
        Self::Bounds { index, len }
    }

    /// Creates a source unavailable error.
    pub fn source_unavailable(message: impl Into<String>) -> Self {
        Self::SourceUnavailable {
            message: message.into(),
        }
    }

    /// Creates an invariant violation.
    pub fn invariant_violation(message: impl Into<String>) -> Self {
        Self::InvariantViolation {
            message: message.into(),
        }
    }

    /// Creates an invalid operation error.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::InvalidOperation {
            message: message.into(),
        }
    }

    /// Creates a conversion error.
    pub fn conversion(message: impl Into<String>) -> Self {
        Self::Conversion {
            message: message.into(),
        }
    }

    /// Creates a malformed cache entry error.
    pub fn malformed_entry(message: impl Into<String>) -> Self {
        Self::MalformedEntry {
            message: message.into(),
        }
    }

    /// Whether retrying the same call may succeed.
    ///
    /// Only collaborator outages qualify. The core itself never retries.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::SourceUnavailable { .. })
    }
}
