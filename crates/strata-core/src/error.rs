//! Error taxonomy shared across all Strata components.
//!
//! Every error carries a stable kind tag (for API clients and logs) and a
//! retryability classification. Retryable kinds are safe for blind retry
//! with the same identifier; non-retryable kinds require caller-side
//! correction.

use serde::{Deserialize, Serialize};

/// The result type used throughout Strata.
pub type Result<T> = std::result::Result<T, Error>;

/// Which side of a cross-system mutation committed when the other failed.
///
/// Produced when the federation engine detects an inconsistency it could not
/// compensate; surfaced verbatim so an operator or a reconciliation retry
/// can act on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialFailureDetail {
    /// The identifier the operation targeted.
    pub ident: String,
    /// The operation being performed (e.g. `create_schema`).
    pub operation: String,
    /// True when the remote provider side-effect is (or may be) committed.
    pub remote_committed: bool,
    /// True when the local metadata record is committed (possibly as DELETED).
    pub local_committed: bool,
    /// Description of the sub-step that failed.
    pub failed_step: String,
}

/// Errors that can occur in Strata operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed identifier, namespace, or request — rejected before any I/O.
    #[error("validation error: {message}")]
    Validation {
        /// Description of what failed validation.
        message: String,
    },

    /// The requested entity was not found.
    #[error("not found: {message}")]
    NotFound {
        /// Description of what was not found.
        message: String,
    },

    /// An entity already occupies the target identifier.
    #[error("already exists: {message}")]
    AlreadyExists {
        /// Description of the conflicting identifier.
        message: String,
    },

    /// Optimistic-concurrency loss: the write targeted a stale version.
    #[error("version conflict on {ident}: expected version {expected}, found {actual}")]
    VersionConflict {
        /// The identifier being written.
        ident: String,
        /// The version the caller expected.
        expected: u64,
        /// The version actually stored.
        actual: u64,
    },

    /// Bounded lock wait elapsed before the path lock could be acquired.
    #[error("lock timeout on path '{path}' after {waited_ms}ms")]
    LockTimeout {
        /// The namespace path being locked.
        path: String,
        /// How long the operation waited.
        waited_ms: u64,
    },

    /// The routed provider does not implement the requested capability.
    #[error("not supported: {message}")]
    NotSupported {
        /// Description of the capability gap.
        message: String,
    },

    /// The remote system is unreachable; transient and safe to retry.
    #[error("remote unavailable: {message}")]
    RemoteUnavailable {
        /// Description of the failure.
        message: String,
    },

    /// The remote system refused the operation; not retryable as-is.
    #[error("remote rejected: {message}")]
    RemoteRejected {
        /// The remote system's refusal.
        message: String,
    },

    /// A caller-supplied deadline elapsed; the remote outcome is unknown.
    #[error("timeout: {message}")]
    Timeout {
        /// Description of the timed-out call.
        message: String,
    },

    /// Cross-system inconsistency detected and not compensated.
    #[error(
        "partial failure during {} on {}: {} (remote committed: {}, local committed: {})",
        detail.operation, detail.ident, detail.failed_step, detail.remote_committed, detail.local_committed
    )]
    PartialFailure {
        /// Which side committed and which sub-step failed.
        detail: PartialFailureDetail,
    },

    /// The backing store failed.
    #[error("storage error: {message}")]
    Storage {
        /// Description of the storage failure.
        message: String,
        /// The underlying cause, if any.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Serialization or deserialization failed.
    #[error("serialization error: {message}")]
    Serialization {
        /// Description of the serialization failure.
        message: String,
    },

    /// An invariant was violated; should not happen in normal operation.
    #[error("internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl Error {
    /// Creates a validation error.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Creates a not-found error.
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Creates an already-exists error.
    #[must_use]
    pub fn already_exists(message: impl Into<String>) -> Self {
        Self::AlreadyExists {
            message: message.into(),
        }
    }

    /// Creates a storage error.
    #[must_use]
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a storage error with a source cause.
    #[must_use]
    pub fn storage_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Storage {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates a serialization error.
    #[must_use]
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns the stable machine-readable kind tag.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "VALIDATION_ERROR",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::AlreadyExists { .. } => "ALREADY_EXISTS",
            Self::VersionConflict { .. } => "VERSION_CONFLICT",
            Self::LockTimeout { .. } => "LOCK_TIMEOUT",
            Self::NotSupported { .. } => "NOT_SUPPORTED",
            Self::RemoteUnavailable { .. } => "REMOTE_UNAVAILABLE",
            Self::RemoteRejected { .. } => "REMOTE_REJECTED",
            Self::Timeout { .. } => "TIMEOUT",
            Self::PartialFailure { .. } => "PARTIAL_FAILURE",
            Self::Storage { .. } => "STORAGE_ERROR",
            Self::Serialization { .. } => "SERIALIZATION_ERROR",
            Self::Internal { .. } => "INTERNAL_ERROR",
        }
    }

    /// Returns true when the whole operation is safe to retry blindly with
    /// the same identifier.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RemoteUnavailable { .. } | Self::LockTimeout { .. } | Self::Timeout { .. }
        )
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::serialization(e.to_string())
    }
}
