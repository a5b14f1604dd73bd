//! Provider-side failure taxonomy.
//!
//! Every provider method returns a success payload or one of these tagged
//! failures. The federation engine maps them onto the core taxonomy when
//! reconciling cross-system mutations.

use strata_core::error::Error;

/// Result type for provider operations.
pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

/// Failures a provider can report.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProviderError {
    /// The capability is not implemented by this provider kind.
    #[error("not supported: {0}")]
    NotSupported(String),

    /// The remote system is unreachable; transient, safe to retry.
    #[error("remote unavailable: {0}")]
    Unavailable(String),

    /// The remote system refused the operation; not retryable as-is.
    #[error("remote rejected: {0}")]
    Rejected(String),

    /// The call's deadline elapsed; the remote outcome is unknown.
    #[error("timed out: {0}")]
    Timeout(String),
}

impl ProviderError {
    /// Returns true when retrying the call may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Timeout(_))
    }
}

impl From<ProviderError> for Error {
    fn from(e: ProviderError) -> Self {
        match e {
            ProviderError::NotSupported(message) => Self::NotSupported { message },
            ProviderError::Unavailable(message) => Self::RemoteUnavailable { message },
            ProviderError::Rejected(message) => Self::RemoteRejected { message },
            ProviderError::Timeout(message) => Self::Timeout { message },
        }
    }
}
