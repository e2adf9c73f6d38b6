use thiserror::Error;
use zkid_core::Retryable;
use zkid_identity::{StateStorageError, StatusStrategy};

/// Failure reported by a resolver backend.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// Unreachable, timed out, or 5xx. Retried.
    #[error("transient: {0}")]
    Transient(String),
    /// Rejected request or malformed response. Not retried.
    #[error("permanent: {0}")]
    Permanent(String),
}

impl Retryable for BackendError {
    fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

impl From<StateStorageError> for BackendError {
    fn from(e: StateStorageError) -> Self {
        match e {
            StateStorageError::Transient(m) => Self::Transient(m),
            other => Self::Permanent(other.to_string()),
        }
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() || e.is_builder() {
            Self::Permanent(e.to_string())
        } else {
            Self::Transient(e.to_string())
        }
    }
}

/// Errors from status resolution.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StatusError {
    /// No resolver is registered for the strategy.
    #[error("no resolver registered for status strategy {0}")]
    UnregisteredStrategy(StatusStrategy),

    /// A resolver is already registered for the strategy.
    #[error("a resolver for status strategy {0} is already registered")]
    DuplicateStrategy(StatusStrategy),

    /// The backend stayed unreachable through every retry.
    #[error("revocation status unavailable via {strategy}: {reason}")]
    ResolutionUnavailable {
        /// Strategy in use.
        strategy: StatusStrategy,
        /// Last failure.
        reason: String,
    },

    /// The backend answered with a permanent error.
    #[error("revocation status backend for {strategy} failed: {reason}")]
    Backend {
        /// Strategy in use.
        strategy: StatusStrategy,
        /// Backend message.
        reason: String,
    },

    /// The returned status does not prove anything about the nonce.
    #[error("revocation status proof for nonce {nonce} does not verify")]
    InvalidProof {
        /// Nonce that was looked up.
        nonce: u64,
    },
}
