use thiserror::Error;
use zkid_pack::PackError;
use zkid_zkp::ProofServiceError;

use crate::phase::AuthPhase;

/// Errors from the authorization flow.
#[derive(Error, Debug)]
pub enum AuthError {
    /// The request is missing a required field or is not an auth request.
    #[error("malformed message: {0}")]
    MalformedMessage(String),

    /// The attempt cannot move to the requested phase.
    #[error("invalid auth transition: {from} -> {to}")]
    InvalidTransition {
        /// Current phase.
        from: AuthPhase,
        /// Attempted phase.
        to: AuthPhase,
    },

    /// No held credential satisfies a requested scope entry.
    #[error("no credential in the wallet satisfies scope request {scope}")]
    NoMatchingCredential {
        /// Scope request id.
        scope: u32,
    },

    /// A response does not answer the request it is checked against.
    #[error("response does not answer the request: {0}")]
    ResponseMismatch(String),

    /// Packing or unpacking failed.
    #[error(transparent)]
    Pack(#[from] PackError),

    /// Proof generation or verification failed.
    #[error(transparent)]
    Proof(#[from] ProofServiceError),
}
