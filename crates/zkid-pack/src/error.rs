use thiserror::Error;
use zkid_core::MediaType;
use zkid_zkp::ProofServiceError;

use crate::zkp::ProvingMethod;

/// Errors from packing and unpacking.
#[derive(Error, Debug)]
pub enum PackError {
    /// The payload or envelope is not a well-formed message.
    #[error("malformed message: {0}")]
    Malformed(String),

    /// A proof-carrying envelope failed an integrity check.
    #[error("proof verification failed: {0}")]
    ProofVerification(String),

    /// No prover or verifier is registered for the proving method.
    #[error("unsupported proving method {0}")]
    UnsupportedAlgorithm(ProvingMethod),

    /// No packer is registered for the media type.
    #[error("no packer registered for {0}")]
    UnsupportedMediaType(MediaType),

    /// A packer for the media type is already registered.
    #[error("a packer for {0} is already registered")]
    DuplicatePacker(MediaType),

    /// The packer needs parameters the caller did not give.
    #[error("missing pack parameter: {0}")]
    MissingParameter(&'static str),

    /// The payload's `from` is not the identity packing it.
    #[error("payload sender {payload:?} does not match packing identity {sender}")]
    SenderMismatch {
        /// `from` in the payload.
        payload: Option<String>,
        /// Identity packing the message.
        sender: String,
    },

    /// Proof generation failed while packing.
    #[error(transparent)]
    Proof(#[from] ProofServiceError),
}
