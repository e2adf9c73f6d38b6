use thiserror::Error;
use zkid_crypto::KmsError;
use zkid_identity::{IdentityError, StateStorageError};
use zkid_status::StatusError;

use crate::circuits::CircuitId;

/// Error loading circuit artifacts.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CircuitStorageError {
    /// No artifacts for the circuit.
    #[error("no artifacts for circuit {0}")]
    NotFound(CircuitId),

    /// Artifacts exist but cannot be read.
    #[error("failed to read {path}: {reason}")]
    Io {
        /// File or key that failed.
        path: String,
        /// Underlying error.
        reason: String,
    },

    /// Artifacts were read but are unusable.
    #[error("malformed artifacts for circuit {circuit}: {reason}")]
    Malformed {
        /// Circuit.
        circuit: CircuitId,
        /// What is wrong.
        reason: String,
    },
}

/// Error during proof generation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProofError {
    /// The witness does not satisfy the circuit.
    #[error("constraint not satisfied: {0}")]
    Unsatisfied(String),
    /// The proving key does not belong to the circuit.
    #[error("proving key mismatch: {0}")]
    KeyMismatch(String),
    /// Internal prover error.
    #[error("prover error: {0}")]
    Prover(String),
}

/// Error during proof verification.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VerifyError {
    /// The proof is invalid.
    #[error("invalid proof: {0}")]
    InvalidProof(String),
    /// The verifying key is incompatible.
    #[error("key mismatch: {0}")]
    KeyMismatch(String),
}

/// Errors from the [`ProofService`](crate::ProofService).
#[derive(Error, Debug)]
pub enum ProofServiceError {
    /// Circuit artifacts could not be loaded.
    #[error("circuit data unavailable: {0}")]
    CircuitDataUnavailable(#[from] CircuitStorageError),

    /// The prover rejected the inputs or failed.
    #[error("proof generation failed: {0}")]
    ProofGeneration(#[from] ProofError),

    /// A proof did not verify.
    #[error("proof verification failed: {0}")]
    ProofVerification(#[from] VerifyError),

    /// The credential's revocation nonce is in the issuer's revocation tree.
    #[error("credential {credential} is revoked (nonce {nonce})")]
    RevokedCredential {
        /// Credential id.
        credential: String,
        /// Revoked nonce.
        nonce: u64,
    },

    /// A claimed identity state is not acceptable.
    #[error("state verification failed for {did}: {reason}")]
    StateVerification {
        /// Identity.
        did: String,
        /// Why.
        reason: String,
    },

    /// The query cannot be served by this operation.
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// Revocation status resolution failed.
    #[error(transparent)]
    Status(#[from] StatusError),

    /// Identity store failure.
    #[error(transparent)]
    Identity(#[from] IdentityError),

    /// Signing failure.
    #[error(transparent)]
    Kms(#[from] KmsError),

    /// Published state could not be read.
    #[error(transparent)]
    StateStorage(#[from] StateStorageError),
}
