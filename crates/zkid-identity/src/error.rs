use thiserror::Error;
use zkid_core::{CanonicalizationError, DidError, Retryable};
use zkid_crypto::{KmsError, TreeError};

/// Errors from identity, claim and credential operations.
#[derive(Error, Debug)]
pub enum IdentityError {
    /// Tree mutation failed. Includes [`TreeError::TreeDepthExceeded`].
    #[error(transparent)]
    Tree(#[from] TreeError),

    /// Key management failure.
    #[error(transparent)]
    Kms(#[from] KmsError),

    /// Identifier derivation failure.
    #[error(transparent)]
    Did(#[from] DidError),

    /// Claim or credential data could not be canonicalized.
    #[error("claim data: {0}")]
    Canonicalization(#[from] CanonicalizationError),

    /// The identity is not held by this store.
    #[error("unknown identity {0}")]
    UnknownIdentity(String),

    /// An identity with this DID already exists (same key seed).
    #[error("identity {0} already exists")]
    AlreadyExists(String),

    /// The credential was not issued by this identity.
    #[error("credential {credential} was not issued by {issuer}")]
    NotIssuer {
        /// Credential id.
        credential: String,
        /// Identity that attempted the operation.
        issuer: String,
    },

    /// Another claim of this identity already holds the revocation nonce.
    /// Revoking either would revoke both.
    #[error("revocation nonce {nonce} is already in use by {did}")]
    NonceInUse {
        /// Identity whose claims tree holds the nonce.
        did: String,
        /// The nonce.
        nonce: u64,
    },

    /// A credential field is missing or has the wrong shape.
    #[error("invalid credential: {0}")]
    InvalidCredential(String),

    /// The wallet does not hold the credential.
    #[error("credential {0} not found")]
    CredentialNotFound(String),

    /// Publication of a state root failed.
    #[error(transparent)]
    Storage(#[from] StateStorageError),
}

impl IdentityError {
    /// Whether this error reports that a tree could not place a claim.
    pub fn is_tree_depth_exceeded(&self) -> bool {
        matches!(self, Self::Tree(TreeError::TreeDepthExceeded { .. }))
    }
}

/// Errors from a [`crate::StateStorage`] backend.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StateStorageError {
    /// Backend temporarily unreachable. Retried.
    #[error("state storage temporarily unavailable: {0}")]
    Transient(String),

    /// Backend rejected the request. Not retried.
    #[error("state storage rejected the request: {0}")]
    Permanent(String),

    /// Retries exhausted.
    #[error("state storage unavailable: {0}")]
    Unavailable(String),
}

impl Retryable for StateStorageError {
    fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}
