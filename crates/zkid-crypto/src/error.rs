//! # Cryptographic Error Types

use thiserror::Error;

use crate::keys::KeyType;

/// Errors from the key management service and its providers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KmsError {
    /// A provider for this key type is already registered.
    #[error("a provider for {0} keys is already registered")]
    DuplicateProvider(KeyType),

    /// No provider handles this key type.
    #[error("no provider registered for {0} keys")]
    UnsupportedKeyType(KeyType),

    /// The key reference is not held by its provider.
    #[error("key not found: {0}")]
    KeyNotFound(String),

    /// Key bytes were rejected by the underlying curve implementation.
    #[error("invalid key material: {0}")]
    InvalidKey(String),

    /// Signature did not verify.
    #[error("signature verification failed: {0}")]
    VerificationFailed(String),
}

/// Errors from sparse merkle tree operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TreeError {
    /// Depth must be between 1 and [`crate::smt::MAX_DEPTH`].
    #[error("tree depth {0} out of range")]
    DepthOutOfRange(usize),

    /// The key is already present.
    #[error("entry already exists for key {0}")]
    EntryExists(String),

    /// Two distinct keys share a leaf position at this depth.
    #[error("tree depth {depth} cannot hold key {key}: leaf position already taken")]
    TreeDepthExceeded {
        /// Depth of the tree.
        depth: usize,
        /// The key that could not be placed.
        key: String,
    },
}
