//! # Error Hierarchy
//!
//! Structured error types for the foundational layer, built with `thiserror`.
//! Downstream crates wrap these with `#[from]` in their own enums.

use thiserror::Error;

/// Top-level error type for zkid-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Canonicalization failure during digest computation.
    #[error("canonicalization error: {0}")]
    Canonicalization(#[from] CanonicalizationError),

    /// Identifier parse or derivation failure.
    #[error("identifier error: {0}")]
    Did(#[from] DidError),

    /// Hex decoding failure or wrong digest length.
    #[error("invalid hex digest: {0}")]
    InvalidHex(String),

    /// A wire string did not name a known media or message type.
    #[error("unknown {kind}: {value:?}")]
    UnknownVariant {
        /// Which vocabulary was being parsed.
        kind: &'static str,
        /// The rejected input.
        value: String,
    },

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors during canonical serialization.
#[derive(Error, Debug)]
pub enum CanonicalizationError {
    /// Float values have no canonical field representation.
    #[error("float values are not permitted in canonical representations: {0}")]
    FloatRejected(f64),

    /// JSON serialization failed during canonicalization.
    #[error("serialization failed: {0}")]
    SerializationFailed(#[from] serde_json::Error),
}

/// Errors parsing or deriving a decentralized identifier.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DidError {
    /// Not of the form `did:<method>:<blockchain>:<network>:<id>`.
    #[error("malformed DID {0:?}")]
    Malformed(String),

    /// A DID component is not part of the supported vocabulary.
    #[error("unsupported DID {component}: {value:?}")]
    Unsupported {
        /// Which component was rejected (method, blockchain, network).
        component: &'static str,
        /// The rejected value.
        value: String,
    },

    /// The identifier bytes do not carry a valid checksum.
    #[error("DID checksum mismatch")]
    Checksum,

    /// The type prefix embedded in the identifier disagrees with the
    /// textual method/blockchain/network.
    #[error("DID type prefix does not match {0}")]
    TypeMismatch(String),
}
