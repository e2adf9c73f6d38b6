//! # zkid-crypto: Key Management and Merkle Trees
//!
//! - [`Kms`]: registry of [`KeyProvider`]s keyed by [`KeyType`]. Signs
//!   digests on behalf of identities without exposing key material.
//! - [`Ed25519Provider`] and [`Secp256k1Provider`]: software providers over
//!   an injectable [`KeyStore`].
//! - [`SparseMerkleTree`]: fixed-depth tree with inclusion and
//!   non-inclusion proofs. Each identity owns three of them.
//!
//! ## Security Invariants
//!
//! - Private keys never leave a provider. No type in this crate serializes,
//!   displays or logs secret bytes.
//! - Seeds held by [`InMemoryKeyStore`] are zeroized on drop.

pub mod ed25519;
pub mod error;
pub mod keys;
pub mod keystore;
pub mod kms;
pub mod secp256k1;
pub mod smt;

pub use ed25519::Ed25519Provider;
pub use error::{KmsError, TreeError};
pub use keys::{KeyRef, KeyType, PublicKey, Signature};
pub use keystore::{InMemoryKeyStore, KeyStore};
pub use kms::{verify_signature, KeyProvider, Kms};
pub use secp256k1::Secp256k1Provider;
pub use smt::{MerkleProof, NodeAux, RhsNode, SparseMerkleTree, DEFAULT_DEPTH, MAX_DEPTH};
