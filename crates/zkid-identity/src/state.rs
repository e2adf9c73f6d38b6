//! Identity state roots.

use serde::{Deserialize, Serialize};
use zkid_core::{sha256_concat, Hash256};

/// An identity state root together with the three tree roots it commits to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityState {
    /// `H(claims_root || revocation_root || roots_root)`.
    pub state: Hash256,
    /// Claims tree root.
    pub claims_root: Hash256,
    /// Revocation tree root.
    pub revocation_root: Hash256,
    /// Roots tree root.
    pub roots_root: Hash256,
}

impl IdentityState {
    /// Derive the state root from the three tree roots.
    pub fn from_roots(claims_root: Hash256, revocation_root: Hash256, roots_root: Hash256) -> Self {
        Self {
            state: state_hash(&claims_root, &revocation_root, &roots_root),
            claims_root,
            revocation_root,
            roots_root,
        }
    }

    /// Whether `state` really is the hash of the three roots.
    pub fn is_consistent(&self) -> bool {
        self.state == state_hash(&self.claims_root, &self.revocation_root, &self.roots_root)
    }
}

/// State root hash.
pub fn state_hash(claims_root: &Hash256, revocation_root: &Hash256, roots_root: &Hash256) -> Hash256 {
    sha256_concat(&[
        claims_root.as_bytes(),
        revocation_root.as_bytes(),
        roots_root.as_bytes(),
    ])
}

/// Key of a `(claims_root, revocation_root)` pair in the roots tree.
pub fn roots_pair_key(claims_root: &Hash256, revocation_root: &Hash256) -> Hash256 {
    sha256_concat(&[claims_root.as_bytes(), revocation_root.as_bytes()])
}

/// Key of a revocation nonce in the revocation tree.
pub fn nonce_key(nonce: u64) -> Hash256 {
    Hash256::from_u64(nonce)
}
