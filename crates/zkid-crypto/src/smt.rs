//! # Sparse Merkle Tree
//!
//! Fixed-depth binary tree over 32-byte keys. A key's leaf position is the
//! low `depth` bits of its last eight bytes, so small integer keys (revocation
//! nonces) and hash keys (claim indexes) both spread across the tree.
//!
//! ## Hashing
//!
//! ```text
//! empty       = 0^32                      (at every level)
//! leaf(k, v)  = SHA256(0x00 || k || v)
//! node(l, r)  = 0^32                      if l and r are both empty
//!             = SHA256(0x01 || l || r)    otherwise
//! ```
//!
//! The empty tree therefore has the zero root, and the domain prefixes keep
//! a leaf from ever being reinterpreted as an internal node.
//!
//! ## Proofs
//!
//! A [`MerkleProof`] carries one sibling per level, leaf first. It proves
//! either inclusion of `(key, value)` or non-inclusion of `key`. Non-inclusion
//! is shown by an empty slot or by a different key occupying the slot
//! ([`NodeAux`]).
//!
//! Trees are `Clone`; identity state takes copy-on-write snapshots of them.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use zkid_core::{sha256_concat, Hash256};

use crate::error::TreeError;

/// Deepest supported tree.
pub const MAX_DEPTH: usize = 64;

/// Default depth for identity trees.
pub const DEFAULT_DEPTH: usize = 40;

const LEAF_PREFIX: [u8; 1] = [0x00];
const NODE_PREFIX: [u8; 1] = [0x01];

/// Hash of a leaf holding `value` under `key`.
pub fn leaf_hash(key: &Hash256, value: &Hash256) -> Hash256 {
    sha256_concat(&[&LEAF_PREFIX, key.as_bytes(), value.as_bytes()])
}

/// Hash of an internal node.
pub fn node_hash(left: &Hash256, right: &Hash256) -> Hash256 {
    if left.is_zero() && right.is_zero() {
        return Hash256::ZERO;
    }
    sha256_concat(&[&NODE_PREFIX, left.as_bytes(), right.as_bytes()])
}

/// Leaf position of `key` in a tree of `depth` levels.
pub fn leaf_index(key: &Hash256, depth: usize) -> u64 {
    let mut tail = [0u8; 8];
    tail.copy_from_slice(&key.as_bytes()[24..]);
    let n = u64::from_be_bytes(tail);
    if depth >= 64 {
        n
    } else {
        n & ((1u64 << depth) - 1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Leaf {
    key: Hash256,
    value: Hash256,
}

/// A sparse merkle tree.
#[derive(Debug, Clone)]
pub struct SparseMerkleTree {
    depth: usize,
    leaves: BTreeMap<u64, Leaf>,
    // (level, index) -> hash. Level 0 holds leaf hashes; level `depth` holds
    // the root. Absent entries are empty.
    nodes: HashMap<(usize, u64), Hash256>,
}

impl SparseMerkleTree {
    /// Empty tree of the given depth.
    pub fn new(depth: usize) -> Result<Self, TreeError> {
        if depth == 0 || depth > MAX_DEPTH {
            return Err(TreeError::DepthOutOfRange(depth));
        }
        Ok(Self {
            depth,
            leaves: BTreeMap::new(),
            nodes: HashMap::new(),
        })
    }

    /// Number of levels below the root.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Current root.
    pub fn root(&self) -> Hash256 {
        self.node(self.depth, 0)
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    /// Whether the tree holds no entries.
    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    /// Hash at `(level, index)`, empty if never written.
    pub fn node(&self, level: usize, index: u64) -> Hash256 {
        self.nodes
            .get(&(level, index))
            .copied()
            .unwrap_or(Hash256::ZERO)
    }

    /// Value stored under `key`.
    pub fn get(&self, key: &Hash256) -> Option<Hash256> {
        self.leaves
            .get(&leaf_index(key, self.depth))
            .filter(|leaf| leaf.key == *key)
            .map(|leaf| leaf.value)
    }

    /// Whether `key` is present.
    pub fn contains(&self, key: &Hash256) -> bool {
        self.get(key).is_some()
    }

    /// Insert a new entry and return the new root.
    ///
    /// Fails with [`TreeError::EntryExists`] if the key is present and with
    /// [`TreeError::TreeDepthExceeded`] if another key holds the same leaf
    /// position. The tree is unchanged on error.
    pub fn insert(&mut self, key: Hash256, value: Hash256) -> Result<Hash256, TreeError> {
        let index = leaf_index(&key, self.depth);
        if let Some(existing) = self.leaves.get(&index) {
            return Err(if existing.key == key {
                TreeError::EntryExists(key.to_hex())
            } else {
                TreeError::TreeDepthExceeded {
                    depth: self.depth,
                    key: key.to_hex(),
                }
            });
        }
        self.leaves.insert(index, Leaf { key, value });

        let mut hash = leaf_hash(&key, &value);
        let mut idx = index;
        self.nodes.insert((0, idx), hash);
        for level in 0..self.depth {
            let sibling = self.node(level, idx ^ 1);
            hash = if idx & 1 == 0 {
                node_hash(&hash, &sibling)
            } else {
                node_hash(&sibling, &hash)
            };
            idx >>= 1;
            self.nodes.insert((level + 1, idx), hash);
        }
        Ok(hash)
    }

    /// Prove inclusion or non-inclusion of `key` against the current root.
    pub fn prove(&self, key: &Hash256) -> MerkleProof {
        let index = leaf_index(key, self.depth);
        let siblings = (0..self.depth)
            .map(|level| self.node(level, (index >> level) ^ 1))
            .collect();
        match self.leaves.get(&index) {
            Some(leaf) if leaf.key == *key => MerkleProof {
                existence: true,
                siblings,
                node_aux: None,
            },
            Some(other) => MerkleProof {
                existence: false,
                siblings,
                node_aux: Some(NodeAux {
                    key: other.key,
                    value: other.value,
                }),
            },
            None => MerkleProof {
                existence: false,
                siblings,
                node_aux: None,
            },
        }
    }

    /// Every non-empty node with its preimage, for publication to a reverse
    /// hash service.
    pub fn publishable_nodes(&self) -> Vec<(Hash256, RhsNode)> {
        let mut out = Vec::with_capacity(self.nodes.len());
        for (&(level, index), hash) in &self.nodes {
            if hash.is_zero() {
                continue;
            }
            let node = if level == 0 {
                match self.leaves.get(&index) {
                    Some(leaf) => RhsNode::Leaf {
                        key: leaf.key,
                        value: leaf.value,
                    },
                    None => continue,
                }
            } else {
                RhsNode::Middle {
                    left: self.node(level - 1, index << 1),
                    right: self.node(level - 1, (index << 1) | 1),
                }
            };
            out.push((*hash, node));
        }
        out
    }
}

/// Preimage of a tree node as served by a reverse hash service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RhsNode {
    /// Internal node.
    Middle {
        /// Left child hash.
        left: Hash256,
        /// Right child hash.
        right: Hash256,
    },
    /// Leaf node.
    Leaf {
        /// Entry key.
        key: Hash256,
        /// Entry value.
        value: Hash256,
    },
}

impl RhsNode {
    /// Hash this preimage commits to.
    pub fn hash(&self) -> Hash256 {
        match self {
            Self::Middle { left, right } => node_hash(left, right),
            Self::Leaf { key, value } => leaf_hash(key, value),
        }
    }
}

/// The entry occupying a slot in a non-inclusion proof.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeAux {
    /// Key actually stored at the slot.
    pub key: Hash256,
    /// Its value.
    pub value: Hash256,
}

/// Inclusion or non-inclusion proof.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerkleProof {
    /// Whether the proof shows the key present.
    pub existence: bool,
    /// Sibling hashes, leaf level first.
    pub siblings: Vec<Hash256>,
    /// Occupying entry for a non-inclusion proof over a taken slot.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_aux: Option<NodeAux>,
}

impl MerkleProof {
    /// Depth of the tree the proof was produced against.
    pub fn depth(&self) -> usize {
        self.siblings.len()
    }

    fn root_from(&self, key: &Hash256, leaf: Hash256) -> Hash256 {
        let mut idx = leaf_index(key, self.depth());
        let mut hash = leaf;
        for sibling in &self.siblings {
            hash = if idx & 1 == 0 {
                node_hash(&hash, sibling)
            } else {
                node_hash(sibling, &hash)
            };
            idx >>= 1;
        }
        hash
    }

    /// Check the proof against `root`.
    ///
    /// For an existence proof `value` must be the stored value. For a
    /// non-existence proof `value` is ignored.
    pub fn verify(&self, root: &Hash256, key: &Hash256, value: Option<&Hash256>) -> bool {
        let depth = self.depth();
        if depth == 0 || depth > MAX_DEPTH {
            return false;
        }
        if self.existence {
            return match (value, &self.node_aux) {
                (Some(v), None) => self.root_from(key, leaf_hash(key, v)) == *root,
                _ => false,
            };
        }
        match &self.node_aux {
            None => self.root_from(key, Hash256::ZERO) == *root,
            Some(aux) => {
                aux.key != *key
                    && leaf_index(&aux.key, depth) == leaf_index(key, depth)
                    && self.root_from(key, leaf_hash(&aux.key, &aux.value)) == *root
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use zkid_core::sha256;

    fn k(n: u64) -> Hash256 {
        Hash256::from_u64(n)
    }

    #[test]
    fn empty_tree_has_zero_root() {
        let t = SparseMerkleTree::new(DEFAULT_DEPTH).unwrap();
        assert_eq!(t.root(), Hash256::ZERO);
        assert!(t.is_empty());
    }

    #[test]
    fn depth_bounds() {
        assert_eq!(
            SparseMerkleTree::new(0).unwrap_err(),
            TreeError::DepthOutOfRange(0)
        );
        assert!(SparseMerkleTree::new(MAX_DEPTH + 1).is_err());
        assert!(SparseMerkleTree::new(MAX_DEPTH).is_ok());
    }

    #[test]
    fn insert_changes_root_and_get_returns_value() {
        let mut t = SparseMerkleTree::new(8).unwrap();
        let r1 = t.insert(k(1), sha256(b"a")).unwrap();
        assert_ne!(r1, Hash256::ZERO);
        let r2 = t.insert(k(2), sha256(b"b")).unwrap();
        assert_ne!(r1, r2);
        assert_eq!(t.root(), r2);
        assert_eq!(t.get(&k(1)), Some(sha256(b"a")));
        assert_eq!(t.get(&k(3)), None);
    }

    #[test]
    fn root_is_independent_of_insertion_order() {
        let mut a = SparseMerkleTree::new(16).unwrap();
        let mut b = SparseMerkleTree::new(16).unwrap();
        for n in [5u64, 9, 300] {
            a.insert(k(n), k(n + 1)).unwrap();
        }
        for n in [300u64, 5, 9] {
            b.insert(k(n), k(n + 1)).unwrap();
        }
        assert_eq!(a.root(), b.root());
    }

    #[test]
    fn duplicate_key_is_rejected() {
        let mut t = SparseMerkleTree::new(8).unwrap();
        t.insert(k(1), k(1)).unwrap();
        let before = t.root();
        assert!(matches!(t.insert(k(1), k(2)), Err(TreeError::EntryExists(_))));
        assert_eq!(t.root(), before);
    }

    #[test]
    fn colliding_slot_exceeds_depth() {
        let mut t = SparseMerkleTree::new(4).unwrap();
        t.insert(k(1), k(0)).unwrap();
        // 17 = 0b1_0001 shares the low four bits with 1.
        let err = t.insert(k(17), k(0)).unwrap_err();
        assert!(matches!(err, TreeError::TreeDepthExceeded { depth: 4, .. }));
        assert_eq!(t.len(), 1);
    }

    #[test]
    fn inclusion_proof_verifies_and_rejects_wrong_value() {
        let mut t = SparseMerkleTree::new(DEFAULT_DEPTH).unwrap();
        for n in 0..10u64 {
            t.insert(sha256(&n.to_be_bytes()), k(n)).unwrap();
        }
        let key = sha256(&3u64.to_be_bytes());
        let proof = t.prove(&key);
        assert!(proof.existence);
        assert_eq!(proof.depth(), DEFAULT_DEPTH);
        assert!(proof.verify(&t.root(), &key, Some(&k(3))));
        assert!(!proof.verify(&t.root(), &key, Some(&k(4))));
        assert!(!proof.verify(&t.root(), &key, None));
    }

    #[test]
    fn non_inclusion_over_empty_slot() {
        let mut t = SparseMerkleTree::new(8).unwrap();
        t.insert(k(1), k(1)).unwrap();
        let proof = t.prove(&k(2));
        assert!(!proof.existence);
        assert!(proof.node_aux.is_none());
        assert!(proof.verify(&t.root(), &k(2), None));
    }

    #[test]
    fn non_inclusion_over_occupied_slot_uses_aux() {
        let mut t = SparseMerkleTree::new(4).unwrap();
        t.insert(k(1), k(7)).unwrap();
        let proof = t.prove(&k(17));
        assert!(!proof.existence);
        assert_eq!(proof.node_aux, Some(NodeAux { key: k(1), value: k(7) }));
        assert!(proof.verify(&t.root(), &k(17), None));
        // The aux entry cannot be used to deny the key it actually holds.
        assert!(!proof.verify(&t.root(), &k(1), None));
    }

    #[test]
    fn proofs_are_bound_to_the_root() {
        let mut t = SparseMerkleTree::new(8).unwrap();
        t.insert(k(1), k(1)).unwrap();
        let old_root = t.root();
        let proof = t.prove(&k(2));
        t.insert(k(2), k(2)).unwrap();
        assert!(proof.verify(&old_root, &k(2), None));
        assert!(!proof.verify(&t.root(), &k(2), None));
    }

    #[test]
    fn publishable_nodes_hash_to_their_keys() {
        let mut t = SparseMerkleTree::new(6).unwrap();
        for n in [1u64, 2, 40] {
            t.insert(k(n), k(n)).unwrap();
        }
        let nodes = t.publishable_nodes();
        assert!(nodes.iter().any(|(h, _)| *h == t.root()));
        for (hash, node) in nodes {
            assert_eq!(node.hash(), hash);
        }
    }

    proptest! {
        #[test]
        fn every_inserted_key_has_a_valid_proof(keys in proptest::collection::btree_set(any::<u32>(), 1..24)) {
            let mut t = SparseMerkleTree::new(MAX_DEPTH).unwrap();
            for n in &keys {
                t.insert(k(u64::from(*n)), k(u64::from(*n) + 1)).unwrap();
            }
            let root = t.root();
            for n in &keys {
                let key = k(u64::from(*n));
                let proof = t.prove(&key);
                prop_assert!(proof.verify(&root, &key, Some(&k(u64::from(*n) + 1))));
            }
        }
    }
}
