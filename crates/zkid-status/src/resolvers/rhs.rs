//! # Reverse Hash Service
//!
//! Issuers publish the preimage of every node of their revocation tree, and
//! of their state root, to a reverse hash service (RHS). A verifier that
//! knows only the issuer's latest state can then rebuild a revocation proof
//! by walking from the state down to the nonce's leaf:
//!
//! ```text
//! state ──▶ (claims_root, revocation_root, roots_root)
//! revocation_root ──▶ (left, right) ──▶ ... ──▶ leaf (key, value) | empty
//! ```
//!
//! The latest state comes from [`StateStorage`]. An issuer that never
//! published falls back to the state recorded in the credential, but only
//! if the issuer's DID was derived from it.
//!
//! ## Wire format
//!
//! - `GET  {base}/node/{hash}` returns `{"node": {"hash": .., "kind": .., ..}}`
//!   or 404.
//! - `POST {base}/node` with a JSON array of nodes.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use zkid_core::Hash256;
use zkid_crypto::smt::leaf_index;
use zkid_crypto::{MerkleProof, NodeAux, RhsNode, DEFAULT_DEPTH};
use zkid_identity::{nonce_key, IdentitySnapshot, IdentityState, RevocationStatus, StateStorage};

use super::{http_client, parse_url, read_json, DEFAULT_HTTP_TIMEOUT};
use crate::error::BackendError;
use crate::registry::{CredentialStatusResolver, StatusRequest};

/// A node preimage stored on the RHS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RhsRecord {
    /// Identity state node.
    State(StateNode),
    /// Revocation tree node.
    Tree(RhsNode),
}

/// Preimage of an identity state root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind", rename = "state")]
pub struct StateNode {
    /// Claims tree root.
    pub claims_root: Hash256,
    /// Revocation tree root.
    pub revocation_root: Hash256,
    /// Roots tree root.
    pub roots_root: Hash256,
}

impl RhsRecord {
    /// The hash this record is the preimage of.
    pub fn hash(&self) -> Hash256 {
        match self {
            Self::State(s) => {
                IdentityState::from_roots(s.claims_root, s.revocation_root, s.roots_root).state
            }
            Self::Tree(n) => n.hash(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct WireNode {
    hash: Hash256,
    #[serde(flatten)]
    record: RhsRecord,
}

#[derive(Debug, Deserialize)]
struct NodeResponse {
    node: WireNode,
}

/// Node lookup and publication.
#[async_trait]
pub trait ReverseHashService: Send + Sync {
    /// Preimage of `hash`, or `None` if unknown.
    async fn get_node(&self, hash: &Hash256) -> Result<Option<RhsRecord>, BackendError>;

    /// Store preimages.
    async fn save_nodes(&self, nodes: Vec<RhsRecord>) -> Result<(), BackendError>;
}

/// Publish `snapshot`'s state node and every revocation tree node.
pub async fn publish_to_rhs(
    rhs: &dyn ReverseHashService,
    snapshot: &IdentitySnapshot,
) -> Result<(), BackendError> {
    let state = snapshot.state();
    let mut nodes = vec![RhsRecord::State(StateNode {
        claims_root: state.claims_root,
        revocation_root: state.revocation_root,
        roots_root: state.roots_root,
    })];
    nodes.extend(
        snapshot
            .revocation_tree()
            .publishable_nodes()
            .into_iter()
            .map(|(_, node)| RhsRecord::Tree(node)),
    );
    tracing::debug!(did = %snapshot.did(), nodes = nodes.len(), "publishing to reverse hash service");
    rhs.save_nodes(nodes).await
}

/// Process-local RHS.
#[derive(Debug, Default)]
pub struct InMemoryReverseHashService {
    nodes: RwLock<HashMap<Hash256, RhsRecord>>,
}

impl InMemoryReverseHashService {
    /// Empty service.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored nodes.
    pub fn len(&self) -> usize {
        self.nodes.read().len()
    }

    /// Whether no nodes are stored.
    pub fn is_empty(&self) -> bool {
        self.nodes.read().is_empty()
    }
}

#[async_trait]
impl ReverseHashService for InMemoryReverseHashService {
    async fn get_node(&self, hash: &Hash256) -> Result<Option<RhsRecord>, BackendError> {
        Ok(self.nodes.read().get(hash).copied())
    }

    async fn save_nodes(&self, nodes: Vec<RhsRecord>) -> Result<(), BackendError> {
        let mut map = self.nodes.write();
        for node in nodes {
            map.insert(node.hash(), node);
        }
        Ok(())
    }
}

/// RHS over HTTP.
#[derive(Debug, Clone)]
pub struct HttpReverseHashService {
    base: url::Url,
    http: reqwest::Client,
}

impl HttpReverseHashService {
    /// Client for the service at `base`.
    pub fn new(base: url::Url) -> Result<Self, BackendError> {
        Self::with_timeout(base, DEFAULT_HTTP_TIMEOUT)
    }

    /// Client with a custom timeout.
    pub fn with_timeout(base: url::Url, timeout: Duration) -> Result<Self, BackendError> {
        Ok(Self {
            base,
            http: http_client(timeout)?,
        })
    }

    fn endpoint(&self, path: &str) -> Result<url::Url, BackendError> {
        let base = self.base.as_str().trim_end_matches('/');
        parse_url(&format!("{base}/{path}"))
    }
}

#[async_trait]
impl ReverseHashService for HttpReverseHashService {
    async fn get_node(&self, hash: &Hash256) -> Result<Option<RhsRecord>, BackendError> {
        let url = self.endpoint(&format!("node/{hash}"))?;
        let resp = self.http.get(url).send().await?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let body: NodeResponse = read_json(resp).await?;
        if body.node.hash != *hash || body.node.record.hash() != *hash {
            return Err(BackendError::Permanent(format!(
                "RHS returned a node that does not hash to {hash}"
            )));
        }
        Ok(Some(body.node.record))
    }

    async fn save_nodes(&self, nodes: Vec<RhsRecord>) -> Result<(), BackendError> {
        let url = self.endpoint("node")?;
        let wire: Vec<WireNode> = nodes
            .into_iter()
            .map(|record| WireNode {
                hash: record.hash(),
                record,
            })
            .collect();
        let resp = self.http.post(url).json(&wire).send().await?;
        let status = resp.status();
        if status.is_server_error() {
            return Err(BackendError::Transient(format!("HTTP {status}")));
        }
        if !status.is_success() {
            return Err(BackendError::Permanent(format!("HTTP {status}")));
        }
        Ok(())
    }
}

/// Resolver for `Iden3ReverseSparseMerkleTreeProof` statuses.
pub struct RhsResolver {
    rhs: Arc<dyn ReverseHashService>,
    states: Arc<dyn StateStorage>,
    depth: usize,
}

impl RhsResolver {
    /// Resolver over an RHS and a state storage, for trees of the default
    /// depth.
    pub fn new(rhs: Arc<dyn ReverseHashService>, states: Arc<dyn StateStorage>) -> Self {
        Self {
            rhs,
            states,
            depth: DEFAULT_DEPTH,
        }
    }

    /// Override the expected tree depth.
    pub fn with_depth(mut self, depth: usize) -> Self {
        self.depth = depth;
        self
    }

    async fn fetch(&self, hash: &Hash256) -> Result<RhsRecord, BackendError> {
        self.rhs
            .get_node(hash)
            .await?
            .ok_or_else(|| BackendError::Permanent(format!("RHS has no node {hash}")))
    }

    async fn issuer_roots(&self, request: &StatusRequest) -> Result<IdentityState, BackendError> {
        if let Some(state) = self.states.latest_state(&request.issuer).await? {
            return match self.fetch(&state).await? {
                RhsRecord::State(s) => Ok(IdentityState::from_roots(
                    s.claims_root,
                    s.revocation_root,
                    s.roots_root,
                )),
                other => Err(BackendError::Permanent(format!(
                    "expected a state node for {state}, got {other:?}"
                ))),
            };
        }
        match request.issuer_state_hint {
            Some(hint) if hint.is_consistent() && request.issuer.matches_genesis(&hint.state) => {
                tracing::debug!(issuer = %request.issuer, "no published state, using genesis");
                Ok(hint)
            }
            _ => Err(BackendError::Permanent(format!(
                "issuer {} has no published state",
                request.issuer
            ))),
        }
    }

    async fn walk(&self, revocation_root: Hash256, nonce: u64) -> Result<MerkleProof, BackendError> {
        let key = nonce_key(nonce);
        let index = leaf_index(&key, self.depth);
        let mut siblings = Vec::with_capacity(self.depth);
        let mut current = revocation_root;

        for level in (0..self.depth).rev() {
            if current.is_zero() {
                siblings.push(Hash256::ZERO);
                continue;
            }
            match self.fetch(&current).await? {
                RhsRecord::Tree(RhsNode::Middle { left, right }) => {
                    if (index >> level) & 1 == 0 {
                        siblings.push(right);
                        current = left;
                    } else {
                        siblings.push(left);
                        current = right;
                    }
                }
                other => {
                    return Err(BackendError::Permanent(format!(
                        "expected an internal node at level {level}, got {other:?}"
                    )))
                }
            }
        }
        siblings.reverse();

        if current.is_zero() {
            return Ok(MerkleProof {
                existence: false,
                siblings,
                node_aux: None,
            });
        }
        match self.fetch(&current).await? {
            RhsRecord::Tree(RhsNode::Leaf { key: k, .. }) if k == key => Ok(MerkleProof {
                existence: true,
                siblings,
                node_aux: None,
            }),
            RhsRecord::Tree(RhsNode::Leaf { key: k, value }) => Ok(MerkleProof {
                existence: false,
                siblings,
                node_aux: Some(NodeAux { key: k, value }),
            }),
            other => Err(BackendError::Permanent(format!(
                "expected a leaf, got {other:?}"
            ))),
        }
    }
}

#[async_trait]
impl CredentialStatusResolver for RhsResolver {
    async fn resolve(&self, request: &StatusRequest) -> Result<RevocationStatus, BackendError> {
        let issuer = self.issuer_roots(request).await?;
        let mtp = self
            .walk(issuer.revocation_root, request.status.revocation_nonce)
            .await?;
        Ok(RevocationStatus { issuer, mtp })
    }
}
