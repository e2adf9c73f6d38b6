//! # On-chain Status
//!
//! The status id names the state contract as a query parameter:
//!
//! ```text
//! did:iden3:polygon:amoy:...?contractAddress=80002:0x1a4c...&revocationNonce=7
//! ```
//!
//! The resolver reads the issuer's latest state and a revocation proof from
//! a [`ChainStateAdapter`] bound to that contract. Talking to an actual node
//! is the adapter's business; [`InMemoryChainState`] stands in for one.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use zkid_core::{Did, Hash256};
use zkid_crypto::{MerkleProof, DEFAULT_DEPTH};
use zkid_identity::{IdentitySnapshot, IdentityState, RevocationStatus};

use crate::error::BackendError;
use crate::registry::{CredentialStatusResolver, StatusRequest};

/// Contract coordinates parsed from a status id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OnChainStatusId {
    /// EIP-155 chain id.
    pub chain_id: u64,
    /// Contract address, lowercase hex with `0x`.
    pub contract: String,
}

impl OnChainStatusId {
    /// Parse the `contractAddress=<chainId>:<address>` parameter.
    pub fn parse(id: &str) -> Result<Self, BackendError> {
        let query = id
            .split_once('?')
            .map(|(_, q)| q)
            .ok_or_else(|| BackendError::Permanent(format!("status id {id:?} has no query")))?;
        let value = query
            .split('&')
            .find_map(|kv| kv.strip_prefix("contractAddress="))
            .ok_or_else(|| {
                BackendError::Permanent(format!("status id {id:?} has no contractAddress"))
            })?;
        let (chain, address) = value.split_once(':').ok_or_else(|| {
            BackendError::Permanent(format!("contractAddress {value:?} is not <chainId>:<address>"))
        })?;
        let chain_id = chain
            .parse()
            .map_err(|_| BackendError::Permanent(format!("invalid chain id {chain:?}")))?;
        let hex = address.strip_prefix("0x").unwrap_or(address);
        if hex.len() != 40 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(BackendError::Permanent(format!(
                "invalid contract address {address:?}"
            )));
        }
        Ok(Self {
            chain_id,
            contract: format!("0x{}", hex.to_ascii_lowercase()),
        })
    }
}

/// Read access to a state contract.
#[async_trait]
pub trait ChainStateAdapter: Send + Sync {
    /// Chain the adapter talks to.
    fn chain_id(&self) -> u64;

    /// Contract address, lowercase hex with `0x`.
    fn contract(&self) -> &str;

    /// Latest state the issuer committed, if any.
    async fn latest_state(&self, issuer: &Did) -> Result<Option<IdentityState>, BackendError>;

    /// Revocation proof for `nonce` against a committed issuer state.
    async fn revocation_proof(
        &self,
        issuer: &Did,
        state: &Hash256,
        nonce: u64,
    ) -> Result<MerkleProof, BackendError>;
}

/// Process-local state contract.
pub struct InMemoryChainState {
    chain_id: u64,
    contract: String,
    // issuer -> committed snapshots, oldest first
    commits: RwLock<HashMap<Did, Vec<Arc<IdentitySnapshot>>>>,
}

impl InMemoryChainState {
    /// Empty contract at `contract` on `chain_id`.
    pub fn new(chain_id: u64, contract: &str) -> Self {
        Self {
            chain_id,
            contract: contract.to_ascii_lowercase(),
            commits: RwLock::new(HashMap::new()),
        }
    }

    /// Commit an issuer snapshot.
    pub fn commit(&self, snapshot: Arc<IdentitySnapshot>) {
        tracing::debug!(did = %snapshot.did(), state = %snapshot.state().state, "committing state on chain");
        self.commits
            .write()
            .entry(snapshot.did().clone())
            .or_default()
            .push(snapshot);
    }

    /// Status id pointing at this contract.
    pub fn status_id(&self, issuer: &Did) -> String {
        format!("{issuer}/credentialStatus?contractAddress={}:{}", self.chain_id, self.contract)
    }
}

#[async_trait]
impl ChainStateAdapter for InMemoryChainState {
    fn chain_id(&self) -> u64 {
        self.chain_id
    }

    fn contract(&self) -> &str {
        &self.contract
    }

    async fn latest_state(&self, issuer: &Did) -> Result<Option<IdentityState>, BackendError> {
        Ok(self
            .commits
            .read()
            .get(issuer)
            .and_then(|c| c.last())
            .map(|s| s.state()))
    }

    async fn revocation_proof(
        &self,
        issuer: &Did,
        state: &Hash256,
        nonce: u64,
    ) -> Result<MerkleProof, BackendError> {
        self.commits
            .read()
            .get(issuer)
            .and_then(|c| c.iter().rev().find(|s| s.state().state == *state))
            .map(|s| s.revocation_proof(nonce))
            .ok_or_else(|| {
                BackendError::Permanent(format!("state {state} is not committed for {issuer}"))
            })
    }
}

/// Resolver for `Iden3OnchainSparseMerkleTreeProof2023` statuses.
pub struct OnChainResolver {
    chain: Arc<dyn ChainStateAdapter>,
    depth: usize,
}

impl OnChainResolver {
    /// Resolver over one contract.
    pub fn new(chain: Arc<dyn ChainStateAdapter>) -> Self {
        Self {
            chain,
            depth: DEFAULT_DEPTH,
        }
    }

    /// Depth of the empty revocation proof produced for genesis issuers.
    pub fn with_depth(mut self, depth: usize) -> Self {
        self.depth = depth;
        self
    }
}

#[async_trait]
impl CredentialStatusResolver for OnChainResolver {
    async fn resolve(&self, request: &StatusRequest) -> Result<RevocationStatus, BackendError> {
        let target = OnChainStatusId::parse(&request.status.id)?;
        if target.chain_id != self.chain.chain_id() || target.contract != self.chain.contract() {
            return Err(BackendError::Permanent(format!(
                "status points at {}:{}, resolver is bound to {}:{}",
                target.chain_id,
                target.contract,
                self.chain.chain_id(),
                self.chain.contract()
            )));
        }
        let nonce = request.status.revocation_nonce;

        if let Some(issuer) = self.chain.latest_state(&request.issuer).await? {
            let mtp = self
                .chain
                .revocation_proof(&request.issuer, &issuer.state, nonce)
                .await?;
            return Ok(RevocationStatus { issuer, mtp });
        }

        // Never committed: only the genesis state can be current, and its
        // revocation tree is empty.
        match request.issuer_state_hint {
            Some(hint)
                if hint.is_consistent()
                    && hint.revocation_root.is_zero()
                    && request.issuer.matches_genesis(&hint.state) =>
            {
                Ok(RevocationStatus {
                    issuer: hint,
                    mtp: MerkleProof {
                        existence: false,
                        siblings: vec![Hash256::ZERO; self.depth],
                        node_aux: None,
                    },
                })
            }
            _ => Err(BackendError::Permanent(format!(
                "issuer {} has no state on chain {}",
                request.issuer, target.chain_id
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONTRACT: &str = "0x1a4cC30f2aA0377b0c3bc9848766D90cb4404124";

    #[test]
    fn parses_contract_address() {
        let id = OnChainStatusId::parse(&format!(
            "did:iden3:polygon:amoy:x/credentialStatus?revocationNonce=1&contractAddress=80002:{CONTRACT}"
        ))
        .unwrap();
        assert_eq!(id.chain_id, 80_002);
        assert_eq!(id.contract, CONTRACT.to_ascii_lowercase());
    }

    #[test]
    fn rejects_malformed_ids() {
        for id in [
            "no-query",
            "x?revocationNonce=1",
            "x?contractAddress=0x1a4c",
            "x?contractAddress=amoy:0x1a4cC30f2aA0377b0c3bc9848766D90cb4404124",
            "x?contractAddress=80002:0xnothex",
        ] {
            assert!(OnChainStatusId::parse(id).is_err(), "{id}");
        }
    }
}
