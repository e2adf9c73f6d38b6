//! # Resolver Registry
//!
//! Typed map from [`StatusStrategy`] to resolver. Resolution applies the
//! registry's [`RetryPolicy`] (per-attempt timeout, bounded exponential
//! backoff on transient errors) and then checks the returned proof against
//! the nonce before handing it out.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use zkid_core::{with_retry, Did, RetryError, RetryPolicy};
use zkid_identity::{Credential, CredentialStatus, IdentityState, RevocationStatus, StatusStrategy};

use crate::error::{BackendError, StatusError};

/// Everything a resolver may need to locate a revocation status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusRequest {
    /// The credential's status pointer.
    pub status: CredentialStatus,
    /// Issuer of the credential.
    pub issuer: Did,
    /// Issuer state recorded in the credential, used when the issuer has
    /// never published a state.
    pub issuer_state_hint: Option<IdentityState>,
}

impl StatusRequest {
    /// Request for a held credential.
    pub fn for_credential(credential: &Credential) -> Self {
        Self {
            status: credential.credential_status.clone(),
            issuer: credential.issuer.clone(),
            issuer_state_hint: Some(credential.proof.issuer_state),
        }
    }
}

/// One revocation status backend.
#[async_trait]
pub trait CredentialStatusResolver: Send + Sync {
    /// Fetch the current status. Must not mutate any state.
    async fn resolve(&self, request: &StatusRequest) -> Result<RevocationStatus, BackendError>;
}

/// Proof that a resolver was registered. Pass it back to
/// [`ResolverRegistry::unregister`] to remove the resolver.
#[derive(Debug, PartialEq, Eq)]
pub struct ResolverHandle {
    strategy: StatusStrategy,
}

impl ResolverHandle {
    /// Strategy the resolver serves.
    pub fn strategy(&self) -> StatusStrategy {
        self.strategy
    }
}

/// Registry of resolvers.
pub struct ResolverRegistry {
    resolvers: RwLock<HashMap<StatusStrategy, Arc<dyn CredentialStatusResolver>>>,
    policy: RetryPolicy,
}

impl Default for ResolverRegistry {
    fn default() -> Self {
        Self::new(RetryPolicy::default())
    }
}

impl ResolverRegistry {
    /// Empty registry using `policy` for every resolution.
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            resolvers: RwLock::new(HashMap::new()),
            policy,
        }
    }

    /// Register a resolver for `strategy`.
    pub fn register(
        &self,
        strategy: StatusStrategy,
        resolver: Arc<dyn CredentialStatusResolver>,
    ) -> Result<ResolverHandle, StatusError> {
        if strategy == StatusStrategy::Unknown {
            return Err(StatusError::UnregisteredStrategy(strategy));
        }
        let mut resolvers = self.resolvers.write();
        if resolvers.contains_key(&strategy) {
            return Err(StatusError::DuplicateStrategy(strategy));
        }
        resolvers.insert(strategy, resolver);
        tracing::debug!(%strategy, "registered status resolver");
        Ok(ResolverHandle { strategy })
    }

    /// Remove a registered resolver.
    pub fn unregister(&self, handle: ResolverHandle) {
        self.resolvers.write().remove(&handle.strategy);
    }

    /// Whether a resolver serves `strategy`.
    pub fn is_registered(&self, strategy: StatusStrategy) -> bool {
        self.resolvers.read().contains_key(&strategy)
    }

    /// Resolve and verify the status of `request.status.revocation_nonce`.
    pub async fn resolve(&self, request: &StatusRequest) -> Result<RevocationStatus, StatusError> {
        let strategy = request.status.strategy;
        let resolver = self
            .resolvers
            .read()
            .get(&strategy)
            .cloned()
            .ok_or(StatusError::UnregisteredStrategy(strategy))?;

        let status = with_retry(&self.policy, "status.resolve", || resolver.resolve(request))
            .await
            .map_err(|e| match e {
                RetryError::Permanent(e) => StatusError::Backend {
                    strategy,
                    reason: e.to_string(),
                },
                RetryError::Exhausted { last, .. } => StatusError::ResolutionUnavailable {
                    strategy,
                    reason: last,
                },
            })?;

        let nonce = request.status.revocation_nonce;
        if !status.verify(nonce) {
            return Err(StatusError::InvalidProof { nonce });
        }
        tracing::debug!(
            %strategy,
            issuer = %request.issuer,
            nonce,
            revoked = status.is_revoked(),
            "resolved revocation status"
        );
        Ok(status)
    }
}
