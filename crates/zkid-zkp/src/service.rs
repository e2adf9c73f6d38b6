//! # Proof Service
//!
//! Builds circuit witnesses from identity state and credentials, proves them
//! on the [`ProverPool`] and verifies proofs and state claims.
//!
//! ## Consistency
//!
//! Every witness is assembled from ONE [`IdentitySnapshot`]: the state root,
//! the auth claim inclusion proof and the non-revocation proof always agree,
//! whatever mutations run concurrently.
//!
//! [`IdentitySnapshot`]: zkid_identity::IdentitySnapshot

use std::sync::Arc;
use std::time::Duration;

use zkid_core::{Did, Hash256};
use zkid_identity::{Credential, IdentityStore, StateStorage};
use zkid_status::{ResolverRegistry, StatusError, StatusRequest};

use crate::circuits::{
    AuthCircuit, AuthWitness, CircuitId, CircuitQuery, CredentialAtomicQueryCircuit,
};
use crate::error::{ProofServiceError, VerifyError};
use crate::loader::CircuitLoader;
use crate::prover::{ProofEnvelope, ProverPool, ProverPoolConfig};
use crate::storage::CircuitStorage;
use crate::traits::ProofSystem;

/// Whether an identity that never published a state may present its genesis
/// state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GenesisPolicy {
    /// Accept the genesis state the DID was derived from.
    #[default]
    Allow,
    /// Accept published states only.
    Deny,
}

/// Proof Service configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProofServiceConfig {
    /// Genesis fallback in [`ProofService::verify_state`].
    pub genesis: GenesisPolicy,
    /// Upper bound on revocation status resolution, retries included.
    pub status_timeout: Duration,
    /// Prover pool sizing.
    pub prover: ProverPoolConfig,
}

impl Default for ProofServiceConfig {
    fn default() -> Self {
        Self {
            genesis: GenesisPolicy::Allow,
            status_timeout: Duration::from_secs(30),
            prover: ProverPoolConfig::default(),
        }
    }
}

/// Proof generation and verification.
pub struct ProofService {
    identities: Arc<IdentityStore>,
    resolvers: Arc<ResolverRegistry>,
    states: Arc<dyn StateStorage>,
    loader: CircuitLoader,
    pool: ProverPool,
    config: ProofServiceConfig,
}

impl ProofService {
    /// Wire a proof service.
    pub fn new(
        identities: Arc<IdentityStore>,
        resolvers: Arc<ResolverRegistry>,
        states: Arc<dyn StateStorage>,
        circuits: Arc<dyn CircuitStorage>,
        system: Arc<dyn ProofSystem>,
        config: ProofServiceConfig,
    ) -> Self {
        Self {
            identities,
            resolvers,
            states,
            loader: CircuitLoader::new(circuits),
            pool: ProverPool::new(system, config.prover),
            config,
        }
    }

    /// Algorithm tag of the proof backend.
    pub fn algorithm(&self) -> &'static str {
        self.pool.system().algorithm()
    }

    /// The identity store proofs are generated from.
    pub fn identities(&self) -> &Arc<IdentityStore> {
        &self.identities
    }

    /// Active configuration.
    pub fn config(&self) -> &ProofServiceConfig {
        &self.config
    }

    fn auth_witness(&self, did: &Did, challenge: Hash256) -> Result<AuthWitness, ProofServiceError> {
        let snapshot = self.identities.snapshot(did)?;
        let auth_claim = self.identities.auth_claim(did)?;
        let key = self.identities.auth_key(did)?;
        let kms = self.identities.kms();
        let h_index = auth_claim.h_index()?;
        Ok(AuthWitness {
            user_id: did.clone(),
            challenge,
            state: snapshot.state(),
            claim_mtp: snapshot.claim_proof(&h_index),
            non_rev_mtp: snapshot.revocation_proof(auth_claim.revocation_nonce),
            public_key: kms.public_key(&key)?,
            signature: kms.sign(&key, &challenge)?,
            auth_claim,
        })
    }

    /// Prove that `did` controls its authentication key, bound to
    /// `challenge`.
    ///
    /// Public signals: `[user_id, challenge, user_state]`.
    pub async fn generate_auth_proof(
        &self,
        did: &Did,
        challenge: Hash256,
    ) -> Result<ProofEnvelope, ProofServiceError> {
        let data = self.loader.load(CircuitId::AuthV2).await?;
        let witness = self.auth_witness(did, challenge)?;
        let envelope = self.pool.prove(AuthCircuit(witness), data).await?;
        tracing::info!(did = %did, circuit = %CircuitId::AuthV2, "generated auth proof");
        Ok(envelope)
    }

    /// Prove possession of a non-revoked `credential` satisfying `query`.
    ///
    /// Resolves the credential's current revocation status first; a revoked
    /// credential fails with [`ProofServiceError::RevokedCredential`]
    /// before any proving.
    pub async fn generate_credential_proof(
        &self,
        did: &Did,
        credential: &Credential,
        query: &CircuitQuery,
    ) -> Result<ProofEnvelope, ProofServiceError> {
        if query.circuit_id != CircuitId::CredentialAtomicQuery {
            return Err(ProofServiceError::InvalidQuery(format!(
                "{} is not a credential circuit",
                query.circuit_id
            )));
        }
        if !query.accepts(credential) {
            return Err(ProofServiceError::InvalidQuery(format!(
                "credential {} does not match the requested schema or type",
                credential.id
            )));
        }

        let request = StatusRequest::for_credential(credential);
        let strategy = request.status.strategy;
        let status = tokio::time::timeout(self.config.status_timeout, self.resolvers.resolve(&request))
            .await
            .map_err(|_| StatusError::ResolutionUnavailable {
                strategy,
                reason: format!("timed out after {:?}", self.config.status_timeout),
            })??;
        if status.is_revoked() {
            tracing::warn!(did = %did, credential = %credential.id, "refusing to prove a revoked credential");
            return Err(ProofServiceError::RevokedCredential {
                credential: credential.id.clone(),
                nonce: credential.credential_status.revocation_nonce,
            });
        }

        let data = self.loader.load(CircuitId::CredentialAtomicQuery).await?;
        let auth = self.auth_witness(did, query.challenge)?;
        let circuit = CredentialAtomicQueryCircuit::new(
            auth,
            credential,
            query,
            status,
            chrono::Utc::now().timestamp(),
        )?;
        let envelope = self.pool.prove(circuit, data).await?;
        tracing::info!(
            did = %did,
            credential = %credential.id,
            circuit = %CircuitId::CredentialAtomicQuery,
            "generated credential proof"
        );
        Ok(envelope)
    }

    /// Check that `claimed` is an acceptable current state of `did`.
    ///
    /// Accepts the latest published root. An identity that never published
    /// is accepted with its genesis root when the [`GenesisPolicy`] allows.
    /// Anything else is [`ProofServiceError::StateVerification`].
    pub async fn verify_state(&self, did: &Did, claimed: &Hash256) -> Result<bool, ProofServiceError> {
        let reject = |reason: String| ProofServiceError::StateVerification {
            did: did.to_string(),
            reason,
        };
        match self.states.latest_state(did).await? {
            Some(latest) if latest == *claimed => Ok(true),
            Some(latest) => Err(reject(format!(
                "claimed state {claimed} is not the latest published state {latest}"
            ))),
            None => match self.config.genesis {
                GenesisPolicy::Allow if did.matches_genesis(claimed) => {
                    tracing::debug!(did = %did, "accepted genesis state");
                    Ok(true)
                }
                GenesisPolicy::Allow => Err(reject(format!(
                    "no published state and {claimed} is not the genesis state"
                ))),
                GenesisPolicy::Deny => Err(reject("no published state".into())),
            },
        }
    }

    /// Verify a proof against its circuit's verification key.
    pub async fn verify_proof(&self, envelope: &ProofEnvelope) -> Result<(), ProofServiceError> {
        let data = self.loader.load(envelope.circuit_id).await?;
        self.pool.system().verify(
            envelope.circuit_id,
            &data.verification_key,
            &envelope.proof,
            &envelope.pub_signals,
        )?;
        Ok(())
    }

    /// Verify that `envelope` authenticates `did` for `challenge`: the proof
    /// verifies, its signals name `did` and `challenge`, and the user state
    /// it proves against is acceptable.
    pub async fn verify_authentication(
        &self,
        did: &Did,
        challenge: &Hash256,
        envelope: &ProofEnvelope,
    ) -> Result<(), ProofServiceError> {
        self.verify_proof(envelope).await?;
        let invalid = |what: &str| {
            ProofServiceError::ProofVerification(VerifyError::InvalidProof(what.to_string()))
        };
        let [user_id, signed, user_state, ..] = envelope.pub_signals.as_slice() else {
            return Err(invalid("too few public signals"));
        };
        if *user_id != did.id_hash() {
            return Err(invalid("proof is for another identity"));
        }
        if signed != challenge {
            return Err(invalid("proof is bound to another challenge"));
        }
        self.verify_state(did, user_state).await?;
        Ok(())
    }
}
