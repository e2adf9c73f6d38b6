//! # Auth Handler
//!
//! Holder side of the authorization flow. One [`AuthAttempt`] per inbound
//! request:
//!
//! 1. unpack with the [`PackageManager`] and validate the auth request,
//! 2. derive the challenge and build one [`CircuitQuery`] per proof,
//! 3. prove every query, concurrently,
//! 4. reply in the request's thread with the proofs as `body.scope`,
//!    packed proof-carrying,
//! 5. return the envelope bytes.
//!
//! Proof Service errors propagate unchanged. Nothing is packed unless every
//! proof was generated.

use std::sync::Arc;

use url::Url;
use zkid_core::{Did, MediaType, MessageType};
use zkid_identity::{Credential, CredentialWallet};
use zkid_pack::{PackParams, PackageManager, ProvingMethod};
use zkid_zkp::{CircuitId, CircuitQuery, ProofEnvelope, ProofService};

use crate::error::AuthError;
use crate::message::{AuthorizationRequest, AuthorizationResponseBody};
use crate::phase::{AuthPhase, PhaseTracker};

/// Outcome of a successful attempt.
#[derive(Debug, Clone)]
pub struct AuthResponse {
    /// Proof-carrying response envelope.
    pub envelope: Vec<u8>,
    /// Where to deliver it.
    pub callback_url: Url,
    /// Thread of the request.
    pub thread_id: String,
}

/// Answers auth requests on behalf of one holder identity.
pub struct AuthHandler {
    identity: Did,
    packages: Arc<PackageManager>,
    proofs: Arc<ProofService>,
    wallet: CredentialWallet,
    proving_method: ProvingMethod,
}

impl AuthHandler {
    /// Handler for `identity`. `proving_method` selects the envelope proof
    /// and must be registered with the manager's proof-carrying packer.
    pub fn new(
        identity: Did,
        packages: Arc<PackageManager>,
        proofs: Arc<ProofService>,
        wallet: CredentialWallet,
        proving_method: ProvingMethod,
    ) -> Self {
        Self {
            identity,
            packages,
            proofs,
            wallet,
            proving_method,
        }
    }

    /// The holder this handler answers for.
    pub fn identity(&self) -> &Did {
        &self.identity
    }

    /// A fresh attempt.
    pub fn attempt(&self) -> AuthAttempt<'_> {
        AuthAttempt {
            handler: self,
            phases: PhaseTracker::new(),
        }
    }

    /// Run a fresh attempt on `envelope`.
    pub async fn handle_request(&self, envelope: &[u8]) -> Result<AuthResponse, AuthError> {
        self.attempt().run(envelope).await
    }

    fn select_credential(&self, scope: u32, query: &CircuitQuery) -> Result<Credential, AuthError> {
        let schema = query.schema.as_deref().unwrap_or_default();
        let candidates = self
            .wallet
            .find_by_query(&self.identity, schema, query.credential_type.as_deref());
        candidates
            .into_iter()
            .find(|c| {
                query.predicate.as_ref().map_or(true, |p| {
                    p.operator.evaluate(c.credential_subject.get(&p.field), &p.value)
                })
            })
            .ok_or(AuthError::NoMatchingCredential { scope })
    }
}

/// One single-use run of the authorization flow.
pub struct AuthAttempt<'a> {
    handler: &'a AuthHandler,
    phases: PhaseTracker,
}

impl AuthAttempt<'_> {
    /// Current phase.
    pub fn phase(&self) -> AuthPhase {
        self.phases.phase()
    }

    /// Phases visited so far, starting with RECEIVED.
    pub fn transitions(&self) -> &[AuthPhase] {
        self.phases.log()
    }

    /// Drive the attempt to DONE or ERRORED. An attempt runs once.
    pub async fn run(&mut self, envelope: &[u8]) -> Result<AuthResponse, AuthError> {
        if self.phases.phase() != AuthPhase::Received {
            return Err(AuthError::InvalidTransition {
                from: self.phases.phase(),
                to: AuthPhase::Parsed,
            });
        }
        match self.steps(envelope).await {
            Ok(response) => Ok(response),
            Err(e) => {
                tracing::warn!(
                    did = %self.handler.identity,
                    phase = %self.phases.phase(),
                    error = %e,
                    "auth attempt failed"
                );
                self.phases.advance(AuthPhase::Errored)?;
                Err(e)
            }
        }
    }

    async fn steps(&mut self, envelope: &[u8]) -> Result<AuthResponse, AuthError> {
        let handler = self.handler;

        let unpacked = handler.packages.unpack(envelope).await?;
        let request = AuthorizationRequest::parse(unpacked.message)?;
        self.phases.advance(AuthPhase::Parsed)?;

        let mut work: Vec<(CircuitQuery, Option<Credential>)> = Vec::new();
        for (scope, query) in request.circuit_queries()? {
            let credential = match (scope, query.circuit_id) {
                (Some(id), CircuitId::CredentialAtomicQuery) => {
                    Some(handler.select_credential(id, &query)?)
                }
                _ => None,
            };
            work.push((query, credential));
        }
        self.phases.advance(AuthPhase::ProofRequested)?;

        let did = &handler.identity;
        let proofs: Vec<ProofEnvelope> =
            futures::future::try_join_all(work.iter().map(|(query, credential)| async move {
                match credential {
                    Some(c) => handler.proofs.generate_credential_proof(did, c, query).await,
                    None => handler.proofs.generate_auth_proof(did, query.challenge).await,
                }
            }))
            .await?;
        self.phases.advance(AuthPhase::ProofReady)?;

        let body = serde_json::to_value(AuthorizationResponseBody {
            message: request.body.message.clone(),
            scope: proofs,
        })
        .map_err(|e| AuthError::MalformedMessage(e.to_string()))?;
        let mut response =
            request
                .message
                .reply(MessageType::AuthorizationResponse, did.to_string(), body);
        response.typ = Some(MediaType::ZkpMessage);
        let payload = response
            .to_bytes()
            .map_err(|e| AuthError::MalformedMessage(e.to_string()))?;
        let envelope = handler
            .packages
            .pack(
                MediaType::ZkpMessage,
                &payload,
                &PackParams::zkp(did.clone(), handler.proving_method),
            )
            .await?;
        self.phases.advance(AuthPhase::Packed)?;

        let thread_id = response.thread_id().to_string();
        self.phases.advance(AuthPhase::Done)?;
        tracing::info!(
            did = %did,
            thread = %thread_id,
            proofs = work.len(),
            callback = %request.callback_url,
            "answered auth request"
        );
        Ok(AuthResponse {
            envelope,
            callback_url: request.callback_url,
            thread_id,
        })
    }
}
