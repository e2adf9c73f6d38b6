//! Relying-party verification of `auth-response` envelopes.

use std::sync::Arc;

use zkid_core::{Did, Hash256, MediaType, MessageType, ProtocolMessage};
use zkid_identity::claim::schema_hash;
use zkid_pack::PackageManager;
use zkid_zkp::{CircuitId, CircuitQuery, ProofEnvelope, ProofService, QueryOperator};

use crate::error::AuthError;
use crate::message::{AuthorizationRequest, AuthorizationResponseBody};

/// A response that answers its request.
#[derive(Debug, Clone, PartialEq)]
pub struct VerifiedAuthorization {
    /// Authenticated holder.
    pub sender: Did,
    /// Thread of the exchange.
    pub thread_id: String,
    /// The response message.
    pub message: ProtocolMessage,
    /// Verified proofs, authentication first.
    pub proofs: Vec<ProofEnvelope>,
}

/// Checks responses to auth requests this relying party sent.
pub struct AuthVerifier {
    packages: Arc<PackageManager>,
    proofs: Arc<ProofService>,
}

impl AuthVerifier {
    /// Verifier unpacking with `packages` and checking proofs with `proofs`.
    pub fn new(packages: Arc<PackageManager>, proofs: Arc<ProofService>) -> Self {
        Self { packages, proofs }
    }

    /// Verify that `envelope` is a proof-carrying answer to `request`: same
    /// thread, every requested proof present in order, each proof valid for
    /// the envelope's sender and the request's challenge. Credential proofs
    /// must also be made against the issuer's current state, so a proof
    /// predating a revocation the issuer has since published is rejected.
    pub async fn verify_authorization_response(
        &self,
        request: &ProtocolMessage,
        envelope: &[u8],
    ) -> Result<VerifiedAuthorization, AuthError> {
        let request = AuthorizationRequest::parse(request.clone())?;
        let unpacked = self.packages.unpack(envelope).await?;
        let mismatch = |what: String| AuthError::ResponseMismatch(what);

        let sender = match (unpacked.metadata.media_type, unpacked.metadata.sender) {
            (MediaType::ZkpMessage, Some(sender)) => sender,
            _ => return Err(mismatch("response is not proof-carrying".into())),
        };
        let message = unpacked.message;
        if message.kind().ok() != Some(MessageType::AuthorizationResponse) {
            return Err(mismatch(format!("unexpected type {}", message.message_type)));
        }
        if message.thread_id() != request.message.thread_id() {
            return Err(mismatch(format!(
                "thread {} does not answer {}",
                message.thread_id(),
                request.message.thread_id()
            )));
        }
        if message.to.is_some() && message.to != request.message.from {
            return Err(mismatch("response is addressed to someone else".into()));
        }

        let body: AuthorizationResponseBody = serde_json::from_value(message.body.clone())
            .map_err(|e| AuthError::MalformedMessage(format!("response body: {e}")))?;
        let queries = request.circuit_queries()?;
        if body.scope.len() != queries.len() {
            return Err(mismatch(format!(
                "expected {} proofs, got {}",
                queries.len(),
                body.scope.len()
            )));
        }

        let challenge = request.challenge();
        for ((_, query), proof) in queries.iter().zip(&body.scope) {
            if proof.circuit_id != query.circuit_id {
                return Err(mismatch(format!(
                    "expected a {} proof, got {}",
                    query.circuit_id, proof.circuit_id
                )));
            }
            self.proofs
                .verify_authentication(&sender, &challenge, proof)
                .await?;
            if query.circuit_id == CircuitId::CredentialAtomicQuery {
                let (issuer, issuer_state) = check_query_signals(query, proof)?;
                // Non-revocation was proven against this issuer state.
                self.proofs.verify_state(&issuer, &issuer_state).await?;
            }
        }

        tracing::info!(sender = %sender, thread = %message.thread_id(), "verified auth response");
        Ok(VerifiedAuthorization {
            sender,
            thread_id: message.thread_id().to_string(),
            proofs: body.scope,
            message,
        })
    }
}

// Signals 5..8 of a credential proof commit to the schema and predicate.
// Returns the issuer and the issuer state of signals 3 and 4.
fn check_query_signals(
    query: &CircuitQuery,
    proof: &ProofEnvelope,
) -> Result<(Did, Hash256), AuthError> {
    let [_, _, _, issuer, issuer_state, schema, operator, value] = proof.pub_signals.as_slice()
    else {
        return Err(AuthError::ResponseMismatch(format!(
            "credential proof has {} signals",
            proof.pub_signals.len()
        )));
    };
    if let Some(requested) = &query.schema {
        if *schema != schema_hash(requested) {
            return Err(AuthError::ResponseMismatch("proof is for another schema".into()));
        }
    }
    let (expected_op, expected_value) = match &query.predicate {
        Some(p) => (
            p.operator,
            p.value_hash()
                .map_err(|e| AuthError::MalformedMessage(format!("predicate operand: {e}")))?,
        ),
        None => (QueryOperator::Noop, Hash256::ZERO),
    };
    if *operator != Hash256::from_u64(expected_op.code()) || *value != expected_value {
        return Err(AuthError::ResponseMismatch(
            "proof does not prove the requested predicate".into(),
        ));
    }
    let issuer = Did::from_id_hash(issuer)
        .map_err(|e| AuthError::ResponseMismatch(format!("issuer signal: {e}")))?;
    Ok((issuer, *issuer_state))
}
