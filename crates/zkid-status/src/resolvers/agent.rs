//! # Agent Status
//!
//! The holder asks the issuer's agent over the messaging protocol: a
//! `revocation-status-request` is POSTed to `credentialStatus.id` and the
//! agent answers, on the same thread, with a `revocation-status-response`
//! whose body is the [`RevocationStatus`].
//!
//! [`answer_status_request`] is the agent side of the exchange.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use zkid_core::{Did, MessageType, ProtocolMessage};
use zkid_identity::{IdentityStore, RevocationStatus};

use super::{http_client, parse_url, read_json, DEFAULT_HTTP_TIMEOUT};
use crate::error::BackendError;
use crate::registry::{CredentialStatusResolver, StatusRequest};

/// Body of a `revocation-status-request`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevocationStatusRequestBody {
    /// Nonce to look up.
    pub revocation_nonce: u64,
}

/// Resolver for `Iden3commRevocationStatusV1.0` statuses.
#[derive(Debug, Clone)]
pub struct AgentResolver {
    http: reqwest::Client,
    from: String,
}

impl AgentResolver {
    /// Resolver sending requests as `from`.
    pub fn new(from: &Did) -> Result<Self, BackendError> {
        Self::with_timeout(from, DEFAULT_HTTP_TIMEOUT)
    }

    /// Resolver with a custom HTTP timeout.
    pub fn with_timeout(from: &Did, timeout: Duration) -> Result<Self, BackendError> {
        Ok(Self {
            http: http_client(timeout)?,
            from: from.to_string(),
        })
    }
}

#[async_trait]
impl CredentialStatusResolver for AgentResolver {
    async fn resolve(&self, request: &StatusRequest) -> Result<RevocationStatus, BackendError> {
        let url = parse_url(&request.status.id)?;
        let body = serde_json::to_value(RevocationStatusRequestBody {
            revocation_nonce: request.status.revocation_nonce,
        })
        .map_err(|e| BackendError::Permanent(e.to_string()))?;
        let mut message = ProtocolMessage::new(MessageType::RevocationStatusRequest, self.from.clone(), body);
        message.to = Some(request.issuer.to_string());

        tracing::debug!(%url, thid = %message.thread_id(), "requesting revocation status from agent");
        let resp = self.http.post(url).json(&message).send().await?;
        let reply: ProtocolMessage = read_json(resp).await?;

        if reply.thid.as_deref() != Some(message.id.as_str()) {
            return Err(BackendError::Permanent(format!(
                "agent replied on thread {:?}, expected {}",
                reply.thid, message.id
            )));
        }
        match reply.kind() {
            Ok(MessageType::RevocationStatusResponse) => {}
            _ => {
                return Err(BackendError::Permanent(format!(
                    "agent replied with message type {:?}",
                    reply.message_type
                )))
            }
        }
        serde_json::from_value(reply.body)
            .map_err(|e| BackendError::Permanent(format!("malformed status body: {e}")))
    }
}

/// Answer a `revocation-status-request` addressed to an identity in `store`.
///
/// The reply carries the current revocation status of the requested nonce
/// and is correlated to the request's thread.
pub fn answer_status_request(
    store: &IdentityStore,
    request: &ProtocolMessage,
) -> Result<ProtocolMessage, BackendError> {
    match request.kind() {
        Ok(MessageType::RevocationStatusRequest) => {}
        _ => {
            return Err(BackendError::Permanent(format!(
                "not a revocation status request: {:?}",
                request.message_type
            )))
        }
    }
    let issuer = request
        .to
        .as_deref()
        .ok_or_else(|| BackendError::Permanent("request has no recipient".into()))
        .and_then(|to| Did::parse(to).map_err(|e| BackendError::Permanent(e.to_string())))?;
    let body: RevocationStatusRequestBody = serde_json::from_value(request.body.clone())
        .map_err(|e| BackendError::Permanent(format!("malformed request body: {e}")))?;
    let status = store
        .revocation_status(&issuer, body.revocation_nonce)
        .map_err(|e| BackendError::Permanent(e.to_string()))?;
    let body = serde_json::to_value(status).map_err(|e| BackendError::Permanent(e.to_string()))?;
    Ok(request.reply(MessageType::RevocationStatusResponse, issuer.to_string(), body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;
    use zkid_core::{Blockchain, DidMethod, NetworkId};
    use zkid_crypto::Kms;
    use zkid_identity::{IdentityOptions, RevocationOptions, StatusStrategy, TreeConfig};

    fn issuer_store() -> (IdentityStore, Did) {
        let store = IdentityStore::new(Arc::new(Kms::in_memory()), TreeConfig { depth: 16 });
        let (did, _) = store
            .create_identity(IdentityOptions {
                method: DidMethod::PolygonId,
                blockchain: Blockchain::Polygon,
                network: NetworkId::Amoy,
                revocation: RevocationOptions {
                    strategy: StatusStrategy::Agent,
                    id: "http://agent.local/status".into(),
                },
                seed: None,
            })
            .unwrap();
        (store, did)
    }

    #[test]
    fn answers_on_the_request_thread() {
        let (store, issuer) = issuer_store();
        store.apply_revocation(&issuer, 12).unwrap();
        let mut request = ProtocolMessage::new(
            MessageType::RevocationStatusRequest,
            "did:holder",
            json!({"revocationNonce": 12}),
        );
        request.to = Some(issuer.to_string());

        let reply = answer_status_request(&store, &request).unwrap();
        assert_eq!(reply.thid.as_deref(), Some(request.id.as_str()));
        assert_eq!(reply.kind().unwrap(), MessageType::RevocationStatusResponse);
        let status: RevocationStatus = serde_json::from_value(reply.body).unwrap();
        assert!(status.is_revoked());
        assert!(status.verify(12));
    }

    #[test]
    fn rejects_other_message_types_and_unknown_recipients() {
        let (store, issuer) = issuer_store();
        let mut wrong_type =
            ProtocolMessage::new(MessageType::AuthorizationRequest, "did:holder", json!({}));
        wrong_type.to = Some(issuer.to_string());
        assert!(answer_status_request(&store, &wrong_type).is_err());

        let no_recipient = ProtocolMessage::new(
            MessageType::RevocationStatusRequest,
            "did:holder",
            json!({"revocationNonce": 1}),
        );
        assert!(answer_status_request(&store, &no_recipient).is_err());
    }
}
