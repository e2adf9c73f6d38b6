//! # Authorization Message Bodies
//!
//! Request body:
//!
//! ```json
//! {
//!   "callbackUrl": "https://verifier.example/callback",
//!   "message": "sign in",
//!   "reason": "age check",
//!   "scope": [{
//!     "id": 1,
//!     "circuitId": "credentialAtomicQuery",
//!     "query": {
//!       "schema": "https://schemas.example/kyc.json",
//!       "type": "KYCAgeCredential",
//!       "credentialSubject": {"birthday": {"$lt": 20000101}}
//!     }
//!   }]
//! }
//! ```
//!
//! Response body: `{"message": .., "scope": [ProofEnvelope]}`. The first
//! envelope is the `authV2` proof of the sender, followed by one envelope per
//! requested scope entry, in request order.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use url::Url;
use zkid_core::{sha256_concat, Hash256, MessageType, ProtocolMessage};
use zkid_zkp::{CircuitId, CircuitQuery, FieldPredicate, ProofEnvelope, QueryOperator};

use crate::error::AuthError;

const CHALLENGE_DOMAIN: &[u8] = b"zkid-auth-challenge";

/// Body of an `auth-request`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizationRequestBody {
    /// Where the relying party expects the response.
    pub callback_url: String,
    /// Free text the holder sees, also bound into the challenge.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Why the relying party asks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Credential proofs requested in addition to authentication.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scope: Vec<ScopeRequest>,
}

/// One requested proof.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopeRequest {
    /// Request-local id, echoed in errors.
    pub id: u32,
    /// Circuit to prove with.
    pub circuit_id: CircuitId,
    /// Credential requirements.
    #[serde(default)]
    pub query: ScopeQuery,
}

/// Credential requirements of a [`ScopeRequest`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopeQuery {
    /// Schema URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    /// Credential type.
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub credential_type: Option<String>,
    /// `{field: {operator: value}}`, at most one field and one operator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential_subject: Option<Map<String, Value>>,
}

impl ScopeQuery {
    fn predicate(&self, scope: u32) -> Result<Option<FieldPredicate>, AuthError> {
        let malformed = |what: String| AuthError::MalformedMessage(format!("scope {scope}: {what}"));
        let Some(subject) = &self.credential_subject else {
            return Ok(None);
        };
        let mut fields = subject.iter();
        let Some((field, condition)) = fields.next() else {
            return Ok(None);
        };
        if fields.next().is_some() {
            return Err(malformed("only one credentialSubject field may be queried".into()));
        }
        let condition = condition
            .as_object()
            .ok_or_else(|| malformed(format!("condition on {field} must be an object")))?;
        let mut ops = condition.iter();
        let (operator, value) = match ops.next() {
            None => (QueryOperator::Noop, Value::Null),
            Some((op, value)) => {
                let operator = serde_json::from_value(Value::String(op.clone()))
                    .map_err(|_| malformed(format!("unknown operator {op}")))?;
                (operator, value.clone())
            }
        };
        if ops.next().is_some() {
            return Err(malformed(format!("only one operator may be applied to {field}")));
        }
        Ok(Some(FieldPredicate {
            field: field.clone(),
            operator,
            value,
        }))
    }
}

impl ScopeRequest {
    /// The circuit query for this entry, bound to `challenge`.
    pub fn to_circuit_query(&self, challenge: Hash256) -> Result<CircuitQuery, AuthError> {
        match self.circuit_id {
            CircuitId::AuthV2 => Ok(CircuitQuery::auth(challenge)),
            CircuitId::CredentialAtomicQuery => {
                if self.query.schema.is_none() {
                    return Err(AuthError::MalformedMessage(format!(
                        "scope {}: credential queries need a schema",
                        self.id
                    )));
                }
                Ok(CircuitQuery {
                    circuit_id: CircuitId::CredentialAtomicQuery,
                    challenge,
                    schema: self.query.schema.clone(),
                    credential_type: self.query.credential_type.clone(),
                    predicate: self.query.predicate(self.id)?,
                })
            }
        }
    }
}

/// Body of an `auth-response`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorizationResponseBody {
    /// Echo of the request message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Proofs, authentication first.
    pub scope: Vec<ProofEnvelope>,
}

/// A validated `auth-request`.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthorizationRequest {
    /// The message as received.
    pub message: ProtocolMessage,
    /// Parsed body.
    pub body: AuthorizationRequestBody,
    /// Parsed callback URL.
    pub callback_url: Url,
}

impl AuthorizationRequest {
    /// Validate that `message` is a well-formed auth request.
    pub fn parse(message: ProtocolMessage) -> Result<Self, AuthError> {
        let malformed = |what: &str| AuthError::MalformedMessage(what.to_string());
        if message.id.is_empty() {
            return Err(malformed("missing id"));
        }
        if message.message_type.is_empty() {
            return Err(malformed("missing type"));
        }
        if message.kind().ok() != Some(MessageType::AuthorizationRequest) {
            return Err(AuthError::MalformedMessage(format!(
                "expected {}, got {}",
                MessageType::AuthorizationRequest,
                message.message_type
            )));
        }
        if message.from.as_deref().map_or(true, str::is_empty) {
            return Err(malformed("missing from"));
        }
        if message.body.get("callbackUrl").is_none() {
            return Err(malformed("missing body.callbackUrl"));
        }
        let body: AuthorizationRequestBody = serde_json::from_value(message.body.clone())
            .map_err(|e| AuthError::MalformedMessage(format!("body: {e}")))?;
        let callback_url = Url::parse(&body.callback_url)
            .map_err(|e| AuthError::MalformedMessage(format!("callbackUrl: {e}")))?;
        Ok(Self {
            message,
            body,
            callback_url,
        })
    }

    /// Challenge every proof of the response binds:
    /// `SHA256("zkid-auth-challenge" || 0 || id || 0 || message)`.
    pub fn challenge(&self) -> Hash256 {
        sha256_concat(&[
            &CHALLENGE_DOMAIN[..],
            &[0u8][..],
            self.message.id.as_bytes(),
            &[0u8][..],
            self.body.message.as_deref().unwrap_or_default().as_bytes(),
        ])
    }

    /// Circuit queries in response order: authentication, then scope.
    pub fn circuit_queries(&self) -> Result<Vec<(Option<u32>, CircuitQuery)>, AuthError> {
        let challenge = self.challenge();
        let mut queries = vec![(None, CircuitQuery::auth(challenge))];
        for entry in &self.body.scope {
            queries.push((Some(entry.id), entry.to_circuit_query(challenge)?));
        }
        Ok(queries)
    }
}

/// Build an `auth-request` from a relying party.
pub fn authorization_request(
    from: impl Into<String>,
    body: &AuthorizationRequestBody,
) -> Result<ProtocolMessage, AuthError> {
    let body = serde_json::to_value(body).map_err(|e| AuthError::MalformedMessage(e.to_string()))?;
    Ok(ProtocolMessage::new(MessageType::AuthorizationRequest, from, body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(raw: Value) -> Result<AuthorizationRequest, AuthError> {
        AuthorizationRequest::parse(serde_json::from_value(raw).unwrap())
    }

    #[test]
    fn validates_required_fields() {
        let ok = json!({
            "id": "m1", "thid": "m1", "type": "auth-request", "from": "did:rp",
            "body": {"callbackUrl": "http://x/cb", "message": "hi"}
        });
        let parsed = request(ok.clone()).unwrap();
        assert_eq!(parsed.callback_url.as_str(), "http://x/cb");
        assert_eq!(parsed.body.message.as_deref(), Some("hi"));

        for (field, path) in [("id", None), ("type", None), ("from", None), ("callbackUrl", Some("body"))] {
            let mut raw = ok.clone();
            match path {
                Some(p) => raw[p].as_object_mut().unwrap().remove(field),
                None => raw.as_object_mut().unwrap().remove(field),
            };
            if field == "id" || field == "type" {
                raw[field] = json!("");
            }
            assert!(
                matches!(request(raw), Err(AuthError::MalformedMessage(_))),
                "missing {field}"
            );
        }
    }

    #[test]
    fn rejects_other_message_types() {
        for t in ["auth-response", "revocation-status-request", "ping"] {
            let raw = json!({
                "id": "m1", "type": t, "from": "did:rp",
                "body": {"callbackUrl": "http://x/cb"}
            });
            assert!(matches!(request(raw), Err(AuthError::MalformedMessage(_))), "{t}");
        }
    }

    #[test]
    fn challenge_binds_id_and_message() {
        let mk = |id: &str, msg: &str| {
            request(json!({
                "id": id, "type": "auth-request", "from": "did:rp",
                "body": {"callbackUrl": "http://x/cb", "message": msg}
            }))
            .unwrap()
            .challenge()
        };
        assert_eq!(mk("m1", "hi"), mk("m1", "hi"));
        assert_ne!(mk("m1", "hi"), mk("m2", "hi"));
        assert_ne!(mk("m1", "hi"), mk("m1", "ho"));
        assert_ne!(mk("m1", "hi"), mk("m1h", "i"));
    }

    #[test]
    fn scope_maps_to_circuit_queries() {
        let req = request(json!({
            "id": "m1", "type": "auth-request", "from": "did:rp",
            "body": {
                "callbackUrl": "http://x/cb",
                "scope": [{
                    "id": 7,
                    "circuitId": "credentialAtomicQuery",
                    "query": {
                        "schema": "https://schemas.example/kyc.json",
                        "type": "KYCAgeCredential",
                        "credentialSubject": {"birthday": {"$lt": 20000101}}
                    }
                }]
            }
        }))
        .unwrap();
        let queries = req.circuit_queries().unwrap();
        assert_eq!(queries.len(), 2);
        assert_eq!(queries[0].1.circuit_id, CircuitId::AuthV2);
        let (id, q) = &queries[1];
        assert_eq!(*id, Some(7));
        assert_eq!(q.challenge, req.challenge());
        let p = q.predicate.as_ref().unwrap();
        assert_eq!(p.field, "birthday");
        assert_eq!(p.operator, QueryOperator::Lt);
        assert_eq!(p.value, json!(20000101));
    }

    #[test]
    fn rejects_ambiguous_predicates() {
        let scope = |subject: Value| ScopeRequest {
            id: 1,
            circuit_id: CircuitId::CredentialAtomicQuery,
            query: ScopeQuery {
                schema: Some("s".into()),
                credential_type: None,
                credential_subject: subject.as_object().cloned(),
            },
        };
        let c = Hash256::ZERO;
        assert!(scope(json!({"a": {"$eq": 1}, "b": {"$eq": 2}})).to_circuit_query(c).is_err());
        assert!(scope(json!({"a": {"$eq": 1, "$ne": 2}})).to_circuit_query(c).is_err());
        assert!(scope(json!({"a": {"$like": 1}})).to_circuit_query(c).is_err());
        assert!(scope(json!({"a": 1})).to_circuit_query(c).is_err());
        let noop = scope(json!({"a": {}})).to_circuit_query(c).unwrap();
        assert_eq!(noop.predicate.unwrap().operator, QueryOperator::Noop);
    }
}
