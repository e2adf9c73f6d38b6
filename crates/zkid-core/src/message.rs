//! # Protocol Messages
//!
//! The JSON message shape exchanged between holders, relying parties and
//! agents, plus the closed vocabularies for media types and message types.
//!
//! `id` and `thid` are correlation keys: a reply carries the `thid` of the
//! message it answers, which for the first message of a thread is its own
//! `id`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::CoreError;

/// Envelope media type. Selects the packer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MediaType {
    /// Unsigned, unencrypted JSON.
    #[serde(rename = "application/iden3comm-plain-json")]
    PlainMessage,
    /// JSON payload carried with a zero-knowledge proof of the sender's
    /// identity state.
    #[serde(rename = "application/iden3-zkp-json")]
    ZkpMessage,
}

impl MediaType {
    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PlainMessage => "application/iden3comm-plain-json",
            Self::ZkpMessage => "application/iden3-zkp-json",
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "application/iden3comm-plain-json" => Ok(Self::PlainMessage),
            "application/iden3-zkp-json" => Ok(Self::ZkpMessage),
            other => Err(CoreError::UnknownVariant {
                kind: "media type",
                value: other.to_string(),
            }),
        }
    }
}

/// Message type. Determines the shape of `body`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageType {
    /// Relying party asks a holder to authenticate.
    #[serde(rename = "auth-request")]
    AuthorizationRequest,
    /// Holder's proof-carrying answer.
    #[serde(rename = "auth-response")]
    AuthorizationResponse,
    /// Ask an agent for the revocation status of a nonce.
    #[serde(rename = "revocation-status-request")]
    RevocationStatusRequest,
    /// Agent's answer.
    #[serde(rename = "revocation-status-response")]
    RevocationStatusResponse,
}

impl MessageType {
    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AuthorizationRequest => "auth-request",
            Self::AuthorizationResponse => "auth-response",
            Self::RevocationStatusRequest => "revocation-status-request",
            Self::RevocationStatusResponse => "revocation-status-response",
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auth-request" => Ok(Self::AuthorizationRequest),
            "auth-response" => Ok(Self::AuthorizationResponse),
            "revocation-status-request" => Ok(Self::RevocationStatusRequest),
            "revocation-status-response" => Ok(Self::RevocationStatusResponse),
            other => Err(CoreError::UnknownVariant {
                kind: "message type",
                value: other.to_string(),
            }),
        }
    }
}

/// A protocol message.
///
/// `type` is kept as a string so that a message of an unknown type still
/// parses and can be rejected with a precise error by whoever handles it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtocolMessage {
    /// Unique message id.
    pub id: String,
    /// Thread id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thid: Option<String>,
    /// Media type the message was (or will be) packed with.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub typ: Option<MediaType>,
    /// Message type wire string.
    #[serde(rename = "type")]
    pub message_type: String,
    /// Sender DID.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    /// Recipient DID.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    /// Type-specific body.
    #[serde(default)]
    pub body: Value,
}

impl ProtocolMessage {
    /// Start a new thread. `thid` equals the fresh `id`.
    pub fn new(message_type: MessageType, from: impl Into<String>, body: Value) -> Self {
        let id = uuid::Uuid::new_v4().to_string();
        Self {
            thid: Some(id.clone()),
            id,
            typ: Some(MediaType::PlainMessage),
            message_type: message_type.as_str().to_string(),
            from: Some(from.into()),
            to: None,
            body,
        }
    }

    /// Thread id, falling back to `id` for the first message of a thread.
    pub fn thread_id(&self) -> &str {
        self.thid.as_deref().unwrap_or(&self.id)
    }

    /// Parse `message_type` into the closed vocabulary.
    pub fn kind(&self) -> Result<MessageType, CoreError> {
        self.message_type.parse()
    }

    /// Build a reply in the same thread, addressed to this message's sender.
    pub fn reply(&self, message_type: MessageType, from: impl Into<String>, body: Value) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            thid: Some(self.thread_id().to_string()),
            typ: self.typ,
            message_type: message_type.as_str().to_string(),
            from: Some(from.into()),
            to: self.from.clone(),
            body,
        }
    }

    /// Serialize to JSON bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, CoreError> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Parse JSON bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CoreError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn media_type_wire_names() {
        assert_eq!(
            serde_json::to_string(&MediaType::ZkpMessage).unwrap(),
            "\"application/iden3-zkp-json\""
        );
        assert_eq!(
            "application/iden3comm-plain-json".parse::<MediaType>().unwrap(),
            MediaType::PlainMessage
        );
        assert!("text/plain".parse::<MediaType>().is_err());
    }

    #[test]
    fn message_type_round_trip_through_str() {
        for t in [
            MessageType::AuthorizationRequest,
            MessageType::AuthorizationResponse,
            MessageType::RevocationStatusRequest,
            MessageType::RevocationStatusResponse,
        ] {
            assert_eq!(t.as_str().parse::<MessageType>().unwrap(), t);
        }
    }

    #[test]
    fn parses_request_shape() {
        let raw = json!({
            "id": "m1",
            "thid": "m1",
            "typ": "application/iden3comm-plain-json",
            "type": "auth-request",
            "from": "did:example:rp",
            "body": {"callbackUrl": "http://x/cb", "message": "hi"}
        });
        let msg: ProtocolMessage = serde_json::from_value(raw).unwrap();
        assert_eq!(msg.kind().unwrap(), MessageType::AuthorizationRequest);
        assert_eq!(msg.thread_id(), "m1");
        assert_eq!(msg.body["callbackUrl"], "http://x/cb");
    }

    #[test]
    fn unknown_type_still_parses() {
        let msg: ProtocolMessage =
            serde_json::from_value(json!({"id": "x", "type": "ping"})).unwrap();
        assert!(msg.kind().is_err());
        assert!(msg.body.is_null());
    }

    #[test]
    fn reply_correlates_thread_and_recipient() {
        let req = ProtocolMessage::new(MessageType::AuthorizationRequest, "rp", json!({}));
        let resp = req.reply(MessageType::AuthorizationResponse, "holder", json!({}));
        assert_eq!(resp.thid.as_deref(), Some(req.id.as_str()));
        assert_eq!(resp.to.as_deref(), Some("rp"));
        assert_ne!(resp.id, req.id);
    }
}
