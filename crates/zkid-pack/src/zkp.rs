//! # Proof-Carrying Packer
//!
//! `application/iden3-zkp-json` envelopes carry the payload together with a
//! zero-knowledge proof that the sender controls its identity:
//!
//! ```text
//! b64url(header) "." b64url(payload) "." b64url(proof envelope)
//! header = {"alg": .., "circuitId": .., "typ": "application/iden3-zkp-json"}
//! ```
//!
//! The proof's challenge is `SHA256(b64url(header) "." b64url(payload))`,
//! which binds the header and the payload to the proof.
//!
//! ## Security Invariant
//!
//! Every segment must decode, and re-encode, to exactly the bytes received.
//! Any other envelope is an integrity failure ([`PackError::ProofVerification`]),
//! so no byte of an envelope can change without detection.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use zkid_core::{sha256, Did, Hash256, MediaType, ProtocolMessage};
use zkid_zkp::{CircuitId, ProofEnvelope, ProofService};

use crate::error::PackError;
use crate::packer::{parse_message, PackParams, Packer, UnpackMetadata, Unpacked};

/// Proving algorithm named in an envelope header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProvingAlg {
    /// Groth16 over BN254.
    Groth16,
    /// The transparent development backend.
    Mock,
}

impl ProvingAlg {
    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Groth16 => "groth16",
            Self::Mock => "mock",
        }
    }

    /// Algorithm for a proof backend's tag.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "groth16" => Some(Self::Groth16),
            "mock" => Some(Self::Mock),
            _ => None,
        }
    }
}

/// Key of the proving and verification maps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProvingMethod {
    /// Algorithm.
    pub alg: ProvingAlg,
    /// Circuit.
    pub circuit_id: CircuitId,
}

impl fmt::Display for ProvingMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.alg.as_str(), self.circuit_id)
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
struct Header {
    alg: ProvingAlg,
    circuit_id: CircuitId,
    typ: MediaType,
}

/// Produces the proof attached to an envelope.
#[async_trait]
pub trait ProofPreparer: Send + Sync {
    /// Prove for `sender`, binding `challenge`.
    async fn prepare(
        &self,
        challenge: Hash256,
        sender: &Did,
        circuit: CircuitId,
    ) -> Result<ProofEnvelope, PackError>;
}

/// Checks the proof attached to an envelope.
#[async_trait]
pub trait ProofVerifier: Send + Sync {
    /// Accept or reject `proof` as `sender`'s proof over `challenge`.
    async fn verify(
        &self,
        challenge: Hash256,
        sender: &Did,
        proof: &ProofEnvelope,
        message: &ProtocolMessage,
    ) -> Result<(), PackError>;
}

/// Proves with the Proof Service's authentication circuit.
pub struct AuthProofPreparer {
    service: Arc<ProofService>,
}

impl AuthProofPreparer {
    /// Preparer over `service`.
    pub fn new(service: Arc<ProofService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl ProofPreparer for AuthProofPreparer {
    async fn prepare(
        &self,
        challenge: Hash256,
        sender: &Did,
        circuit: CircuitId,
    ) -> Result<ProofEnvelope, PackError> {
        if circuit != CircuitId::AuthV2 {
            return Err(PackError::Malformed(format!(
                "envelope proofs use authV2, not {circuit}"
            )));
        }
        Ok(self.service.generate_auth_proof(sender, challenge).await?)
    }
}

/// Verifies authentication proofs and the sender's state.
pub struct AuthProofVerifier {
    service: Arc<ProofService>,
}

impl AuthProofVerifier {
    /// Verifier over `service`.
    pub fn new(service: Arc<ProofService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl ProofVerifier for AuthProofVerifier {
    async fn verify(
        &self,
        challenge: Hash256,
        sender: &Did,
        proof: &ProofEnvelope,
        _message: &ProtocolMessage,
    ) -> Result<(), PackError> {
        self.service
            .verify_authentication(sender, &challenge, proof)
            .await
            .map_err(|e| PackError::ProofVerification(e.to_string()))
    }
}

/// Proof-carrying packer.
#[derive(Default)]
pub struct ZkpPacker {
    proving: HashMap<ProvingMethod, Arc<dyn ProofPreparer>>,
    verification: HashMap<ProvingMethod, Arc<dyn ProofVerifier>>,
}

impl ZkpPacker {
    /// Packer over explicit proving and verification maps.
    pub fn new(
        proving: HashMap<ProvingMethod, Arc<dyn ProofPreparer>>,
        verification: HashMap<ProvingMethod, Arc<dyn ProofVerifier>>,
    ) -> Self {
        Self {
            proving,
            verification,
        }
    }

    /// Packer proving and verifying `authV2` with `service`'s backend.
    pub fn for_service(service: Arc<ProofService>) -> Result<Self, PackError> {
        let alg = ProvingAlg::from_tag(service.algorithm()).ok_or_else(|| {
            PackError::Malformed(format!("unknown proving algorithm {:?}", service.algorithm()))
        })?;
        let method = ProvingMethod {
            alg,
            circuit_id: CircuitId::AuthV2,
        };
        let mut proving: HashMap<ProvingMethod, Arc<dyn ProofPreparer>> = HashMap::new();
        proving.insert(method, Arc::new(AuthProofPreparer::new(service.clone())));
        let mut verification: HashMap<ProvingMethod, Arc<dyn ProofVerifier>> = HashMap::new();
        verification.insert(method, Arc::new(AuthProofVerifier::new(service)));
        Ok(Self::new(proving, verification))
    }

    /// Methods this packer can prove.
    pub fn proving_methods(&self) -> Vec<ProvingMethod> {
        let mut methods: Vec<_> = self.proving.keys().copied().collect();
        methods.sort();
        methods
    }
}

fn integrity(what: impl Into<String>) -> PackError {
    PackError::ProofVerification(what.into())
}

fn decode_segment(segment: &str, name: &str) -> Result<Vec<u8>, PackError> {
    URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|e| integrity(format!("{name} is not base64url: {e}")))
}

// Decode a JSON segment and require that it re-encodes to the same bytes.
fn decode_canonical<T>(segment: &str, name: &str) -> Result<T, PackError>
where
    T: Serialize + for<'de> Deserialize<'de>,
{
    let bytes = decode_segment(segment, name)?;
    let value: T =
        serde_json::from_slice(&bytes).map_err(|e| integrity(format!("{name}: {e}")))?;
    let again = serde_json::to_vec(&value).map_err(|e| integrity(format!("{name}: {e}")))?;
    if again != bytes {
        return Err(integrity(format!("{name} is not canonically encoded")));
    }
    Ok(value)
}

fn encode_json(value: &impl Serialize) -> Result<String, PackError> {
    let bytes = serde_json::to_vec(value).map_err(|e| PackError::Malformed(e.to_string()))?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}

fn challenge(header_b64: &str, payload_b64: &str) -> Hash256 {
    sha256(format!("{header_b64}.{payload_b64}").as_bytes())
}

#[async_trait]
impl Packer for ZkpPacker {
    fn media_type(&self) -> MediaType {
        MediaType::ZkpMessage
    }

    async fn pack(&self, payload: &[u8], params: &PackParams) -> Result<Vec<u8>, PackError> {
        let sender = params
            .sender
            .as_ref()
            .ok_or(PackError::MissingParameter("sender"))?;
        let method = params
            .proving_method
            .ok_or(PackError::MissingParameter("proving_method"))?;
        let message = parse_message(payload)?;
        if message.from.as_deref() != Some(sender.to_string().as_str()) {
            return Err(PackError::SenderMismatch {
                payload: message.from,
                sender: sender.to_string(),
            });
        }
        let preparer = self
            .proving
            .get(&method)
            .ok_or(PackError::UnsupportedAlgorithm(method))?;

        let header_b64 = encode_json(&Header {
            alg: method.alg,
            circuit_id: method.circuit_id,
            typ: MediaType::ZkpMessage,
        })?;
        let payload_b64 = URL_SAFE_NO_PAD.encode(payload);
        let proof = preparer
            .prepare(challenge(&header_b64, &payload_b64), sender, method.circuit_id)
            .await?;
        let proof_b64 = encode_json(&proof)?;
        tracing::debug!(sender = %sender, method = %method, "packed proof-carrying envelope");
        Ok(format!("{header_b64}.{payload_b64}.{proof_b64}").into_bytes())
    }

    async fn unpack(&self, envelope: &[u8]) -> Result<Unpacked, PackError> {
        let text = std::str::from_utf8(envelope).map_err(|_| integrity("envelope is not text"))?;
        let segments: Vec<&str> = text.split('.').collect();
        let &[header_b64, payload_b64, proof_b64] = segments.as_slice() else {
            return Err(integrity("envelope must have three segments"));
        };

        let header: Header = decode_canonical(header_b64, "header")?;
        if header.typ != MediaType::ZkpMessage {
            return Err(integrity(format!("header typ is {}", header.typ)));
        }
        let method = ProvingMethod {
            alg: header.alg,
            circuit_id: header.circuit_id,
        };
        let verifier = self
            .verification
            .get(&method)
            .ok_or(PackError::UnsupportedAlgorithm(method))?;

        let payload = decode_segment(payload_b64, "payload")?;
        if URL_SAFE_NO_PAD.encode(&payload) != payload_b64 {
            return Err(integrity("payload is not canonically encoded"));
        }
        let proof: ProofEnvelope = decode_canonical(proof_b64, "proof")?;
        if proof.circuit_id != method.circuit_id {
            return Err(integrity(format!(
                "header names {}, proof is for {}",
                method.circuit_id, proof.circuit_id
            )));
        }

        let message = parse_message(&payload).map_err(|e| integrity(e.to_string()))?;
        let sender = message
            .from
            .as_deref()
            .ok_or_else(|| integrity("payload has no sender"))
            .and_then(|from| Did::parse(from).map_err(|e| integrity(format!("sender: {e}"))))?;

        verifier
            .verify(challenge(header_b64, payload_b64), &sender, &proof, &message)
            .await?;
        tracing::debug!(sender = %sender, method = %method, "verified proof-carrying envelope");

        Ok(Unpacked {
            payload,
            message,
            metadata: UnpackMetadata {
                media_type: MediaType::ZkpMessage,
                sender: Some(sender),
                proving_method: Some(method),
                proof: Some(proof),
            },
        })
    }
}
