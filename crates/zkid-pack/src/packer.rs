//! The packer contract.

use async_trait::async_trait;
use zkid_core::{Did, MediaType, ProtocolMessage};
use zkid_zkp::ProofEnvelope;

use crate::error::PackError;
use crate::zkp::ProvingMethod;

/// Parameters for [`Packer::pack`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackParams {
    /// Identity packing the message. Must equal the payload's `from`.
    pub sender: Option<Did>,
    /// Proof to attach, for proof-carrying packers.
    pub proving_method: Option<ProvingMethod>,
}

impl PackParams {
    /// No parameters, for the plain packer.
    pub fn plain() -> Self {
        Self::default()
    }

    /// Parameters for a proof-carrying envelope.
    pub fn zkp(sender: Did, proving_method: ProvingMethod) -> Self {
        Self {
            sender: Some(sender),
            proving_method: Some(proving_method),
        }
    }
}

/// What an envelope carried besides the payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnpackMetadata {
    /// Envelope media type.
    pub media_type: MediaType,
    /// Sender whose proof was verified.
    pub sender: Option<Did>,
    /// Proving method of the attached proof.
    pub proving_method: Option<ProvingMethod>,
    /// The verified proof.
    pub proof: Option<ProofEnvelope>,
}

/// A decoded envelope.
#[derive(Debug, Clone, PartialEq)]
pub struct Unpacked {
    /// Payload bytes exactly as packed.
    pub payload: Vec<u8>,
    /// The payload parsed.
    pub message: ProtocolMessage,
    /// Envelope metadata.
    pub metadata: UnpackMetadata,
}

/// Codec between a payload and one envelope media type.
#[async_trait]
pub trait Packer: Send + Sync {
    /// Media type produced and consumed.
    fn media_type(&self) -> MediaType;

    /// Wrap `payload` in an envelope.
    async fn pack(&self, payload: &[u8], params: &PackParams) -> Result<Vec<u8>, PackError>;

    /// Open and verify an envelope.
    async fn unpack(&self, envelope: &[u8]) -> Result<Unpacked, PackError>;
}

pub(crate) fn parse_message(bytes: &[u8]) -> Result<ProtocolMessage, PackError> {
    ProtocolMessage::from_bytes(bytes).map_err(|e| PackError::Malformed(e.to_string()))
}
