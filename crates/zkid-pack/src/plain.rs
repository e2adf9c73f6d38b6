//! `application/iden3comm-plain-json`: the envelope is the payload.

use async_trait::async_trait;
use zkid_core::MediaType;

use crate::error::PackError;
use crate::packer::{parse_message, PackParams, Packer, UnpackMetadata, Unpacked};

/// Plain JSON packer.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainPacker;

#[async_trait]
impl Packer for PlainPacker {
    fn media_type(&self) -> MediaType {
        MediaType::PlainMessage
    }

    async fn pack(&self, payload: &[u8], _params: &PackParams) -> Result<Vec<u8>, PackError> {
        parse_message(payload)?;
        Ok(payload.to_vec())
    }

    async fn unpack(&self, envelope: &[u8]) -> Result<Unpacked, PackError> {
        Ok(Unpacked {
            message: parse_message(envelope)?,
            payload: envelope.to_vec(),
            metadata: UnpackMetadata {
                media_type: MediaType::PlainMessage,
                sender: None,
                proving_method: None,
                proof: None,
            },
        })
    }
}
