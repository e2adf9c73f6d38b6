//! # Package Manager
//!
//! Registry of [`Packer`]s keyed by [`MediaType`]. Inbound bytes are routed
//! by sniffing: a JSON object is a plain message, three base64url segments
//! joined by `.` are a proof-carrying envelope.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use zkid_core::MediaType;

use crate::error::PackError;
use crate::packer::{PackParams, Packer, Unpacked};

/// Proof that a packer was registered. Pass it back to
/// [`PackageManager::unregister`] to remove the packer.
#[derive(Debug, PartialEq, Eq)]
pub struct PackerHandle {
    media_type: MediaType,
}

impl PackerHandle {
    /// Media type of the packer.
    pub fn media_type(&self) -> MediaType {
        self.media_type
    }
}

/// Detect the media type of an envelope.
pub fn sniff_media_type(envelope: &[u8]) -> Result<MediaType, PackError> {
    let first = envelope.iter().find(|b| !b.is_ascii_whitespace());
    if first == Some(&b'{') {
        return Ok(MediaType::PlainMessage);
    }
    let is_b64url = |b: &u8| b.is_ascii_alphanumeric() || *b == b'-' || *b == b'_';
    let segments: Vec<&[u8]> = envelope.split(|b| *b == b'.').collect();
    if segments.len() == 3 && segments.iter().all(|s| !s.is_empty() && s.iter().all(is_b64url)) {
        return Ok(MediaType::ZkpMessage);
    }
    Err(PackError::Malformed("unrecognized envelope format".into()))
}

/// Packers by media type.
#[derive(Default)]
pub struct PackageManager {
    packers: RwLock<HashMap<MediaType, Arc<dyn Packer>>>,
}

impl PackageManager {
    /// Empty manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a packer under its media type.
    pub fn register_packer(&self, packer: Arc<dyn Packer>) -> Result<PackerHandle, PackError> {
        let media_type = packer.media_type();
        let mut packers = self.packers.write();
        if packers.contains_key(&media_type) {
            return Err(PackError::DuplicatePacker(media_type));
        }
        packers.insert(media_type, packer);
        tracing::debug!(%media_type, "registered packer");
        Ok(PackerHandle { media_type })
    }

    /// Remove a registered packer.
    pub fn unregister(&self, handle: PackerHandle) {
        self.packers.write().remove(&handle.media_type);
    }

    fn packer(&self, media_type: MediaType) -> Result<Arc<dyn Packer>, PackError> {
        self.packers
            .read()
            .get(&media_type)
            .cloned()
            .ok_or(PackError::UnsupportedMediaType(media_type))
    }

    /// Pack `payload` as `media_type`.
    pub async fn pack(
        &self,
        media_type: MediaType,
        payload: &[u8],
        params: &PackParams,
    ) -> Result<Vec<u8>, PackError> {
        self.packer(media_type)?.pack(payload, params).await
    }

    /// Unpack an envelope of any registered media type.
    pub async fn unpack(&self, envelope: &[u8]) -> Result<Unpacked, PackError> {
        let media_type = sniff_media_type(envelope)?;
        self.packer(media_type)?.unpack(envelope).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plain::PlainPacker;
    use serde_json::json;
    use zkid_core::{MessageType, ProtocolMessage};

    #[test]
    fn sniffing() {
        assert_eq!(
            sniff_media_type(b"  {\"id\":1}").unwrap(),
            MediaType::PlainMessage
        );
        assert_eq!(
            sniff_media_type(b"eyJh.eyJi.eyJj").unwrap(),
            MediaType::ZkpMessage
        );
        assert!(sniff_media_type(b"eyJh.eyJi").is_err());
        assert!(sniff_media_type(b"a..b").is_err());
        assert!(sniff_media_type(b"a+b.c.d").is_err());
        assert!(sniff_media_type(b"").is_err());
    }

    #[tokio::test]
    async fn duplicate_registration_is_rejected() {
        let pm = PackageManager::new();
        let handle = pm.register_packer(Arc::new(PlainPacker)).unwrap();
        assert!(matches!(
            pm.register_packer(Arc::new(PlainPacker)),
            Err(PackError::DuplicatePacker(MediaType::PlainMessage))
        ));
        pm.unregister(handle);
        pm.register_packer(Arc::new(PlainPacker)).unwrap();
    }

    #[tokio::test]
    async fn routes_by_media_type() {
        let pm = PackageManager::new();
        pm.register_packer(Arc::new(PlainPacker)).unwrap();
        let msg = ProtocolMessage::new(MessageType::AuthorizationRequest, "did:x", json!({}));
        let bytes = msg.to_bytes().unwrap();
        let env = pm
            .pack(MediaType::PlainMessage, &bytes, &PackParams::plain())
            .await
            .unwrap();
        assert_eq!(pm.unpack(&env).await.unwrap().message, msg);
        assert!(matches!(
            pm.pack(MediaType::ZkpMessage, &bytes, &PackParams::plain()).await,
            Err(PackError::UnsupportedMediaType(MediaType::ZkpMessage))
        ));
    }
}
