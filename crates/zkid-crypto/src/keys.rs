//! # Key Handles and Signature Types
//!
//! Public-facing key types. None of them carries secret material: a
//! [`KeyRef`] only names a key that lives inside a provider.
//!
//! Public keys and signatures serialize as hex strings.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::KmsError;

/// Supported key algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyType {
    /// Ed25519. Used for identity authentication keys.
    Ed25519,
    /// ECDSA over secp256k1. Used for chain-facing keys.
    Secp256k1,
}

impl KeyType {
    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ed25519 => "ed25519",
            Self::Secp256k1 => "secp256k1",
        }
    }
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A reference to a key held by a provider: `<type>:<hex public key>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyRef {
    /// Algorithm of the referenced key.
    pub key_type: KeyType,
    /// Provider-scoped alias. Providers in this crate use the hex public key.
    pub alias: String,
}

impl KeyRef {
    /// Build a reference.
    pub fn new(key_type: KeyType, alias: impl Into<String>) -> Self {
        Self {
            key_type,
            alias: alias.into(),
        }
    }
}

impl fmt::Display for KeyRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.key_type, self.alias)
    }
}

/// A public key tagged with its algorithm.
///
/// Ed25519 keys are 32 bytes; secp256k1 keys are 33-byte compressed SEC1.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PublicKey {
    /// Algorithm.
    pub key_type: KeyType,
    /// Encoded key bytes.
    #[serde(with = "hex_bytes")]
    pub bytes: Vec<u8>,
}

impl PublicKey {
    /// Tag raw bytes with their algorithm.
    pub fn new(key_type: KeyType, bytes: Vec<u8>) -> Self {
        Self { key_type, bytes }
    }

    /// Lowercase hex of the key bytes.
    pub fn to_hex(&self) -> String {
        hex::encode(&self.bytes)
    }
}

/// A signature over a 32-byte digest.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Signature(Vec<u8>);

impl Signature {
    /// Wrap raw signature bytes.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Raw signature bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Lowercase hex.
    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }

    /// Parse hex.
    pub fn from_hex(s: &str) -> Result<Self, KmsError> {
        hex::decode(s.trim())
            .map(Self)
            .map_err(|e| KmsError::VerificationFailed(format!("signature hex: {e}")))
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hex = self.to_hex();
        write!(f, "Signature({}...)", &hex[..hex.len().min(16)])
    }
}

impl Serialize for Signature {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Signature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_ref_display() {
        let r = KeyRef::new(KeyType::Ed25519, "ab01");
        assert_eq!(r.to_string(), "ed25519:ab01");
    }

    #[test]
    fn public_key_serializes_bytes_as_hex() {
        let pk = PublicKey::new(KeyType::Secp256k1, vec![0x02, 0xff]);
        let json = serde_json::to_value(&pk).unwrap();
        assert_eq!(json["key_type"], "secp256k1");
        assert_eq!(json["bytes"], "02ff");
        let back: PublicKey = serde_json::from_value(json).unwrap();
        assert_eq!(back, pk);
    }

    #[test]
    fn signature_debug_is_truncated() {
        let sig = Signature::from_bytes(vec![0xaa; 64]);
        let dbg = format!("{sig:?}");
        assert!(dbg.len() < 40);
    }

    #[test]
    fn signature_rejects_bad_hex() {
        assert!(Signature::from_hex("xyz").is_err());
    }
}
