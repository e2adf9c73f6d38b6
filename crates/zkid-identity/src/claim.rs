//! # Claims
//!
//! A claim is the tree-level form of a credential. It splits into an index
//! part and a value part:
//!
//! ```text
//! h_index = H(canonical {schema, subject, index})
//! h_value = H(canonical {revocationNonce, version, expiration, value})
//! ```
//!
//! The claims tree stores `h_index -> h_value`, so two claims with the same
//! index cannot coexist, and the revocation nonce is committed on the value
//! side where it can change without moving the claim.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use zkid_core::{sha256, sha256_canonical, Did, Hash256};
use zkid_crypto::PublicKey;

use crate::error::IdentityError;

/// Schema URL of authentication key claims.
pub const AUTH_SCHEMA: &str = "https://schema.iden3.io/core/jsonld/auth.jsonld#AuthEd25519Credential";

/// A claim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claim {
    /// Hash of the schema URL.
    pub schema_hash: Hash256,
    /// Subject identity. `None` for claims about the issuer itself.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<Did>,
    /// Index data. Determines the leaf.
    pub index: Value,
    /// Value data.
    pub value: Value,
    /// Revocation nonce. Revoking inserts this into the revocation tree.
    pub revocation_nonce: u64,
    /// Claim version.
    #[serde(default)]
    pub version: u32,
    /// Expiration as unix seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration: Option<i64>,
}

impl Claim {
    /// The authentication claim for a public key. Nonce 0.
    pub fn auth(public_key: &PublicKey) -> Self {
        Self {
            schema_hash: schema_hash(AUTH_SCHEMA),
            subject: None,
            index: json!({
                "keyType": public_key.key_type,
                "publicKey": public_key.to_hex(),
            }),
            value: Value::Null,
            revocation_nonce: 0,
            version: 0,
            expiration: None,
        }
    }

    /// Public key committed by an authentication claim.
    pub fn auth_public_key(&self) -> Option<String> {
        if self.schema_hash != schema_hash(AUTH_SCHEMA) {
            return None;
        }
        self.index
            .get("publicKey")
            .and_then(Value::as_str)
            .map(str::to_string)
    }

    /// Hash of the index part. The claim's key in the claims tree.
    pub fn h_index(&self) -> Result<Hash256, IdentityError> {
        Ok(sha256_canonical(&json!({
            "schema": self.schema_hash,
            "subject": self.subject,
            "index": self.index,
        }))?)
    }

    /// Hash of the value part.
    pub fn h_value(&self) -> Result<Hash256, IdentityError> {
        Ok(sha256_canonical(&json!({
            "revocationNonce": self.revocation_nonce,
            "version": self.version,
            "expiration": self.expiration,
            "value": self.value,
        }))?)
    }

    /// Both hashes.
    pub fn hashes(&self) -> Result<(Hash256, Hash256), IdentityError> {
        Ok((self.h_index()?, self.h_value()?))
    }
}

/// Hash of a schema URL.
pub fn schema_hash(schema: &str) -> Hash256 {
    sha256(schema.as_bytes())
}
