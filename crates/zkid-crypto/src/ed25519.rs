//! # Ed25519 Provider
//!
//! Software Ed25519 signing over 32-byte digests. Seeds are kept in a
//! [`KeyStore`] under the hex public key; a `SigningKey` is rebuilt per
//! operation and zeroized when it goes out of scope.

use std::sync::Arc;

use ed25519_dalek::{Signer, SigningKey, Verifier, VerifyingKey};
use rand_core::{OsRng, RngCore};
use zeroize::Zeroizing;
use zkid_core::Hash256;

use crate::error::KmsError;
use crate::keys::{KeyRef, KeyType, PublicKey, Signature};
use crate::keystore::KeyStore;
use crate::kms::KeyProvider;

/// Ed25519 key provider.
pub struct Ed25519Provider {
    store: Arc<dyn KeyStore>,
}

impl Ed25519Provider {
    /// Provider over `store`.
    pub fn new(store: Arc<dyn KeyStore>) -> Self {
        Self { store }
    }

    fn signing_key(&self, key: &KeyRef) -> Result<SigningKey, KmsError> {
        let seed = self
            .store
            .get(&key.alias)
            .ok_or_else(|| KmsError::KeyNotFound(key.to_string()))?;
        Ok(SigningKey::from_bytes(&seed))
    }
}

impl KeyProvider for Ed25519Provider {
    fn key_type(&self) -> KeyType {
        KeyType::Ed25519
    }

    fn new_key(&self, seed: Option<&[u8; 32]>) -> Result<KeyRef, KmsError> {
        let mut bytes = Zeroizing::new([0u8; 32]);
        match seed {
            Some(s) => bytes.copy_from_slice(s),
            None => OsRng.fill_bytes(&mut bytes[..]),
        }
        let alias = hex::encode(SigningKey::from_bytes(&bytes).verifying_key().as_bytes());
        self.store.put(&alias, bytes);
        Ok(KeyRef::new(KeyType::Ed25519, alias))
    }

    fn public_key(&self, key: &KeyRef) -> Result<PublicKey, KmsError> {
        let sk = self.signing_key(key)?;
        Ok(PublicKey::new(
            KeyType::Ed25519,
            sk.verifying_key().as_bytes().to_vec(),
        ))
    }

    fn sign(&self, key: &KeyRef, digest: &Hash256) -> Result<Signature, KmsError> {
        let sk = self.signing_key(key)?;
        Ok(Signature::from_bytes(
            sk.sign(digest.as_bytes()).to_bytes().to_vec(),
        ))
    }

    fn verify(&self, public_key: &PublicKey, digest: &Hash256, sig: &Signature) -> Result<(), KmsError> {
        verify(public_key, digest, sig)
    }
}

pub(crate) fn verify(public_key: &PublicKey, digest: &Hash256, sig: &Signature) -> Result<(), KmsError> {
    let pk: [u8; 32] = public_key.bytes.as_slice().try_into().map_err(|_| {
        KmsError::InvalidKey(format!(
            "Ed25519 public key must be 32 bytes, got {}",
            public_key.bytes.len()
        ))
    })?;
    let vk = VerifyingKey::from_bytes(&pk).map_err(|e| KmsError::InvalidKey(e.to_string()))?;
    let sig_bytes: [u8; 64] = sig.as_bytes().try_into().map_err(|_| {
        KmsError::VerificationFailed(format!(
            "Ed25519 signature must be 64 bytes, got {}",
            sig.as_bytes().len()
        ))
    })?;
    vk.verify(digest.as_bytes(), &ed25519_dalek::Signature::from_bytes(&sig_bytes))
        .map_err(|e| KmsError::VerificationFailed(e.to_string()))
}
