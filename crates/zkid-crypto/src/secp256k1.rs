//! # secp256k1 Provider
//!
//! ECDSA over secp256k1 with prehashed 32-byte digests. Public keys are
//! compressed SEC1 (33 bytes); signatures are fixed 64-byte `r || s`.

use std::sync::Arc;

use k256::ecdsa::signature::hazmat::{PrehashSigner, PrehashVerifier};
use k256::ecdsa::{Signature as EcdsaSignature, SigningKey, VerifyingKey};
use rand_core::OsRng;
use zeroize::Zeroizing;
use zkid_core::Hash256;

use crate::error::KmsError;
use crate::keys::{KeyRef, KeyType, PublicKey, Signature};
use crate::keystore::KeyStore;
use crate::kms::KeyProvider;

/// secp256k1 key provider.
pub struct Secp256k1Provider {
    store: Arc<dyn KeyStore>,
}

impl Secp256k1Provider {
    /// Provider over `store`.
    pub fn new(store: Arc<dyn KeyStore>) -> Self {
        Self { store }
    }

    fn signing_key(&self, key: &KeyRef) -> Result<SigningKey, KmsError> {
        let seed = self
            .store
            .get(&key.alias)
            .ok_or_else(|| KmsError::KeyNotFound(key.to_string()))?;
        SigningKey::from_slice(&seed[..]).map_err(|e| KmsError::InvalidKey(e.to_string()))
    }
}

fn compressed(vk: &VerifyingKey) -> Vec<u8> {
    vk.to_encoded_point(true).as_bytes().to_vec()
}

impl KeyProvider for Secp256k1Provider {
    fn key_type(&self) -> KeyType {
        KeyType::Secp256k1
    }

    fn new_key(&self, seed: Option<&[u8; 32]>) -> Result<KeyRef, KmsError> {
        let sk = match seed {
            Some(s) => SigningKey::from_slice(s).map_err(|e| KmsError::InvalidKey(e.to_string()))?,
            None => SigningKey::random(&mut OsRng),
        };
        let mut secret = Zeroizing::new([0u8; 32]);
        secret.copy_from_slice(&sk.to_bytes());
        let alias = hex::encode(compressed(sk.verifying_key()));
        self.store.put(&alias, secret);
        Ok(KeyRef::new(KeyType::Secp256k1, alias))
    }

    fn public_key(&self, key: &KeyRef) -> Result<PublicKey, KmsError> {
        let sk = self.signing_key(key)?;
        Ok(PublicKey::new(KeyType::Secp256k1, compressed(sk.verifying_key())))
    }

    fn sign(&self, key: &KeyRef, digest: &Hash256) -> Result<Signature, KmsError> {
        let sk = self.signing_key(key)?;
        let sig: EcdsaSignature = sk
            .sign_prehash(digest.as_bytes())
            .map_err(|e| KmsError::InvalidKey(e.to_string()))?;
        Ok(Signature::from_bytes(sig.to_bytes().to_vec()))
    }

    fn verify(&self, public_key: &PublicKey, digest: &Hash256, sig: &Signature) -> Result<(), KmsError> {
        verify(public_key, digest, sig)
    }
}

pub(crate) fn verify(public_key: &PublicKey, digest: &Hash256, sig: &Signature) -> Result<(), KmsError> {
    let vk = VerifyingKey::from_sec1_bytes(&public_key.bytes)
        .map_err(|e| KmsError::InvalidKey(e.to_string()))?;
    let sig = EcdsaSignature::from_slice(sig.as_bytes())
        .map_err(|e| KmsError::VerificationFailed(e.to_string()))?;
    vk.verify_prehash(digest.as_bytes(), &sig)
        .map_err(|e| KmsError::VerificationFailed(e.to_string()))
}
