//! # Key Management Service
//!
//! [`Kms`] dispatches key operations to exactly one [`KeyProvider`] per
//! [`KeyType`]. Callers hold [`KeyRef`]s, never keys.
//!
//! ## Security Invariant
//!
//! Nothing in this module logs or returns private key bytes. Log events
//! carry the key type and the public alias only.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use zkid_core::Hash256;

use crate::ed25519::Ed25519Provider;
use crate::error::KmsError;
use crate::keys::{KeyRef, KeyType, PublicKey, Signature};
use crate::keystore::{InMemoryKeyStore, KeyStore};
use crate::secp256k1::Secp256k1Provider;

/// A signing backend for one key type.
///
/// Implementations must be `Send + Sync`: one provider instance serves every
/// identity in the process.
pub trait KeyProvider: Send + Sync {
    /// The key type this provider handles.
    fn key_type(&self) -> KeyType;

    /// Create a key. With a seed the result is deterministic.
    fn new_key(&self, seed: Option<&[u8; 32]>) -> Result<KeyRef, KmsError>;

    /// Public key for a reference.
    fn public_key(&self, key: &KeyRef) -> Result<PublicKey, KmsError>;

    /// Sign a 32-byte digest.
    fn sign(&self, key: &KeyRef, digest: &Hash256) -> Result<Signature, KmsError>;

    /// Verify a signature over a digest.
    fn verify(&self, public_key: &PublicKey, digest: &Hash256, sig: &Signature)
        -> Result<(), KmsError>;
}

/// Registry of key providers.
#[derive(Default)]
pub struct Kms {
    providers: RwLock<HashMap<KeyType, Arc<dyn KeyProvider>>>,
}

impl Kms {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with software Ed25519 and secp256k1 providers sharing one
    /// in-memory key store.
    pub fn in_memory() -> Self {
        let store: Arc<dyn KeyStore> = Arc::new(InMemoryKeyStore::new());
        let providers: [Arc<dyn KeyProvider>; 2] = [
            Arc::new(Ed25519Provider::new(store.clone())),
            Arc::new(Secp256k1Provider::new(store)),
        ];
        Self {
            providers: RwLock::new(
                providers
                    .into_iter()
                    .map(|p| (p.key_type(), p))
                    .collect(),
            ),
        }
    }

    /// Register a provider. Fails if one already serves its key type.
    pub fn register_provider(&self, provider: Arc<dyn KeyProvider>) -> Result<(), KmsError> {
        let key_type = provider.key_type();
        let mut providers = self.providers.write();
        if providers.contains_key(&key_type) {
            return Err(KmsError::DuplicateProvider(key_type));
        }
        providers.insert(key_type, provider);
        tracing::debug!(%key_type, "registered key provider");
        Ok(())
    }

    fn provider(&self, key_type: KeyType) -> Result<Arc<dyn KeyProvider>, KmsError> {
        self.providers
            .read()
            .get(&key_type)
            .cloned()
            .ok_or(KmsError::UnsupportedKeyType(key_type))
    }

    /// Create a key of the given type.
    pub fn create_key(&self, key_type: KeyType, seed: Option<&[u8; 32]>) -> Result<KeyRef, KmsError> {
        let key = self.provider(key_type)?.new_key(seed)?;
        tracing::info!(key = %key, seeded = seed.is_some(), "created key");
        Ok(key)
    }

    /// Public key for a reference.
    pub fn public_key(&self, key: &KeyRef) -> Result<PublicKey, KmsError> {
        self.provider(key.key_type)?.public_key(key)
    }

    /// Sign a digest with the referenced key.
    pub fn sign(&self, key: &KeyRef, digest: &Hash256) -> Result<Signature, KmsError> {
        self.provider(key.key_type)?.sign(key, digest)
    }
}

impl std::fmt::Debug for Kms {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut types: Vec<KeyType> = self.providers.read().keys().copied().collect();
        types.sort();
        f.debug_struct("Kms").field("providers", &types).finish()
    }
}

/// Verify a signature without a registry. Verification needs no secrets, so
/// relying parties call this directly.
pub fn verify_signature(
    public_key: &PublicKey,
    digest: &Hash256,
    sig: &Signature,
) -> Result<(), KmsError> {
    match public_key.key_type {
        KeyType::Ed25519 => crate::ed25519::verify(public_key, digest, sig),
        KeyType::Secp256k1 => crate::secp256k1::verify(public_key, digest, sig),
    }
}
