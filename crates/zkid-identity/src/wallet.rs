//! Credential wallet: the holder-side collection of issued credentials.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;
use zkid_core::Did;

use crate::credential::Credential;
use crate::error::IdentityError;

/// Backing store for a [`CredentialWallet`].
pub trait CredentialStorage: Send + Sync {
    /// Insert or replace by id.
    fn save(&self, credential: Credential);
    /// All credentials, ordered by id.
    fn list(&self) -> Vec<Credential>;
    /// Remove by id, returning the removed credential.
    fn remove(&self, id: &str) -> Option<Credential>;
}

/// Process-local credential storage.
#[derive(Debug, Default)]
pub struct InMemoryCredentialStorage {
    credentials: RwLock<BTreeMap<String, Credential>>,
}

impl CredentialStorage for InMemoryCredentialStorage {
    fn save(&self, credential: Credential) {
        self.credentials
            .write()
            .insert(credential.id.clone(), credential);
    }

    fn list(&self) -> Vec<Credential> {
        self.credentials.read().values().cloned().collect()
    }

    fn remove(&self, id: &str) -> Option<Credential> {
        self.credentials.write().remove(id)
    }
}

/// Holder wallet.
#[derive(Clone)]
pub struct CredentialWallet {
    storage: Arc<dyn CredentialStorage>,
}

impl Default for CredentialWallet {
    fn default() -> Self {
        Self::new(Arc::new(InMemoryCredentialStorage::default()))
    }
}

impl CredentialWallet {
    /// Wallet over `storage`.
    pub fn new(storage: Arc<dyn CredentialStorage>) -> Self {
        Self { storage }
    }

    /// Store a credential. Rejects credentials whose issuer proof does not
    /// check out.
    pub fn save(&self, credential: Credential) -> Result<(), IdentityError> {
        if !credential.verify_issuer_proof() {
            return Err(IdentityError::InvalidCredential(format!(
                "issuer proof of {} does not verify",
                credential.id
            )));
        }
        tracing::debug!(credential = %credential.id, "saved credential");
        self.storage.save(credential);
        Ok(())
    }

    /// All credentials.
    pub fn list(&self) -> Vec<Credential> {
        self.storage.list()
    }

    /// Credential by id.
    pub fn find_by_id(&self, id: &str) -> Result<Credential, IdentityError> {
        self.storage
            .list()
            .into_iter()
            .find(|c| c.id == id)
            .ok_or_else(|| IdentityError::CredentialNotFound(id.to_string()))
    }

    /// Credentials of `schema`, whoever holds them.
    pub fn find_by_schema(&self, schema: &str) -> Vec<Credential> {
        self.storage
            .list()
            .into_iter()
            .filter(|c| c.credential_schema == schema)
            .collect()
    }

    /// Credentials held by `subject` that match `schema` and, if given,
    /// `credential_type`.
    pub fn find_by_query(&self, subject: &Did, schema: &str, credential_type: Option<&str>) -> Vec<Credential> {
        self.storage
            .list()
            .into_iter()
            .filter(|c| c.credential_schema == schema)
            .filter(|c| c.subject_did().as_ref() == Some(subject))
            .filter(|c| match credential_type {
                Some(t) => c.credential_type.iter().any(|x| x == t),
                None => true,
            })
            .collect()
    }

    /// Remove by id.
    pub fn remove(&self, id: &str) -> Result<Credential, IdentityError> {
        self.storage
            .remove(id)
            .ok_or_else(|| IdentityError::CredentialNotFound(id.to_string()))
    }
}
