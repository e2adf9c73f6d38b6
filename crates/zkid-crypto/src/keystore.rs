//! Storage for provider secrets.
//!
//! Providers persist 32-byte seeds under an alias. The store is a trait so a
//! deployment can back it with an HSM or an encrypted file; the in-memory
//! implementation serves development and tests.

use std::collections::HashMap;

use parking_lot::RwLock;
use zeroize::Zeroizing;

/// A 32-byte secret seed, zeroized when dropped.
pub type Seed = Zeroizing<[u8; 32]>;

/// Backing store for provider seeds.
pub trait KeyStore: Send + Sync {
    /// Store a seed under `alias`, replacing any previous value.
    fn put(&self, alias: &str, seed: Seed);

    /// Fetch a copy of the seed stored under `alias`.
    fn get(&self, alias: &str) -> Option<Seed>;

    /// Whether `alias` is present.
    fn contains(&self, alias: &str) -> bool {
        self.get(alias).is_some()
    }
}

/// Process-local key store.
#[derive(Default)]
pub struct InMemoryKeyStore {
    seeds: RwLock<HashMap<String, Seed>>,
}

impl InMemoryKeyStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyStore for InMemoryKeyStore {
    fn put(&self, alias: &str, seed: Seed) {
        self.seeds.write().insert(alias.to_string(), seed);
    }

    fn get(&self, alias: &str) -> Option<Seed> {
        self.seeds.read().get(alias).cloned()
    }

    fn contains(&self, alias: &str) -> bool {
        self.seeds.read().contains_key(alias)
    }
}

impl std::fmt::Debug for InMemoryKeyStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryKeyStore")
            .field("keys", &self.seeds.read().len())
            .finish()
    }
}
