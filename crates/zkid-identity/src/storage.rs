//! # State Storage
//!
//! Published identity state roots, per identity, in publication order. In
//! production this is the state contract on chain; the trait keeps the Proof
//! Service and resolvers independent of it.
//!
//! [`RetryingStateStorage`] adds bounded backoff and a per-call timeout in
//! front of any backend. Retries live here, in the storage layer, and
//! nowhere above it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;
use zkid_core::{with_retry, Did, Hash256, RetryError, RetryPolicy};

use crate::error::StateStorageError;

/// Read/write access to published state roots.
#[async_trait]
pub trait StateStorage: Send + Sync {
    /// Most recently published root, or `None` if never published.
    async fn latest_state(&self, did: &Did) -> Result<Option<Hash256>, StateStorageError>;

    /// Append a root to `did`'s history.
    async fn publish(&self, did: &Did, state: Hash256) -> Result<(), StateStorageError>;

    /// Every published root, oldest first.
    async fn history(&self, did: &Did) -> Result<Vec<Hash256>, StateStorageError>;
}

/// Process-local state storage.
///
/// `fail_next` injects transient failures for exercising retry paths.
#[derive(Debug, Default)]
pub struct InMemoryStateStorage {
    states: RwLock<HashMap<Did, Vec<Hash256>>>,
    pending_failures: AtomicU32,
}

impl InMemoryStateStorage {
    /// Empty storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` calls fail with a transient error.
    pub fn fail_next(&self, n: u32) {
        self.pending_failures.store(n, Ordering::SeqCst);
    }

    fn check_failure(&self) -> Result<(), StateStorageError> {
        let injected = self
            .pending_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(StateStorageError::Transient("injected failure".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl StateStorage for InMemoryStateStorage {
    async fn latest_state(&self, did: &Did) -> Result<Option<Hash256>, StateStorageError> {
        self.check_failure()?;
        Ok(self
            .states
            .read()
            .get(did)
            .and_then(|h| h.last().copied()))
    }

    async fn publish(&self, did: &Did, state: Hash256) -> Result<(), StateStorageError> {
        self.check_failure()?;
        let mut states = self.states.write();
        let history = states.entry(did.clone()).or_default();
        if history.last() == Some(&state) {
            return Ok(());
        }
        history.push(state);
        Ok(())
    }

    async fn history(&self, did: &Did) -> Result<Vec<Hash256>, StateStorageError> {
        self.check_failure()?;
        Ok(self.states.read().get(did).cloned().unwrap_or_default())
    }
}

/// Wraps a backend with [`with_retry`].
pub struct RetryingStateStorage<S> {
    inner: S,
    policy: RetryPolicy,
}

impl<S: StateStorage> RetryingStateStorage<S> {
    /// Wrap `inner`.
    pub fn new(inner: S, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    /// The wrapped backend.
    pub fn inner(&self) -> &S {
        &self.inner
    }
}

fn flatten(e: RetryError<StateStorageError>) -> StateStorageError {
    match e {
        RetryError::Permanent(e) => e,
        RetryError::Exhausted { attempts, last } => {
            StateStorageError::Unavailable(format!("{attempts} attempts, last: {last}"))
        }
    }
}

#[async_trait]
impl<S: StateStorage> StateStorage for RetryingStateStorage<S> {
    async fn latest_state(&self, did: &Did) -> Result<Option<Hash256>, StateStorageError> {
        with_retry(&self.policy, "state.latest", || self.inner.latest_state(did))
            .await
            .map_err(flatten)
    }

    async fn publish(&self, did: &Did, state: Hash256) -> Result<(), StateStorageError> {
        with_retry(&self.policy, "state.publish", || self.inner.publish(did, state))
            .await
            .map_err(flatten)
    }

    async fn history(&self, did: &Did) -> Result<Vec<Hash256>, StateStorageError> {
        with_retry(&self.policy, "state.history", || self.inner.history(did))
            .await
            .map_err(flatten)
    }
}
