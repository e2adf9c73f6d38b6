//! Process-lifetime cache of circuit artifacts.
//!
//! Each circuit is loaded at most once: concurrent callers await the same
//! in-flight load. A failed load leaves the slot empty so a later call can
//! try again.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::OnceCell;

use crate::circuits::CircuitId;
use crate::error::CircuitStorageError;
use crate::storage::{CircuitData, CircuitStorage};

/// Single-flight loader in front of a [`CircuitStorage`].
pub struct CircuitLoader {
    storage: Arc<dyn CircuitStorage>,
    slots: Mutex<HashMap<CircuitId, Arc<OnceCell<Arc<CircuitData>>>>>,
}

impl CircuitLoader {
    /// Loader over `storage`.
    pub fn new(storage: Arc<dyn CircuitStorage>) -> Self {
        Self {
            storage,
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Artifacts for `circuit`, loading them on first use.
    pub async fn load(&self, circuit: CircuitId) -> Result<Arc<CircuitData>, CircuitStorageError> {
        let slot = self.slots.lock().entry(circuit).or_default().clone();
        let data = slot
            .get_or_try_init(|| async {
                let data = self.storage.load(circuit).await?;
                if data.circuit_id != circuit {
                    return Err(CircuitStorageError::Malformed {
                        circuit,
                        reason: format!("storage returned artifacts for {}", data.circuit_id),
                    });
                }
                tracing::info!(%circuit, "loaded circuit artifacts");
                Ok(Arc::new(data))
            })
            .await?;
        Ok(data.clone())
    }

    /// Whether `circuit` is already cached.
    pub fn is_cached(&self, circuit: CircuitId) -> bool {
        self.slots
            .lock()
            .get(&circuit)
            .is_some_and(|slot| slot.initialized())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::mock_setup;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    struct Counting {
        loads: AtomicU32,
        fail_first: u32,
    }

    #[async_trait]
    impl CircuitStorage for Counting {
        async fn load(&self, circuit: CircuitId) -> Result<CircuitData, CircuitStorageError> {
            let n = self.loads.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            if n < self.fail_first {
                return Err(CircuitStorageError::NotFound(circuit));
            }
            Ok(mock_setup(circuit))
        }
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_load() {
        let storage = Arc::new(Counting {
            loads: AtomicU32::new(0),
            fail_first: 0,
        });
        let loader = Arc::new(CircuitLoader::new(storage.clone()));
        let mut tasks = Vec::new();
        for _ in 0..16 {
            let loader = loader.clone();
            tasks.push(tokio::spawn(async move { loader.load(CircuitId::AuthV2).await }));
        }
        for t in tasks {
            t.await.unwrap().unwrap();
        }
        assert_eq!(storage.loads.load(Ordering::SeqCst), 1);
        assert!(loader.is_cached(CircuitId::AuthV2));
        assert!(!loader.is_cached(CircuitId::CredentialAtomicQuery));
    }

    #[tokio::test]
    async fn failed_load_is_retried_on_next_call() {
        let storage = Arc::new(Counting {
            loads: AtomicU32::new(0),
            fail_first: 1,
        });
        let loader = CircuitLoader::new(storage.clone());
        assert!(loader.load(CircuitId::AuthV2).await.is_err());
        assert!(!loader.is_cached(CircuitId::AuthV2));
        loader.load(CircuitId::AuthV2).await.unwrap();
        assert_eq!(storage.loads.load(Ordering::SeqCst), 2);
    }
}
