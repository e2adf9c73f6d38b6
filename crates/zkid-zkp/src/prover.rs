//! Bounded pool for proof computation.
//!
//! Proving is CPU-bound and runs on tokio's blocking threads, at most
//! `workers` at a time. Callers beyond that wait for a permit. Dropping the
//! caller's future before the computation is dispatched cancels it; once
//! dispatched it runs to completion and the result is discarded.

use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use zkid_core::Hash256;

use crate::circuits::{Circuit, CircuitId};
use crate::error::ProofError;
use crate::storage::CircuitData;
use crate::traits::ProofSystem;

/// A proof with everything needed to verify it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProofEnvelope {
    /// Circuit the proof is for.
    pub circuit_id: CircuitId,
    /// Proof bytes, hex.
    #[serde(with = "hex::serde")]
    pub proof: Vec<u8>,
    /// Public signals, in circuit order.
    pub pub_signals: Vec<Hash256>,
}

/// Prover pool sizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProverPoolConfig {
    /// Concurrent proof computations.
    pub workers: usize,
}

impl Default for ProverPoolConfig {
    fn default() -> Self {
        Self {
            workers: std::thread::available_parallelism().map_or(2, |n| n.get()),
        }
    }
}

/// Bounded blocking worker pool.
pub struct ProverPool {
    system: Arc<dyn ProofSystem>,
    permits: Arc<Semaphore>,
}

impl ProverPool {
    /// Pool proving with `system`.
    pub fn new(system: Arc<dyn ProofSystem>, config: ProverPoolConfig) -> Self {
        Self {
            system,
            permits: Arc::new(Semaphore::new(config.workers.max(1))),
        }
    }

    /// The backend in use.
    pub fn system(&self) -> &Arc<dyn ProofSystem> {
        &self.system
    }

    /// Check `circuit`'s constraints and prove it.
    pub async fn prove<C: Circuit>(
        &self,
        circuit: C,
        data: Arc<CircuitData>,
    ) -> Result<ProofEnvelope, ProofError> {
        let circuit_id = circuit.id();
        if data.circuit_id != circuit_id {
            return Err(ProofError::KeyMismatch(format!(
                "artifacts are for {}, circuit is {circuit_id}",
                data.circuit_id
            )));
        }
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| ProofError::Prover("prover pool closed".into()))?;
        let system = self.system.clone();

        tokio::task::spawn_blocking(move || {
            let _permit = permit;
            let started = Instant::now();
            circuit.check_constraints()?;
            let pub_signals = circuit.public_signals();
            let proof = system.prove(circuit_id, &data.proving_key, &pub_signals)?;
            tracing::debug!(
                circuit = %circuit_id,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "proof computed"
            );
            Ok(ProofEnvelope {
                circuit_id,
                proof,
                pub_signals,
            })
        })
        .await
        .map_err(|e| ProofError::Prover(format!("prover task failed: {e}")))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuits::auth::tests::witness;
    use crate::circuits::AuthCircuit;
    use crate::mock::{mock_setup, MockProofSystem};
    use zkid_core::sha256;

    #[tokio::test]
    async fn proves_valid_witness() {
        let pool = ProverPool::new(Arc::new(MockProofSystem), ProverPoolConfig { workers: 1 });
        let data = Arc::new(mock_setup(CircuitId::AuthV2));
        let env = pool
            .prove(AuthCircuit(witness(sha256(b"c"))), data.clone())
            .await
            .unwrap();
        assert_eq!(env.circuit_id, CircuitId::AuthV2);
        MockProofSystem
            .verify(env.circuit_id, &data.verification_key, &env.proof, &env.pub_signals)
            .unwrap();
    }

    #[tokio::test]
    async fn unsatisfied_witness_never_reaches_backend() {
        let pool = ProverPool::new(Arc::new(MockProofSystem), ProverPoolConfig::default());
        let mut w = witness(sha256(b"c"));
        w.challenge = sha256(b"d");
        let err = pool
            .prove(AuthCircuit(w), Arc::new(mock_setup(CircuitId::AuthV2)))
            .await
            .unwrap_err();
        assert!(matches!(err, ProofError::Unsatisfied(_)));
    }

    #[tokio::test]
    async fn wrong_artifacts_are_rejected() {
        let pool = ProverPool::new(Arc::new(MockProofSystem), ProverPoolConfig::default());
        let err = pool
            .prove(
                AuthCircuit(witness(sha256(b"c"))),
                Arc::new(mock_setup(CircuitId::CredentialAtomicQuery)),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ProofError::KeyMismatch(_)));
    }

    #[test]
    fn envelope_wire_shape() {
        let env = ProofEnvelope {
            circuit_id: CircuitId::AuthV2,
            proof: vec![0xab, 0xcd],
            pub_signals: vec![Hash256::from_u64(1)],
        };
        let v = serde_json::to_value(&env).unwrap();
        assert_eq!(v["circuitId"], "authV2");
        assert_eq!(v["proof"], "abcd");
        assert_eq!(v["pubSignals"].as_array().unwrap().len(), 1);
    }
}
