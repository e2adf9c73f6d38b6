//! # Proof System Trait
//!
//! The interface every proof backend satisfies. Keys and proofs cross it as
//! opaque bytes, so backends are interchangeable at runtime and the rest of
//! the workspace never names a concrete proof type.
//!
//! ## Security Invariant
//!
//! `prove` and `verify` are pure functions of their arguments. `prove` runs
//! on a blocking worker and may take seconds; it must not touch async state.

use zkid_core::Hash256;

use crate::circuits::CircuitId;
use crate::error::{ProofError, VerifyError};

/// A zero-knowledge proof backend.
pub trait ProofSystem: Send + Sync {
    /// Algorithm tag carried in proof-carrying envelopes, e.g. `groth16`.
    fn algorithm(&self) -> &'static str;

    /// Prove that the public signals are the outputs of a satisfied
    /// instance of `circuit`. The caller has already checked the witness.
    fn prove(
        &self,
        circuit: CircuitId,
        proving_key: &[u8],
        public_signals: &[Hash256],
    ) -> Result<Vec<u8>, ProofError>;

    /// Check a proof against the circuit's verification key.
    fn verify(
        &self,
        circuit: CircuitId,
        verification_key: &[u8],
        proof: &[u8],
        public_signals: &[Hash256],
    ) -> Result<(), VerifyError>;
}
