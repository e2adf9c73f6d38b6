//! # zkid-zkp: Zero-Knowledge Proofs
//!
//! ## Architecture
//!
//! - **Traits** (`traits.rs`): [`ProofSystem`] is the backend contract.
//!   Keys and proofs are opaque bytes, so backends are swapped at runtime.
//! - **Mock** (`mock.rs`): [`MockProofSystem`] produces deterministic,
//!   transparent proofs and [`mock_setup`] the matching artifacts.
//! - **Circuits** (`circuits/`): witness types for `authV2` and
//!   `credentialAtomicQuery`, their constraint checks and public signals.
//! - **Storage** (`storage.rs`, `loader.rs`): circuit artifacts from disk or
//!   memory, loaded once per circuit per process.
//! - **Prover pool** (`prover.rs`): bounded blocking workers.
//! - **Service** (`service.rs`): [`ProofService`], the entry point.
//!
//! ## Crate Policy
//!
//! - The mock backend is behind the default `mock` feature.
//! - No `unsafe`.

pub mod circuits;
pub mod error;
pub mod loader;
#[cfg(feature = "mock")]
pub mod mock;
pub mod prover;
pub mod service;
pub mod storage;
pub mod traits;

pub use circuits::{
    AuthCircuit, AuthWitness, Circuit, CircuitId, CircuitQuery, CredentialAtomicQueryCircuit,
    FieldPredicate, QueryOperator,
};
pub use error::{CircuitStorageError, ProofError, ProofServiceError, VerifyError};
pub use loader::CircuitLoader;
#[cfg(feature = "mock")]
pub use mock::{mock_setup, MockProofSystem, MOCK_ALGORITHM};
pub use prover::{ProofEnvelope, ProverPool, ProverPoolConfig};
pub use service::{GenesisPolicy, ProofService, ProofServiceConfig};
pub use storage::{
    write_circuit_data, CircuitData, CircuitStorage, FsCircuitStorage, InMemoryCircuitStorage,
};
pub use traits::ProofSystem;
