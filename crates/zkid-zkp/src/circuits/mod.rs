//! # Circuits
//!
//! A circuit here is its witness type plus two functions: the constraint
//! check a real prover would enforce, and the public signals it exposes.
//! The proof backend only ever sees the signals; the witness never leaves
//! the prover pool.
//!
//! | Circuit | Public signals |
//! |---------|----------------|
//! | `authV2` | `user_id, challenge, user_state` |
//! | `credentialAtomicQuery` | `user_id, challenge, user_state, issuer_id, issuer_claim_non_rev_state, schema_hash, operator, value_hash` |

pub mod auth;
pub mod query;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use zkid_core::Hash256;

use crate::error::ProofError;

pub use auth::{AuthCircuit, AuthWitness};
pub use query::{CircuitQuery, CredentialAtomicQueryCircuit, FieldPredicate, QueryOperator};

/// Circuits this workspace can prove.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CircuitId {
    /// Authentication: the holder controls a key committed in its state.
    #[serde(rename = "authV2")]
    AuthV2,
    /// Authentication plus a predicate over a non-revoked credential.
    #[serde(rename = "credentialAtomicQuery")]
    CredentialAtomicQuery,
}

impl CircuitId {
    /// Every circuit, for setup tooling.
    pub const ALL: [CircuitId; 2] = [CircuitId::AuthV2, CircuitId::CredentialAtomicQuery];

    /// Wire name and artifact directory name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AuthV2 => "authV2",
            Self::CredentialAtomicQuery => "credentialAtomicQuery",
        }
    }
}

impl fmt::Display for CircuitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CircuitId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| format!("unknown circuit {s:?}"))
    }
}

/// A witness for one circuit.
pub trait Circuit: Send + 'static {
    /// Which circuit.
    fn id(&self) -> CircuitId;

    /// Check every constraint. A failing witness never reaches the backend.
    fn check_constraints(&self) -> Result<(), ProofError>;

    /// Public signals, in circuit order.
    fn public_signals(&self) -> Vec<Hash256>;
}

pub(crate) fn ensure(cond: bool, what: impl FnOnce() -> String) -> Result<(), ProofError> {
    if cond {
        Ok(())
    } else {
        Err(ProofError::Unsatisfied(what()))
    }
}
