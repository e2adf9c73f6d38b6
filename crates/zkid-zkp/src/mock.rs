//! # Mock Proof System
//!
//! A deterministic, transparent "proof system" for development and tests.
//! A proof is a domain-separated SHA-256 over the verification key, the
//! circuit id and the public signals:
//!
//! ```text
//! vk    = SHA256(proving_key)
//! proof = SHA256("zkid/mock-proof/v1" || vk || circuit_id || 0x00 || signals...)
//! ```
//!
//! ## Security Notice
//!
//! This backend provides NO zero-knowledge and NO soundness: anyone holding
//! the verification key can forge proofs. It exists so that every layer above
//! the proof system (witness checks, packing, the auth flow) runs for real.

use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use zkid_core::{sha256, sha256_concat, Hash256, Sha256Accumulator};

use crate::circuits::CircuitId;
use crate::error::{ProofError, VerifyError};
use crate::storage::CircuitData;
use crate::traits::ProofSystem;

const PROOF_DOMAIN: &[u8] = b"zkid/mock-proof/v1";
const SETUP_DOMAIN: &[u8] = b"zkid/mock-setup/v1";
const PK_PREFIX: &str = "zkid-mock-pk";

/// Algorithm tag of the mock backend.
pub const MOCK_ALGORITHM: &str = "mock";

/// `verification_key.json` contents for the mock backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MockVerificationKey {
    /// Always `"mock"`.
    pub protocol: String,
    /// Circuit the key belongs to.
    pub circuit_id: CircuitId,
    /// Digest of the proving key.
    pub key: Hash256,
}

/// Produce the artifacts a trusted setup would, for the mock backend.
pub fn mock_setup(circuit: CircuitId) -> CircuitData {
    let entropy = sha256_concat(&[SETUP_DOMAIN, circuit.as_str().as_bytes()]);
    let proving_key = format!("{PK_PREFIX}:{}:{}", circuit.as_str(), entropy.to_hex()).into_bytes();
    let vk = MockVerificationKey {
        protocol: MOCK_ALGORITHM.to_string(),
        circuit_id: circuit,
        key: sha256(&proving_key),
    };
    CircuitData {
        circuit_id: circuit,
        // Serializing a struct of strings and hashes cannot fail.
        verification_key: serde_json::to_vec_pretty(&vk).unwrap_or_default(),
        proving_key,
        program: format!("zkid-mock-program:{}", circuit.as_str()).into_bytes(),
    }
}

fn proof_digest(key: &Hash256, circuit: CircuitId, signals: &[Hash256]) -> Hash256 {
    let mut acc = Sha256Accumulator::new();
    acc.update(PROOF_DOMAIN)
        .update(key.as_bytes())
        .update(circuit.as_str().as_bytes())
        .update(&[0]);
    for signal in signals {
        acc.update(signal.as_bytes());
    }
    acc.finalize()
}

/// Deterministic, transparent proof backend.
#[derive(Debug, Default, Clone, Copy)]
pub struct MockProofSystem;

impl ProofSystem for MockProofSystem {
    fn algorithm(&self) -> &'static str {
        MOCK_ALGORITHM
    }

    fn prove(
        &self,
        circuit: CircuitId,
        proving_key: &[u8],
        public_signals: &[Hash256],
    ) -> Result<Vec<u8>, ProofError> {
        let header = std::str::from_utf8(proving_key)
            .ok()
            .and_then(|s| s.strip_prefix(PK_PREFIX))
            .and_then(|s| s.strip_prefix(':'))
            .and_then(|s| s.split(':').next())
            .ok_or_else(|| ProofError::KeyMismatch("not a mock proving key".into()))?;
        if header != circuit.as_str() {
            return Err(ProofError::KeyMismatch(format!(
                "proving key is for {header}, not {circuit}"
            )));
        }
        let vk = sha256(proving_key);
        Ok(proof_digest(&vk, circuit, public_signals).as_bytes().to_vec())
    }

    fn verify(
        &self,
        circuit: CircuitId,
        verification_key: &[u8],
        proof: &[u8],
        public_signals: &[Hash256],
    ) -> Result<(), VerifyError> {
        let vk: MockVerificationKey = serde_json::from_slice(verification_key)
            .map_err(|e| VerifyError::KeyMismatch(format!("not a mock verification key: {e}")))?;
        if vk.protocol != MOCK_ALGORITHM || vk.circuit_id != circuit {
            return Err(VerifyError::KeyMismatch(format!(
                "verification key is {}/{}, proof is {MOCK_ALGORITHM}/{circuit}",
                vk.protocol, vk.circuit_id
            )));
        }
        let expected = proof_digest(&vk.key, circuit, public_signals);
        if bool::from(expected.as_bytes()[..].ct_eq(proof)) {
            Ok(())
        } else {
            Err(VerifyError::InvalidProof(format!(
                "proof does not match public signals for {circuit}"
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn signals() -> Vec<Hash256> {
        vec![sha256(b"user"), Hash256::from_u64(42), sha256(b"state")]
    }

    #[test]
    fn setup_is_deterministic() {
        assert_eq!(mock_setup(CircuitId::AuthV2), mock_setup(CircuitId::AuthV2));
        assert_ne!(
            mock_setup(CircuitId::AuthV2).proving_key,
            mock_setup(CircuitId::CredentialAtomicQuery).proving_key
        );
    }

    #[test]
    fn prove_then_verify() {
        let data = mock_setup(CircuitId::AuthV2);
        let proof = MockProofSystem
            .prove(CircuitId::AuthV2, &data.proving_key, &signals())
            .unwrap();
        MockProofSystem
            .verify(CircuitId::AuthV2, &data.verification_key, &proof, &signals())
            .unwrap();
    }

    #[test]
    fn changed_signal_fails() {
        let data = mock_setup(CircuitId::AuthV2);
        let proof = MockProofSystem
            .prove(CircuitId::AuthV2, &data.proving_key, &signals())
            .unwrap();
        let mut other = signals();
        other[1] = Hash256::from_u64(43);
        assert!(matches!(
            MockProofSystem.verify(CircuitId::AuthV2, &data.verification_key, &proof, &other),
            Err(VerifyError::InvalidProof(_))
        ));
    }

    #[test]
    fn keys_are_bound_to_their_circuit() {
        let auth = mock_setup(CircuitId::AuthV2);
        let query = mock_setup(CircuitId::CredentialAtomicQuery);
        assert!(matches!(
            MockProofSystem.prove(CircuitId::CredentialAtomicQuery, &auth.proving_key, &signals()),
            Err(ProofError::KeyMismatch(_))
        ));
        let proof = MockProofSystem
            .prove(CircuitId::AuthV2, &auth.proving_key, &signals())
            .unwrap();
        assert!(matches!(
            MockProofSystem.verify(CircuitId::AuthV2, &query.verification_key, &proof, &signals()),
            Err(VerifyError::KeyMismatch(_))
        ));
    }

    proptest! {
        #[test]
        fn any_flipped_proof_bit_fails(byte in 0usize..32, bit in 0u8..8) {
            let data = mock_setup(CircuitId::AuthV2);
            let mut proof = MockProofSystem
                .prove(CircuitId::AuthV2, &data.proving_key, &signals())
                .unwrap();
            proof[byte] ^= 1 << bit;
            prop_assert!(MockProofSystem
                .verify(CircuitId::AuthV2, &data.verification_key, &proof, &signals())
                .is_err());
        }
    }
}
