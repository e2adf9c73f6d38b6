//! `authV2`: the holder's auth claim is in its claims tree, is not revoked,
//! and the holder signed the challenge with the committed key.

use zkid_core::{Did, Hash256};
use zkid_crypto::{verify_signature, MerkleProof, PublicKey, Signature};
use zkid_identity::{nonce_key, Claim, IdentityState};

use super::{ensure, Circuit, CircuitId};
use crate::error::ProofError;

/// Private inputs shared by every authenticating circuit.
#[derive(Debug, Clone)]
pub struct AuthWitness {
    /// Holder.
    pub user_id: Did,
    /// Challenge the proof is bound to.
    pub challenge: Hash256,
    /// Holder state the proofs are against.
    pub state: IdentityState,
    /// Holder's authentication claim.
    pub auth_claim: Claim,
    /// Inclusion of the auth claim in the claims tree.
    pub claim_mtp: MerkleProof,
    /// Non-inclusion of the auth claim nonce in the revocation tree.
    pub non_rev_mtp: MerkleProof,
    /// Key committed by the auth claim.
    pub public_key: PublicKey,
    /// Signature over the challenge.
    pub signature: Signature,
}

impl AuthWitness {
    pub(crate) fn check(&self) -> Result<(), ProofError> {
        ensure(self.state.is_consistent(), || {
            "user state is not the hash of its roots".into()
        })?;
        ensure(
            self.auth_claim.auth_public_key().as_deref() == Some(self.public_key.to_hex().as_str()),
            || "auth claim does not commit to the signing key".into(),
        )?;
        let (hi, hv) = self
            .auth_claim
            .hashes()
            .map_err(|e| ProofError::Unsatisfied(format!("auth claim: {e}")))?;
        ensure(
            self.claim_mtp.existence && self.claim_mtp.verify(&self.state.claims_root, &hi, Some(&hv)),
            || "auth claim is not in the claims tree".into(),
        )?;
        let nonce = nonce_key(self.auth_claim.revocation_nonce);
        ensure(
            !self.non_rev_mtp.existence
                && self
                    .non_rev_mtp
                    .verify(&self.state.revocation_root, &nonce, Some(&Hash256::ZERO)),
            || "auth claim is revoked or the proof is invalid".into(),
        )?;
        ensure(
            verify_signature(&self.public_key, &self.challenge, &self.signature).is_ok(),
            || "challenge signature does not verify".into(),
        )
    }

    pub(crate) fn signals(&self) -> [Hash256; 3] {
        [self.user_id.id_hash(), self.challenge, self.state.state]
    }
}

/// The `authV2` circuit.
#[derive(Debug, Clone)]
pub struct AuthCircuit(pub AuthWitness);

impl Circuit for AuthCircuit {
    fn id(&self) -> CircuitId {
        CircuitId::AuthV2
    }

    fn check_constraints(&self) -> Result<(), ProofError> {
        self.0.check()
    }

    fn public_signals(&self) -> Vec<Hash256> {
        self.0.signals().to_vec()
    }
}
