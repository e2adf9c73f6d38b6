//! # Credentials and Revocation Status
//!
//! A [`Credential`] is issued claim data plus everything a holder needs to
//! prove it later: the issuer's state at issuance, the inclusion proof of the
//! claim in the issuer's claims tree, and a [`CredentialStatus`] telling
//! verifiers how to check revocation.
//!
//! Credentials are never mutated after issuance. Revocation happens in the
//! issuer's revocation tree and is observed through a [`RevocationStatus`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use zkid_core::Did;
use zkid_crypto::MerkleProof;

use crate::claim::Claim;
use crate::state::{nonce_key, IdentityState};

/// How a verifier resolves revocation status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StatusStrategy {
    /// Ask the issuer's own status endpoint.
    #[serde(rename = "SparseMerkleTreeProof")]
    IssuerHosted,
    /// Walk the issuer's published tree nodes on a reverse hash service.
    #[serde(rename = "Iden3ReverseSparseMerkleTreeProof")]
    ReverseHashService,
    /// Read the issuer's state from the chain.
    #[serde(rename = "Iden3OnchainSparseMerkleTreeProof2023")]
    OnChain,
    /// Ask an agent over the messaging protocol.
    #[serde(rename = "Iden3commRevocationStatusV1.0")]
    Agent,
    /// Any tag this build does not know.
    #[serde(other)]
    Unknown,
}

impl StatusStrategy {
    /// Wire tag.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::IssuerHosted => "SparseMerkleTreeProof",
            Self::ReverseHashService => "Iden3ReverseSparseMerkleTreeProof",
            Self::OnChain => "Iden3OnchainSparseMerkleTreeProof2023",
            Self::Agent => "Iden3commRevocationStatusV1.0",
            Self::Unknown => "Unknown",
        }
    }
}

impl std::fmt::Display for StatusStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where and how to check a credential's revocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialStatus {
    /// Resolution endpoint or identifier. Meaning depends on the strategy.
    pub id: String,
    /// Strategy tag.
    #[serde(rename = "type")]
    pub strategy: StatusStrategy,
    /// Nonce to look up in the issuer's revocation tree.
    pub revocation_nonce: u64,
}

/// Issuer's proof that the credential's claim is in its claims tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuerProof {
    /// Issuer state right after the claim was added.
    pub issuer_state: IdentityState,
    /// The claim itself.
    pub core_claim: Claim,
    /// Inclusion proof against `issuer_state.claims_root`.
    pub mtp: MerkleProof,
}

/// An issued credential.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credential {
    /// `urn:uuid:` identifier.
    pub id: String,
    /// Credential types, most specific last.
    #[serde(rename = "type")]
    pub credential_type: Vec<String>,
    /// Issuer identifier.
    pub issuer: Did,
    /// Subject data. Always carries the holder's DID as `id`.
    pub credential_subject: Value,
    /// Schema URL.
    pub credential_schema: String,
    /// Issuance time.
    pub issuance_date: DateTime<Utc>,
    /// Expiration time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration_date: Option<DateTime<Utc>>,
    /// Revocation status pointer.
    pub credential_status: CredentialStatus,
    /// Issuer inclusion proof.
    pub proof: IssuerProof,
}

impl Credential {
    /// Holder DID from `credentialSubject.id`.
    pub fn subject_did(&self) -> Option<Did> {
        self.credential_subject
            .get("id")
            .and_then(Value::as_str)
            .and_then(|s| Did::parse(s).ok())
    }

    /// Whether the issuer proof is internally consistent: the claim hashes
    /// into the claims root and that root is part of the stated issuer state.
    pub fn verify_issuer_proof(&self) -> bool {
        let state = &self.proof.issuer_state;
        if !state.is_consistent() {
            return false;
        }
        match self.proof.core_claim.hashes() {
            Ok((hi, hv)) => self.proof.mtp.verify(&state.claims_root, &hi, Some(&hv)),
            Err(_) => false,
        }
    }
}

/// What an issuer needs to mint a credential.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialRequest {
    /// Schema URL.
    pub credential_schema: String,
    /// Most specific credential type.
    #[serde(rename = "type")]
    pub credential_type: String,
    /// Subject fields. `id` is filled in by the issuer.
    pub credential_subject: Value,
    /// Expiration time.
    #[serde(default)]
    pub expiration: Option<DateTime<Utc>>,
    /// Explicit revocation nonce. The issuer assigns one when absent.
    #[serde(default)]
    pub revocation_nonce: Option<u64>,
}

/// Revocation status of one nonce at one issuer state.
///
/// Recomputed on every check. Never cached across issuer state changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevocationStatus {
    /// Issuer state the proof is against.
    pub issuer: IdentityState,
    /// Proof of inclusion (revoked) or non-inclusion (valid) of the nonce.
    pub mtp: MerkleProof,
}

impl RevocationStatus {
    /// Whether the nonce is revoked.
    pub fn is_revoked(&self) -> bool {
        self.mtp.existence
    }

    /// Whether the proof is valid for `nonce` against the stated issuer
    /// revocation root, and that root belongs to the stated issuer state.
    pub fn verify(&self, nonce: u64) -> bool {
        self.issuer.is_consistent()
            && self.mtp.verify(
                &self.issuer.revocation_root,
                &nonce_key(nonce),
                Some(&zkid_core::Hash256::ZERO),
            )
    }
}
