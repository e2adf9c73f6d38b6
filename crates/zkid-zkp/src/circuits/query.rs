//! `credentialAtomicQuery`: authentication plus a statement about one
//! credential. The credential's claim was issued to the holder under the
//! requested schema, sits in the issuer's claims tree, is not revoked at
//! the issuer's current state, and its subject satisfies the predicate.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use zkid_core::{sha256_canonical, CanonicalizationError, Did, Hash256};
use zkid_crypto::MerkleProof;
use zkid_identity::claim::schema_hash;
use zkid_identity::{Claim, Credential, IdentityState, RevocationStatus};

use super::auth::AuthWitness;
use super::{ensure, Circuit, CircuitId};
use crate::error::ProofError;

/// Comparison applied to a credential subject field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QueryOperator {
    /// No predicate; only possession is proven.
    #[serde(rename = "$noop")]
    Noop,
    /// Equal.
    #[serde(rename = "$eq")]
    Eq,
    /// Less than.
    #[serde(rename = "$lt")]
    Lt,
    /// Greater than.
    #[serde(rename = "$gt")]
    Gt,
    /// Member of a list.
    #[serde(rename = "$in")]
    In,
    /// Not a member of a list.
    #[serde(rename = "$nin")]
    Nin,
    /// Not equal.
    #[serde(rename = "$ne")]
    Ne,
}

impl QueryOperator {
    /// Numeric code exposed as a public signal.
    pub fn code(&self) -> u64 {
        match self {
            Self::Noop => 0,
            Self::Eq => 1,
            Self::Lt => 2,
            Self::Gt => 3,
            Self::In => 4,
            Self::Nin => 5,
            Self::Ne => 6,
        }
    }

    /// Apply the operator. A missing field satisfies only `Noop`.
    pub fn evaluate(&self, actual: Option<&Value>, expected: &Value) -> bool {
        let Some(actual) = actual else {
            return *self == Self::Noop;
        };
        match self {
            Self::Noop => true,
            Self::Eq => compare(actual, expected) == Some(Ordering::Equal),
            Self::Ne => compare(actual, expected) != Some(Ordering::Equal),
            Self::Lt => compare(actual, expected) == Some(Ordering::Less),
            Self::Gt => compare(actual, expected) == Some(Ordering::Greater),
            Self::In => expected
                .as_array()
                .is_some_and(|list| list.iter().any(|v| compare(actual, v) == Some(Ordering::Equal))),
            Self::Nin => expected
                .as_array()
                .is_some_and(|list| list.iter().all(|v| compare(actual, v) != Some(Ordering::Equal))),
        }
    }
}

// Numbers compare numerically, strings and booleans only for equality.
fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            if let (Some(x), Some(y)) = (x.as_i64(), y.as_i64()) {
                Some(x.cmp(&y))
            } else if let (Some(x), Some(y)) = (x.as_u64(), y.as_u64()) {
                Some(x.cmp(&y))
            } else {
                x.as_f64()?.partial_cmp(&y.as_f64()?)
            }
        }
        (Value::String(x), Value::String(y)) => (x == y).then_some(Ordering::Equal),
        (Value::Bool(x), Value::Bool(y)) => (x == y).then_some(Ordering::Equal),
        _ => None,
    }
}

/// A predicate over one credential subject field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldPredicate {
    /// Field name in `credentialSubject`.
    pub field: String,
    /// Operator.
    pub operator: QueryOperator,
    /// Operand.
    pub value: Value,
}

impl FieldPredicate {
    /// Commitment to the operand, exposed as a public signal.
    pub fn value_hash(&self) -> Result<Hash256, CanonicalizationError> {
        if self.operator == QueryOperator::Noop {
            return Ok(Hash256::ZERO);
        }
        sha256_canonical(&self.value)
    }
}

/// What one proof should establish. Built per attempt, never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct CircuitQuery {
    /// Circuit to prove.
    pub circuit_id: CircuitId,
    /// Challenge the proof binds.
    pub challenge: Hash256,
    /// Required credential schema URL.
    pub schema: Option<String>,
    /// Required credential type.
    pub credential_type: Option<String>,
    /// Predicate over the credential subject.
    pub predicate: Option<FieldPredicate>,
}

impl CircuitQuery {
    /// Plain authentication.
    pub fn auth(challenge: Hash256) -> Self {
        Self {
            circuit_id: CircuitId::AuthV2,
            challenge,
            schema: None,
            credential_type: None,
            predicate: None,
        }
    }

    /// Whether `credential` is of the requested schema and type.
    pub fn accepts(&self, credential: &Credential) -> bool {
        self.schema
            .as_deref()
            .map_or(true, |s| s == credential.credential_schema)
            && self
                .credential_type
                .as_deref()
                .map_or(true, |t| credential.credential_type.iter().any(|c| c == t))
    }
}

/// The `credentialAtomicQuery` circuit.
#[derive(Debug, Clone)]
pub struct CredentialAtomicQueryCircuit {
    /// Holder authentication.
    pub auth: AuthWitness,
    /// Issuer.
    pub issuer_id: Did,
    /// Credential claim.
    pub issuer_claim: Claim,
    /// Issuer state at issuance.
    pub issuer_claim_state: IdentityState,
    /// Inclusion of the claim in the issuer's claims tree at issuance.
    pub issuer_claim_mtp: MerkleProof,
    /// Current non-revocation proof of the claim nonce.
    pub non_rev: RevocationStatus,
    /// Requested schema.
    pub schema_hash: Hash256,
    /// Requested predicate.
    pub predicate: Option<FieldPredicate>,
    /// Unix seconds the proof is made at, for claim expiry.
    pub timestamp: i64,
    value_hash: Hash256,
}

impl CredentialAtomicQueryCircuit {
    /// Assemble the witness for a held credential.
    pub fn new(
        auth: AuthWitness,
        credential: &Credential,
        query: &CircuitQuery,
        non_rev: RevocationStatus,
        timestamp: i64,
    ) -> Result<Self, ProofError> {
        let value_hash = match &query.predicate {
            Some(p) => p
                .value_hash()
                .map_err(|e| ProofError::Unsatisfied(format!("predicate operand: {e}")))?,
            None => Hash256::ZERO,
        };
        Ok(Self {
            auth,
            issuer_id: credential.issuer.clone(),
            issuer_claim: credential.proof.core_claim.clone(),
            issuer_claim_state: credential.proof.issuer_state,
            issuer_claim_mtp: credential.proof.mtp.clone(),
            non_rev,
            schema_hash: schema_hash(query.schema.as_deref().unwrap_or(&credential.credential_schema)),
            predicate: query.predicate.clone(),
            timestamp,
            value_hash,
        })
    }

    fn operator(&self) -> QueryOperator {
        self.predicate
            .as_ref()
            .map_or(QueryOperator::Noop, |p| p.operator)
    }
}

impl Circuit for CredentialAtomicQueryCircuit {
    fn id(&self) -> CircuitId {
        CircuitId::CredentialAtomicQuery
    }

    fn check_constraints(&self) -> Result<(), ProofError> {
        self.auth.check()?;
        let claim = &self.issuer_claim;
        ensure(claim.subject.as_ref() == Some(&self.auth.user_id), || {
            "credential was not issued to the prover".into()
        })?;
        ensure(claim.schema_hash == self.schema_hash, || {
            "credential schema does not match the query".into()
        })?;
        ensure(
            claim.expiration.map_or(true, |exp| exp > self.timestamp),
            || "credential claim has expired".into(),
        )?;

        let (hi, hv) = claim
            .hashes()
            .map_err(|e| ProofError::Unsatisfied(format!("credential claim: {e}")))?;
        ensure(
            self.issuer_claim_state.is_consistent()
                && self.issuer_claim_mtp.existence
                && self
                    .issuer_claim_mtp
                    .verify(&self.issuer_claim_state.claims_root, &hi, Some(&hv)),
            || "credential claim is not in the issuer's claims tree".into(),
        )?;
        ensure(
            !self.non_rev.is_revoked() && self.non_rev.verify(claim.revocation_nonce),
            || format!("nonce {} is not proven unrevoked", claim.revocation_nonce),
        )?;

        if let Some(p) = &self.predicate {
            ensure(p.operator.evaluate(claim.value.get(&p.field), &p.value), || {
                format!("credentialSubject.{} does not satisfy {:?}", p.field, p.operator)
            })?;
        }
        Ok(())
    }

    fn public_signals(&self) -> Vec<Hash256> {
        let [user_id, challenge, user_state] = self.auth.signals();
        vec![
            user_id,
            challenge,
            user_state,
            self.issuer_id.id_hash(),
            self.non_rev.issuer.state,
            self.schema_hash,
            Hash256::from_u64(self.operator().code()),
            self.value_hash,
        ]
    }
}
