//! # Identity State Store
//!
//! Holds every identity managed by this process: its authentication key
//! reference, its revocation options and the current [`IdentitySnapshot`] of
//! its three trees.
//!
//! ## Concurrency
//!
//! Mutation of one identity runs inside that identity's exclusive section (a
//! per-identity mutex). It clones the current snapshot, mutates the clone
//! and swaps it in. Trees sit behind `Arc`, so only the trees that change are
//! copied. Readers take an `Arc` of the current snapshot and keep a
//! consistent view for as long as they hold it, whatever writers do
//! meanwhile. Identities never share a lock.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use serde_json::{json, Value};
use zkid_core::{Blockchain, Did, DidMethod, Hash256, NetworkId};
use zkid_crypto::{KeyRef, KeyType, Kms, MerkleProof, SparseMerkleTree, DEFAULT_DEPTH};

use crate::claim::{schema_hash, Claim, AUTH_SCHEMA};
use crate::credential::{
    Credential, CredentialRequest, CredentialStatus, IssuerProof, RevocationStatus, StatusStrategy,
};
use crate::error::IdentityError;
use crate::state::{nonce_key, roots_pair_key, IdentityState};
use crate::storage::StateStorage;

/// Tree configuration shared by every identity in a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeConfig {
    /// Depth of all three trees.
    pub depth: usize,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            depth: DEFAULT_DEPTH,
        }
    }
}

/// Revocation options baked into credentials an identity issues.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevocationOptions {
    /// Strategy verifiers should use.
    pub strategy: StatusStrategy,
    /// Endpoint for that strategy (RHS URL, issuer status base URL, ...).
    pub id: String,
}

/// Parameters for [`IdentityStore::create_identity`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityOptions {
    /// DID method.
    pub method: DidMethod,
    /// Anchoring chain.
    pub blockchain: Blockchain,
    /// Network.
    pub network: NetworkId,
    /// Revocation options.
    pub revocation: RevocationOptions,
    /// Authentication key seed. Random when absent.
    pub seed: Option<[u8; 32]>,
}

/// Immutable view of one identity's trees at one version.
#[derive(Debug, Clone)]
pub struct IdentitySnapshot {
    did: Did,
    version: u64,
    claims: Arc<SparseMerkleTree>,
    revocations: Arc<SparseMerkleTree>,
    roots: Arc<SparseMerkleTree>,
    state: IdentityState,
}

impl IdentitySnapshot {
    fn recompute(&mut self) {
        self.state = IdentityState::from_roots(
            self.claims.root(),
            self.revocations.root(),
            self.roots.root(),
        );
    }

    /// Identity this snapshot belongs to.
    pub fn did(&self) -> &Did {
        &self.did
    }

    /// Monotonic version. Genesis is 0.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// State and tree roots.
    pub fn state(&self) -> IdentityState {
        self.state
    }

    /// Proof for a claim index in the claims tree.
    pub fn claim_proof(&self, h_index: &Hash256) -> MerkleProof {
        self.claims.prove(h_index)
    }

    /// Proof for a nonce in the revocation tree.
    pub fn revocation_proof(&self, nonce: u64) -> MerkleProof {
        self.revocations.prove(&nonce_key(nonce))
    }

    /// Whether `nonce` is revoked in this version.
    pub fn is_revoked(&self, nonce: u64) -> bool {
        self.revocations.contains(&nonce_key(nonce))
    }

    /// Revocation status of `nonce` at this version.
    pub fn revocation_status(&self, nonce: u64) -> RevocationStatus {
        RevocationStatus {
            issuer: self.state,
            mtp: self.revocation_proof(nonce),
        }
    }

    /// The revocation tree, for publication of its nodes.
    pub fn revocation_tree(&self) -> &SparseMerkleTree {
        &self.revocations
    }
}

// Revocation nonces taken by claims in the claims tree.
#[derive(Clone)]
struct NonceLedger {
    next: u64,
    used: BTreeSet<u64>,
}

impl NonceLedger {
    fn genesis(auth_nonce: u64) -> Self {
        Self {
            next: 1,
            used: BTreeSet::from([auth_nonce]),
        }
    }

    // Take `requested`, or the lowest free nonce from `next` on.
    fn take(&mut self, did: &Did, requested: Option<u64>) -> Result<u64, IdentityError> {
        let nonce = match requested {
            Some(n) => n,
            None => {
                while self.used.contains(&self.next) {
                    self.next += 1;
                }
                self.next
            }
        };
        if !self.used.insert(nonce) {
            return Err(IdentityError::NonceInUse {
                did: did.to_string(),
                nonce,
            });
        }
        Ok(nonce)
    }
}

struct IdentityEntry {
    auth_key: KeyRef,
    auth_claim: Claim,
    revocation: RevocationOptions,
    // Held for the whole of a mutation.
    write: Mutex<NonceLedger>,
    current: RwLock<Arc<IdentitySnapshot>>,
}

/// Store of identities and their state.
pub struct IdentityStore {
    kms: Arc<Kms>,
    config: TreeConfig,
    identities: RwLock<HashMap<Did, Arc<IdentityEntry>>>,
}

impl IdentityStore {
    /// Store backed by `kms`.
    pub fn new(kms: Arc<Kms>, config: TreeConfig) -> Self {
        Self {
            kms,
            config,
            identities: RwLock::new(HashMap::new()),
        }
    }

    /// The key management service this store signs with.
    pub fn kms(&self) -> &Arc<Kms> {
        &self.kms
    }

    fn entry(&self, did: &Did) -> Result<Arc<IdentityEntry>, IdentityError> {
        self.identities
            .read()
            .get(did)
            .cloned()
            .ok_or_else(|| IdentityError::UnknownIdentity(did.to_string()))
    }

    /// Create an identity.
    ///
    /// Creates an Ed25519 authentication key, inserts its auth claim into a
    /// fresh claims tree, derives the genesis state and the DID, and returns
    /// the DID with the auth credential. Deterministic for a fixed seed and
    /// tree depth.
    pub fn create_identity(&self, opts: IdentityOptions) -> Result<(Did, Credential), IdentityError> {
        let auth_key = self.kms.create_key(KeyType::Ed25519, opts.seed.as_ref())?;
        let public_key = self.kms.public_key(&auth_key)?;
        let auth_claim = Claim::auth(&public_key);
        let (hi, hv) = auth_claim.hashes()?;

        let mut claims = SparseMerkleTree::new(self.config.depth)?;
        claims.insert(hi, hv)?;
        let revocations = SparseMerkleTree::new(self.config.depth)?;
        let roots = SparseMerkleTree::new(self.config.depth)?;
        let state = IdentityState::from_roots(claims.root(), revocations.root(), roots.root());
        let did = Did::from_genesis(opts.method, opts.blockchain, opts.network, &state.state)?;

        let snapshot = IdentitySnapshot {
            did: did.clone(),
            version: 0,
            claims: Arc::new(claims),
            revocations: Arc::new(revocations),
            roots: Arc::new(roots),
            state,
        };
        let credential = Credential {
            id: format!("urn:uuid:{}", uuid::Uuid::new_v4()),
            credential_type: vec![
                "VerifiableCredential".into(),
                "AuthEd25519Credential".into(),
            ],
            issuer: did.clone(),
            credential_subject: json!({
                "id": did.to_string(),
                "type": "AuthEd25519Credential",
                "publicKey": public_key.to_hex(),
            }),
            credential_schema: AUTH_SCHEMA.to_string(),
            issuance_date: Utc::now(),
            expiration_date: None,
            credential_status: CredentialStatus {
                id: opts.revocation.id.clone(),
                strategy: opts.revocation.strategy,
                revocation_nonce: auth_claim.revocation_nonce,
            },
            proof: IssuerProof {
                issuer_state: state,
                mtp: snapshot.claim_proof(&hi),
                core_claim: auth_claim.clone(),
            },
        };

        let mut identities = self.identities.write();
        if identities.contains_key(&did) {
            return Err(IdentityError::AlreadyExists(did.to_string()));
        }
        identities.insert(
            did.clone(),
            Arc::new(IdentityEntry {
                auth_key,
                write: Mutex::new(NonceLedger::genesis(auth_claim.revocation_nonce)),
                auth_claim,
                revocation: opts.revocation,
                current: RwLock::new(Arc::new(snapshot)),
            }),
        );
        tracing::info!(did = %did, genesis = %state.state, "created identity");
        Ok((did, credential))
    }

    /// Whether the store holds `did`.
    pub fn contains(&self, did: &Did) -> bool {
        self.identities.read().contains_key(did)
    }

    /// All identities held, in no particular order.
    pub fn dids(&self) -> Vec<Did> {
        self.identities.read().keys().cloned().collect()
    }

    /// Current snapshot.
    pub fn snapshot(&self, did: &Did) -> Result<Arc<IdentitySnapshot>, IdentityError> {
        Ok(self.entry(did)?.current.read().clone())
    }

    /// Authentication key reference.
    pub fn auth_key(&self, did: &Did) -> Result<KeyRef, IdentityError> {
        Ok(self.entry(did)?.auth_key.clone())
    }

    /// Authentication claim.
    pub fn auth_claim(&self, did: &Did) -> Result<Claim, IdentityError> {
        Ok(self.entry(did)?.auth_claim.clone())
    }

    // Runs `f` on private copies of the current snapshot and nonce ledger
    // inside the identity's exclusive section, records the new root pair and
    // swaps both in. On error nothing changes.
    fn mutate<T>(
        &self,
        did: &Did,
        f: impl FnOnce(&mut IdentitySnapshot, &mut NonceLedger) -> Result<T, IdentityError>,
    ) -> Result<(Arc<IdentitySnapshot>, T), IdentityError> {
        let entry = self.entry(did)?;
        let mut ledger = entry.write.lock();
        let mut next = IdentitySnapshot::clone(&entry.current.read());
        let mut next_ledger = ledger.clone();

        let out = f(&mut next, &mut next_ledger)?;
        let pair = roots_pair_key(&next.claims.root(), &next.revocations.root());
        Arc::make_mut(&mut next.roots).insert(pair, Hash256::ZERO)?;
        next.version += 1;
        next.recompute();

        let next = Arc::new(next);
        *entry.current.write() = next.clone();
        *ledger = next_ledger;
        Ok((next, out))
    }

    /// Add a claim to the claims tree. Returns the new state.
    ///
    /// Fails with [`IdentityError::NonceInUse`] if another claim already
    /// holds the claim's revocation nonce.
    pub fn apply_claim(&self, did: &Did, claim: &Claim) -> Result<IdentityState, IdentityError> {
        let (hi, hv) = claim.hashes()?;
        let (snap, ()) = self.mutate(did, |s, nonces| {
            nonces.take(did, Some(claim.revocation_nonce))?;
            Arc::make_mut(&mut s.claims).insert(hi, hv)?;
            Ok(())
        })?;
        tracing::debug!(did = %did, version = snap.version, state = %snap.state.state, "applied claim");
        Ok(snap.state)
    }

    /// Add a nonce to the revocation tree. Returns the new state.
    pub fn apply_revocation(&self, did: &Did, nonce: u64) -> Result<IdentityState, IdentityError> {
        let (snap, ()) = self.mutate(did, |s, _| {
            Arc::make_mut(&mut s.revocations).insert(nonce_key(nonce), Hash256::ZERO)?;
            Ok(())
        })?;
        tracing::info!(did = %did, nonce, state = %snap.state.state, "revoked nonce");
        Ok(snap.state)
    }

    /// Issue a credential from `issuer` to `subject`.
    ///
    /// The claim lands in the issuer's claims tree; the credential carries the
    /// inclusion proof against the resulting issuer state. Without an
    /// explicit nonce the issuer assigns the next unused one; an explicit
    /// nonce another claim holds is [`IdentityError::NonceInUse`].
    pub fn issue_credential(
        &self,
        issuer: &Did,
        subject: &Did,
        request: CredentialRequest,
    ) -> Result<Credential, IdentityError> {
        let revocation = self.entry(issuer)?.revocation.clone();
        let mut subject_data = match request.credential_subject {
            Value::Object(map) => map,
            Value::Null => serde_json::Map::new(),
            other => {
                return Err(IdentityError::InvalidCredential(format!(
                    "credentialSubject must be an object, got {other}"
                )))
            }
        };
        subject_data.insert("id".into(), Value::String(subject.to_string()));
        let subject_value = Value::Object(subject_data);

        let (snap, claim) = self.mutate(issuer, |s, nonces| {
            let revocation_nonce = nonces.take(issuer, request.revocation_nonce)?;
            let claim = Claim {
                schema_hash: schema_hash(&request.credential_schema),
                subject: Some(subject.clone()),
                index: json!({ "type": request.credential_type }),
                value: subject_value.clone(),
                revocation_nonce,
                version: 0,
                expiration: request.expiration.map(|t| t.timestamp()),
            };
            let (hi, hv) = claim.hashes()?;
            Arc::make_mut(&mut s.claims).insert(hi, hv)?;
            Ok(claim)
        })?;

        let hi = claim.h_index()?;
        let credential = Credential {
            id: format!("urn:uuid:{}", uuid::Uuid::new_v4()),
            credential_type: vec!["VerifiableCredential".into(), request.credential_type],
            issuer: issuer.clone(),
            credential_subject: subject_value,
            credential_schema: request.credential_schema,
            issuance_date: Utc::now(),
            expiration_date: request.expiration,
            credential_status: CredentialStatus {
                id: revocation.id,
                strategy: revocation.strategy,
                revocation_nonce: claim.revocation_nonce,
            },
            proof: IssuerProof {
                issuer_state: snap.state,
                mtp: snap.claim_proof(&hi),
                core_claim: claim,
            },
        };
        tracing::info!(issuer = %issuer, subject = %subject, credential = %credential.id, "issued credential");
        Ok(credential)
    }

    /// Revoke a credential this identity issued.
    pub fn revoke_credential(&self, issuer: &Did, credential: &Credential) -> Result<IdentityState, IdentityError> {
        if credential.issuer != *issuer {
            return Err(IdentityError::NotIssuer {
                credential: credential.id.clone(),
                issuer: issuer.to_string(),
            });
        }
        self.apply_revocation(issuer, credential.credential_status.revocation_nonce)
    }

    /// Current revocation status of `nonce` in `did`'s revocation tree.
    pub fn revocation_status(&self, did: &Did, nonce: u64) -> Result<RevocationStatus, IdentityError> {
        Ok(self.snapshot(did)?.revocation_status(nonce))
    }

    /// Publish the current state root of `did` to `storage`.
    pub async fn publish_state(
        &self,
        did: &Did,
        storage: &dyn StateStorage,
    ) -> Result<IdentityState, IdentityError> {
        let state = self.snapshot(did)?.state();
        storage.publish(did, state.state).await?;
        tracing::info!(did = %did, state = %state.state, "published state");
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryStateStorage;
    use std::thread;

    fn store(depth: usize) -> IdentityStore {
        IdentityStore::new(Arc::new(Kms::in_memory()), TreeConfig { depth })
    }

    fn opts(seed: Option<[u8; 32]>) -> IdentityOptions {
        IdentityOptions {
            method: DidMethod::PolygonId,
            blockchain: Blockchain::Polygon,
            network: NetworkId::Amoy,
            revocation: RevocationOptions {
                strategy: StatusStrategy::ReverseHashService,
                id: "https://rhs-staging.polygonid.me".into(),
            },
            seed,
        }
    }

    fn kyc_request() -> CredentialRequest {
        CredentialRequest {
            credential_schema: "https://example.com/schemas/kyc.json".into(),
            credential_type: "KYCAgeCredential".into(),
            credential_subject: json!({"birthday": 19960424, "documentType": 2}),
            expiration: None,
            revocation_nonce: None,
        }
    }

    #[test]
    fn genesis_is_deterministic_for_a_fixed_seed() {
        let (a, _) = store(DEFAULT_DEPTH).create_identity(opts(Some([4u8; 32]))).unwrap();
        let (b, _) = store(DEFAULT_DEPTH).create_identity(opts(Some([4u8; 32]))).unwrap();
        assert_eq!(a, b);
        let (c, _) = store(DEFAULT_DEPTH).create_identity(opts(Some([5u8; 32]))).unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn genesis_did_matches_genesis_state() {
        let s = store(DEFAULT_DEPTH);
        let (did, cred) = s.create_identity(opts(None)).unwrap();
        let snap = s.snapshot(&did).unwrap();
        assert_eq!(snap.version(), 0);
        assert!(did.matches_genesis(&snap.state().state));
        assert_eq!(snap.state().revocation_root, Hash256::ZERO);
        assert_eq!(snap.state().roots_root, Hash256::ZERO);
        assert!(cred.verify_issuer_proof());
        assert_eq!(cred.credential_status.revocation_nonce, 0);
    }

    #[test]
    fn same_seed_twice_in_one_store_is_rejected() {
        let s = store(DEFAULT_DEPTH);
        s.create_identity(opts(Some([1u8; 32]))).unwrap();
        assert!(matches!(
            s.create_identity(opts(Some([1u8; 32]))),
            Err(IdentityError::AlreadyExists(_))
        ));
    }

    #[test]
    fn claims_and_revocations_produce_new_consistent_states() {
        let s = store(DEFAULT_DEPTH);
        let (issuer, _) = s.create_identity(opts(None)).unwrap();
        let (holder, _) = s.create_identity(opts(None)).unwrap();
        let genesis = s.snapshot(&issuer).unwrap().state();

        let cred = s.issue_credential(&issuer, &holder, kyc_request()).unwrap();
        assert!(cred.verify_issuer_proof());
        assert_eq!(cred.subject_did(), Some(holder.clone()));
        let after_issue = s.snapshot(&issuer).unwrap();
        assert_eq!(after_issue.version(), 1);
        assert_ne!(after_issue.state().state, genesis.state);
        assert_ne!(after_issue.state().roots_root, Hash256::ZERO);
        assert!(after_issue.state().is_consistent());

        let nonce = cred.credential_status.revocation_nonce;
        assert!(!s.revocation_status(&issuer, nonce).unwrap().is_revoked());
        s.revoke_credential(&issuer, &cred).unwrap();
        let status = s.revocation_status(&issuer, nonce).unwrap();
        assert!(status.is_revoked());
        assert!(status.verify(nonce));
    }

    #[test]
    fn issuer_assigns_distinct_nonces() {
        let s = store(DEFAULT_DEPTH);
        let (issuer, _) = s.create_identity(opts(None)).unwrap();
        let (holder, _) = s.create_identity(opts(None)).unwrap();
        let mut second = kyc_request();
        second.credential_type = "Membership".into();
        let a = s.issue_credential(&issuer, &holder, kyc_request()).unwrap();
        let b = s.issue_credential(&issuer, &holder, second).unwrap();
        assert_ne!(
            a.credential_status.revocation_nonce,
            b.credential_status.revocation_nonce
        );
        assert_ne!(a.credential_status.revocation_nonce, 0);
    }

    #[test]
    fn explicit_nonces_cannot_be_shared() {
        let s = store(DEFAULT_DEPTH);
        let (issuer, _) = s.create_identity(opts(None)).unwrap();
        let (holder, _) = s.create_identity(opts(None)).unwrap();
        let auto = s.issue_credential(&issuer, &holder, kyc_request()).unwrap();
        let taken = auto.credential_status.revocation_nonce;

        let before = s.snapshot(&issuer).unwrap();
        for nonce in [taken, 0] {
            let mut req = kyc_request();
            req.credential_type = format!("Reuse{nonce}");
            req.revocation_nonce = Some(nonce);
            assert!(matches!(
                s.issue_credential(&issuer, &holder, req),
                Err(IdentityError::NonceInUse { nonce: n, .. }) if n == nonce
            ));
        }
        assert_eq!(s.snapshot(&issuer).unwrap().version(), before.version());

        // An explicit nonce ahead of the counter is skipped by assignment.
        let mut explicit = kyc_request();
        explicit.credential_type = "Explicit".into();
        explicit.revocation_nonce = Some(taken + 1);
        let explicit = s.issue_credential(&issuer, &holder, explicit).unwrap();
        assert_eq!(explicit.credential_status.revocation_nonce, taken + 1);
        let mut next = kyc_request();
        next.credential_type = "Next".into();
        let next = s.issue_credential(&issuer, &holder, next).unwrap();
        assert_eq!(next.credential_status.revocation_nonce, taken + 2);

        // Revoking one credential leaves the other unrevoked.
        s.revoke_credential(&issuer, &explicit).unwrap();
        assert!(!s.revocation_status(&issuer, taken + 2).unwrap().is_revoked());
    }

    #[test]
    fn revoking_twice_fails_and_leaves_state_alone() {
        let s = store(DEFAULT_DEPTH);
        let (did, _) = s.create_identity(opts(None)).unwrap();
        s.apply_revocation(&did, 9).unwrap();
        let before = s.snapshot(&did).unwrap();
        assert!(s.apply_revocation(&did, 9).is_err());
        let after = s.snapshot(&did).unwrap();
        assert_eq!(before.version(), after.version());
        assert_eq!(before.state(), after.state());
    }

    #[test]
    fn only_the_issuer_can_revoke() {
        let s = store(DEFAULT_DEPTH);
        let (issuer, _) = s.create_identity(opts(None)).unwrap();
        let (holder, _) = s.create_identity(opts(None)).unwrap();
        let cred = s.issue_credential(&issuer, &holder, kyc_request()).unwrap();
        assert!(matches!(
            s.revoke_credential(&holder, &cred),
            Err(IdentityError::NotIssuer { .. })
        ));
    }

    #[test]
    fn shallow_trees_report_depth_exceeded() {
        let s = store(1);
        let (issuer, _) = s.create_identity(opts(None)).unwrap();
        let (holder, _) = s.create_identity(opts(None)).unwrap();
        // Two slots: the auth claim holds one, so at most one more claim fits.
        let mut failures = 0;
        for i in 0..4 {
            let mut req = kyc_request();
            req.credential_type = format!("T{i}");
            match s.issue_credential(&issuer, &holder, req) {
                Ok(_) => {}
                Err(e) => {
                    assert!(e.is_tree_depth_exceeded(), "unexpected error {e}");
                    failures += 1;
                }
            }
        }
        assert!(failures >= 3);
    }

    #[test]
    fn unknown_identity() {
        let s = store(DEFAULT_DEPTH);
        let other = store(DEFAULT_DEPTH);
        let (did, _) = other.create_identity(opts(None)).unwrap();
        assert!(matches!(s.snapshot(&did), Err(IdentityError::UnknownIdentity(_))));
    }

    #[test]
    fn snapshots_stay_consistent_under_concurrent_mutation() {
        let s = Arc::new(store(DEFAULT_DEPTH));
        let (did, _) = s.create_identity(opts(None)).unwrap();
        let auth = s.auth_claim(&did).unwrap();
        let hi = auth.h_index().unwrap();
        let hv = auth.h_value().unwrap();

        let writer = {
            let s = s.clone();
            let did = did.clone();
            thread::spawn(move || {
                for n in 1..=64u64 {
                    s.apply_revocation(&did, n).unwrap();
                }
            })
        };
        let mut last_version = 0;
        for _ in 0..200 {
            let snap = s.snapshot(&did).unwrap();
            assert!(snap.version() >= last_version);
            last_version = snap.version();
            let st = snap.state();
            assert!(st.is_consistent());
            assert!(snap.claim_proof(&hi).verify(&st.claims_root, &hi, Some(&hv)));
            assert!(snap.revocation_proof(0).verify(&st.revocation_root, &nonce_key(0), None));
        }
        writer.join().unwrap();
        assert_eq!(s.snapshot(&did).unwrap().version(), 64);
    }

    #[tokio::test]
    async fn publish_state_writes_current_root() {
        let s = store(DEFAULT_DEPTH);
        let storage = InMemoryStateStorage::new();
        let (did, _) = s.create_identity(opts(None)).unwrap();
        s.apply_revocation(&did, 3).unwrap();
        let published = s.publish_state(&did, &storage).await.unwrap();
        assert_eq!(storage.latest_state(&did).await.unwrap(), Some(published.state));
    }
}
