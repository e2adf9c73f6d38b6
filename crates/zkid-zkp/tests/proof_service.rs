//! Proof Service behavior over in-memory identity, status and circuit
//! backends.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use zkid_core::{sha256, Blockchain, Did, DidMethod, Hash256, NetworkId, RetryPolicy};
use zkid_crypto::{Kms, DEFAULT_DEPTH};
use zkid_identity::{
    Claim, Credential, CredentialRequest, IdentityOptions, IdentityStore, InMemoryStateStorage,
    RevocationOptions, RevocationStatus, StateStorage, StatusStrategy, TreeConfig,
};
use zkid_status::{BackendError, CredentialStatusResolver, ResolverRegistry, StatusRequest};
use zkid_zkp::{
    CircuitId, CircuitQuery, FieldPredicate, GenesisPolicy, InMemoryCircuitStorage,
    MockProofSystem, ProofService, ProofServiceConfig, ProofServiceError, QueryOperator,
};

const SCHEMA: &str = "https://schemas.example/kyc.json";

/// Serves status straight from the issuer's store.
struct LocalIssuer(Arc<IdentityStore>);

#[async_trait]
impl CredentialStatusResolver for LocalIssuer {
    async fn resolve(&self, request: &StatusRequest) -> Result<RevocationStatus, BackendError> {
        self.0
            .revocation_status(&request.issuer, request.status.revocation_nonce)
            .map_err(|e| BackendError::Permanent(e.to_string()))
    }
}

struct Env {
    store: Arc<IdentityStore>,
    states: Arc<InMemoryStateStorage>,
    service: ProofService,
    issuer: Did,
    holder: Did,
}

fn env_with(config: ProofServiceConfig, circuits: InMemoryCircuitStorage) -> Env {
    let store = Arc::new(IdentityStore::new(
        Arc::new(Kms::in_memory()),
        TreeConfig {
            depth: DEFAULT_DEPTH,
        },
    ));
    let create = |seed: u8| {
        store
            .create_identity(IdentityOptions {
                method: DidMethod::PolygonId,
                blockchain: Blockchain::Polygon,
                network: NetworkId::Amoy,
                revocation: RevocationOptions {
                    strategy: StatusStrategy::IssuerHosted,
                    id: "local://status".into(),
                },
                seed: Some([seed; 32]),
            })
            .unwrap()
            .0
    };
    let issuer = create(1);
    let holder = create(2);

    let resolvers = Arc::new(ResolverRegistry::new(RetryPolicy::immediate(0)));
    resolvers
        .register(StatusStrategy::IssuerHosted, Arc::new(LocalIssuer(store.clone())))
        .unwrap();
    let states = Arc::new(InMemoryStateStorage::new());
    let service = ProofService::new(
        store.clone(),
        resolvers,
        states.clone(),
        Arc::new(circuits),
        Arc::new(MockProofSystem),
        config,
    );
    Env {
        store,
        states,
        service,
        issuer,
        holder,
    }
}

fn env() -> Env {
    env_with(
        ProofServiceConfig::default(),
        InMemoryCircuitStorage::with_mock_setup(),
    )
}

fn kyc(env: &Env) -> Credential {
    env.store
        .issue_credential(
            &env.issuer,
            &env.holder,
            CredentialRequest {
                credential_schema: SCHEMA.into(),
                credential_type: "KYCAgeCredential".into(),
                credential_subject: json!({"birthday": 19960424, "country": "DE"}),
                expiration: None,
                revocation_nonce: None,
            },
        )
        .unwrap()
}

fn query(challenge: Hash256, operator: QueryOperator, value: serde_json::Value) -> CircuitQuery {
    CircuitQuery {
        circuit_id: CircuitId::CredentialAtomicQuery,
        challenge,
        schema: Some(SCHEMA.into()),
        credential_type: Some("KYCAgeCredential".into()),
        predicate: Some(FieldPredicate {
            field: "birthday".into(),
            operator,
            value,
        }),
    }
}

#[tokio::test]
async fn auth_proof_verifies_for_genesis_identity() {
    let env = env();
    let challenge = sha256(b"login");
    let proof = env
        .service
        .generate_auth_proof(&env.holder, challenge)
        .await
        .unwrap();
    assert_eq!(proof.circuit_id, CircuitId::AuthV2);
    assert_eq!(proof.pub_signals[0], env.holder.id_hash());
    assert_eq!(proof.pub_signals[1], challenge);
    env.service
        .verify_authentication(&env.holder, &challenge, &proof)
        .await
        .unwrap();

    // The proof names its holder and challenge.
    assert!(env
        .service
        .verify_authentication(&env.issuer, &challenge, &proof)
        .await
        .is_err());
    assert!(env
        .service
        .verify_authentication(&env.holder, &sha256(b"other"), &proof)
        .await
        .is_err());
}

#[tokio::test]
async fn tampered_signals_fail_verification() {
    let env = env();
    let mut proof = env
        .service
        .generate_auth_proof(&env.holder, Hash256::from_u64(7))
        .await
        .unwrap();
    proof.pub_signals[1] = Hash256::from_u64(8);
    assert!(matches!(
        env.service.verify_proof(&proof).await,
        Err(ProofServiceError::ProofVerification(_))
    ));
}

#[tokio::test]
async fn verify_state_genesis_fallback_and_rejection() {
    let env = env();
    let genesis = env.store.snapshot(&env.holder).unwrap().state().state;
    assert!(env.service.verify_state(&env.holder, &genesis).await.unwrap());
    assert!(matches!(
        env.service.verify_state(&env.holder, &sha256(b"bogus")).await,
        Err(ProofServiceError::StateVerification { .. })
    ));

    // Once published, only the latest state is accepted.
    env.store
        .apply_claim(
            &env.holder,
            &Claim {
                schema_hash: sha256(b"s"),
                subject: None,
                index: json!({"n": 1}),
                value: json!(null),
                revocation_nonce: 100,
                version: 0,
                expiration: None,
            },
        )
        .unwrap();
    let published = env
        .store
        .publish_state(&env.holder, env.states.as_ref())
        .await
        .unwrap();
    assert!(env
        .service
        .verify_state(&env.holder, &published.state)
        .await
        .unwrap());
    assert!(env.service.verify_state(&env.holder, &genesis).await.is_err());
}

#[tokio::test]
async fn genesis_policy_deny_requires_publication() {
    let env = env_with(
        ProofServiceConfig {
            genesis: GenesisPolicy::Deny,
            ..ProofServiceConfig::default()
        },
        InMemoryCircuitStorage::with_mock_setup(),
    );
    let genesis = env.store.snapshot(&env.holder).unwrap().state().state;
    assert!(matches!(
        env.service.verify_state(&env.holder, &genesis).await,
        Err(ProofServiceError::StateVerification { .. })
    ));
    env.states.publish(&env.holder, genesis).await.unwrap();
    assert!(env.service.verify_state(&env.holder, &genesis).await.unwrap());
}

#[tokio::test]
async fn credential_proof_with_predicate() {
    let env = env();
    let cred = kyc(&env);
    let challenge = sha256(b"age check");
    let proof = env
        .service
        .generate_credential_proof(
            &env.holder,
            &cred,
            &query(challenge, QueryOperator::Lt, json!(20000101)),
        )
        .await
        .unwrap();
    assert_eq!(proof.circuit_id, CircuitId::CredentialAtomicQuery);
    assert_eq!(proof.pub_signals.len(), 8);
    assert_eq!(proof.pub_signals[1], challenge);
    assert_eq!(proof.pub_signals[3], env.issuer.id_hash());
    assert_eq!(
        proof.pub_signals[4],
        env.store.snapshot(&env.issuer).unwrap().state().state
    );
    assert_eq!(proof.pub_signals[6], Hash256::from_u64(QueryOperator::Lt.code()));
    env.service.verify_proof(&proof).await.unwrap();
}

#[tokio::test]
async fn unsatisfied_predicate_is_a_generation_error() {
    let env = env();
    let cred = kyc(&env);
    let err = env
        .service
        .generate_credential_proof(
            &env.holder,
            &cred,
            &query(Hash256::from_u64(1), QueryOperator::Gt, json!(20000101)),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ProofServiceError::ProofGeneration(_)), "{err:?}");
}

#[tokio::test]
async fn credential_of_another_holder_cannot_be_proven() {
    let env = env();
    let cred = kyc(&env);
    let err = env
        .service
        .generate_credential_proof(
            &env.issuer,
            &cred,
            &query(Hash256::from_u64(1), QueryOperator::Noop, json!(null)),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ProofServiceError::ProofGeneration(_)), "{err:?}");
}

#[tokio::test]
async fn revoked_credential_is_refused() {
    let env = env();
    let cred = kyc(&env);
    env.store.revoke_credential(&env.issuer, &cred).unwrap();
    let err = env
        .service
        .generate_credential_proof(
            &env.holder,
            &cred,
            &query(Hash256::from_u64(1), QueryOperator::Noop, json!(null)),
        )
        .await
        .unwrap_err();
    assert!(
        matches!(err, ProofServiceError::RevokedCredential { nonce, .. } if nonce == cred.credential_status.revocation_nonce),
        "{err:?}"
    );
}

#[tokio::test]
async fn mismatched_query_is_rejected() {
    let env = env();
    let cred = kyc(&env);
    let mut q = query(Hash256::from_u64(1), QueryOperator::Noop, json!(null));
    q.schema = Some("https://schemas.example/other.json".into());
    assert!(matches!(
        env.service.generate_credential_proof(&env.holder, &cred, &q).await,
        Err(ProofServiceError::InvalidQuery(_))
    ));
    let auth_only = CircuitQuery::auth(Hash256::from_u64(1));
    assert!(matches!(
        env.service.generate_credential_proof(&env.holder, &cred, &auth_only).await,
        Err(ProofServiceError::InvalidQuery(_))
    ));
}

#[tokio::test]
async fn missing_artifacts_are_reported() {
    let env = env_with(ProofServiceConfig::default(), InMemoryCircuitStorage::new());
    assert!(matches!(
        env.service.generate_auth_proof(&env.holder, Hash256::ZERO).await,
        Err(ProofServiceError::CircuitDataUnavailable(_))
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn proofs_stay_consistent_under_concurrent_mutation() {
    let env = Arc::new(env());
    let writer = {
        let env = env.clone();
        tokio::task::spawn_blocking(move || {
            for i in 0..40u64 {
                env.store
                    .apply_claim(
                        &env.holder,
                        &Claim {
                            schema_hash: sha256(b"s"),
                            subject: None,
                            index: json!({ "n": i }),
                            value: json!(i),
                            revocation_nonce: 1_000 + i,
                            version: 0,
                            expiration: None,
                        },
                    )
                    .unwrap();
            }
        })
    };
    let mut provers = Vec::new();
    for i in 0..20u64 {
        let env = env.clone();
        provers.push(tokio::spawn(async move {
            let challenge = Hash256::from_u64(i);
            let proof = env
                .service
                .generate_auth_proof(&env.holder, challenge)
                .await
                .unwrap();
            env.service.verify_proof(&proof).await.unwrap();
        }));
    }
    writer.await.unwrap();
    for p in provers {
        p.await.unwrap();
    }
    assert_eq!(env.store.snapshot(&env.holder).unwrap().version(), 40);
}
