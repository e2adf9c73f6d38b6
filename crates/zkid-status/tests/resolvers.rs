//! Resolver tests against mock HTTP backends and in-memory chain state.

use std::sync::Arc;

use zkid_core::{Blockchain, Did, DidMethod, NetworkId, ProtocolMessage, RetryPolicy};
use zkid_crypto::Kms;
use zkid_identity::{
    CredentialRequest, IdentityOptions, IdentityStore, RevocationOptions, StatusStrategy,
    TreeConfig,
};
use zkid_status::{
    answer_status_request, AgentResolver, InMemoryChainState, IssuerResolver, OnChainResolver,
    ResolverRegistry, StatusError, StatusRequest,
};

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

const DEPTH: usize = 16;
const CONTRACT: &str = "0x1a4cC30f2aA0377b0c3bc9848766D90cb4404124";

fn store() -> Arc<IdentityStore> {
    Arc::new(IdentityStore::new(
        Arc::new(Kms::in_memory()),
        TreeConfig { depth: DEPTH },
    ))
}

fn identity(store: &IdentityStore, strategy: StatusStrategy, id: &str) -> Did {
    store
        .create_identity(IdentityOptions {
            method: DidMethod::PolygonId,
            blockchain: Blockchain::Polygon,
            network: NetworkId::Amoy,
            revocation: RevocationOptions {
                strategy,
                id: id.to_string(),
            },
            seed: None,
        })
        .unwrap()
        .0
}

fn kyc_request() -> CredentialRequest {
    CredentialRequest {
        credential_schema: "https://schemas.example/kyc.json".into(),
        credential_type: "KYCAgeCredential".into(),
        credential_subject: serde_json::json!({"birthday": 19960424}),
        expiration: None,
        revocation_nonce: None,
    }
}

#[tokio::test]
async fn issuer_hosted_status_is_fetched_and_verified() {
    let server = MockServer::start().await;
    let store = store();
    let issuer = identity(
        &store,
        StatusStrategy::IssuerHosted,
        &format!("{}/status", server.uri()),
    );
    let holder = identity(&store, StatusStrategy::IssuerHosted, "unused");
    let cred = store.issue_credential(&issuer, &holder, kyc_request()).unwrap();
    let nonce = cred.credential_status.revocation_nonce;

    Mock::given(method("GET"))
        .and(path("/status"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(store.revocation_status(&issuer, nonce).unwrap()),
        )
        .mount(&server)
        .await;

    let registry = ResolverRegistry::new(RetryPolicy::immediate(0));
    registry
        .register(StatusStrategy::IssuerHosted, Arc::new(IssuerResolver::new().unwrap()))
        .unwrap();
    let status = registry
        .resolve(&StatusRequest::for_credential(&cred))
        .await
        .unwrap();
    assert!(!status.is_revoked());
    assert_eq!(status.issuer, store.snapshot(&issuer).unwrap().state());
}

#[tokio::test]
async fn server_errors_are_retried_until_the_issuer_recovers() {
    let server = MockServer::start().await;
    let store = store();
    let issuer = identity(
        &store,
        StatusStrategy::IssuerHosted,
        &format!("{}/status", server.uri()),
    );
    let holder = identity(&store, StatusStrategy::IssuerHosted, "unused");
    let cred = store.issue_credential(&issuer, &holder, kyc_request()).unwrap();
    store.revoke_credential(&issuer, &cred).unwrap();
    let nonce = cred.credential_status.revocation_nonce;

    Mock::given(method("GET"))
        .and(path("/status"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/status"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(store.revocation_status(&issuer, nonce).unwrap()),
        )
        .expect(1)
        .mount(&server)
        .await;

    let registry = ResolverRegistry::new(RetryPolicy::immediate(3));
    registry
        .register(StatusStrategy::IssuerHosted, Arc::new(IssuerResolver::new().unwrap()))
        .unwrap();
    let status = registry
        .resolve(&StatusRequest::for_credential(&cred))
        .await
        .unwrap();
    assert!(status.is_revoked());
}

#[tokio::test]
async fn client_errors_fail_without_retry() {
    let server = MockServer::start().await;
    let store = store();
    let issuer = identity(
        &store,
        StatusStrategy::IssuerHosted,
        &format!("{}/status", server.uri()),
    );
    let holder = identity(&store, StatusStrategy::IssuerHosted, "unused");
    let cred = store.issue_credential(&issuer, &holder, kyc_request()).unwrap();

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let registry = ResolverRegistry::new(RetryPolicy::immediate(3));
    registry
        .register(StatusStrategy::IssuerHosted, Arc::new(IssuerResolver::new().unwrap()))
        .unwrap();
    let err = registry
        .resolve(&StatusRequest::for_credential(&cred))
        .await
        .unwrap_err();
    assert!(matches!(err, StatusError::Backend { .. }), "{err:?}");
}

#[tokio::test]
async fn persistent_outage_is_reported_unavailable() {
    let server = MockServer::start().await;
    let store = store();
    let issuer = identity(
        &store,
        StatusStrategy::IssuerHosted,
        &format!("{}/status", server.uri()),
    );
    let holder = identity(&store, StatusStrategy::IssuerHosted, "unused");
    let cred = store.issue_credential(&issuer, &holder, kyc_request()).unwrap();

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(502))
        .expect(3)
        .mount(&server)
        .await;

    let registry = ResolverRegistry::new(RetryPolicy::immediate(2));
    registry
        .register(StatusStrategy::IssuerHosted, Arc::new(IssuerResolver::new().unwrap()))
        .unwrap();
    let err = registry
        .resolve(&StatusRequest::for_credential(&cred))
        .await
        .unwrap_err();
    assert!(matches!(err, StatusError::ResolutionUnavailable { .. }), "{err:?}");
}

/// Answers revocation status requests from an issuer store.
struct Agent(Arc<IdentityStore>);

impl Respond for Agent {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let Ok(message) = ProtocolMessage::from_bytes(&request.body) else {
            return ResponseTemplate::new(400);
        };
        match answer_status_request(&self.0, &message) {
            Ok(reply) => ResponseTemplate::new(200).set_body_json(reply),
            Err(_) => ResponseTemplate::new(400),
        }
    }
}

#[tokio::test]
async fn agent_answers_over_protocol_messages() {
    let server = MockServer::start().await;
    let store = store();
    let issuer = identity(
        &store,
        StatusStrategy::Agent,
        &format!("{}/agent", server.uri()),
    );
    let holder = identity(&store, StatusStrategy::Agent, "unused");
    let kept = store.issue_credential(&issuer, &holder, kyc_request()).unwrap();
    let revoked = store.issue_credential(&issuer, &holder, kyc_request()).unwrap();
    store.revoke_credential(&issuer, &revoked).unwrap();

    Mock::given(method("POST"))
        .and(path("/agent"))
        .respond_with(Agent(store.clone()))
        .mount(&server)
        .await;

    let registry = ResolverRegistry::new(RetryPolicy::immediate(0));
    registry
        .register(StatusStrategy::Agent, Arc::new(AgentResolver::new(&holder).unwrap()))
        .unwrap();

    let status = registry.resolve(&StatusRequest::for_credential(&kept)).await.unwrap();
    assert!(!status.is_revoked());
    let status = registry
        .resolve(&StatusRequest::for_credential(&revoked))
        .await
        .unwrap();
    assert!(status.is_revoked());
}

#[tokio::test]
async fn agent_reply_on_another_thread_is_rejected() {
    let server = MockServer::start().await;
    let store = store();
    let issuer = identity(
        &store,
        StatusStrategy::Agent,
        &format!("{}/agent", server.uri()),
    );
    let holder = identity(&store, StatusStrategy::Agent, "unused");
    let cred = store.issue_credential(&issuer, &holder, kyc_request()).unwrap();

    let stray = ProtocolMessage::new(
        zkid_core::MessageType::RevocationStatusResponse,
        issuer.to_string(),
        serde_json::to_value(store.revocation_status(&issuer, 1).unwrap()).unwrap(),
    );
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(stray))
        .mount(&server)
        .await;

    let registry = ResolverRegistry::new(RetryPolicy::immediate(0));
    registry
        .register(StatusStrategy::Agent, Arc::new(AgentResolver::new(&holder).unwrap()))
        .unwrap();
    let err = registry
        .resolve(&StatusRequest::for_credential(&cred))
        .await
        .unwrap_err();
    assert!(matches!(err, StatusError::Backend { .. }), "{err:?}");
}

#[tokio::test]
async fn on_chain_status_tracks_committed_state() {
    let store = store();
    let chain = Arc::new(InMemoryChainState::new(80_002, CONTRACT));
    let placeholder = identity(&store, StatusStrategy::OnChain, "unused");
    let status_id = chain.status_id(&placeholder);
    let issuer = identity(&store, StatusStrategy::OnChain, &status_id);
    let holder = identity(&store, StatusStrategy::OnChain, &status_id);

    let cred = store.issue_credential(&issuer, &holder, kyc_request()).unwrap();
    chain.commit(store.snapshot(&issuer).unwrap());

    let registry = ResolverRegistry::new(RetryPolicy::immediate(0));
    registry
        .register(
            StatusStrategy::OnChain,
            Arc::new(OnChainResolver::new(chain.clone()).with_depth(DEPTH)),
        )
        .unwrap();

    let request = StatusRequest::for_credential(&cred);
    assert!(!registry.resolve(&request).await.unwrap().is_revoked());

    // Revocation is only visible once committed.
    store.revoke_credential(&issuer, &cred).unwrap();
    assert!(!registry.resolve(&request).await.unwrap().is_revoked());
    chain.commit(store.snapshot(&issuer).unwrap());
    let status = registry.resolve(&request).await.unwrap();
    assert!(status.is_revoked());
    assert_eq!(status.issuer, store.snapshot(&issuer).unwrap().state());
}

#[tokio::test]
async fn on_chain_genesis_issuer_and_wrong_contract() {
    let store = store();
    let chain = Arc::new(InMemoryChainState::new(80_002, CONTRACT));
    let holder = identity(&store, StatusStrategy::OnChain, "unused");
    let (issuer, auth) = store
        .create_identity(IdentityOptions {
            method: DidMethod::PolygonId,
            blockchain: Blockchain::Polygon,
            network: NetworkId::Amoy,
            revocation: RevocationOptions {
                strategy: StatusStrategy::OnChain,
                id: chain.status_id(&holder),
            },
            seed: None,
        })
        .unwrap();

    let resolver = OnChainResolver::new(chain.clone()).with_depth(DEPTH);
    let registry = ResolverRegistry::new(RetryPolicy::immediate(0));
    registry.register(StatusStrategy::OnChain, Arc::new(resolver)).unwrap();

    // Never committed: genesis state with an empty revocation tree.
    let status = registry.resolve(&StatusRequest::for_credential(&auth)).await.unwrap();
    assert!(!status.is_revoked());
    assert!(issuer.matches_genesis(&status.issuer.state));

    let mut elsewhere = StatusRequest::for_credential(&auth);
    elsewhere.status.id = format!(
        "{issuer}/credentialStatus?contractAddress=1:0x0000000000000000000000000000000000000001"
    );
    assert!(matches!(
        registry.resolve(&elsewhere).await.unwrap_err(),
        StatusError::Backend { .. }
    ));
}

/// Collects published nodes so they can be served over mock HTTP.
#[derive(Default)]
struct Recorder(parking_lot::Mutex<Vec<zkid_status::RhsRecord>>);

#[async_trait::async_trait]
impl zkid_status::ReverseHashService for Recorder {
    async fn get_node(
        &self,
        _: &zkid_core::Hash256,
    ) -> Result<Option<zkid_status::RhsRecord>, zkid_status::BackendError> {
        Ok(None)
    }

    async fn save_nodes(
        &self,
        nodes: Vec<zkid_status::RhsRecord>,
    ) -> Result<(), zkid_status::BackendError> {
        self.0.lock().extend(nodes);
        Ok(())
    }
}

#[tokio::test]
async fn reverse_hash_service_over_http() {
    use zkid_identity::{InMemoryStateStorage, StateStorage};
    use zkid_status::{publish_to_rhs, HttpReverseHashService, RhsResolver};

    let server = MockServer::start().await;
    let store = store();
    let issuer = identity(&store, StatusStrategy::ReverseHashService, &server.uri());
    let holder = identity(&store, StatusStrategy::ReverseHashService, &server.uri());
    let cred = store.issue_credential(&issuer, &holder, kyc_request()).unwrap();
    store.revoke_credential(&issuer, &cred).unwrap();

    let recorder = Recorder::default();
    publish_to_rhs(&recorder, &store.snapshot(&issuer).unwrap())
        .await
        .unwrap();
    for record in recorder.0.lock().iter() {
        let hash = record.hash();
        let mut node = serde_json::to_value(record).unwrap();
        node["hash"] = serde_json::json!(hash);
        Mock::given(method("GET"))
            .and(path(format!("/node/{hash}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "node": node })))
            .mount(&server)
            .await;
    }
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let states = Arc::new(InMemoryStateStorage::new());
    store.publish_state(&issuer, states.as_ref()).await.unwrap();
    assert_eq!(states.history(&issuer).await.unwrap().len(), 1);

    let rhs = HttpReverseHashService::new(server.uri().parse().unwrap()).unwrap();
    let registry = ResolverRegistry::new(RetryPolicy::immediate(0));
    registry
        .register(
            StatusStrategy::ReverseHashService,
            Arc::new(RhsResolver::new(Arc::new(rhs), states).with_depth(DEPTH)),
        )
        .unwrap();
    let status = registry
        .resolve(&StatusRequest::for_credential(&cred))
        .await
        .unwrap();
    assert!(status.is_revoked());
}
