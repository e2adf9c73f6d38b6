//! # Demo Subcommand
//!
//! Runs the whole authorization flow in one process:
//!
//! 1. create an issuer and a user identity, both with RHS revocation,
//! 2. issue the user a KYC credential and publish the issuer's state and
//!    revocation tree,
//! 3. a relying party asks the user to authenticate and prove an age
//!    predicate over the credential,
//! 4. the user's auth handler answers with a proof-carrying envelope,
//! 5. the relying party verifies it.
//!
//! The chain is simulated in memory. The RHS is in memory unless
//! `--remote-rhs` is given, in which case the configured service is used.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use serde_json::json;
use zkid_auth::{
    authorization_request, AuthHandler, AuthVerifier, AuthorizationRequestBody, ScopeQuery,
    ScopeRequest,
};
use zkid_core::{sha256, DidMethod, MediaType, RetryPolicy};
use zkid_crypto::Kms;
use zkid_identity::{
    CredentialRequest, CredentialWallet, IdentityStore, InMemoryStateStorage, StatusStrategy,
    TreeConfig,
};
use zkid_pack::{PackParams, PackageManager, PlainPacker, ProvingAlg, ProvingMethod, ZkpPacker};
use zkid_status::{
    publish_to_rhs, HttpReverseHashService, InMemoryChainState, InMemoryReverseHashService,
    OnChainResolver, ResolverRegistry, ReverseHashService, RhsResolver,
};
use zkid_zkp::{
    CircuitId, CircuitStorage, FsCircuitStorage, InMemoryCircuitStorage, MockProofSystem,
    ProofService, ProofServiceConfig,
};

use crate::config::ZkidConfig;
use crate::identity::identity_options;

const KYC_SCHEMA: &str = "https://schemas.zkid.dev/kyc-v3.json";
const VERIFIER_DID: &str = "did:web:verifier.example";

/// Arguments for `zkid demo`.
#[derive(Args, Debug, Clone)]
pub struct DemoArgs {
    /// Publish to and resolve from the configured reverse hash service.
    #[arg(long)]
    pub remote_rhs: bool,

    /// Message the relying party shows the user.
    #[arg(long, default_value = "sign in to the zkid demo")]
    pub message: String,

    /// User birthday, YYYYMMDD.
    #[arg(long, default_value_t = 19960424)]
    pub birthday: u64,
}

/// What the demo established.
#[derive(Debug, Clone)]
pub struct DemoReport {
    /// Issuer DID.
    pub issuer: String,
    /// User DID.
    pub user: String,
    /// Thread of the exchange.
    pub thread_id: String,
    /// Number of verified proofs.
    pub proofs: usize,
    /// Response envelope size.
    pub envelope_len: usize,
}

fn circuit_storage(path: Option<&Path>) -> Arc<dyn CircuitStorage> {
    match path {
        Some(dir) => Arc::new(FsCircuitStorage::new(dir)),
        None => Arc::new(InMemoryCircuitStorage::with_mock_setup()),
    }
}

/// Run the flow and report.
pub async fn demo(args: &DemoArgs, config: &ZkidConfig) -> Result<DemoReport> {
    let tree = TreeConfig::default();
    let store = Arc::new(IdentityStore::new(Arc::new(Kms::in_memory()), tree));
    let states = Arc::new(InMemoryStateStorage::new());
    let rhs: Arc<dyn ReverseHashService> = if args.remote_rhs {
        Arc::new(HttpReverseHashService::new(config.rhs_url.clone())?)
    } else {
        Arc::new(InMemoryReverseHashService::new())
    };
    let chain = Arc::new(InMemoryChainState::new(config.chain_id, &config.contract_address));

    let resolvers = Arc::new(ResolverRegistry::new(RetryPolicy::default()));
    resolvers.register(
        StatusStrategy::ReverseHashService,
        Arc::new(RhsResolver::new(rhs.clone(), states.clone()).with_depth(tree.depth)),
    )?;
    resolvers.register(
        StatusStrategy::OnChain,
        Arc::new(OnChainResolver::new(chain.clone()).with_depth(tree.depth)),
    )?;

    let proofs = Arc::new(ProofService::new(
        store.clone(),
        resolvers,
        states.clone(),
        circuit_storage(config.circuits_path.as_deref()),
        Arc::new(MockProofSystem),
        ProofServiceConfig::default(),
    ));
    let packages = Arc::new(PackageManager::new());
    packages.register_packer(Arc::new(PlainPacker))?;
    packages.register_packer(Arc::new(ZkpPacker::for_service(proofs.clone())?))?;

    // Identities and issuance.
    let (issuer, _) = store.create_identity(identity_options(config, DidMethod::PolygonId, None)?)?;
    let (user, _) = store.create_identity(identity_options(config, DidMethod::PolygonId, None)?)?;
    let credential = store.issue_credential(
        &issuer,
        &user,
        CredentialRequest {
            credential_schema: KYC_SCHEMA.into(),
            credential_type: "KYCAgeCredential".into(),
            credential_subject: json!({"birthday": args.birthday, "documentType": 2}),
            expiration: None,
            revocation_nonce: None,
        },
    )?;
    store.publish_state(&issuer, states.as_ref()).await?;
    let snapshot = store.snapshot(&issuer)?;
    publish_to_rhs(rhs.as_ref(), &snapshot)
        .await
        .context("publishing issuer state to the reverse hash service")?;
    chain.commit(snapshot);
    let wallet = CredentialWallet::default();
    wallet.save(credential)?;
    println!("issuer: {issuer}");
    println!("user:   {user}");

    // Relying party request, delivered as plain JSON.
    let request = authorization_request(
        VERIFIER_DID,
        &AuthorizationRequestBody {
            callback_url: config.callback_url.to_string(),
            message: Some(args.message.clone()),
            reason: Some("age verification".into()),
            scope: vec![ScopeRequest {
                id: 1,
                circuit_id: CircuitId::CredentialAtomicQuery,
                query: ScopeQuery {
                    schema: Some(KYC_SCHEMA.into()),
                    credential_type: Some("KYCAgeCredential".into()),
                    credential_subject: json!({"birthday": {"$lt": 20000101}})
                        .as_object()
                        .cloned(),
                },
            }],
        },
    )?;
    let inbound = packages
        .pack(MediaType::PlainMessage, &request.to_bytes()?, &PackParams::plain())
        .await?;

    // User answers.
    let handler = AuthHandler::new(
        user.clone(),
        packages.clone(),
        proofs.clone(),
        wallet,
        ProvingMethod {
            alg: ProvingAlg::Mock,
            circuit_id: CircuitId::AuthV2,
        },
    );
    let response = handler.handle_request(&inbound).await?;
    println!(
        "response for thread {} ({} bytes, sha256 {}) -> {}",
        response.thread_id,
        response.envelope.len(),
        sha256(&response.envelope),
        response.callback_url
    );

    // Relying party verifies.
    let verified = AuthVerifier::new(packages, proofs)
        .verify_authorization_response(&request, &response.envelope)
        .await?;
    println!("verified {} proofs from {}", verified.proofs.len(), verified.sender);

    Ok(DemoReport {
        issuer: issuer.to_string(),
        user: user.to_string(),
        thread_id: verified.thread_id,
        proofs: verified.proofs.len(),
        envelope_len: response.envelope.len(),
    })
}

/// Execute `zkid demo`.
pub async fn run_demo(args: &DemoArgs, config: &ZkidConfig) -> Result<u8> {
    let report = demo(args, config).await?;
    tracing::info!(user = %report.user, thread = %report.thread_id, "demo complete");
    Ok(0)
}
