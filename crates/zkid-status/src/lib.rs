//! # zkid-status: Credential Revocation Status Resolution
//!
//! A credential's `credentialStatus.type` selects a [`StatusStrategy`]; the
//! [`ResolverRegistry`] maps each strategy to a [`CredentialStatusResolver`]
//! and produces a verified [`RevocationStatus`].
//!
//! | Strategy | Resolver | Backend |
//! |----------|----------|---------|
//! | `SparseMerkleTreeProof` | [`IssuerResolver`] | issuer's HTTP status endpoint |
//! | `Iden3ReverseSparseMerkleTreeProof` | [`RhsResolver`] | state storage + reverse hash service |
//! | `Iden3OnchainSparseMerkleTreeProof2023` | [`OnChainResolver`] | [`ChainStateAdapter`] |
//! | `Iden3commRevocationStatusV1.0` | [`AgentResolver`] | agent endpoint, protocol messages |
//!
//! Resolution is read-only. Transient backend failures are retried with
//! bounded backoff inside the registry; everything above it sees either a
//! verified status or a terminal error.

pub mod error;
pub mod registry;
pub mod resolvers;

pub use error::{BackendError, StatusError};
pub use registry::{CredentialStatusResolver, ResolverHandle, ResolverRegistry, StatusRequest};
pub use resolvers::agent::{answer_status_request, AgentResolver, RevocationStatusRequestBody};
pub use resolvers::issuer::IssuerResolver;
pub use resolvers::onchain::{ChainStateAdapter, InMemoryChainState, OnChainResolver, OnChainStatusId};
pub use resolvers::rhs::{
    publish_to_rhs, HttpReverseHashService, InMemoryReverseHashService, ReverseHashService,
    RhsRecord, RhsResolver, StateNode,
};
pub use zkid_identity::{RevocationStatus, StatusStrategy};
