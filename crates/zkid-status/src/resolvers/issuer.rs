//! Issuer-hosted status: `GET <credentialStatus.id>` returns a
//! [`RevocationStatus`] as JSON.

use std::time::Duration;

use async_trait::async_trait;
use zkid_identity::RevocationStatus;

use super::{http_client, parse_url, read_json, DEFAULT_HTTP_TIMEOUT};
use crate::error::BackendError;
use crate::registry::{CredentialStatusResolver, StatusRequest};

/// Resolver for `SparseMerkleTreeProof` statuses.
#[derive(Debug, Clone)]
pub struct IssuerResolver {
    http: reqwest::Client,
}

impl IssuerResolver {
    /// Resolver with the default timeout.
    pub fn new() -> Result<Self, BackendError> {
        Self::with_timeout(DEFAULT_HTTP_TIMEOUT)
    }

    /// Resolver with a custom HTTP timeout.
    pub fn with_timeout(timeout: Duration) -> Result<Self, BackendError> {
        Ok(Self {
            http: http_client(timeout)?,
        })
    }
}

#[async_trait]
impl CredentialStatusResolver for IssuerResolver {
    async fn resolve(&self, request: &StatusRequest) -> Result<RevocationStatus, BackendError> {
        let url = parse_url(&request.status.id)?;
        tracing::debug!(%url, "fetching issuer-hosted revocation status");
        let resp = self.http.get(url).send().await?;
        read_json(resp).await
    }
}
