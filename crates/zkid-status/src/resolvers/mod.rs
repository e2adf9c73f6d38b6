//! Resolver implementations, one per [`zkid_identity::StatusStrategy`].

pub mod agent;
pub mod issuer;
pub mod onchain;
pub mod rhs;

use std::time::Duration;

use reqwest::StatusCode;
use serde::de::DeserializeOwned;

use crate::error::BackendError;

/// Default timeout for resolver HTTP calls.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

pub(crate) fn http_client(timeout: Duration) -> Result<reqwest::Client, BackendError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| BackendError::Permanent(format!("http client: {e}")))
}

pub(crate) fn parse_url(raw: &str) -> Result<url::Url, BackendError> {
    url::Url::parse(raw).map_err(|e| BackendError::Permanent(format!("invalid endpoint {raw:?}: {e}")))
}

/// Map status codes: 5xx and 429 are transient, other non-2xx permanent.
pub(crate) async fn read_json<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, BackendError> {
    let status = resp.status();
    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        return Err(BackendError::Transient(format!("HTTP {status} from {}", resp.url())));
    }
    if !status.is_success() {
        return Err(BackendError::Permanent(format!("HTTP {status} from {}", resp.url())));
    }
    resp.json::<T>()
        .await
        .map_err(|e| BackendError::Permanent(format!("malformed response: {e}")))
}
