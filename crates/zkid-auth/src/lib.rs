//! # zkid-auth: Authorization Flow
//!
//! - [`AuthHandler`] answers `auth-request` messages for a holder: it
//!   validates the request, proves authentication plus every requested
//!   credential query, and packs a thread-correlated `auth-response` with a
//!   proof-carrying packer.
//! - [`AuthVerifier`] is the relying-party side: it checks that a response
//!   envelope answers a request.
//!
//! Each request runs as one [`AuthAttempt`] through the [`AuthPhase`] state
//! machine. Attempts are single-use.

pub mod error;
pub mod handler;
pub mod message;
pub mod phase;
pub mod verifier;

pub use error::AuthError;
pub use handler::{AuthAttempt, AuthHandler, AuthResponse};
pub use message::{
    authorization_request, AuthorizationRequest, AuthorizationRequestBody,
    AuthorizationResponseBody, ScopeQuery, ScopeRequest,
};
pub use phase::AuthPhase;
pub use verifier::{AuthVerifier, VerifiedAuthorization};
