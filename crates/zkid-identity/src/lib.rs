//! # zkid-identity: Identity State, Claims and Credentials
//!
//! Each identity exclusively owns three sparse merkle trees:
//!
//! - **claims**: claim commitments `h_index -> h_value`
//! - **revocation**: revoked nonces
//! - **roots**: every historical `(claims_root, revocation_root)` pair
//!
//! and its state root is `H(claims_root || revocation_root || roots_root)`.
//!
//! ## Concurrency
//!
//! [`IdentityStore`] serializes mutation per identity and publishes each new
//! tree version as an immutable [`IdentitySnapshot`]. Readers (proof
//! generation, status serving) take the current snapshot and never observe a
//! root that disagrees with its proofs.

pub mod claim;
pub mod credential;
pub mod error;
pub mod state;
pub mod storage;
pub mod store;
pub mod wallet;

pub use claim::{Claim, AUTH_SCHEMA};
pub use credential::{
    CredentialStatus, Credential, CredentialRequest, IssuerProof, RevocationStatus, StatusStrategy,
};
pub use error::{IdentityError, StateStorageError};
pub use state::{nonce_key, IdentityState};
pub use storage::{InMemoryStateStorage, RetryingStateStorage, StateStorage};
pub use store::{IdentityOptions, IdentitySnapshot, IdentityStore, RevocationOptions, TreeConfig};
pub use wallet::{CredentialStorage, CredentialWallet, InMemoryCredentialStorage};
