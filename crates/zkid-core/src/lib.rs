#![deny(missing_docs)]

//! # zkid-core: Foundational Types for Zero-Knowledge Identity
//!
//! Every other crate in the workspace depends on this one. It has no internal
//! crate dependencies.
//!
//! ## Design Principles
//!
//! 1. **[`CanonicalBytes`] is the sole path to structured digests.** Values that
//!    end up inside a commitment are canonicalized first (sorted keys, compact
//!    separators, floats rejected).
//!
//! 2. **[`Hash256`] everywhere.** Tree roots, state roots, challenges and claim
//!    commitments share one 32-byte type with hex serde.
//!
//! 3. **Identifiers are derived, never assigned.** A [`Did`] is computed from
//!    the genesis state root of its identity and can be checked against it.
//!
//! 4. **Typed wire vocabulary.** [`MediaType`] and [`MessageType`] are closed
//!    enums; an unknown string fails at the boundary.

pub mod canonical;
pub mod did;
pub mod digest;
pub mod error;
pub mod message;
pub mod retry;

pub use canonical::CanonicalBytes;
pub use did::{Blockchain, Did, DidMethod, NetworkId};
pub use digest::{sha256, sha256_canonical, sha256_concat, Hash256, Sha256Accumulator};
pub use error::{CanonicalizationError, CoreError, DidError};
pub use message::{MediaType, MessageType, ProtocolMessage};
pub use retry::{with_retry, RetryError, RetryPolicy, Retryable};
