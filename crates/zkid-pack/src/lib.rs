//! # zkid-pack: Message Packing
//!
//! A [`PackageManager`] holds one [`Packer`] per [`MediaType`]:
//!
//! | Media type | Packer | Envelope |
//! |------------|--------|----------|
//! | `application/iden3comm-plain-json` | [`PlainPacker`] | the payload |
//! | `application/iden3-zkp-json` | [`ZkpPacker`] | `header.payload.proof`, base64url |
//!
//! The proof-carrying packer is parameterized by proving and verification
//! maps keyed by [`ProvingMethod`]; [`AuthProofPreparer`] and
//! [`AuthProofVerifier`] bind them to a [`zkid_zkp::ProofService`].
//!
//! [`MediaType`]: zkid_core::MediaType

pub mod error;
pub mod manager;
pub mod packer;
pub mod plain;
pub mod zkp;

pub use error::PackError;
pub use manager::{sniff_media_type, PackageManager, PackerHandle};
pub use packer::{PackParams, Packer, UnpackMetadata, Unpacked};
pub use plain::PlainPacker;
pub use zkp::{
    AuthProofPreparer, AuthProofVerifier, ProofPreparer, ProofVerifier, ProvingAlg, ProvingMethod,
    ZkpPacker,
};
