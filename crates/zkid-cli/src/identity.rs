//! # Identity Subcommand
//!
//! - `zkid identity create [--seed <hex>] [--method polygonid]` derives an
//!   identity and prints its DID and genesis state. With a seed the output
//!   is reproducible.

use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::{Args, Subcommand};
use zkid_core::{DidMethod, NetworkId};
use zkid_crypto::Kms;
use zkid_identity::{IdentityOptions, IdentityStore, RevocationOptions, StatusStrategy, TreeConfig};

use crate::config::ZkidConfig;

/// Arguments for `zkid identity`.
#[derive(Args, Debug)]
pub struct IdentityArgs {
    #[command(subcommand)]
    pub command: IdentityCommand,
}

/// Identity subcommands.
#[derive(Subcommand, Debug)]
pub enum IdentityCommand {
    /// Create an identity and print its DID.
    Create {
        /// 32-byte authentication key seed, hex.
        #[arg(long)]
        seed: Option<String>,

        /// DID method.
        #[arg(long, default_value = "polygonid")]
        method: String,

        /// Print the auth credential as JSON as well.
        #[arg(long)]
        json: bool,
    },
}

/// Parse a 32-byte hex seed.
pub fn parse_seed(hex_seed: &str) -> Result<[u8; 32]> {
    let bytes = hex::decode(hex_seed.trim_start_matches("0x")).context("seed is not hex")?;
    bytes
        .try_into()
        .map_err(|b: Vec<u8>| anyhow!("seed must be 32 bytes, got {}", b.len()))
}

/// Identity options for the configured chain, with RHS revocation.
pub fn identity_options(
    config: &ZkidConfig,
    method: DidMethod,
    seed: Option<[u8; 32]>,
) -> Result<IdentityOptions> {
    let (blockchain, network) = NetworkId::from_chain_id(config.chain_id)
        .ok_or_else(|| anyhow!("chain id {} has no DID network", config.chain_id))?;
    Ok(IdentityOptions {
        method,
        blockchain,
        network,
        revocation: RevocationOptions {
            strategy: StatusStrategy::ReverseHashService,
            id: config.rhs_url.to_string(),
        },
        seed,
    })
}

/// Execute `zkid identity`.
pub fn run_identity(args: &IdentityArgs, config: &ZkidConfig) -> Result<u8> {
    match &args.command {
        IdentityCommand::Create { seed, method, json } => {
            let seed = seed.as_deref().map(parse_seed).transpose()?;
            let method: DidMethod = method.parse().context("--method")?;
            let store = IdentityStore::new(Arc::new(Kms::in_memory()), TreeConfig::default());
            let (did, auth_credential) = store.create_identity(identity_options(config, method, seed)?)?;
            let state = store.snapshot(&did)?.state();
            println!("did:           {did}");
            println!("genesis state: {}", state.state);
            if *json {
                println!("{}", serde_json::to_string_pretty(&auth_credential)?);
            }
            Ok(0)
        }
    }
}
