//! # Circuits Subcommand
//!
//! - `zkid circuits setup --dir <path>` runs the mock trusted setup and
//!   writes `<dir>/<circuitId>/{circuit_final.zkey, verification_key.json,
//!   circuit.wasm}` for every circuit.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use zkid_zkp::{mock_setup, write_circuit_data, CircuitId};

use crate::config::ZkidConfig;

/// Arguments for `zkid circuits`.
#[derive(Args, Debug)]
pub struct CircuitsArgs {
    #[command(subcommand)]
    pub command: CircuitsCommand,
}

/// Circuit subcommands.
#[derive(Subcommand, Debug)]
pub enum CircuitsCommand {
    /// Write mock artifacts for every circuit.
    Setup {
        /// Target directory. Defaults to the configured circuits path.
        #[arg(long)]
        dir: Option<PathBuf>,
    },
}

/// Execute `zkid circuits`.
pub async fn run_circuits(args: &CircuitsArgs, config: &ZkidConfig) -> Result<u8> {
    match &args.command {
        CircuitsCommand::Setup { dir } => {
            let dir = dir
                .clone()
                .or_else(|| config.circuits_path.clone())
                .unwrap_or_else(|| PathBuf::from("circuits"));
            for circuit in CircuitId::ALL {
                write_circuit_data(&dir, &mock_setup(circuit))
                    .await
                    .with_context(|| format!("writing {circuit} artifacts"))?;
                tracing::info!(%circuit, dir = %dir.display(), "wrote mock artifacts");
                println!("{}", dir.join(circuit.as_str()).display());
            }
            Ok(0)
        }
    }
}
