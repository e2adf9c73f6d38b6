//! # zkid CLI entry point
//!
//! Parses arguments, resolves configuration and dispatches to subcommand
//! handlers.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use zkid_cli::circuits::{run_circuits, CircuitsArgs};
use zkid_cli::config::{ConfigOverrides, ZkidConfig};
use zkid_cli::demo::{run_demo, DemoArgs};
use zkid_cli::identity::{run_identity, IdentityArgs};

/// Zero-knowledge identity authentication toolkit.
#[derive(Parser, Debug)]
#[command(name = "zkid", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Path to a YAML configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(flatten)]
    overrides: ConfigOverrides,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the authorization flow end to end.
    Demo(DemoArgs),

    /// Identity operations.
    Identity(IdentityArgs),

    /// Circuit artifact operations.
    Circuits(CircuitsArgs),
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let config = match ZkidConfig::load(cli.config.as_deref(), cli.overrides.clone()) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("{e:#}");
            return ExitCode::from(2);
        }
    };

    let result = match &cli.command {
        Commands::Demo(args) => run_demo(args, &config).await,
        Commands::Identity(args) => run_identity(args, &config),
        Commands::Circuits(args) => run_circuits(args, &config).await,
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(1)
        }
    }
}
