//! # CLI Configuration
//!
//! Layered, later layers win:
//!
//! 1. built-in defaults (Polygon Amoy, staging RHS),
//! 2. the YAML file given with `--config`,
//! 3. `ZKID_*` environment variables,
//! 4. command-line flags.
//!
//! Every layer is a [`ConfigOverrides`]; [`ZkidConfig::merge`] validates
//! each value as it is applied.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Args;
use serde::Deserialize;
use url::Url;

/// Default JSON-RPC endpoint.
pub const DEFAULT_RPC_URL: &str = "https://rpc-amoy.polygon.technology";
/// Default state contract.
pub const DEFAULT_CONTRACT_ADDRESS: &str = "0x1a4cC30f2aA0377b0c3bc9848766D90cb4404124";
/// Polygon Amoy.
pub const DEFAULT_CHAIN_ID: u64 = 80_002;
/// Default reverse hash service.
pub const DEFAULT_RHS_URL: &str = "https://rhs-staging.polygonid.me";
/// Default relying party callback.
pub const DEFAULT_CALLBACK_URL: &str = "http://localhost:8080/callback";

/// One configuration layer. Also the global command-line flags.
#[derive(Args, Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigOverrides {
    /// JSON-RPC endpoint of the state chain.
    #[arg(long, global = true)]
    pub rpc_url: Option<String>,

    /// State contract address (0x-prefixed, 20 bytes).
    #[arg(long, global = true)]
    pub contract_address: Option<String>,

    /// EVM chain id of the state chain.
    #[arg(long, global = true)]
    pub chain_id: Option<u64>,

    /// Reverse hash service base URL.
    #[arg(long, global = true)]
    pub rhs_url: Option<String>,

    /// Directory of circuit artifacts. Mock artifacts are generated in
    /// memory when unset.
    #[arg(long, global = true)]
    pub circuits_path: Option<PathBuf>,

    /// Relying party callback URL used by the demo.
    #[arg(long, global = true)]
    pub callback_url: Option<String>,
}

impl ConfigOverrides {
    /// Layer from `ZKID_*` variables, read through `var`.
    pub fn from_env_with(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let chain_id = match var("ZKID_CHAIN_ID") {
            Some(v) => Some(
                v.parse()
                    .with_context(|| format!("ZKID_CHAIN_ID={v} is not a chain id"))?,
            ),
            None => None,
        };
        Ok(Self {
            rpc_url: var("ZKID_RPC_URL"),
            contract_address: var("ZKID_CONTRACT_ADDRESS"),
            chain_id,
            rhs_url: var("ZKID_RHS_URL"),
            circuits_path: var("ZKID_CIRCUITS_PATH").map(PathBuf::from),
            callback_url: var("ZKID_CALLBACK_URL"),
        })
    }

    /// Layer from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_env_with(|k| std::env::var(k).ok())
    }
}

/// Validated configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZkidConfig {
    /// JSON-RPC endpoint.
    pub rpc_url: Url,
    /// State contract, lowercase hex with `0x`.
    pub contract_address: String,
    /// EVM chain id.
    pub chain_id: u64,
    /// Reverse hash service.
    pub rhs_url: Url,
    /// Circuit artifact directory.
    pub circuits_path: Option<PathBuf>,
    /// Relying party callback.
    pub callback_url: Url,
}

fn parse_url(name: &str, value: &str) -> Result<Url> {
    Url::parse(value).with_context(|| format!("{name}: invalid URL {value:?}"))
}

fn parse_contract(value: &str) -> Result<String> {
    let hex = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .unwrap_or(value);
    if hex.len() != 40 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        bail!("contract_address: {value:?} is not a 20-byte hex address");
    }
    Ok(format!("0x{}", hex.to_lowercase()))
}

impl ZkidConfig {
    /// Built-in defaults.
    pub fn defaults() -> Result<Self> {
        Ok(Self {
            rpc_url: parse_url("rpc_url", DEFAULT_RPC_URL)?,
            contract_address: parse_contract(DEFAULT_CONTRACT_ADDRESS)?,
            chain_id: DEFAULT_CHAIN_ID,
            rhs_url: parse_url("rhs_url", DEFAULT_RHS_URL)?,
            circuits_path: None,
            callback_url: parse_url("callback_url", DEFAULT_CALLBACK_URL)?,
        })
    }

    /// Apply one layer.
    pub fn merge(&mut self, layer: ConfigOverrides) -> Result<()> {
        if let Some(v) = layer.rpc_url {
            self.rpc_url = parse_url("rpc_url", &v)?;
        }
        if let Some(v) = layer.contract_address {
            self.contract_address = parse_contract(&v)?;
        }
        if let Some(v) = layer.chain_id {
            self.chain_id = v;
        }
        if let Some(v) = layer.rhs_url {
            self.rhs_url = parse_url("rhs_url", &v)?;
        }
        if let Some(v) = layer.circuits_path {
            self.circuits_path = Some(v);
        }
        if let Some(v) = layer.callback_url {
            self.callback_url = parse_url("callback_url", &v)?;
        }
        Ok(())
    }

    /// Defaults, then `file`, then `env`, then `flags`.
    pub fn layered(
        file: Option<&Path>,
        env: ConfigOverrides,
        flags: ConfigOverrides,
    ) -> Result<Self> {
        let mut config = Self::defaults()?;
        if let Some(path) = file {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            let layer: ConfigOverrides = serde_yaml::from_str(&text)
                .with_context(|| format!("parsing {}", path.display()))?;
            config
                .merge(layer)
                .with_context(|| format!("in {}", path.display()))?;
        }
        config.merge(env).context("in ZKID_* environment")?;
        config.merge(flags).context("in command-line flags")?;
        tracing::debug!(?config, "resolved configuration");
        Ok(config)
    }

    /// Defaults, then `file`, then the process environment, then `flags`.
    pub fn load(file: Option<&Path>, flags: ConfigOverrides) -> Result<Self> {
        Self::layered(file, ConfigOverrides::from_env()?, flags)
    }
}
