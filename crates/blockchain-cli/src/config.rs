//! The node's operational config (§6): a path to the genesis file plus the
//! things that are this node's business and not the chain's — where to
//! persist data, which validator key (if any) to produce blocks with, and
//! where to bind RPC. Loaded from TOML; genesis itself stays a separate
//! file since many nodes share one genesis but each has its own config.

use serde::Deserialize;
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Debug, Clone, Deserialize)]
pub struct NodeConfig {
    pub genesis_path: PathBuf,
    /// `None` runs against an in-memory store (dev/test only; nothing
    /// persists across restarts).
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
    /// A keystore file from `blockchain-wallet`. Omit to run as a
    /// non-validating, RPC-only node.
    #[serde(default)]
    pub validator_key_path: Option<PathBuf>,
    #[serde(default = "default_http_addr")]
    pub http_addr: SocketAddr,
}

fn default_http_addr() -> SocketAddr {
    "127.0.0.1:8545".parse().unwrap()
}

impl NodeConfig {
    pub fn load(path: impl AsRef<std::path::Path>) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&text)?)
    }
}

pub fn load_genesis(path: impl AsRef<std::path::Path>) -> anyhow::Result<blockchain_core::Genesis> {
    let text = std::fs::read_to_string(path)?;
    Ok(toml::from_str(&text)?)
}
