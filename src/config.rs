//! Ambient configuration shared by the binary and library entry points: a
//! plain serde struct with explicit defaults, deserializable from TOML but
//! equally constructible in code (as `main.rs`'s CLI args do).

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::address::Network;
use crate::error::{PoolError, Result};

/// Validates that `directory` exists and is a directory, surfacing a
/// `PoolError::Configuration` rather than letting a bad path fail later as a
/// raw `std::io::Error` out of `registry::list_wallets`. Mirrors
/// `monerowalletpool`'s `WalletManager.__init__` assertion
/// (`assert os.path.exists(self.directory) and os.path.isdir(self.directory)`).
pub fn validate_directory(directory: &Path) -> Result<()> {
    if !directory.exists() {
        return Err(PoolError::Configuration(format!(
            "wallet directory {} does not exist",
            directory.display()
        )));
    }
    if !directory.is_dir() {
        return Err(PoolError::Configuration(format!(
            "wallet directory {} is not a directory",
            directory.display()
        )));
    }
    Ok(())
}

fn default_network() -> String {
    "mainnet".to_string()
}

/// Parses the three standard network tags (`mainnet`/`stagenet`/`testnet`),
/// case-insensitively.
pub fn parse_network(s: &str) -> anyhow::Result<Network> {
    match s.to_ascii_lowercase().as_str() {
        "mainnet" => Ok(Network::Mainnet),
        "stagenet" => Ok(Network::Stagenet),
        "testnet" => Ok(Network::Testnet),
        other => Err(anyhow::anyhow!("unknown network '{other}'")),
    }
}

fn default_max_concurrent() -> usize {
    4
}

fn default_daemon_host() -> String {
    "127.0.0.1".to_string()
}

fn default_daemon_port() -> u16 {
    18081
}

fn default_rpc_port_lo() -> u16 {
    18090
}

fn default_rpc_port_hi() -> u16 {
    18190
}

fn default_cmd_cli() -> PathBuf {
    PathBuf::from("monero-wallet-cli")
}

fn default_cmd_rpc() -> PathBuf {
    PathBuf::from("monero-wallet-rpc")
}

fn default_main_loop_sleep_secs() -> u64 {
    5
}

/// Everything needed to run a pool over one wallet directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub directory: PathBuf,

    #[serde(default = "default_network")]
    pub network: String,

    #[serde(default = "default_daemon_host")]
    pub daemon_host: String,

    #[serde(default = "default_daemon_port")]
    pub daemon_port: u16,

    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    #[serde(default = "default_rpc_port_lo")]
    pub rpc_port_lo: u16,

    #[serde(default = "default_rpc_port_hi")]
    pub rpc_port_hi: u16,

    #[serde(default = "default_cmd_cli")]
    pub cmd_cli: PathBuf,

    #[serde(default = "default_cmd_rpc")]
    pub cmd_rpc: PathBuf,

    #[serde(default = "default_main_loop_sleep_secs")]
    pub main_loop_sleep_secs: u64,
}

impl Config {
    pub fn main_loop_sleep(&self) -> Duration {
        Duration::from_secs(self.main_loop_sleep_secs)
    }

    pub fn rpc_port_range(&self) -> std::ops::Range<u16> {
        self.rpc_port_lo..self.rpc_port_hi
    }

    pub fn network(&self) -> anyhow::Result<Network> {
        parse_network(&self.network)
    }
}
