use async_trait::async_trait;
use serde::Deserialize;

use crate::address::{parse_unchecked, Address};

/// A single incoming or outgoing transfer, as reported by the wallet RPC's
/// `get_transfers`.
#[derive(Debug, Clone, Deserialize)]
pub struct Transfer {
    pub txid: String,
    pub amount: u64,
    pub height: Option<u64>,
}

/// The opaque wallet-RPC client surface the Controller depends on (spec
/// §1/§6). Exists so tests can substitute a fake without spawning a real
/// `monero-wallet-rpc` process.
#[async_trait]
pub trait WalletRpcClient: Send + Sync {
    async fn height(&self) -> anyhow::Result<u64>;
    async fn address(&self) -> anyhow::Result<Address>;
    async fn incoming(&self) -> anyhow::Result<Vec<Transfer>>;
    async fn outgoing(&self) -> anyhow::Result<Vec<Transfer>>;
}

/// Talks to a `monero-wallet-rpc` instance over its JSON-RPC endpoint.
pub struct JsonRpcWalletClient {
    http: reqwest::Client,
    endpoint: String,
}

impl JsonRpcWalletClient {
    pub fn new(port: u16) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: format!("http://127.0.0.1:{port}/json_rpc"),
        }
    }
}

#[derive(Deserialize)]
struct HeightResult {
    height: u64,
}

#[derive(Deserialize)]
struct AddressResult {
    address: String,
}

#[derive(Deserialize, Default)]
struct TransfersResult {
    #[serde(default)]
    #[serde(alias = "in")]
    incoming: Vec<Transfer>,
    #[serde(default)]
    out: Vec<Transfer>,
}

#[async_trait]
impl WalletRpcClient for JsonRpcWalletClient {
    async fn height(&self) -> anyhow::Result<u64> {
        let result: HeightResult =
            super::call_json_rpc(&self.http, &self.endpoint, "get_height", serde_json::json!({}))
                .await?;
        Ok(result.height)
    }

    async fn address(&self) -> anyhow::Result<Address> {
        let result: AddressResult =
            super::call_json_rpc(&self.http, &self.endpoint, "get_address", serde_json::json!({}))
                .await?;
        parse_unchecked(&result.address)
    }

    async fn incoming(&self) -> anyhow::Result<Vec<Transfer>> {
        let result: TransfersResult = super::call_json_rpc(
            &self.http,
            &self.endpoint,
            "get_transfers",
            serde_json::json!({ "in": true }),
        )
        .await
        .unwrap_or_default();
        Ok(result.incoming)
    }

    async fn outgoing(&self) -> anyhow::Result<Vec<Transfer>> {
        let result: TransfersResult = super::call_json_rpc(
            &self.http,
            &self.endpoint,
            "get_transfers",
            serde_json::json!({ "out": true }),
        )
        .await
        .unwrap_or_default();
        Ok(result.out)
    }
}
