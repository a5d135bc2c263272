//! Minimal opaque RPC clients for the wallet-RPC and daemon JSON-RPC
//! endpoints, consumed only through `height()`, `address()`, `incoming()`,
//! `outgoing()`.

pub mod daemon;
pub mod wallet;

pub use daemon::{DaemonRpcClient, JsonRpcDaemonClient};
pub use wallet::{JsonRpcWalletClient, Transfer, WalletRpcClient};

use serde::de::DeserializeOwned;
use serde_json::Value;

/// Performs a single JSON-RPC 2.0 call against `endpoint` and returns the
/// `result` field, deserialized as `T`.
pub(crate) async fn call_json_rpc<T: DeserializeOwned>(
    client: &reqwest::Client,
    endpoint: &str,
    method: &str,
    params: Value,
) -> anyhow::Result<T> {
    let body = serde_json::json!({
        "jsonrpc": "2.0",
        "id": "0",
        "method": method,
        "params": params,
    });

    let response = client
        .post(endpoint)
        .json(&body)
        .send()
        .await?
        .error_for_status()?;

    let value: Value = response.json().await?;
    if let Some(error) = value.get("error") {
        anyhow::bail!("rpc error calling {method}: {error}");
    }
    let result = value
        .get("result")
        .ok_or_else(|| anyhow::anyhow!("rpc response to {method} missing 'result' field"))?;
    Ok(serde_json::from_value(result.clone())?)
}
