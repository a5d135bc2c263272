use async_trait::async_trait;
use serde::Deserialize;

/// The opaque blockchain-daemon RPC client surface the Controller depends
/// on: just `height()`.
#[async_trait]
pub trait DaemonRpcClient: Send + Sync {
    async fn height(&self) -> anyhow::Result<u64>;
}

/// Talks to a `monerod` instance's JSON-RPC endpoint.
pub struct JsonRpcDaemonClient {
    http: reqwest::Client,
    endpoint: String,
}

impl JsonRpcDaemonClient {
    pub fn new(host: &str, port: u16) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: format!("http://{host}:{port}/json_rpc"),
        }
    }
}

#[derive(Deserialize)]
struct GetInfoResult {
    height: u64,
}

#[async_trait]
impl DaemonRpcClient for JsonRpcDaemonClient {
    async fn height(&self) -> anyhow::Result<u64> {
        let result: GetInfoResult =
            super::call_json_rpc(&self.http, &self.endpoint, "get_info", serde_json::json!({}))
                .await?;
        Ok(result.height)
    }
}
