//! Starknet JSON-RPC helpers for read-only queries.

use std::time::Duration;

use anyhow::Context;
use backon::{ExponentialBuilder, Retryable};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::{ClassHash, ContractAddress, Felt};

/// Default timeout for RPC requests.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Maximum number of retries for idempotent queries.
const MAX_RETRIES: usize = 3;

/// `CONTRACT_NOT_FOUND` error code of the Starknet JSON-RPC specification.
const CONTRACT_NOT_FOUND: i64 = 20;

/// Create an HTTP client configured for JSON-RPC requests.
pub fn create_client() -> Result<reqwest::Client, anyhow::Error> {
    reqwest::Client::builder()
        .timeout(DEFAULT_TIMEOUT)
        .build()
        .context("Failed to create HTTP client")
}

/// A JSON-RPC error object returned by the node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
}

/// Send a JSON-RPC request and return either the `result` value or the node's error object.
async fn request(
    client: &reqwest::Client,
    url: &str,
    method: &str,
    params: Vec<Value>,
) -> Result<Result<Value, RpcError>, anyhow::Error> {
    let response = client
        .post(url)
        .json(&serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1
        }))
        .send()
        .await
        .with_context(|| format!("Failed to send {} request", method))?;

    let body: Value = response
        .json()
        .await
        .with_context(|| format!("Failed to parse {} response", method))?;

    if let Some(error) = body.get("error") {
        return Ok(Err(RpcError {
            code: error.get("code").and_then(Value::as_i64).unwrap_or_default(),
            message: error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown")
                .to_string(),
        }));
    }

    body.get("result")
        .cloned()
        .map(Ok)
        .context("No result in response")
}

/// Make a JSON-RPC call and deserialize the result.
pub async fn json_rpc_call<T: DeserializeOwned>(
    client: &reqwest::Client,
    url: &str,
    method: &str,
    params: Vec<Value>,
) -> Result<T, anyhow::Error> {
    let result = match request(client, url, method, params).await? {
        Ok(result) => result,
        Err(error) => anyhow::bail!("RPC error {}: {}", error.code, error.message),
    };

    serde_json::from_value(result).with_context(|| format!("Failed to deserialize {} result", method))
}

/// Fetch the chain id of the node, retrying transient failures.
pub async fn chain_id(client: &reqwest::Client, url: &str) -> Result<Felt, anyhow::Error> {
    let raw: String = (|| json_rpc_call(client, url, "starknet_chainId", Vec::new()))
        .retry(ExponentialBuilder::default().with_max_times(MAX_RETRIES))
        .notify(|err: &anyhow::Error, delay: Duration| {
            tracing::warn!(error = %err, ?delay, "starknet_chainId failed, retrying...");
        })
        .await
        .context("Failed to fetch chain id")?;

    raw.parse().context("Node returned an invalid chain id")
}

/// Class hash of the contract at `address`, or `None` when nothing is deployed there.
pub async fn class_hash_at(
    client: &reqwest::Client,
    url: &str,
    address: ContractAddress,
) -> Result<Option<ClassHash>, anyhow::Error> {
    let params = vec![
        serde_json::json!("latest"),
        serde_json::json!(address.to_string()),
    ];

    match request(client, url, "starknet_getClassHashAt", params).await? {
        Ok(result) => {
            let hash: String = serde_json::from_value(result)
                .context("Failed to deserialize starknet_getClassHashAt result")?;
            Ok(Some(hash.parse()?))
        }
        Err(error) if error.code == CONTRACT_NOT_FOUND => Ok(None),
        Err(error) => anyhow::bail!("RPC error {}: {}", error.code, error.message),
    }
}
