//! Chain access for nonce seeding.
//!
//! The only chain query the nonce manager needs is the pending
//! transaction count of an address. [`JsonRpcChainProvider`] asks an
//! Ethereum-style JSON-RPC node; tests substitute a stub.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use url::Url;

use credo_core::LedgerAddress;

/// Failures when talking to the chain node.
#[derive(Error, Debug)]
pub enum ProviderError {
    /// The node could not be reached.
    #[error("chain node unreachable: {0}")]
    Unreachable(String),

    /// The node answered with a JSON-RPC error object.
    #[error("chain node error {code}: {message}")]
    Rpc {
        /// JSON-RPC error code.
        code: i64,
        /// JSON-RPC error message.
        message: String,
    },

    /// The node's answer could not be interpreted.
    #[error("malformed chain response: {0}")]
    Malformed(String),
}

/// Read-side chain collaborator.
#[async_trait]
pub trait ChainProvider: Send + Sync {
    /// The address's transaction count including pending transactions.
    async fn pending_transaction_count(
        &self,
        address: &LedgerAddress,
    ) -> Result<u64, ProviderError>;
}

/// [`ChainProvider`] over an Ethereum-style JSON-RPC endpoint.
#[derive(Debug, Clone)]
pub struct JsonRpcChainProvider {
    endpoint: Url,
    http: reqwest::Client,
}

#[derive(Deserialize)]
struct RpcResponse {
    result: Option<String>,
    error: Option<RpcError>,
}

#[derive(Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

impl JsonRpcChainProvider {
    /// Create a provider for the given JSON-RPC endpoint.
    pub fn new(endpoint: Url) -> Result<Self, ProviderError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| ProviderError::Unreachable(e.to_string()))?;
        Ok(Self { endpoint, http })
    }
}

#[async_trait]
impl ChainProvider for JsonRpcChainProvider {
    async fn pending_transaction_count(
        &self,
        address: &LedgerAddress,
    ) -> Result<u64, ProviderError> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "eth_getTransactionCount",
            "params": [address.as_str(), "pending"],
        });

        let response: RpcResponse = self
            .http
            .post(self.endpoint.clone())
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Unreachable(e.to_string()))?
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(e.to_string()))?;

        if let Some(error) = response.error {
            return Err(ProviderError::Rpc {
                code: error.code,
                message: error.message,
            });
        }
        let hex = response
            .result
            .ok_or_else(|| ProviderError::Malformed("missing result".to_string()))?;
        let digits = hex
            .strip_prefix("0x")
            .ok_or_else(|| ProviderError::Malformed(format!("expected hex quantity, got {hex}")))?;
        u64::from_str_radix(digits, 16)
            .map_err(|e| ProviderError::Malformed(format!("bad hex quantity {hex}: {e}")))
    }
}
