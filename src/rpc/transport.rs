//! Wire transport for ledger JSON-RPC.
//!
//! # Design Decisions
//! - The transport only moves bytes and unwraps the `result` envelope
//! - Interpreting ledger error replies is the manager's job
//! - Every failure here is a network failure from the pool's point of view

use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;
use url::Url;
use uuid::Uuid;

use crate::error::{WalletError, WalletResult};

/// A single JSON-RPC call: method name plus one params object.
#[derive(Debug, Clone, PartialEq)]
pub struct RpcRequest {
    pub method: String,
    pub params: Value,
}

impl RpcRequest {
    pub fn new(method: &str, params: Value) -> Self {
        Self {
            method: method.to_string(),
            params,
        }
    }

    /// A call without parameters.
    pub fn bare(method: &str) -> Self {
        Self::new(method, json!({}))
    }

    /// Request body in the ledger's JSON-RPC dialect.
    pub fn to_body(&self, id: &str) -> Value {
        json!({
            "method": self.method,
            "params": [self.params],
            "id": id,
        })
    }

    /// Stable key for response caching.
    pub fn cache_key(&self) -> String {
        format!("{}:{}", self.method, self.params)
    }
}

/// Moves one request to one endpoint and returns the reply's `result` object.
#[async_trait]
pub trait RpcTransport: Send + Sync {
    async fn call(&self, endpoint: &Url, request: &RpcRequest) -> WalletResult<Value>;
}

/// HTTP transport over `reqwest`.
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> WalletResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| WalletError::Config(format!("HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl RpcTransport for HttpTransport {
    async fn call(&self, endpoint: &Url, request: &RpcRequest) -> WalletResult<Value> {
        let request_id = Uuid::new_v4().to_string();
        tracing::debug!(endpoint = %endpoint, method = %request.method, request_id = %request_id, "Sending RPC request");

        let response = self
            .client
            .post(endpoint.clone())
            .json(&request.to_body(&request_id))
            .send()
            .await
            .map_err(|e| WalletError::Network(format!("{}: {}", endpoint, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(WalletError::Network(format!("{}: HTTP {}", endpoint, status)));
        }

        let mut payload: Value = response
            .json()
            .await
            .map_err(|e| WalletError::Network(format!("{}: malformed reply: {}", endpoint, e)))?;

        payload
            .get_mut("result")
            .map(Value::take)
            .ok_or_else(|| WalletError::Network(format!("{}: reply has no result", endpoint)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_body_shape() {
        let request = RpcRequest::new("account_info", json!({"account": "rX", "ledger_index": "current"}));
        let body = request.to_body("abc");
        assert_eq!(body["method"], "account_info");
        assert_eq!(body["params"][0]["ledger_index"], "current");
        assert_eq!(body["id"], "abc");
        assert_eq!(RpcRequest::bare("fee").params, json!({}));
    }
}
