//! Typed ledger queries over the endpoint pool.
//!
//! # Responsibilities
//! - Build JSON-RPC calls for the ledger methods the wallet uses
//! - Parse replies into typed summaries
//! - Cache slow-changing replies (`server_info`, `fee`) for a short TTL

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use serde_json::{json, Value};
use tokio::time::Instant;

use crate::error::{WalletError, WalletResult};
use crate::rpc::manager::EndpointManager;
use crate::rpc::transport::RpcRequest;
use crate::rpc::types::{
    history_from_result, ledger_index_from_result, trust_lines_from_result, AccountInfo, FeeInfo,
    HistoryEntry, ReserveRequirements, ServerInfo, SubmitResult, TrustLine, TxStatus,
};

/// Cache lifetime per method. Methods not listed are never cached.
fn cache_ttl(method: &str) -> Option<Duration> {
    match method {
        "server_info" => Some(Duration::from_secs(30)),
        "fee" => Some(Duration::from_secs(15)),
        _ => None,
    }
}

/// Ledger client shared by the signer, submitter and collaborators.
pub struct LedgerClient {
    manager: Arc<EndpointManager>,
    cache: DashMap<String, (Instant, Value)>,
}

impl LedgerClient {
    pub fn new(manager: Arc<EndpointManager>) -> Self {
        Self {
            manager,
            cache: DashMap::new(),
        }
    }

    pub fn manager(&self) -> &Arc<EndpointManager> {
        &self.manager
    }

    /// Drop all cached replies.
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    async fn call(&self, request: RpcRequest) -> WalletResult<Value> {
        let Some(ttl) = cache_ttl(&request.method) else {
            return self.manager.request(&request).await;
        };

        let key = request.cache_key();
        if let Some(entry) = self.cache.get(&key) {
            let (stored_at, value) = entry.value();
            if stored_at.elapsed() < ttl {
                tracing::trace!(method = %request.method, "Cache hit");
                return Ok(value.clone());
            }
        }

        let value = self.manager.request(&request).await?;
        self.cache.insert(key, (Instant::now(), value.clone()));
        Ok(value)
    }

    pub async fn server_info(&self) -> WalletResult<ServerInfo> {
        let result = self.call(RpcRequest::bare("server_info")).await?;
        ServerInfo::from_result(&result)
    }

    pub async fn fee(&self) -> WalletResult<FeeInfo> {
        let result = self.call(RpcRequest::bare("fee")).await?;
        FeeInfo::from_result(&result)
    }

    /// Index of the latest validated ledger. Never cached.
    pub async fn validated_ledger_index(&self) -> WalletResult<u32> {
        let result = self
            .call(RpcRequest::new("ledger", json!({"ledger_index": "validated"})))
            .await?;
        ledger_index_from_result(&result)
    }

    /// Account state in the current (open) ledger.
    pub async fn account_info(&self, address: &str) -> WalletResult<AccountInfo> {
        let result = self
            .call(RpcRequest::new(
                "account_info",
                json!({"account": address, "ledger_index": "current"}),
            ))
            .await?;
        AccountInfo::from_result(&result)
    }

    pub async fn account_sequence(&self, address: &str) -> WalletResult<u32> {
        Ok(self.account_info(address).await?.sequence)
    }

    pub async fn account_lines(&self, address: &str) -> WalletResult<Vec<TrustLine>> {
        let result = self
            .call(RpcRequest::new(
                "account_lines",
                json!({"account": address, "ledger_index": "validated"}),
            ))
            .await?;
        trust_lines_from_result(&result)
    }

    pub async fn account_tx(&self, address: &str, limit: u32) -> WalletResult<Vec<HistoryEntry>> {
        let result = self
            .call(RpcRequest::new(
                "account_tx",
                json!({
                    "account": address,
                    "ledger_index_min": -1,
                    "ledger_index_max": -1,
                    "limit": limit,
                }),
            ))
            .await?;
        history_from_result(&result)
    }

    pub async fn submit(&self, tx_blob: &str) -> WalletResult<SubmitResult> {
        let result = self
            .call(RpcRequest::new("submit", json!({"tx_blob": tx_blob})))
            .await?;
        SubmitResult::from_result(&result)
    }

    /// Look a transaction up by hash. `Ok(None)` while the ledger has not seen it.
    pub async fn tx(&self, hash: &str) -> WalletResult<Option<TxStatus>> {
        match self
            .call(RpcRequest::new("tx", json!({"transaction": hash, "binary": false})))
            .await
        {
            Ok(result) => TxStatus::from_result(&result).map(Some),
            Err(WalletError::Ledger { code, .. }) if code == "txnNotFound" => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Reserve requirements, falling back to 10/2 XRP when they cannot be read.
    pub async fn reserve_requirements(&self) -> ReserveRequirements {
        match self.server_info().await {
            Ok(ServerInfo {
                validated_ledger: Some(ledger),
                ..
            }) => ReserveRequirements {
                base_xrp: ledger.reserve_base_xrp,
                increment_xrp: ledger.reserve_inc_xrp,
                available: true,
            },
            Ok(_) => {
                tracing::warn!("server_info has no validated ledger, using default reserves");
                ReserveRequirements::default()
            }
            Err(e) => {
                tracing::warn!(error = %e, "Could not read reserves, using defaults");
                ReserveRequirements::default()
            }
        }
    }
}
