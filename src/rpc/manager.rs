//! Endpoint pool with health tracking and failover.
//!
//! # Responsibilities
//! - Try endpoints in fixed priority order, current endpoint first
//! - Mark endpoints Unhealthy on error or timeout, Healthy on success
//! - Skip Unhealthy endpoints until their cool-down elapses
//! - Report pool status and re-probe on demand
//!
//! # Design Decisions
//! - Deterministic ordering, never randomised
//! - Ledger error replies are valid answers and do not touch endpoint health,
//!   except transient server codes (`tooBusy`, `slowDown`, ...), which count as
//!   endpoint failures and surface as `WalletError::Network` once the pool is exhausted
//! - One pass over the pool per call; retrying across passes is the caller's decision

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tokio::time::Instant;
use url::Url;

use crate::config::NetworkConfig;
use crate::error::{WalletError, WalletResult};
use crate::observability::metrics;
use crate::resilience::with_timeout;
use crate::rpc::endpoint::{Endpoint, HealthState};
use crate::rpc::transport::{HttpTransport, RpcRequest, RpcTransport};

/// Snapshot of the pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EndpointStatus {
    pub connected: bool,
    pub current_endpoint: Option<String>,
    pub failed_endpoints: Vec<String>,
    pub available_endpoints: Vec<String>,
}

/// Failover-capable ledger RPC client over a fixed pool of endpoints.
pub struct EndpointManager {
    endpoints: Vec<Arc<Endpoint>>,
    current: AtomicUsize,
    transport: Arc<dyn RpcTransport>,
    request_timeout: Duration,
    cooldown: Duration,
}

impl EndpointManager {
    /// Build a manager over explicit URLs and transport.
    pub fn new(
        urls: &[String],
        transport: Arc<dyn RpcTransport>,
        request_timeout: Duration,
        cooldown: Duration,
    ) -> WalletResult<Self> {
        if urls.is_empty() {
            return Err(WalletError::Config("at least one endpoint is required".into()));
        }
        let endpoints = urls
            .iter()
            .map(|raw| {
                Url::parse(raw)
                    .map(|url| Arc::new(Endpoint::new(url)))
                    .map_err(|e| WalletError::Config(format!("invalid endpoint {}: {}", raw, e)))
            })
            .collect::<WalletResult<Vec<_>>>()?;

        Ok(Self {
            endpoints,
            current: AtomicUsize::new(0),
            transport,
            request_timeout,
            cooldown,
        })
    }

    /// Build a manager using the HTTP transport.
    pub fn from_config(config: &NetworkConfig) -> WalletResult<Self> {
        let timeout = Duration::from_secs(config.request_timeout_secs);
        let transport = Arc::new(HttpTransport::new(timeout)?);
        Self::new(
            &config.endpoints,
            transport,
            timeout,
            Duration::from_secs(config.cooldown_secs),
        )
    }

    /// Build a manager from config over a caller-supplied transport.
    pub fn with_transport(config: &NetworkConfig, transport: Arc<dyn RpcTransport>) -> WalletResult<Self> {
        Self::new(
            &config.endpoints,
            transport,
            Duration::from_secs(config.request_timeout_secs),
            Duration::from_secs(config.cooldown_secs),
        )
    }

    pub fn endpoints(&self) -> &[Arc<Endpoint>] {
        &self.endpoints
    }

    /// Index of the endpoint that answered most recently.
    pub fn current_index(&self) -> usize {
        self.current.load(Ordering::Relaxed)
    }

    /// Current endpoint first, then the rest in priority order, minus those cooling down.
    fn candidates(&self) -> Vec<usize> {
        let now = Instant::now();
        let current = self.current_index();
        std::iter::once(current)
            .chain((0..self.endpoints.len()).filter(|&i| i != current))
            .filter(|&i| self.endpoints[i].is_available(self.cooldown, now))
            .collect()
    }

    /// Send one call, failing over across the pool.
    ///
    /// Returns the reply's `result` object. A ledger error reply becomes
    /// `WalletError::Ledger` without marking the endpoint failed. A transient
    /// server reply fails the endpoint and moves on to the next one.
    pub async fn request(&self, call: &RpcRequest) -> WalletResult<Value> {
        let order = self.candidates();
        if order.is_empty() {
            tracing::warn!(method = %call.method, "No endpoint available, all cooling down");
            metrics::record_rpc_request(&call.method, "unavailable");
            return Err(WalletError::Network(
                "all endpoints are unhealthy and cooling down".into(),
            ));
        }

        let mut last_error = None;
        for idx in order {
            let endpoint = &self.endpoints[idx];
            let fut = self.transport.call(&endpoint.url, call);
            match with_timeout(self.request_timeout, &call.method, fut).await {
                Ok(result) => match ledger_error(&result) {
                    Some(WalletError::Ledger { code, message }) if is_transient_server_code(&code) => {
                        tracing::warn!(
                            endpoint = %endpoint.url,
                            method = %call.method,
                            code = %code,
                            "Endpoint overloaded, trying next endpoint"
                        );
                        endpoint.mark_failure();
                        last_error = Some(WalletError::Network(format!("{}: {}", code, message)));
                    }
                    other => {
                        endpoint.mark_success();
                        self.current.store(idx, Ordering::Relaxed);
                        return match other {
                            Some(err) => {
                                metrics::record_rpc_request(&call.method, "ledger_error");
                                Err(err)
                            }
                            None => {
                                metrics::record_rpc_request(&call.method, "success");
                                Ok(result)
                            }
                        };
                    }
                },
                Err(e) => {
                    tracing::warn!(
                        endpoint = %endpoint.url,
                        method = %call.method,
                        error = %e,
                        "RPC failed, trying next endpoint"
                    );
                    endpoint.mark_failure();
                    last_error = Some(e);
                }
            }
        }

        metrics::record_rpc_request(&call.method, "exhausted");
        Err(WalletError::Network(format!(
            "all endpoints failed for {}: {}",
            call.method,
            last_error.map(|e| e.to_string()).unwrap_or_default()
        )))
    }

    pub fn get_status(&self) -> EndpointStatus {
        let now = Instant::now();
        let connected = self
            .endpoints
            .iter()
            .any(|e| e.health() == HealthState::Healthy);
        let current = &self.endpoints[self.current_index()];

        EndpointStatus {
            connected,
            current_endpoint: (current.health() == HealthState::Healthy)
                .then(|| current.url.to_string()),
            failed_endpoints: self
                .endpoints
                .iter()
                .filter(|e| e.health() == HealthState::Unhealthy)
                .map(|e| e.url.to_string())
                .collect(),
            available_endpoints: self
                .endpoints
                .iter()
                .filter(|e| e.is_available(self.cooldown, now))
                .map(|e| e.url.to_string())
                .collect(),
        }
    }

    /// Clear all health state and probe every endpoint with `server_info`.
    ///
    /// The first endpoint that answers becomes current. Returns whether any answered.
    pub async fn force_reconnect(&self) -> bool {
        for endpoint in &self.endpoints {
            endpoint.reset();
        }
        self.current.store(0, Ordering::Relaxed);

        let probe = RpcRequest::bare("server_info");
        let mut first_healthy = None;
        for (idx, endpoint) in self.endpoints.iter().enumerate() {
            let fut = self.transport.call(&endpoint.url, &probe);
            match with_timeout(self.request_timeout, "server_info", fut).await {
                Ok(_) => {
                    endpoint.mark_success();
                    first_healthy.get_or_insert(idx);
                }
                Err(e) => {
                    tracing::warn!(endpoint = %endpoint.url, error = %e, "Reconnect probe failed");
                    endpoint.mark_failure();
                }
            }
        }

        match first_healthy {
            Some(idx) => {
                self.current.store(idx, Ordering::Relaxed);
                tracing::info!(endpoint = %self.endpoints[idx].url, "Reconnected");
                true
            }
            None => {
                tracing::error!("Reconnect failed, no endpoint answered");
                false
            }
        }
    }
}

/// Server-side conditions that say nothing about the request itself.
pub const TRANSIENT_SERVER_CODES: &[&str] = &[
    "tooBusy",
    "slowDown",
    "noNetwork",
    "notSynced",
    "noCurrent",
    "noClosed",
];

pub fn is_transient_server_code(code: &str) -> bool {
    TRANSIENT_SERVER_CODES.contains(&code)
}

/// Interpret a `result` object carrying `status: "error"`.
fn ledger_error(result: &Value) -> Option<WalletError> {
    let is_error = result.get("status").and_then(Value::as_str) == Some("error")
        || result.get("error").is_some();
    if !is_error {
        return None;
    }
    let code = result
        .get("error")
        .and_then(Value::as_str)
        .unwrap_or("unknown")
        .to_string();
    let message = result
        .get("error_message")
        .or_else(|| result.get("error_exception"))
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string();
    Some(WalletError::Ledger { code, message })
}
