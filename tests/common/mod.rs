//! Shared utilities for integration tests: a scripted in-process ledger.

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};
use url::Url;

use ledger_wallet_core::config::{RateLimitConfig, WalletConfig};
use ledger_wallet_core::ledger::codec::transaction_hash;
use ledger_wallet_core::rpc::{RpcRequest, RpcTransport};
use ledger_wallet_core::vault::{KeyValueStore, MemoryStore};
use ledger_wallet_core::{AppContext, WalletError, WalletResult};

pub const ENDPOINT_A: &str = "http://a.test/";
pub const ENDPOINT_B: &str = "http://b.test/";
pub const PASSWORD: &str = "Abc12345!";
pub const DESTINATION: &str = "rHb9CJAWyB4rj91VRWn96DkukG4bwdtyTh";
pub const ISSUER: &str = "rrrrrrrrrrrrrrrrrrrrrhoLvTp";

struct LedgerState {
    down: HashSet<String>,
    calls: Vec<(String, String)>,
    validated: u32,
    ledger_step: u32,
    base_fee: u64,
    sequence: u32,
    funded: HashSet<String>,
    engine_result: String,
    /// Ledger index at which the submitted transaction validates, and its result.
    verdict: Option<(u32, String)>,
    submitted: Vec<String>,
    failing_submits: u32,
    /// Methods answered with `slowDown` for the given number of further calls.
    overloaded: Vec<(String, u32)>,
}

/// A ledger answering JSON-RPC calls from memory, with per-endpoint outages.
pub struct MockLedger {
    state: Mutex<LedgerState>,
}

impl MockLedger {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(LedgerState {
                down: HashSet::new(),
                calls: Vec::new(),
                validated: 100,
                ledger_step: 1,
                base_fee: 12,
                sequence: 7,
                funded: HashSet::new(),
                engine_result: "tesSUCCESS".into(),
                verdict: Some((102, "tesSUCCESS".into())),
                submitted: Vec::new(),
                failing_submits: 0,
                overloaded: Vec::new(),
            }),
        })
    }

    fn with<T>(&self, f: impl FnOnce(&mut LedgerState) -> T) -> T {
        f(&mut self.state.lock().unwrap())
    }

    pub fn set_down(&self, endpoint: &str, down: bool) {
        self.with(|s| {
            if down {
                s.down.insert(endpoint.to_string());
            } else {
                s.down.remove(endpoint);
            }
        });
    }

    pub fn fund(&self, address: &str) {
        self.with(|s| s.funded.insert(address.to_string()));
    }

    pub fn set_base_fee(&self, drops: u64) {
        self.with(|s| s.base_fee = drops);
    }

    pub fn set_engine_result(&self, code: &str) {
        self.with(|s| s.engine_result = code.to_string());
    }

    /// Validate the submitted transaction once the ledger reaches `ledger`.
    pub fn validate_at(&self, ledger: u32, code: &str) {
        self.with(|s| s.verdict = Some((ledger, code.to_string())));
    }

    pub fn never_validate(&self) {
        self.with(|s| s.verdict = None);
    }

    /// Fail the next `n` submit calls on every endpoint.
    pub fn fail_submits(&self, n: u32) {
        self.with(|s| s.failing_submits = n);
    }

    /// Answer the next `n` calls to `method` with a `slowDown` error reply.
    pub fn overload(&self, method: &str, n: u32) {
        self.with(|s| s.overloaded.push((method.to_string(), n)));
    }

    /// Number of calls to `method`, including failed ones.
    pub fn calls(&self, method: &str) -> usize {
        self.with(|s| s.calls.iter().filter(|(_, m)| m == method).count())
    }

    /// Number of calls that reached `endpoint`.
    pub fn calls_on(&self, endpoint: &str) -> usize {
        self.with(|s| s.calls.iter().filter(|(e, _)| e == endpoint).count())
    }

    /// Blobs accepted by `submit`.
    pub fn submitted(&self) -> Vec<String> {
        self.with(|s| s.submitted.clone())
    }

    fn error(code: &str) -> Value {
        json!({"status": "error", "error": code, "error_message": format!("{} (mock)", code)})
    }

    fn answer(state: &mut LedgerState, request: &RpcRequest) -> WalletResult<Value> {
        let params = &request.params;
        match request.method.as_str() {
            "server_info" => Ok(json!({
                "info": {
                    "build_version": "2.2.0",
                    "server_state": "full",
                    "validated_ledger": {
                        "seq": state.validated,
                        "reserve_base_xrp": 1.0,
                        "reserve_inc_xrp": 0.2
                    }
                },
                "status": "success"
            })),
            "fee" => Ok(json!({
                "drops": {"base_fee": state.base_fee.to_string(), "open_ledger_fee": "10"},
                "status": "success"
            })),
            "ledger" => {
                let current = state.validated;
                state.validated += state.ledger_step;
                Ok(json!({"ledger_index": current, "validated": true, "status": "success"}))
            }
            "account_info" => {
                let account = params["account"].as_str().unwrap_or_default();
                if !state.funded.contains(account) {
                    return Ok(Self::error("actNotFound"));
                }
                Ok(json!({
                    "account_data": {
                        "Account": account,
                        "Balance": "50000000",
                        "Sequence": state.sequence,
                        "OwnerCount": 0
                    },
                    "status": "success"
                }))
            }
            "account_lines" => Ok(json!({
                "lines": [{
                    "account": ISSUER,
                    "currency": "USD",
                    "balance": "10",
                    "limit": "100",
                    "limit_peer": "0",
                    "no_ripple": true
                }],
                "status": "success"
            })),
            "account_tx" => Ok(json!({
                "transactions": [{
                    "tx": {"hash": "AB12", "TransactionType": "Payment", "ledger_index": 90},
                    "meta": {"TransactionResult": "tesSUCCESS"},
                    "validated": true
                }],
                "status": "success"
            })),
            "submit" => {
                if state.failing_submits > 0 {
                    state.failing_submits -= 1;
                    return Err(WalletError::Network("connection reset (mock)".into()));
                }
                let blob = params["tx_blob"].as_str().unwrap_or_default().to_string();
                let hash = transaction_hash(&hex::decode(&blob).unwrap_or_default());
                state.submitted.push(blob);
                Ok(json!({
                    "engine_result": state.engine_result,
                    "engine_result_message": "mock",
                    "tx_json": {"hash": hash},
                    "status": "success"
                }))
            }
            "tx" => {
                let hash = params["transaction"].as_str().unwrap_or_default();
                let known = state
                    .submitted
                    .iter()
                    .any(|b| transaction_hash(&hex::decode(b).unwrap_or_default()) == hash);
                if !known {
                    return Ok(Self::error("txnNotFound"));
                }
                match &state.verdict {
                    Some((at, code)) if state.validated >= *at => Ok(json!({
                        "hash": hash,
                        "validated": true,
                        "ledger_index": at,
                        "meta": {"TransactionResult": code},
                        "Fee": state.base_fee.max(10).to_string(),
                        "status": "success"
                    })),
                    _ => Ok(json!({"hash": hash, "validated": false, "status": "success"})),
                }
            }
            other => Ok(Self::error(&format!("unknownCmd:{}", other))),
        }
    }
}

#[async_trait]
impl RpcTransport for MockLedger {
    async fn call(&self, endpoint: &Url, request: &RpcRequest) -> WalletResult<Value> {
        let mut state = self.state.lock().unwrap();
        state
            .calls
            .push((endpoint.to_string(), request.method.clone()));
        if state.down.contains(endpoint.as_str()) {
            return Err(WalletError::Network(format!("{} unreachable (mock)", endpoint)));
        }
        if let Some((_, left)) = state
            .overloaded
            .iter_mut()
            .find(|(m, left)| *m == request.method && *left > 0)
        {
            *left -= 1;
            return Ok(Self::error("slowDown"));
        }
        Self::answer(&mut state, request)
    }
}

/// Config over the two mock endpoints with fast polling.
pub fn test_config() -> WalletConfig {
    let mut config = WalletConfig::default();
    config.network.endpoints = vec![ENDPOINT_A.into(), ENDPOINT_B.into()];
    config.submitter.poll_interval_ms = 100;
    config.submitter.backoff_base_ms = 100;
    config.submitter.backoff_max_ms = 400;
    config.rate_limits = vec![
        RateLimitConfig::new("ledger_submit", 3600, 10, Some(5)),
        RateLimitConfig::new("ledger_query", 60, 60, Some(10)),
        RateLimitConfig::new("account_probe", 60, 20, Some(5)),
    ];
    config
}

/// Context over `ledger` and an in-memory vault.
pub fn app_with(config: WalletConfig, ledger: &Arc<MockLedger>) -> AppContext {
    let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    AppContext::with_parts(config, ledger.clone(), store).unwrap()
}

/// Context with a created vault and one funded active account. Returns its address.
pub async fn funded_app(config: WalletConfig, ledger: &Arc<MockLedger>) -> (AppContext, String) {
    let app = app_with(config, ledger);
    app.vault.create(PASSWORD).await.unwrap();
    let account = app.vault.generate_account(PASSWORD).await.unwrap();
    ledger.fund(&account.address);
    (app, account.address)
}
