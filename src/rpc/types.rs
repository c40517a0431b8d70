//! Typed views of ledger replies.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{WalletError, WalletResult};

/// `server_info` summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServerInfo {
    pub build_version: Option<String>,
    pub server_state: Option<String>,
    pub validated_ledger: Option<ValidatedLedger>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidatedLedger {
    pub seq: u32,
    pub reserve_base_xrp: f64,
    pub reserve_inc_xrp: f64,
}

/// `fee` summary, in drops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FeeInfo {
    pub base_fee_drops: u64,
    pub open_ledger_fee_drops: Option<u64>,
}

/// `account_info` summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountInfo {
    pub account: String,
    pub balance_drops: u64,
    pub sequence: u32,
    pub owner_count: u32,
}

/// One trust line from `account_lines`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustLine {
    /// Counterparty (issuer) address.
    pub account: String,
    pub currency: String,
    pub balance: String,
    pub limit: String,
    #[serde(default)]
    pub limit_peer: Option<String>,
    #[serde(default)]
    pub no_ripple: Option<bool>,
}

/// One entry from `account_tx`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryEntry {
    pub hash: Option<String>,
    pub transaction_type: Option<String>,
    pub result_code: Option<String>,
    pub validated: bool,
    pub ledger_index: Option<u32>,
}

/// Preliminary verdict from `submit`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubmitResult {
    pub engine_result: String,
    pub engine_result_message: Option<String>,
    pub hash: Option<String>,
}

/// Lookup of a transaction by hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TxStatus {
    pub validated: bool,
    pub result_code: Option<String>,
    pub fee_drops: Option<u64>,
    pub ledger_index: Option<u32>,
}

/// Reserve requirements in XRP.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ReserveRequirements {
    pub base_xrp: f64,
    pub increment_xrp: f64,
    /// False when the ledger could not be asked and defaults were used.
    pub available: bool,
}

impl Default for ReserveRequirements {
    fn default() -> Self {
        Self {
            base_xrp: 10.0,
            increment_xrp: 2.0,
            available: false,
        }
    }
}

fn malformed(method: &str, what: &str) -> WalletError {
    WalletError::Network(format!("malformed {} reply: missing {}", method, what))
}

/// Numbers arrive as JSON numbers or decimal strings depending on the field.
fn as_u64(value: &Value) -> Option<u64> {
    value
        .as_u64()
        .or_else(|| value.as_str().and_then(|s| s.parse().ok()))
}

fn as_u32(value: &Value) -> Option<u32> {
    as_u64(value).and_then(|v| u32::try_from(v).ok())
}

fn as_string(value: &Value) -> Option<String> {
    value.as_str().map(str::to_string)
}

impl ServerInfo {
    pub fn from_result(result: &Value) -> WalletResult<Self> {
        let info = result.get("info").ok_or_else(|| malformed("server_info", "info"))?;
        let validated_ledger = info
            .get("validated_ledger")
            .and_then(|v| serde_json::from_value::<ValidatedLedger>(v.clone()).ok());
        Ok(Self {
            build_version: info.get("build_version").and_then(as_string),
            server_state: info.get("server_state").and_then(as_string),
            validated_ledger,
        })
    }
}

impl FeeInfo {
    pub fn from_result(result: &Value) -> WalletResult<Self> {
        let drops = result.get("drops").ok_or_else(|| malformed("fee", "drops"))?;
        let base_fee_drops = drops
            .get("base_fee")
            .and_then(as_u64)
            .ok_or_else(|| malformed("fee", "drops.base_fee"))?;
        Ok(Self {
            base_fee_drops,
            open_ledger_fee_drops: drops.get("open_ledger_fee").and_then(as_u64),
        })
    }
}

impl AccountInfo {
    pub fn from_result(result: &Value) -> WalletResult<Self> {
        let data = result
            .get("account_data")
            .ok_or_else(|| malformed("account_info", "account_data"))?;
        Ok(Self {
            account: data
                .get("Account")
                .and_then(as_string)
                .ok_or_else(|| malformed("account_info", "Account"))?,
            balance_drops: data
                .get("Balance")
                .and_then(as_u64)
                .ok_or_else(|| malformed("account_info", "Balance"))?,
            sequence: data
                .get("Sequence")
                .and_then(as_u32)
                .ok_or_else(|| malformed("account_info", "Sequence"))?,
            owner_count: data.get("OwnerCount").and_then(as_u32).unwrap_or(0),
        })
    }
}

pub fn trust_lines_from_result(result: &Value) -> WalletResult<Vec<TrustLine>> {
    let lines = result
        .get("lines")
        .cloned()
        .ok_or_else(|| malformed("account_lines", "lines"))?;
    serde_json::from_value(lines)
        .map_err(|e| WalletError::Network(format!("malformed account_lines reply: {}", e)))
}

pub fn history_from_result(result: &Value) -> WalletResult<Vec<HistoryEntry>> {
    let transactions = result
        .get("transactions")
        .and_then(Value::as_array)
        .ok_or_else(|| malformed("account_tx", "transactions"))?;

    Ok(transactions
        .iter()
        .map(|entry| {
            // API v1 nests the transaction under `tx`, v2 under `tx_json` with a top-level hash.
            let tx = entry.get("tx").or_else(|| entry.get("tx_json"));
            HistoryEntry {
                hash: entry
                    .get("hash")
                    .or_else(|| tx.and_then(|t| t.get("hash")))
                    .and_then(as_string),
                transaction_type: tx
                    .and_then(|t| t.get("TransactionType"))
                    .and_then(as_string),
                result_code: entry
                    .get("meta")
                    .and_then(|m| m.get("TransactionResult"))
                    .and_then(as_string),
                validated: entry.get("validated").and_then(Value::as_bool).unwrap_or(false),
                ledger_index: entry
                    .get("ledger_index")
                    .or_else(|| tx.and_then(|t| t.get("ledger_index")))
                    .and_then(as_u32),
            }
        })
        .collect())
}

impl SubmitResult {
    pub fn from_result(result: &Value) -> WalletResult<Self> {
        Ok(Self {
            engine_result: result
                .get("engine_result")
                .and_then(as_string)
                .ok_or_else(|| malformed("submit", "engine_result"))?,
            engine_result_message: result.get("engine_result_message").and_then(as_string),
            hash: result
                .get("tx_json")
                .and_then(|t| t.get("hash"))
                .and_then(as_string),
        })
    }
}

impl TxStatus {
    pub fn from_result(result: &Value) -> WalletResult<Self> {
        let tx = result.get("tx_json").unwrap_or(result);
        Ok(Self {
            validated: result.get("validated").and_then(Value::as_bool).unwrap_or(false),
            result_code: result
                .get("meta")
                .and_then(|m| m.get("TransactionResult"))
                .and_then(as_string),
            fee_drops: tx.get("Fee").and_then(as_u64),
            ledger_index: result.get("ledger_index").and_then(as_u32),
        })
    }
}

/// Validated ledger index from a `ledger` reply.
pub fn ledger_index_from_result(result: &Value) -> WalletResult<u32> {
    result
        .get("ledger_index")
        .or_else(|| result.get("ledger").and_then(|l| l.get("ledger_index")))
        .and_then(as_u32)
        .ok_or_else(|| malformed("ledger", "ledger_index"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_account_info() {
        let result = json!({
            "account_data": {"Account": "rA", "Balance": "25000000", "Sequence": 7, "OwnerCount": 1},
            "status": "success"
        });
        let info = AccountInfo::from_result(&result).unwrap();
        assert_eq!(info.balance_drops, 25_000_000);
        assert_eq!(info.sequence, 7);
    }

    #[test]
    fn test_parse_tx_status() {
        let result = json!({
            "Fee": "12",
            "validated": true,
            "ledger_index": 105,
            "meta": {"TransactionResult": "tesSUCCESS"}
        });
        let status = TxStatus::from_result(&result).unwrap();
        assert!(status.validated);
        assert_eq!(status.fee_drops, Some(12));
        assert_eq!(status.result_code.as_deref(), Some("tesSUCCESS"));
    }

    #[test]
    fn test_parse_ledger_index_variants() {
        assert_eq!(ledger_index_from_result(&json!({"ledger_index": 99})).unwrap(), 99);
        assert_eq!(
            ledger_index_from_result(&json!({"ledger": {"ledger_index": "100"}})).unwrap(),
            100
        );
        assert!(ledger_index_from_result(&json!({})).is_err());
    }

    #[test]
    fn test_parse_history_both_layouts() {
        let result = json!({"transactions": [
            {"tx": {"hash": "H1", "TransactionType": "Payment", "ledger_index": 5},
             "meta": {"TransactionResult": "tesSUCCESS"}, "validated": true},
            {"hash": "H2", "tx_json": {"TransactionType": "TrustSet"}, "ledger_index": 6,
             "meta": {"TransactionResult": "tecNO_LINE"}, "validated": true}
        ]});
        let history = history_from_result(&result).unwrap();
        assert_eq!(history[0].hash.as_deref(), Some("H1"));
        assert_eq!(history[1].transaction_type.as_deref(), Some("TrustSet"));
        assert_eq!(history[1].ledger_index, Some(6));
    }
}
