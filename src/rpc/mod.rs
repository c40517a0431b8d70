//! Ledger RPC subsystem.
//!
//! # Data Flow
//! ```text
//! LedgerClient (typed query, optional cache)
//!     → EndpointManager::request (priority order, current first)
//!         → RpcTransport::call (HTTP JSON-RPC, per-call timeout)
//!         → on failure: mark Unhealthy, next endpoint
//!     → ledger error reply → WalletError::Ledger
//! ```

pub mod client;
pub mod endpoint;
pub mod manager;
pub mod transport;
pub mod types;

pub use client::LedgerClient;
pub use endpoint::{Endpoint, HealthState};
pub use manager::{is_transient_server_code, EndpointManager, EndpointStatus};
pub use transport::{HttpTransport, RpcRequest, RpcTransport};
pub use types::{
    AccountInfo, FeeInfo, HistoryEntry, ReserveRequirements, ServerInfo, SubmitResult, TrustLine,
    TxStatus,
};
