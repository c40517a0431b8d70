//! Ledger wallet core: credential vault and resilient transaction pipeline.

pub mod app;
pub mod config;
pub mod error;
pub mod ledger;
pub mod lifecycle;
pub mod observability;
pub mod resilience;
pub mod rpc;
pub mod security;
pub mod vault;

pub use app::AppContext;
pub use config::WalletConfig;
pub use error::{WalletError, WalletResult};
pub use ledger::{ResilientSubmitter, TransactionSigner};
pub use lifecycle::Shutdown;
pub use rpc::EndpointManager;
pub use security::RateLimiter;
pub use vault::CredentialVault;
