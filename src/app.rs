//! Application context: wires every component from one `WalletConfig`.
//!
//! # Responsibilities
//! - Own the endpoint manager, limiter, vault, signer and submitter
//! - Gate outbound transfers on `ledger_submit` and queries on `ledger_query`
//! - Chain build → decrypt → sign → background submit for transfers
//!
//! # Data Flow
//! ```text
//! send_xrp / send_token / trust_set
//!     → RateLimiter::acquire("ledger_submit")
//!     → TransactionSigner::build (sequence, fee, expiry bound)
//!     → CredentialVault::get_active_keypair (decrypt for one call)
//!     → TransactionSigner::sign
//!     → ResilientSubmitter::spawn → SubmissionHandle
//! ```

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::WalletConfig;
use crate::error::{WalletError, WalletResult};
use crate::ledger::{
    Amount, IssuedAmount, ResilientSubmitter, SignedBlob, SubmissionHandle, TransactionEnvelope,
    TransactionSigner, TxTemplate,
};
use crate::rpc::{
    AccountInfo, EndpointManager, HistoryEntry, LedgerClient, ReserveRequirements, RpcTransport,
    TrustLine,
};
use crate::security::RateLimiter;
use crate::vault::{AccountProbe, CredentialVault, FileStore, KeyValueStore};

pub const SUBMIT_RESOURCE: &str = "ledger_submit";
pub const QUERY_RESOURCE: &str = "ledger_query";
pub const PROBE_RESOURCE: &str = "account_probe";

/// Ledger-backed existence check used when accounts are added.
pub struct LedgerProbe {
    client: Arc<LedgerClient>,
    limiter: Arc<RateLimiter>,
}

impl LedgerProbe {
    pub fn new(client: Arc<LedgerClient>, limiter: Arc<RateLimiter>) -> Self {
        Self { client, limiter }
    }
}

#[async_trait]
impl AccountProbe for LedgerProbe {
    async fn account_exists(&self, address: &str) -> WalletResult<bool> {
        self.limiter.acquire(PROBE_RESOURCE)?;
        match self.client.account_info(address).await {
            Ok(_) => Ok(true),
            Err(WalletError::Ledger { code, .. }) if code == "actNotFound" => Ok(false),
            Err(e) => Err(e),
        }
    }
}

/// Shared handles to every wallet component.
pub struct AppContext {
    pub config: WalletConfig,
    pub limiter: Arc<RateLimiter>,
    pub manager: Arc<EndpointManager>,
    pub client: Arc<LedgerClient>,
    pub vault: Arc<CredentialVault>,
    pub signer: TransactionSigner,
    pub submitter: Arc<ResilientSubmitter>,
}

impl AppContext {
    /// Build over HTTP endpoints and the on-disk vault at `config.vault.path`.
    pub fn from_config(config: WalletConfig) -> WalletResult<Self> {
        let manager = EndpointManager::from_config(&config.network)?;
        let store = FileStore::open(&config.vault.path)?;
        Ok(Self::assemble(config, manager, Arc::new(store)))
    }

    /// Build over an injected transport and store.
    pub fn with_parts(
        config: WalletConfig,
        transport: Arc<dyn RpcTransport>,
        store: Arc<dyn KeyValueStore>,
    ) -> WalletResult<Self> {
        let manager = EndpointManager::with_transport(&config.network, transport)?;
        Ok(Self::assemble(config, manager, store))
    }

    fn assemble(config: WalletConfig, manager: EndpointManager, store: Arc<dyn KeyValueStore>) -> Self {
        let limiter = Arc::new(RateLimiter::from_config(&config.rate_limits));
        let manager = Arc::new(manager);
        let client = Arc::new(LedgerClient::new(Arc::clone(&manager)));

        let probe = LedgerProbe::new(Arc::clone(&client), Arc::clone(&limiter));
        let vault = CredentialVault::new(store, config.vault.clone()).with_probe(
            Arc::new(probe),
            Duration::from_secs(config.network.probe_timeout_secs),
        );

        let signer = TransactionSigner::new(Arc::clone(&client), config.signer.clone());
        let submitter = Arc::new(ResilientSubmitter::new(
            Arc::clone(&client),
            config.submitter.clone(),
        ));

        tracing::info!(
            endpoints = config.network.endpoints.len(),
            vault_scheme = ?config.vault.scheme,
            rate_limits = config.rate_limits.len(),
            "Wallet context ready"
        );

        Self {
            config,
            limiter,
            manager,
            client,
            vault: Arc::new(vault),
            signer,
            submitter,
        }
    }

    /// Build and sign `template` from the active account.
    ///
    /// Consumes one `ledger_submit` admission even when building fails.
    pub async fn prepare(
        &self,
        template: TxTemplate,
        password: &str,
    ) -> WalletResult<(TransactionEnvelope, SignedBlob)> {
        self.limiter.acquire(SUBMIT_RESOURCE)?;
        let account = self.vault.active_account().await?;
        let mut envelope = self.signer.build(template, &account.address).await?;
        let bundle = self.vault.get_active_keypair(password).await?;
        let blob = self.signer.sign(&mut envelope, bundle)?;
        Ok((envelope, blob))
    }

    /// Prepare `template` and submit it in the background.
    pub async fn submit(&self, template: TxTemplate, password: &str) -> WalletResult<SubmissionHandle> {
        let (envelope, blob) = self.prepare(template, password).await?;
        Ok(self.submitter.spawn(blob, envelope))
    }

    /// Send native XRP, given as a decimal string.
    pub async fn send_xrp(
        &self,
        destination: &str,
        amount_xrp: &str,
        destination_tag: Option<u32>,
        password: &str,
    ) -> WalletResult<SubmissionHandle> {
        let amount = Amount::xrp(amount_xrp)?;
        self.submit(TxTemplate::payment(destination, amount, destination_tag), password)
            .await
    }

    pub async fn send_token(
        &self,
        destination: &str,
        value: &str,
        currency: &str,
        issuer: &str,
        destination_tag: Option<u32>,
        password: &str,
    ) -> WalletResult<SubmissionHandle> {
        let amount = Amount::Issued(IssuedAmount::new(value, currency, issuer)?);
        self.submit(TxTemplate::payment(destination, amount, destination_tag), password)
            .await
    }

    /// Create or update a trust line toward `issuer`.
    pub async fn trust_set(
        &self,
        currency: &str,
        issuer: &str,
        limit: &str,
        password: &str,
    ) -> WalletResult<SubmissionHandle> {
        let limit = IssuedAmount::new(limit, currency, issuer)?;
        self.submit(TxTemplate::trust_set(limit), password).await
    }

    async fn query_address(&self, address: Option<&str>) -> WalletResult<String> {
        self.limiter.acquire(QUERY_RESOURCE)?;
        match address {
            Some(address) => Ok(address.to_string()),
            None => Ok(self.vault.active_account().await?.address),
        }
    }

    /// Account state for `address`, or for the active account.
    pub async fn account_info(&self, address: Option<&str>) -> WalletResult<AccountInfo> {
        let address = self.query_address(address).await?;
        self.client.account_info(&address).await
    }

    pub async fn account_lines(&self, address: Option<&str>) -> WalletResult<Vec<TrustLine>> {
        let address = self.query_address(address).await?;
        self.client.account_lines(&address).await
    }

    pub async fn account_history(
        &self,
        address: Option<&str>,
        limit: u32,
    ) -> WalletResult<Vec<HistoryEntry>> {
        let address = self.query_address(address).await?;
        self.client.account_tx(&address, limit).await
    }

    pub async fn reserve_requirements(&self) -> ReserveRequirements {
        self.client.reserve_requirements().await
    }
}
