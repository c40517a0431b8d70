//! Password-gated storage of account keys.
//!
//! # Responsibilities
//! - Create the vault (password hash, sealed app key, no accounts)
//! - Verify passwords, encrypt new entries, decrypt the active entry
//! - Track the active account and manage the account list
//! - Generate and recover accounts from BIP39 recovery phrases
//!
//! # Design Decisions
//! - Every mutating operation is serialized by one async mutex
//! - Hashing, key derivation and file I/O run on blocking workers
//! - Key pairs are validated before anything is written
//! - The app key is stored sealed under the password; a bare key from a
//!   version 1 document is sealed on the next password-checked write
//! - The ledger lookup for a new account runs only after the password verifies
//! - Wrong passwords and corrupted entries are logged apart but reported
//!   with the same user message

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::Mutex;
use zeroize::{Zeroize, Zeroizing};

use crate::config::{VaultConfig, VaultScheme};
use crate::error::{WalletError, WalletResult};
use crate::ledger::keys::{classic_address, verify_key_pair, CredentialBundle, Keypair};
use crate::ledger::mnemonic::{generate_phrase, keypair_from_phrase};
use crate::observability::metrics;
use crate::vault::crypto::{
    legacy_decrypt, legacy_encrypt, token_decrypt, token_encrypt, unwrap_app_key, wrap_app_key,
    AppKey, CryptoError,
};
use crate::vault::password::{check_policy, hash_password, verify_password};
use crate::vault::records::{
    AccountIndex, StoredAccount, StoredAppKey, VaultDocument, VaultEntry, WrappedAppKey,
    DOCUMENT_VERSION, VAULT_KEY,
};
use crate::vault::repair::{repair_document, RepairReport};
use crate::vault::store::{FileStore, KeyValueStore};

/// Best-effort check that an address exists on the ledger.
#[async_trait]
pub trait AccountProbe: Send + Sync {
    async fn account_exists(&self, address: &str) -> WalletResult<bool>;
}

/// Public view of one stored account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountSummary {
    pub index: AccountIndex,
    pub address: String,
    pub public_key: String,
    pub active: bool,
    pub scheme: &'static str,
}

impl AccountSummary {
    fn from_record(record: &StoredAccount, active: Option<AccountIndex>) -> Self {
        let scheme = match record.entry() {
            Ok(VaultEntry::Modern { .. }) => "modern",
            Ok(VaultEntry::Legacy(_)) => "legacy",
            Err(_) => "incomplete",
        };
        Self {
            index: record.index,
            address: record.address.clone().unwrap_or_default(),
            public_key: record.public_key().to_string(),
            active: active == Some(record.index),
            scheme,
        }
    }
}

async fn blocking<T, F>(f: F) -> WalletResult<T>
where
    F: FnOnce() -> WalletResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await?
}

fn read_document(store: &dyn KeyValueStore) -> WalletResult<Option<VaultDocument>> {
    match store.get(VAULT_KEY)? {
        Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        None => Ok(None),
    }
}

fn write_document(store: &dyn KeyValueStore, doc: &VaultDocument) -> WalletResult<()> {
    let bytes = serde_json::to_vec_pretty(doc)?;
    store.set(VAULT_KEY, &bytes)
}

/// Unseal the document's app key with `password`.
fn unseal_app_key(doc: &VaultDocument, password: &str) -> Result<AppKey, CryptoError> {
    match &doc.app_key {
        Some(StoredAppKey::Wrapped(wrapped)) => {
            let parts = wrapped
                .decode()
                .map_err(|_| CryptoError::Malformed("app key encoding"))?;
            unwrap_app_key(
                password,
                wrapped.iterations,
                &parts.salt,
                &parts.nonce,
                &parts.ciphertext,
            )
        }
        Some(StoredAppKey::Clear(encoded)) => AppKey::decode(encoded),
        None => Err(CryptoError::Malformed("app key missing")),
    }
}

fn seal_app_key(
    doc: &mut VaultDocument,
    key: &AppKey,
    password: &str,
    iterations: u32,
) -> WalletResult<()> {
    let sealed = wrap_app_key(key, password, iterations).map_err(sealing_failed)?;
    doc.app_key = Some(StoredAppKey::Wrapped(WrappedAppKey::new(&sealed, iterations)));
    doc.version = DOCUMENT_VERSION;
    Ok(())
}

fn app_key_unavailable(e: CryptoError) -> WalletError {
    WalletError::Storage(format!("vault app key unavailable: {}", e))
}

/// Unseal the app key, sealing a bare one under `password` in place.
///
/// Returns the key and whether the document changed.
fn open_app_key(
    doc: &mut VaultDocument,
    password: &str,
    iterations: u32,
) -> WalletResult<(AppKey, bool)> {
    let key = unseal_app_key(doc, password).map_err(app_key_unavailable)?;
    let bare = matches!(doc.app_key, Some(StoredAppKey::Clear(_)));
    if bare {
        seal_app_key(doc, &key, password, iterations)?;
        tracing::info!("Sealed bare app key under the vault password");
    }
    Ok((key, bare))
}

fn corrupt(index: AccountIndex, reason: impl Into<String>) -> WalletError {
    WalletError::CorruptEntry {
        index: index.0,
        reason: reason.into(),
    }
}

/// Decrypt the private key of `record`: modern token first, then retained legacy material.
fn decrypt_record(
    app_key: Result<&AppKey, &CryptoError>,
    record: &StoredAccount,
    password: &str,
    iterations: u32,
) -> WalletResult<Zeroizing<String>> {
    let index = record.index;
    let entry = record.entry().map_err(|reason| corrupt(index, reason))?;

    let mut plaintext = match entry {
        VaultEntry::Modern { token, legacy } => {
            let modern = app_key
                .map_err(Clone::clone)
                .and_then(|key| token_decrypt(key, &token));
            match (modern, legacy) {
                (Ok(plain), _) => plain,
                (Err(token_err), Some(l)) => {
                    tracing::warn!(index = %index, error = %token_err, "Token failed, trying legacy material");
                    legacy_decrypt(password, iterations, &l.salt, &l.nonce, &l.ciphertext)
                        .map_err(|e| corrupt(index, format!("token: {}; legacy: {}", token_err, e)))?
                }
                (Err(e), None) => return Err(corrupt(index, format!("token: {}", e))),
            }
        }
        VaultEntry::Legacy(l) => legacy_decrypt(password, iterations, &l.salt, &l.nonce, &l.ciphertext)
            .map_err(|e| corrupt(index, format!("legacy: {}", e)))?,
    };

    let bytes = std::mem::take(&mut *plaintext);
    String::from_utf8(bytes).map(Zeroizing::new).map_err(|e| {
        e.into_bytes().zeroize();
        corrupt(index, "plaintext is not UTF-8")
    })
}

fn sealing_failed(e: CryptoError) -> WalletError {
    WalletError::Internal(format!("encryption failed: {}", e))
}

fn seal_token(key: &AppKey, private_key: &str) -> WalletResult<String> {
    token_encrypt(key, private_key.as_bytes()).map_err(sealing_failed)
}

/// Encrypted, password-gated account key storage.
pub struct CredentialVault {
    store: Arc<dyn KeyValueStore>,
    config: VaultConfig,
    probe: Option<Arc<dyn AccountProbe>>,
    probe_timeout: Duration,
    lock: Mutex<()>,
}

impl CredentialVault {
    pub fn new(store: Arc<dyn KeyValueStore>, config: VaultConfig) -> Self {
        Self {
            store,
            config,
            probe: None,
            probe_timeout: Duration::from_secs(10),
            lock: Mutex::new(()),
        }
    }

    /// Open the file-backed vault at `config.path`.
    pub fn open(config: &VaultConfig) -> WalletResult<Self> {
        let store = FileStore::open(&config.path)?;
        Ok(Self::new(Arc::new(store), config.clone()))
    }

    /// Probe new accounts on the ledger before storing them.
    pub fn with_probe(mut self, probe: Arc<dyn AccountProbe>, timeout: Duration) -> Self {
        self.probe = Some(probe);
        self.probe_timeout = timeout;
        self
    }

    async fn read(&self) -> WalletResult<Option<VaultDocument>> {
        let store = Arc::clone(&self.store);
        blocking(move || read_document(store.as_ref())).await
    }

    async fn load(&self) -> WalletResult<VaultDocument> {
        self.read().await?.ok_or(WalletError::VaultNotInitialized)
    }

    async fn save(&self, doc: VaultDocument) -> WalletResult<()> {
        let store = Arc::clone(&self.store);
        blocking(move || write_document(store.as_ref(), &doc)).await
    }

    /// Verify `password` against the stored hash.
    async fn verify(&self, doc: &VaultDocument, password: &str) -> WalletResult<()> {
        let stored = doc
            .password_hash
            .clone()
            .ok_or_else(|| WalletError::Storage("vault has no password hash".into()))?;
        let password = Zeroizing::new(password.to_string());
        let matches = blocking(move || verify_password(&password, &stored)).await?;
        if matches {
            Ok(())
        } else {
            tracing::warn!("Vault password rejected");
            metrics::record_auth_failure("password");
            Err(WalletError::Auth)
        }
    }

    fn report_corruption(err: &WalletError) {
        if let WalletError::CorruptEntry { index, reason } = err {
            tracing::error!(index, reason = %reason, "Vault entry failed integrity check");
            metrics::record_auth_failure("integrity");
        }
    }

    pub async fn exists(&self) -> WalletResult<bool> {
        Ok(self.read().await?.is_some())
    }

    /// Initialise an empty vault.
    pub async fn create(&self, password: &str) -> WalletResult<()> {
        check_policy(password, self.config.min_password_len)?;
        let _guard = self.lock.lock().await;
        if self.read().await?.is_some() {
            return Err(WalletError::VaultExists);
        }

        let iterations = self.config.pbkdf2_iterations;
        let password = Zeroizing::new(password.to_string());
        let store = Arc::clone(&self.store);
        blocking(move || {
            let mut doc = VaultDocument {
                version: DOCUMENT_VERSION,
                password_hash: Some(hash_password(&password)?),
                app_key: None,
                accounts: Vec::new(),
                active_index: None,
            };
            seal_app_key(&mut doc, &AppKey::generate(), &password, iterations)?;
            write_document(store.as_ref(), &doc)
        })
        .await?;

        tracing::info!("Vault created");
        Ok(())
    }

    /// Check the password. Used only as a gate.
    ///
    /// A bare app key left by a version 1 document is sealed here.
    pub async fn unlock(&self, password: &str) -> WalletResult<()> {
        let _guard = self.lock.lock().await;
        let mut doc = self.load().await?;
        self.verify(&doc, password).await?;

        if matches!(doc.app_key, Some(StoredAppKey::Clear(_))) {
            let iterations = self.config.pbkdf2_iterations;
            let password = Zeroizing::new(password.to_string());
            let store = Arc::clone(&self.store);
            blocking(move || {
                open_app_key(&mut doc, &password, iterations)?;
                write_document(store.as_ref(), &doc)
            })
            .await?;
        }
        tracing::debug!("Vault unlocked");
        Ok(())
    }

    /// Ask the ledger whether `address` exists. Informational only.
    async fn look_up(&self, address: &str) {
        let Some(probe) = &self.probe else {
            return;
        };
        match tokio::time::timeout(self.probe_timeout, probe.account_exists(address)).await {
            Ok(Ok(true)) => tracing::debug!(address = %address, "Account found on ledger"),
            Ok(Ok(false)) => tracing::info!(address = %address, "Account not yet funded on ledger"),
            Ok(Err(e)) => tracing::warn!(address = %address, error = %e, "Account lookup failed"),
            Err(_) => tracing::warn!(
                address = %address,
                timeout_secs = self.probe_timeout.as_secs_f64(),
                "Account lookup timed out"
            ),
        }
    }

    /// Store a key pair under the next account index.
    pub async fn add_account(
        &self,
        public_key: &str,
        private_key: &str,
        password: &str,
    ) -> WalletResult<AccountIndex> {
        let public_key = public_key.trim().to_ascii_uppercase();
        let private_key = Zeroizing::new(private_key.trim().to_string());
        verify_key_pair(&public_key, &private_key)?;
        let address = classic_address(&public_key)?;

        let _guard = self.lock.lock().await;
        let mut doc = self.load().await?;
        self.verify(&doc, password).await?;

        if let Some(existing) = doc
            .accounts
            .iter()
            .find(|a| a.public_key().eq_ignore_ascii_case(&public_key))
        {
            return Err(WalletError::DuplicateAccount(existing.index.0));
        }

        self.look_up(&address).await;

        let index = doc.next_index();
        let scheme = self.config.scheme;
        let iterations = self.config.pbkdf2_iterations;
        let password = Zeroizing::new(password.to_string());
        let store = Arc::clone(&self.store);
        let logged_address = address.clone();

        blocking(move || {
            let record = match scheme {
                VaultScheme::Modern => {
                    let (key, _) = open_app_key(&mut doc, &password, iterations)?;
                    let token = seal_token(&key, &private_key)?;
                    StoredAccount::modern(index, address, public_key, token)
                }
                VaultScheme::Legacy => {
                    let sealed = legacy_encrypt(&password, iterations, private_key.as_bytes())
                        .map_err(sealing_failed)?;
                    StoredAccount::legacy(index, address, public_key, &sealed)
                }
            };
            doc.accounts.push(record);
            if doc.active_index.is_none() {
                doc.active_index = Some(index);
            }
            write_document(store.as_ref(), &doc)
        })
        .await?;

        tracing::info!(index = %index, address = %logged_address, "Account added");
        Ok(index)
    }

    async fn summary(&self, index: AccountIndex) -> WalletResult<AccountSummary> {
        let doc = self.load().await?;
        doc.find(index)
            .map(|r| AccountSummary::from_record(r, doc.active_index))
            .ok_or(WalletError::AccountNotFound)
    }

    /// Generate a fresh ed25519 key pair and store it.
    pub async fn generate_account(&self, password: &str) -> WalletResult<AccountSummary> {
        let pair = Keypair::generate();
        let index = self
            .add_account(&pair.public_key, &pair.private_key, password)
            .await?;
        self.summary(index).await
    }

    /// Generate an account from a new 12-word recovery phrase.
    ///
    /// The phrase is returned once and never stored.
    pub async fn generate_account_with_mnemonic(
        &self,
        password: &str,
    ) -> WalletResult<(AccountSummary, Zeroizing<String>)> {
        let phrase = generate_phrase()?;
        let summary = self.recover_from_mnemonic(&phrase, password).await?;
        Ok((summary, phrase))
    }

    /// Store the account a recovery phrase derives to.
    pub async fn recover_from_mnemonic(
        &self,
        phrase: &str,
        password: &str,
    ) -> WalletResult<AccountSummary> {
        let phrase = Zeroizing::new(phrase.to_string());
        let pair = blocking(move || keypair_from_phrase(&phrase, "")).await?;
        let index = self
            .add_account(&pair.public_key, &pair.private_key, password)
            .await?;
        tracing::info!(index = %index, "Account recovered from phrase");
        self.summary(index).await
    }

    /// Decrypt the active account's key pair.
    pub async fn get_active_keypair(&self, password: &str) -> WalletResult<CredentialBundle> {
        let _guard = self.lock.lock().await;
        let doc = self.load().await?;
        self.verify(&doc, password).await?;

        let index = doc.active_index.ok_or(WalletError::AccountNotFound)?;
        let record = doc.find(index).cloned().ok_or(WalletError::AccountNotFound)?;
        let iterations = self.config.pbkdf2_iterations;
        let password = Zeroizing::new(password.to_string());

        let result = blocking(move || {
            let app_key = if record.token.is_some() {
                unseal_app_key(&doc, &password)
            } else {
                Err(CryptoError::Malformed("app key not unsealed"))
            };
            let private_key = decrypt_record(app_key.as_ref(), &record, &password, iterations)?;
            CredentialBundle::new(record.public_key().to_string(), private_key)
                .map_err(|_| corrupt(record.index, "decrypted key does not match public key"))
        })
        .await;

        if let Err(e) = &result {
            Self::report_corruption(e);
        }
        result
    }

    /// The active account, without decrypting anything.
    pub async fn active_account(&self) -> WalletResult<AccountSummary> {
        let doc = self.load().await?;
        let index = doc.active_index.ok_or(WalletError::AccountNotFound)?;
        doc.find(index)
            .map(|r| AccountSummary::from_record(r, doc.active_index))
            .ok_or(WalletError::AccountNotFound)
    }

    pub async fn list_accounts(&self) -> WalletResult<Vec<AccountSummary>> {
        let doc = self.load().await?;
        Ok(doc
            .accounts
            .iter()
            .map(|r| AccountSummary::from_record(r, doc.active_index))
            .collect())
    }

    /// Make `index` the active account. No password required.
    pub async fn switch_account(&self, index: AccountIndex) -> WalletResult<()> {
        let _guard = self.lock.lock().await;
        let mut doc = self.load().await?;
        if doc.find(index).is_none() {
            return Err(WalletError::IndexOutOfRange(index.0));
        }
        doc.active_index = Some(index);
        self.save(doc).await?;
        tracing::info!(index = %index, "Switched active account");
        Ok(())
    }

    pub async fn remove_account(&self, index: AccountIndex, password: &str) -> WalletResult<()> {
        let _guard = self.lock.lock().await;
        let mut doc = self.load().await?;
        self.verify(&doc, password).await?;

        let before = doc.accounts.len();
        doc.accounts.retain(|a| a.index != index);
        if doc.accounts.len() == before {
            return Err(WalletError::IndexOutOfRange(index.0));
        }
        doc.repoint_active();
        self.save(doc).await?;
        tracing::info!(index = %index, "Account removed");
        Ok(())
    }

    /// Re-hash the password and re-encrypt every entry under the modern scheme.
    ///
    /// Entries move to a fresh app key sealed under the new password. Aborts
    /// without writing if any entry cannot be decrypted.
    pub async fn change_password(&self, old: &str, new: &str) -> WalletResult<()> {
        check_policy(new, self.config.min_password_len)?;
        let _guard = self.lock.lock().await;
        let mut doc = self.load().await?;
        self.verify(&doc, old).await?;

        let iterations = self.config.pbkdf2_iterations;
        let old = Zeroizing::new(old.to_string());
        let new = Zeroizing::new(new.to_string());
        let store = Arc::clone(&self.store);

        let result = blocking(move || {
            let current = unseal_app_key(&doc, &old);
            if let Err(e) = &current {
                tracing::warn!(error = %e, "Current app key unavailable, relying on legacy material");
            }
            let next = AppKey::generate();
            let mut resealed = Vec::with_capacity(doc.accounts.len());
            for record in &doc.accounts {
                let private_key = decrypt_record(current.as_ref(), record, &old, iterations)?;
                let mut updated = record.clone();
                updated.token = Some(seal_token(&next, &private_key)?);
                updated.clear_legacy();
                resealed.push(updated);
            }
            doc.accounts = resealed;
            doc.password_hash = Some(hash_password(&new)?);
            seal_app_key(&mut doc, &next, &new, iterations)?;
            write_document(store.as_ref(), &doc)
        })
        .await;

        if let Err(e) = &result {
            Self::report_corruption(e);
        }
        result?;
        tracing::info!("Vault password changed");
        Ok(())
    }

    /// Add a modern token to every legacy-only entry, keeping the legacy material.
    ///
    /// Returns the number of entries migrated.
    pub async fn migrate_legacy(&self, password: &str) -> WalletResult<usize> {
        let _guard = self.lock.lock().await;
        let mut doc = self.load().await?;
        self.verify(&doc, password).await?;

        let iterations = self.config.pbkdf2_iterations;
        let password = Zeroizing::new(password.to_string());
        let store = Arc::clone(&self.store);

        let result = blocking(move || {
            let (key, resealed) = open_app_key(&mut doc, &password, iterations)?;
            let mut migrated = 0;
            for i in 0..doc.accounts.len() {
                if !matches!(doc.accounts[i].entry(), Ok(VaultEntry::Legacy(_))) {
                    continue;
                }
                let private_key =
                    decrypt_record(Ok(&key), &doc.accounts[i], &password, iterations)?;
                doc.accounts[i].token = Some(seal_token(&key, &private_key)?);
                migrated += 1;
            }
            if migrated > 0 || resealed {
                write_document(store.as_ref(), &doc)?;
            }
            Ok(migrated)
        })
        .await;

        match &result {
            Ok(count) => tracing::info!(migrated = count, "Legacy entries migrated"),
            Err(e) => Self::report_corruption(e),
        }
        result
    }

    /// Remove incomplete records. Works without the password.
    pub async fn repair(&self) -> WalletResult<RepairReport> {
        let _guard = self.lock.lock().await;
        let mut doc = self.load().await?;
        let report = repair_document(&mut doc);
        if report.changed() {
            self.save(doc).await?;
        }
        tracing::info!(removed = report.removed.len(), remaining = report.remaining, "Vault repair finished");
        Ok(report)
    }
}
