//! Persisted vault document and per-account records.
//!
//! Record fields are optional on disk so that incomplete records can be
//! loaded and reported by repair instead of failing the whole document.

use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::vault::crypto::{LegacySealed, LEGACY_NONCE_LEN, SALT_LEN};

/// Store key holding the vault document.
pub const VAULT_KEY: &str = "vault";

pub const DOCUMENT_VERSION: u32 = 2;

/// Stable account label, assigned once and never reused while the account exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountIndex(pub u32);

impl fmt::Display for AccountIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The whole vault as stored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VaultDocument {
    #[serde(default)]
    pub version: u32,
    /// Argon2id PHC string.
    pub password_hash: Option<String>,
    /// Modern-scheme key, sealed under the password.
    pub app_key: Option<StoredAppKey>,
    #[serde(default)]
    pub accounts: Vec<StoredAccount>,
    #[serde(default)]
    pub active_index: Option<AccountIndex>,
}

/// The modern-scheme key as stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StoredAppKey {
    Wrapped(WrappedAppKey),
    /// Bare base64url key written by version 1 documents.
    Clear(String),
}

/// App key sealed with a password-derived key; binary fields are base64.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WrappedAppKey {
    pub salt: String,
    pub nonce: String,
    pub ciphertext: String,
    pub iterations: u32,
}

impl WrappedAppKey {
    pub fn new(sealed: &LegacySealed, iterations: u32) -> Self {
        Self {
            salt: STANDARD.encode(sealed.salt),
            nonce: STANDARD.encode(sealed.nonce),
            ciphertext: STANDARD.encode(&sealed.ciphertext),
            iterations,
        }
    }

    pub fn decode(&self) -> Result<LegacyEntry, String> {
        let field = |name: &'static str, value: &str| {
            STANDARD
                .decode(value)
                .map_err(|_| format!("app key {} is not valid base64", name))
        };
        Ok(LegacyEntry {
            salt: field("salt", &self.salt)?,
            nonce: field("nonce", &self.nonce)?,
            ciphertext: field("ciphertext", &self.ciphertext)?,
        })
    }
}

impl VaultDocument {
    pub fn find(&self, index: AccountIndex) -> Option<&StoredAccount> {
        self.accounts.iter().find(|a| a.index == index)
    }

    pub fn next_index(&self) -> AccountIndex {
        AccountIndex(self.accounts.iter().map(|a| a.index.0).max().unwrap_or(0) + 1)
    }

    /// Keep `active_index` pointing at a surviving record.
    pub fn repoint_active(&mut self) {
        let valid = self
            .active_index
            .is_some_and(|idx| self.accounts.iter().any(|a| a.index == idx));
        if !valid {
            self.active_index = self.accounts.first().map(|a| a.index);
        }
    }
}

/// One account as stored. Legacy fields and the modern token may coexist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredAccount {
    pub index: AccountIndex,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub public_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub salt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ciphertext: Option<String>,
}

/// Decoded legacy material.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyEntry {
    pub salt: Vec<u8>,
    pub nonce: Vec<u8>,
    pub ciphertext: Vec<u8>,
}

/// Encrypted key material, by scheme.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VaultEntry {
    Legacy(LegacyEntry),
    /// A modern token, possibly retaining the legacy material it was migrated from.
    Modern {
        token: String,
        legacy: Option<LegacyEntry>,
    },
}

fn decode_field(name: &'static str, value: &Option<String>) -> Result<Vec<u8>, String> {
    let raw = value.as_deref().ok_or_else(|| format!("missing {}", name))?;
    STANDARD
        .decode(raw)
        .map_err(|_| format!("{} is not valid base64", name))
}

impl StoredAccount {
    pub fn modern(index: AccountIndex, address: String, public_key: String, token: String) -> Self {
        Self {
            index,
            address: Some(address),
            public_key: Some(public_key),
            token: Some(token),
            salt: None,
            nonce: None,
            ciphertext: None,
        }
    }

    pub fn legacy(index: AccountIndex, address: String, public_key: String, sealed: &LegacySealed) -> Self {
        let mut record = Self {
            index,
            address: Some(address),
            public_key: Some(public_key),
            token: None,
            salt: None,
            nonce: None,
            ciphertext: None,
        };
        record.set_legacy(sealed);
        record
    }

    pub fn set_legacy(&mut self, sealed: &LegacySealed) {
        self.salt = Some(STANDARD.encode(sealed.salt));
        self.nonce = Some(STANDARD.encode(sealed.nonce));
        self.ciphertext = Some(STANDARD.encode(&sealed.ciphertext));
    }

    pub fn clear_legacy(&mut self) {
        self.salt = None;
        self.nonce = None;
        self.ciphertext = None;
    }

    fn has_any_legacy(&self) -> bool {
        self.salt.is_some() || self.nonce.is_some() || self.ciphertext.is_some()
    }

    fn legacy_entry(&self) -> Result<LegacyEntry, String> {
        let salt = decode_field("salt", &self.salt)?;
        let nonce = decode_field("nonce", &self.nonce)?;
        let ciphertext = decode_field("ciphertext", &self.ciphertext)?;
        if salt.len() != SALT_LEN {
            return Err("salt has wrong length".into());
        }
        if nonce.len() != LEGACY_NONCE_LEN {
            return Err("nonce has wrong length".into());
        }
        if ciphertext.is_empty() {
            return Err("ciphertext is empty".into());
        }
        Ok(LegacyEntry {
            salt,
            nonce,
            ciphertext,
        })
    }

    /// Decode the encrypted material, or describe what is missing.
    pub fn entry(&self) -> Result<VaultEntry, String> {
        if self.public_key.as_deref().map_or(true, str::is_empty) {
            return Err("missing public key".into());
        }
        match &self.token {
            Some(token) if token.is_empty() => Err("empty token".into()),
            Some(token) => {
                // Partial legacy leftovers next to a token are ignored, not fatal.
                let legacy = if self.has_any_legacy() {
                    self.legacy_entry().ok()
                } else {
                    None
                };
                Ok(VaultEntry::Modern {
                    token: token.clone(),
                    legacy,
                })
            }
            None => self.legacy_entry().map(VaultEntry::Legacy),
        }
    }

    pub fn public_key(&self) -> &str {
        self.public_key.as_deref().unwrap_or("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sealed() -> LegacySealed {
        LegacySealed {
            salt: [1; SALT_LEN],
            nonce: [2; LEGACY_NONCE_LEN],
            ciphertext: vec![3; 40],
        }
    }

    #[test]
    fn test_entry_dispatch() {
        let legacy = StoredAccount::legacy(AccountIndex(1), "r1".into(), "ED00".into(), &sealed());
        assert!(matches!(legacy.entry(), Ok(VaultEntry::Legacy(_))));

        let mut migrated = legacy.clone();
        migrated.token = Some("tok".into());
        assert!(matches!(
            migrated.entry(),
            Ok(VaultEntry::Modern { legacy: Some(_), .. })
        ));

        let modern = StoredAccount::modern(AccountIndex(2), "r2".into(), "ED00".into(), "tok".into());
        assert!(matches!(modern.entry(), Ok(VaultEntry::Modern { legacy: None, .. })));
    }

    #[test]
    fn test_incomplete_records() {
        let mut record = StoredAccount::legacy(AccountIndex(1), "r1".into(), "ED00".into(), &sealed());
        record.nonce = None;
        assert_eq!(record.entry().unwrap_err(), "missing nonce");

        let mut record = StoredAccount::modern(AccountIndex(2), "r2".into(), "ED00".into(), "tok".into());
        record.public_key = None;
        assert_eq!(record.entry().unwrap_err(), "missing public key");
    }

    #[test]
    fn test_document_indices() {
        let mut doc = VaultDocument::default();
        assert_eq!(doc.next_index(), AccountIndex(1));
        doc.accounts.push(StoredAccount::modern(AccountIndex(3), "r".into(), "ED".into(), "t".into()));
        assert_eq!(doc.next_index(), AccountIndex(4));

        doc.active_index = Some(AccountIndex(9));
        doc.repoint_active();
        assert_eq!(doc.active_index, Some(AccountIndex(3)));
    }

    #[test]
    fn test_app_key_forms() {
        let wrapped: VaultDocument = serde_json::from_str(
            r#"{"version":2,"password_hash":"h","app_key":{"salt":"AQ==","nonce":"Ag==","ciphertext":"Aw==","iterations":10}}"#,
        )
        .unwrap();
        let Some(StoredAppKey::Wrapped(key)) = wrapped.app_key else {
            panic!("expected a wrapped key");
        };
        assert_eq!(key.iterations, 10);
        assert_eq!(key.decode().unwrap().ciphertext, vec![3]);

        let clear: VaultDocument =
            serde_json::from_str(r#"{"version":1,"password_hash":"h","app_key":"BwcH"}"#).unwrap();
        assert_eq!(clear.app_key, Some(StoredAppKey::Clear("BwcH".into())));
    }

    #[test]
    fn test_optional_fields_deserialize() {
        let doc: VaultDocument = serde_json::from_str(
            r#"{"password_hash":"h","accounts":[{"index":1,"public_key":"ED","salt":"AQ=="}]}"#,
        )
        .unwrap();
        assert_eq!(doc.accounts[0].index, AccountIndex(1));
        assert!(doc.accounts[0].entry().is_err());
    }
}
