//! Credential vault.
//!
//! # Data Flow
//! ```text
//! password ──argon2──▶ gate (password_hash)
//! private key ──┬─ modern: XChaCha20-Poly1305 token under the app key
//!               └─ legacy: AES-256-GCM under PBKDF2(password, salt)
//!                      ▼
//!              VaultDocument (JSON) ──▶ KeyValueStore
//! ```
//!
//! # Design Decisions
//! - One document per vault, rewritten atomically on every change
//! - Decryption prefers the modern token and falls back to legacy material
//! - Key material is held in `Zeroizing` buffers and never logged

pub mod credentials;
pub mod crypto;
pub mod password;
pub mod records;
pub mod repair;
pub mod store;

pub use credentials::{AccountProbe, AccountSummary, CredentialVault};
pub use records::{AccountIndex, StoredAppKey, VaultDocument, WrappedAppKey};
pub use repair::{RemovedRecord, RepairReport};
pub use store::{FileStore, KeyValueStore, MemoryStore};
