//! Encryption schemes for stored private keys.
//!
//! Two schemes coexist:
//! - **legacy**: PBKDF2-HMAC-SHA256 over the password with a per-entry salt,
//!   feeding AES-256-GCM with a random 12-byte nonce
//! - **modern**: a random app-level key feeding a versioned token
//!   `version ‖ 24-byte nonce ‖ XChaCha20-Poly1305 ciphertext`, base64url,
//!   with the version byte bound as associated data
//!
//! The app key itself is only ever stored wrapped: AES-256-GCM under a
//! PBKDF2 key derived from the vault password with its own salt.
//!
//! Every encryption draws a fresh nonce from the OS RNG. A wrong key or
//! tampered input fails authentication; plaintext is never guessed.

use aes_gcm::{Aes256Gcm, Nonce};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chacha20poly1305::aead::{Aead, KeyInit, Payload};
use chacha20poly1305::{XChaCha20Poly1305, XNonce};
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Sha256;
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

pub const KEY_LEN: usize = 32;
pub const SALT_LEN: usize = 16;
pub const LEGACY_NONCE_LEN: usize = 12;
pub const TOKEN_NONCE_LEN: usize = 24;
pub const TOKEN_VERSION: u8 = 0x01;

/// Why a decryption failed. Never carries plaintext or key material.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CryptoError {
    /// Input is structurally invalid (length, encoding, version).
    #[error("malformed ciphertext: {0}")]
    Malformed(&'static str),

    /// Authentication tag did not verify.
    #[error("authentication failed")]
    Authentication,
}

/// App-level symmetric key for the modern scheme.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct AppKey([u8; KEY_LEN]);

impl AppKey {
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_LEN];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    /// Decode the stored base64url form.
    pub fn decode(encoded: &str) -> Result<Self, CryptoError> {
        let raw = Zeroizing::new(
            URL_SAFE_NO_PAD
                .decode(encoded.trim())
                .map_err(|_| CryptoError::Malformed("app key encoding"))?,
        );
        if raw.len() != KEY_LEN {
            return Err(CryptoError::Malformed("app key length"));
        }
        let mut bytes = [0u8; KEY_LEN];
        bytes.copy_from_slice(&raw);
        Ok(Self(bytes))
    }

    pub fn encode(&self) -> String {
        URL_SAFE_NO_PAD.encode(self.0)
    }

    fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl std::fmt::Debug for AppKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppKey").field("key", &"[REDACTED]").finish()
    }
}

fn random_bytes<const N: usize>() -> [u8; N] {
    let mut bytes = [0u8; N];
    OsRng.fill_bytes(&mut bytes);
    bytes
}

pub fn generate_salt() -> [u8; SALT_LEN] {
    random_bytes()
}

/// Derive a legacy-scheme key from a password and salt.
pub fn derive_key(password: &str, salt: &[u8], iterations: u32) -> Zeroizing<[u8; KEY_LEN]> {
    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    pbkdf2::pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, iterations, &mut key[..]);
    key
}

/// Output of legacy encryption.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacySealed {
    pub salt: [u8; SALT_LEN],
    pub nonce: [u8; LEGACY_NONCE_LEN],
    pub ciphertext: Vec<u8>,
}

pub fn legacy_encrypt(
    password: &str,
    iterations: u32,
    plaintext: &[u8],
) -> Result<LegacySealed, CryptoError> {
    let salt = generate_salt();
    let key = derive_key(password, &salt, iterations);
    let cipher =
        Aes256Gcm::new_from_slice(&key[..]).map_err(|_| CryptoError::Malformed("key length"))?;

    let nonce = random_bytes::<LEGACY_NONCE_LEN>();
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(&nonce), plaintext)
        .map_err(|_| CryptoError::Authentication)?;

    Ok(LegacySealed {
        salt,
        nonce,
        ciphertext,
    })
}

pub fn legacy_decrypt(
    password: &str,
    iterations: u32,
    salt: &[u8],
    nonce: &[u8],
    ciphertext: &[u8],
) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    if salt.len() != SALT_LEN {
        return Err(CryptoError::Malformed("salt length"));
    }
    if nonce.len() != LEGACY_NONCE_LEN {
        return Err(CryptoError::Malformed("nonce length"));
    }
    let key = derive_key(password, salt, iterations);
    let cipher =
        Aes256Gcm::new_from_slice(&key[..]).map_err(|_| CryptoError::Malformed("key length"))?;

    cipher
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map(Zeroizing::new)
        .map_err(|_| CryptoError::Authentication)
}

/// Seal the app key under a key derived from `password`.
pub fn wrap_app_key(
    key: &AppKey,
    password: &str,
    iterations: u32,
) -> Result<LegacySealed, CryptoError> {
    legacy_encrypt(password, iterations, key.as_bytes())
}

/// Recover the app key sealed by [`wrap_app_key`].
pub fn unwrap_app_key(
    password: &str,
    iterations: u32,
    salt: &[u8],
    nonce: &[u8],
    ciphertext: &[u8],
) -> Result<AppKey, CryptoError> {
    let raw = legacy_decrypt(password, iterations, salt, nonce, ciphertext)?;
    if raw.len() != KEY_LEN {
        return Err(CryptoError::Malformed("app key length"));
    }
    let mut bytes = [0u8; KEY_LEN];
    bytes.copy_from_slice(&raw);
    Ok(AppKey(bytes))
}

/// Encrypt into a modern token.
pub fn token_encrypt(key: &AppKey, plaintext: &[u8]) -> Result<String, CryptoError> {
    let cipher = XChaCha20Poly1305::new_from_slice(key.as_bytes())
        .map_err(|_| CryptoError::Malformed("key length"))?;
    let nonce = random_bytes::<TOKEN_NONCE_LEN>();
    let aad = [TOKEN_VERSION];

    let ciphertext = cipher
        .encrypt(
            XNonce::from_slice(&nonce),
            Payload {
                msg: plaintext,
                aad: &aad,
            },
        )
        .map_err(|_| CryptoError::Authentication)?;

    let mut token = Vec::with_capacity(1 + TOKEN_NONCE_LEN + ciphertext.len());
    token.push(TOKEN_VERSION);
    token.extend_from_slice(&nonce);
    token.extend_from_slice(&ciphertext);
    Ok(URL_SAFE_NO_PAD.encode(token))
}

/// Decrypt a modern token.
pub fn token_decrypt(key: &AppKey, token: &str) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    let raw = URL_SAFE_NO_PAD
        .decode(token.trim())
        .map_err(|_| CryptoError::Malformed("token encoding"))?;
    // version + nonce + at least the 16-byte tag
    if raw.len() < 1 + TOKEN_NONCE_LEN + 16 {
        return Err(CryptoError::Malformed("token length"));
    }
    if raw[0] != TOKEN_VERSION {
        return Err(CryptoError::Malformed("token version"));
    }

    let (nonce, ciphertext) = raw[1..].split_at(TOKEN_NONCE_LEN);
    let cipher = XChaCha20Poly1305::new_from_slice(key.as_bytes())
        .map_err(|_| CryptoError::Malformed("key length"))?;
    cipher
        .decrypt(
            XNonce::from_slice(nonce),
            Payload {
                msg: ciphertext,
                aad: &raw[..1],
            },
        )
        .map(Zeroizing::new)
        .map_err(|_| CryptoError::Authentication)
}
