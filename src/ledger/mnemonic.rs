//! BIP39 recovery phrases for ed25519 accounts.
//!
//! A phrase maps to an account as:
//! ```text
//! BIP39 seed (PBKDF2-HMAC-SHA512, 2048 rounds, salt "mnemonic" ‖ passphrase)
//!     → first 16 bytes of SHA-256(seed)      ledger family seed
//!     → SHA-512 half of the family seed      ed25519 private key
//! ```
//! which is how the ledger derives an ed25519 key from a family seed.

use bip39::Mnemonic;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use crate::error::{WalletError, WalletResult};
use crate::ledger::codec::sha512_half;
use crate::ledger::keys::Keypair;

/// Entropy of generated phrases: 128 bits, 12 words.
pub const ENTROPY_LEN: usize = 16;

/// A fresh 12-word phrase.
pub fn generate_phrase() -> WalletResult<Zeroizing<String>> {
    let mut entropy = Zeroizing::new([0u8; ENTROPY_LEN]);
    OsRng.fill_bytes(&mut entropy[..]);
    let mnemonic = Mnemonic::from_entropy(&entropy[..])
        .map_err(|e| WalletError::Internal(format!("mnemonic generation failed: {}", e)))?;
    Ok(Zeroizing::new(mnemonic.to_string()))
}

/// Parse a phrase, tolerating case and extra whitespace.
pub fn parse_phrase(phrase: &str) -> WalletResult<Mnemonic> {
    let normalized = Zeroizing::new(
        phrase
            .split_whitespace()
            .map(str::to_lowercase)
            .collect::<Vec<_>>()
            .join(" "),
    );
    Mnemonic::parse_normalized(&normalized)
        .map_err(|e| WalletError::InvalidKey(format!("invalid recovery phrase: {}", e)))
}

/// The ed25519 key pair a phrase recovers.
pub fn keypair_from_phrase(phrase: &str, passphrase: &str) -> WalletResult<Keypair> {
    let mnemonic = parse_phrase(phrase)?;
    let seed = Zeroizing::new(mnemonic.to_seed(passphrase));
    let digest = Sha256::digest(&seed[..]);
    let family_seed = Zeroizing::new(digest[..16].to_vec());
    let private = Zeroizing::new(sha512_half(&[&family_seed[..]]));
    Ok(Keypair::from_ed25519_seed(&private))
}
