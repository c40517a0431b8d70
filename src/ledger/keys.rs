//! Account keys and classic addresses.
//!
//! # Design Decisions
//! - Two algorithms, told apart by the key bytes: ed25519 keys are hex `ED`
//!   followed by 32 bytes; secp256k1 public keys are 33-byte compressed points
//!   and private keys are 32 bytes, optionally behind a `00` byte
//! - secp256k1 signatures are DER-encoded, low-S ECDSA over the SHA-512 half of
//!   the signing data; ed25519 signs the data itself
//! - Private key material lives in `Zeroizing` buffers and never appears in `Debug`
//! - [`CredentialBundle`] is not `Clone`; it is consumed by signing

use std::fmt;
use std::str::FromStr;

use ed25519_dalek::Signer;
use k256::ecdsa::signature::hazmat::PrehashSigner;
use rand::rngs::OsRng;
use rand::RngCore;
use ripemd::Ripemd160;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use crate::error::{WalletError, WalletResult};
use crate::ledger::codec::sha512_half;

/// Hex prefix marking an ed25519 key.
pub const ED25519_PREFIX: &str = "ED";

/// Hex prefix of a 33-byte secp256k1 private key.
pub const SECP256K1_PRIVATE_PREFIX: &str = "00";

const ACCOUNT_ID_PREFIX: u8 = 0x00;

/// Signing algorithm of an account key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyAlgorithm {
    #[default]
    Ed25519,
    Secp256k1,
}

impl KeyAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyAlgorithm::Ed25519 => "ed25519",
            KeyAlgorithm::Secp256k1 => "secp256k1",
        }
    }

    /// Algorithm of a public key, from its leading byte.
    pub fn of_public_key(public_key: &[u8; 33]) -> Self {
        if public_key[0] == 0xED {
            KeyAlgorithm::Ed25519
        } else {
            KeyAlgorithm::Secp256k1
        }
    }
}

impl FromStr for KeyAlgorithm {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ed25519" => Ok(KeyAlgorithm::Ed25519),
            "secp256k1" => Ok(KeyAlgorithm::Secp256k1),
            other => Err(WalletError::InvalidKey(format!(
                "unknown key algorithm '{}'",
                other
            ))),
        }
    }
}

fn decode_hex(label: &str, hex_str: &str) -> WalletResult<Vec<u8>> {
    hex::decode(hex_str.trim())
        .map_err(|_| WalletError::InvalidKey(format!("{} is not valid hex", label)))
}

/// A parsed private key of either algorithm.
pub enum SecretKey {
    Ed25519(ed25519_dalek::SigningKey),
    Secp256k1(k256::ecdsa::SigningKey),
}

impl SecretKey {
    pub fn algorithm(&self) -> KeyAlgorithm {
        match self {
            SecretKey::Ed25519(_) => KeyAlgorithm::Ed25519,
            SecretKey::Secp256k1(_) => KeyAlgorithm::Secp256k1,
        }
    }

    /// Upper-hex public key in ledger form.
    pub fn public_key_hex(&self) -> String {
        match self {
            SecretKey::Ed25519(key) => format!(
                "{}{}",
                ED25519_PREFIX,
                hex::encode_upper(key.verifying_key().as_bytes())
            ),
            SecretKey::Secp256k1(key) => {
                hex::encode_upper(key.verifying_key().to_encoded_point(true).as_bytes())
            }
        }
    }

    /// Sign ledger signing data.
    pub fn sign(&self, message: &[u8]) -> WalletResult<Vec<u8>> {
        match self {
            SecretKey::Ed25519(key) => Ok(key.sign(message).to_bytes().to_vec()),
            SecretKey::Secp256k1(key) => {
                let digest = sha512_half(&[message]);
                let signature: k256::ecdsa::Signature = key
                    .sign_prehash(&digest)
                    .map_err(|e| WalletError::Signing(e.to_string()))?;
                let signature = signature.normalize_s().unwrap_or(signature);
                Ok(signature.to_der().as_bytes().to_vec())
            }
        }
    }
}

fn secp256k1_key(scalar: &[u8]) -> WalletResult<SecretKey> {
    k256::ecdsa::SigningKey::from_slice(scalar)
        .map(SecretKey::Secp256k1)
        .map_err(|_| WalletError::InvalidKey("private key is not a valid secp256k1 scalar".into()))
}

/// Parse a private key: `ED`‖32 bytes for ed25519, `00`‖32 bytes or 32 bytes for secp256k1.
pub fn parse_private_key(private_key: &str) -> WalletResult<SecretKey> {
    let bytes = Zeroizing::new(decode_hex("private key", private_key)?);
    match bytes.len() {
        33 if bytes[0] == 0xED => {
            let mut seed = Zeroizing::new([0u8; 32]);
            seed.copy_from_slice(&bytes[1..]);
            Ok(SecretKey::Ed25519(ed25519_dalek::SigningKey::from_bytes(&seed)))
        }
        33 if bytes[0] == 0x00 => secp256k1_key(&bytes[1..]),
        32 => secp256k1_key(&bytes),
        33 => Err(WalletError::InvalidKey(
            "unsupported key algorithm prefix".into(),
        )),
        n => Err(WalletError::InvalidKey(format!(
            "private key must be 32 or 33 bytes, got {}",
            n
        ))),
    }
}

/// Parse a public key into its 33 wire bytes.
pub fn parse_public_key(public_key: &str) -> WalletResult<[u8; 33]> {
    let bytes = decode_hex("public key", public_key)?;
    if bytes.len() != 33 {
        return Err(WalletError::InvalidKey(format!(
            "public key must be 33 bytes, got {}",
            bytes.len()
        )));
    }
    match bytes[0] {
        0xED => {}
        0x02 | 0x03 => {
            k256::ecdsa::VerifyingKey::from_sec1_bytes(&bytes).map_err(|_| {
                WalletError::InvalidKey("public key is not a secp256k1 curve point".into())
            })?;
        }
        _ => {
            return Err(WalletError::InvalidKey(
                "unsupported key algorithm prefix".into(),
            ))
        }
    }
    let mut out = [0u8; 33];
    out.copy_from_slice(&bytes);
    Ok(out)
}

/// Re-derive the public key for a private key.
pub fn derive_public_key(private_key: &str) -> WalletResult<String> {
    Ok(parse_private_key(private_key)?.public_key_hex())
}

/// Check that `public_key` belongs to `private_key`.
pub fn verify_key_pair(public_key: &str, private_key: &str) -> WalletResult<()> {
    parse_public_key(public_key)?;
    let derived = derive_public_key(private_key)?;
    if !derived.eq_ignore_ascii_case(public_key.trim()) {
        return Err(WalletError::KeyMismatch);
    }
    Ok(())
}

fn checksum(payload: &[u8]) -> [u8; 4] {
    let digest = Sha256::digest(Sha256::digest(payload));
    let mut out = [0u8; 4];
    out.copy_from_slice(&digest[..4]);
    out
}

/// 20-byte account ID for a public key.
pub fn account_id(public_key: &[u8]) -> [u8; 20] {
    let digest = Ripemd160::digest(Sha256::digest(public_key));
    let mut out = [0u8; 20];
    out.copy_from_slice(&digest);
    out
}

/// Classic `r...` address for a 20-byte account ID.
pub fn encode_address(account_id: &[u8; 20]) -> String {
    let mut payload = Vec::with_capacity(25);
    payload.push(ACCOUNT_ID_PREFIX);
    payload.extend_from_slice(account_id);
    let check = checksum(&payload);
    payload.extend_from_slice(&check);
    bs58::encode(payload)
        .with_alphabet(bs58::Alphabet::RIPPLE)
        .into_string()
}

/// Classic address for a hex public key.
pub fn classic_address(public_key: &str) -> WalletResult<String> {
    let bytes = parse_public_key(public_key)?;
    Ok(encode_address(&account_id(&bytes)))
}

/// Decode and checksum-verify a classic address.
pub fn decode_address(address: &str) -> Option<[u8; 20]> {
    let raw = bs58::decode(address)
        .with_alphabet(bs58::Alphabet::RIPPLE)
        .into_vec()
        .ok()?;
    if raw.len() != 25 || raw[0] != ACCOUNT_ID_PREFIX {
        return None;
    }
    let (payload, check) = raw.split_at(21);
    if checksum(payload) != check {
        return None;
    }
    let mut out = [0u8; 20];
    out.copy_from_slice(&payload[1..]);
    Some(out)
}

pub fn is_valid_address(address: &str) -> bool {
    address.starts_with('r') && (25..=35).contains(&address.len()) && decode_address(address).is_some()
}

/// A freshly generated key pair.
pub struct Keypair {
    pub public_key: String,
    pub private_key: Zeroizing<String>,
}

impl Keypair {
    /// A random ed25519 pair.
    pub fn generate() -> Self {
        Self::generate_with(KeyAlgorithm::Ed25519)
    }

    pub fn generate_with(algorithm: KeyAlgorithm) -> Self {
        match algorithm {
            KeyAlgorithm::Ed25519 => {
                let mut seed = Zeroizing::new([0u8; 32]);
                OsRng.fill_bytes(&mut seed[..]);
                Self::from_ed25519_seed(&seed)
            }
            KeyAlgorithm::Secp256k1 => {
                let key = k256::ecdsa::SigningKey::random(&mut OsRng);
                let scalar = Zeroizing::new(key.to_bytes().to_vec());
                Self {
                    public_key: SecretKey::Secp256k1(key).public_key_hex(),
                    private_key: Zeroizing::new(format!(
                        "{}{}",
                        SECP256K1_PRIVATE_PREFIX,
                        hex::encode_upper(&scalar[..])
                    )),
                }
            }
        }
    }

    /// The ed25519 pair for a 32-byte seed.
    pub fn from_ed25519_seed(seed: &[u8; 32]) -> Self {
        let key = ed25519_dalek::SigningKey::from_bytes(seed);
        Self {
            public_key: SecretKey::Ed25519(key).public_key_hex(),
            private_key: Zeroizing::new(format!(
                "{}{}",
                ED25519_PREFIX,
                hex::encode_upper(&seed[..])
            )),
        }
    }

    pub fn address(&self) -> WalletResult<String> {
        classic_address(&self.public_key)
    }
}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keypair")
            .field("public_key", &self.public_key)
            .field("private_key", &"<redacted>")
            .finish()
    }
}

/// Decrypted key pair for one signing call.
pub struct CredentialBundle {
    public_key: String,
    private_key: Zeroizing<String>,
}

impl CredentialBundle {
    /// Build a bundle, rejecting pairs whose keys do not match.
    pub fn new(public_key: String, private_key: Zeroizing<String>) -> WalletResult<Self> {
        verify_key_pair(&public_key, &private_key)?;
        Ok(Self {
            public_key,
            private_key,
        })
    }

    pub fn public_key(&self) -> &str {
        &self.public_key
    }

    pub fn address(&self) -> WalletResult<String> {
        classic_address(&self.public_key)
    }

    /// Public key bytes for `SigningPubKey`.
    pub fn public_key_bytes(&self) -> WalletResult<[u8; 33]> {
        parse_public_key(&self.public_key)
    }

    pub fn algorithm(&self) -> WalletResult<KeyAlgorithm> {
        Ok(KeyAlgorithm::of_public_key(&self.public_key_bytes()?))
    }

    /// Sign `message`, consuming the bundle.
    pub fn sign(self, message: &[u8]) -> WalletResult<Vec<u8>> {
        parse_private_key(&self.private_key)
            .map_err(|e| WalletError::Signing(e.to_string()))?
            .sign(message)
    }
}

impl fmt::Debug for CredentialBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialBundle")
            .field("public_key", &self.public_key)
            .field("private_key", &"<redacted>")
            .finish()
    }
}
