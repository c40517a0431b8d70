//! Canonical binary serialization for the transaction types the wallet signs.
//!
//! Fields are written sorted by (type code, field code). Only the fields used
//! by `Payment` and `TrustSet` are defined.

use sha2::{Digest, Sha512};

use crate::error::{WalletError, WalletResult};
use crate::ledger::amount::Amount;

/// Prefix hashed before the signing serialization.
pub const SIGNING_PREFIX: [u8; 4] = [0x53, 0x54, 0x58, 0x00];

/// Prefix hashed before a signed blob to form the transaction ID.
pub const TRANSACTION_ID_PREFIX: [u8; 4] = [0x54, 0x58, 0x4E, 0x00];

const TYPE_UINT16: u8 = 1;
const TYPE_UINT32: u8 = 2;
const TYPE_AMOUNT: u8 = 6;
const TYPE_BLOB: u8 = 7;
const TYPE_ACCOUNT: u8 = 8;

/// A field definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    pub name: &'static str,
    pub type_code: u8,
    pub field_code: u8,
    /// Excluded from the signing serialization.
    pub signature_field: bool,
}

const fn field(name: &'static str, type_code: u8, field_code: u8) -> Field {
    Field {
        name,
        type_code,
        field_code,
        signature_field: false,
    }
}

pub const TRANSACTION_TYPE: Field = field("TransactionType", TYPE_UINT16, 2);
pub const FLAGS: Field = field("Flags", TYPE_UINT32, 2);
pub const SEQUENCE: Field = field("Sequence", TYPE_UINT32, 4);
pub const DESTINATION_TAG: Field = field("DestinationTag", TYPE_UINT32, 14);
pub const LAST_LEDGER_SEQUENCE: Field = field("LastLedgerSequence", TYPE_UINT32, 27);
pub const AMOUNT: Field = field("Amount", TYPE_AMOUNT, 1);
pub const LIMIT_AMOUNT: Field = field("LimitAmount", TYPE_AMOUNT, 3);
pub const FEE: Field = field("Fee", TYPE_AMOUNT, 8);
pub const SIGNING_PUB_KEY: Field = field("SigningPubKey", TYPE_BLOB, 3);
pub const TXN_SIGNATURE: Field = Field {
    signature_field: true,
    ..field("TxnSignature", TYPE_BLOB, 4)
};
pub const ACCOUNT: Field = field("Account", TYPE_ACCOUNT, 1);
pub const DESTINATION: Field = field("Destination", TYPE_ACCOUNT, 3);

/// Transaction type codes.
pub const TT_PAYMENT: u16 = 0;
pub const TT_TRUST_SET: u16 = 20;

/// Typed field value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    UInt16(u16),
    UInt32(u32),
    Amount(Amount),
    Blob(Vec<u8>),
    Account([u8; 20]),
}

fn field_header(field: &Field) -> Vec<u8> {
    let (t, n) = (field.type_code, field.field_code);
    match (t < 16, n < 16) {
        (true, true) => vec![(t << 4) | n],
        (true, false) => vec![t << 4, n],
        (false, true) => vec![n, t],
        (false, false) => vec![0, t, n],
    }
}

/// Length prefix for variable-length fields.
pub fn encode_vl_length(len: usize) -> WalletResult<Vec<u8>> {
    match len {
        0..=192 => Ok(vec![len as u8]),
        193..=12480 => {
            let l = len - 193;
            Ok(vec![193 + (l >> 8) as u8, (l & 0xFF) as u8])
        }
        12481..=918744 => {
            let l = len - 12481;
            Ok(vec![241 + (l >> 16) as u8, ((l >> 8) & 0xFF) as u8, (l & 0xFF) as u8])
        }
        _ => Err(WalletError::Serialization(format!("field of {} bytes is too long", len))),
    }
}

/// An ordered set of fields for one transaction.
#[derive(Debug, Clone, Default)]
pub struct TxFields {
    fields: Vec<(Field, FieldValue)>,
}

impl TxFields {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a field, replacing any previous value.
    pub fn set(&mut self, field: Field, value: FieldValue) {
        self.fields.retain(|(f, _)| f.name != field.name);
        self.fields.push((field, value));
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|(f, _)| f.name == name).map(|(_, v)| v)
    }

    fn write(&self, signing: bool) -> WalletResult<Vec<u8>> {
        let mut sorted: Vec<&(Field, FieldValue)> = self
            .fields
            .iter()
            .filter(|(f, _)| !(signing && f.signature_field))
            .collect();
        sorted.sort_by_key(|(f, _)| (f.type_code, f.field_code));

        let mut out = Vec::with_capacity(256);
        for (field, value) in sorted {
            out.extend_from_slice(&field_header(field));
            match value {
                FieldValue::UInt16(v) => out.extend_from_slice(&v.to_be_bytes()),
                FieldValue::UInt32(v) => out.extend_from_slice(&v.to_be_bytes()),
                FieldValue::Amount(a) => out.extend_from_slice(&a.to_bytes()?),
                FieldValue::Blob(bytes) => {
                    out.extend_from_slice(&encode_vl_length(bytes.len())?);
                    out.extend_from_slice(bytes);
                }
                FieldValue::Account(id) => {
                    out.push(20);
                    out.extend_from_slice(id);
                }
            }
        }
        Ok(out)
    }

    /// Full serialization, including the signature.
    pub fn serialize(&self) -> WalletResult<Vec<u8>> {
        self.write(false)
    }

    /// Bytes to sign: the signing prefix followed by every non-signature field.
    pub fn signing_data(&self) -> WalletResult<Vec<u8>> {
        let mut data = SIGNING_PREFIX.to_vec();
        data.extend(self.write(true)?);
        Ok(data)
    }
}

/// First 32 bytes of SHA-512 over the concatenated parts.
pub fn sha512_half(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Sha512::new();
    for part in parts {
        hasher.update(part);
    }
    let mut out = [0u8; 32];
    out.copy_from_slice(&hasher.finalize()[..32]);
    out
}

/// Transaction ID of a signed blob, upper-hex.
pub fn transaction_hash(blob: &[u8]) -> String {
    hex::encode_upper(sha512_half(&[&TRANSACTION_ID_PREFIX[..], blob]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_headers() {
        assert_eq!(field_header(&TRANSACTION_TYPE), vec![0x12]);
        assert_eq!(field_header(&FLAGS), vec![0x22]);
        assert_eq!(field_header(&LAST_LEDGER_SEQUENCE), vec![0x20, 0x1B]);
        assert_eq!(field_header(&FEE), vec![0x68]);
        assert_eq!(field_header(&TXN_SIGNATURE), vec![0x74]);
        assert_eq!(field_header(&DESTINATION), vec![0x83]);
    }

    #[test]
    fn test_vl_length() {
        assert_eq!(encode_vl_length(33).unwrap(), vec![33]);
        assert_eq!(encode_vl_length(193).unwrap(), vec![193, 0]);
        assert_eq!(encode_vl_length(12480).unwrap(), vec![240, 255]);
        assert!(encode_vl_length(1_000_000).is_err());
    }

    #[test]
    fn test_canonical_order_and_signing_exclusion() {
        let mut fields = TxFields::new();
        fields.set(ACCOUNT, FieldValue::Account([1; 20]));
        fields.set(FEE, FieldValue::Amount(Amount::Xrp(12)));
        fields.set(TXN_SIGNATURE, FieldValue::Blob(vec![0xAA; 64]));
        fields.set(SEQUENCE, FieldValue::UInt32(5));
        fields.set(TRANSACTION_TYPE, FieldValue::UInt16(TT_PAYMENT));

        let full = fields.serialize().unwrap();
        assert_eq!(&full[..3], &[0x12, 0x00, 0x00]);
        assert_eq!(full[3], 0x24);
        assert!(full.windows(2).any(|w| w == [0x74, 64]));

        let signing = fields.signing_data().unwrap();
        assert_eq!(&signing[..4], &SIGNING_PREFIX);
        assert_eq!(signing.len() - 4, full.len() - 66);
    }

    #[test]
    fn test_hash_is_upper_hex_32_bytes() {
        let hash = transaction_hash(b"blob");
        assert_eq!(hash.len(), 64);
        assert_eq!(hash, hash.to_uppercase());
    }
}
