//! Transaction building and signing.
//!
//! # Responsibilities
//! - Validate a template (addresses, amounts) before any network call
//! - Fetch sequence, validated ledger index and network fee
//! - Fill in `LastLedgerSequence` and the fee within configured bounds
//! - Serialize canonically and sign with a vault-supplied bundle
//!
//! # Design Decisions
//! - One path for every amount type: native payments, issued payments and
//!   trust lines differ only in the fields they contribute
//! - The bundle is consumed by `sign`, so it is dropped (and zeroized) on every exit path
//! - Serialization and signing errors are fatal for the given inputs

use std::sync::Arc;

use serde::Serialize;

use crate::config::SignerConfig;
use crate::error::{WalletError, WalletResult};
use crate::ledger::amount::{Amount, AmountView, IssuedAmount};
use crate::ledger::codec::{self, FieldValue, TxFields};
use crate::ledger::keys::{decode_address, CredentialBundle};
use crate::rpc::LedgerClient;

/// What the caller wants to do, before ledger data is filled in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxTemplate {
    Payment {
        destination: String,
        amount: Amount,
        destination_tag: Option<u32>,
    },
    TrustSet {
        limit: IssuedAmount,
    },
}

impl TxTemplate {
    pub fn payment(destination: &str, amount: Amount, destination_tag: Option<u32>) -> Self {
        TxTemplate::Payment {
            destination: destination.to_string(),
            amount,
            destination_tag,
        }
    }

    pub fn trust_set(limit: IssuedAmount) -> Self {
        TxTemplate::TrustSet { limit }
    }

    pub fn transaction_type(&self) -> &'static str {
        match self {
            TxTemplate::Payment { .. } => "Payment",
            TxTemplate::TrustSet { .. } => "TrustSet",
        }
    }

    fn validate(&self, account: &str) -> WalletResult<()> {
        match self {
            TxTemplate::Payment {
                destination, amount, ..
            } => {
                if decode_address(destination).is_none() {
                    return Err(WalletError::Serialization(format!(
                        "invalid destination address '{}'",
                        destination
                    )));
                }
                if destination == account {
                    return Err(WalletError::Serialization(
                        "destination must differ from the sending account".into(),
                    ));
                }
                if !amount.is_positive() {
                    return Err(WalletError::Serialization("amount must be positive".into()));
                }
            }
            TxTemplate::TrustSet { limit } => {
                if limit.value.is_negative() {
                    return Err(WalletError::Serialization(
                        "trust line limit must not be negative".into(),
                    ));
                }
                if limit.issuer == account {
                    return Err(WalletError::Serialization(
                        "cannot set a trust line to the account itself".into(),
                    ));
                }
            }
        }
        Ok(())
    }

    fn contribute(&self, fields: &mut TxFields) -> WalletResult<()> {
        match self {
            TxTemplate::Payment {
                destination,
                amount,
                destination_tag,
            } => {
                let id = decode_address(destination).ok_or_else(|| {
                    WalletError::Serialization(format!("invalid destination address '{}'", destination))
                })?;
                fields.set(codec::TRANSACTION_TYPE, FieldValue::UInt16(codec::TT_PAYMENT));
                fields.set(codec::DESTINATION, FieldValue::Account(id));
                fields.set(codec::AMOUNT, FieldValue::Amount(amount.clone()));
                if let Some(tag) = destination_tag {
                    fields.set(codec::DESTINATION_TAG, FieldValue::UInt32(*tag));
                }
            }
            TxTemplate::TrustSet { limit } => {
                fields.set(codec::TRANSACTION_TYPE, FieldValue::UInt16(codec::TT_TRUST_SET));
                fields.set(
                    codec::LIMIT_AMOUNT,
                    FieldValue::Amount(Amount::Issued(limit.clone())),
                );
            }
        }
        Ok(())
    }
}

/// Lifecycle of a built transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionState {
    Pending,
    ValidatedSuccess,
    ValidatedFailure,
    Expired,
}

/// A fully specified transaction, ready to sign.
#[derive(Debug, Clone)]
pub struct TransactionEnvelope {
    pub account: String,
    pub template: TxTemplate,
    pub sequence: u32,
    pub fee_drops: u64,
    pub last_ledger_sequence: u32,
    pub state: SubmissionState,
    /// Set once signed.
    pub hash: Option<String>,
}

impl TransactionEnvelope {
    fn fields(&self) -> WalletResult<TxFields> {
        let account = decode_address(&self.account).ok_or_else(|| {
            WalletError::Serialization(format!("invalid account address '{}'", self.account))
        })?;
        let mut fields = TxFields::new();
        fields.set(codec::ACCOUNT, FieldValue::Account(account));
        fields.set(codec::FLAGS, FieldValue::UInt32(0));
        fields.set(codec::SEQUENCE, FieldValue::UInt32(self.sequence));
        fields.set(codec::FEE, FieldValue::Amount(Amount::Xrp(self.fee_drops)));
        fields.set(
            codec::LAST_LEDGER_SEQUENCE,
            FieldValue::UInt32(self.last_ledger_sequence),
        );
        self.template.contribute(&mut fields)?;
        Ok(fields)
    }
}

/// Summary for display and logs.
#[derive(Debug, Clone, Serialize)]
pub struct EnvelopeSummary {
    pub transaction_type: &'static str,
    pub account: String,
    pub sequence: u32,
    pub fee_drops: u64,
    pub last_ledger_sequence: u32,
    pub amount: AmountView,
    pub state: SubmissionState,
    pub hash: Option<String>,
}

impl From<&TransactionEnvelope> for EnvelopeSummary {
    fn from(env: &TransactionEnvelope) -> Self {
        let amount = match &env.template {
            TxTemplate::Payment { amount, .. } => AmountView::from(amount),
            TxTemplate::TrustSet { limit } => AmountView::from(&Amount::Issued(limit.clone())),
        };
        Self {
            transaction_type: env.template.transaction_type(),
            account: env.account.clone(),
            sequence: env.sequence,
            fee_drops: env.fee_drops,
            last_ledger_sequence: env.last_ledger_sequence,
            amount,
            state: env.state,
            hash: env.hash.clone(),
        }
    }
}

/// Signed transaction bytes plus identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedBlob {
    /// Upper-hex serialization with signature.
    pub tx_blob: String,
    pub hash: String,
    pub last_ledger_sequence: u32,
}

/// Serialize and sign `envelope`, consuming `bundle`.
pub fn sign_envelope(
    envelope: &mut TransactionEnvelope,
    bundle: CredentialBundle,
) -> WalletResult<SignedBlob> {
    let bundle_address = bundle
        .address()
        .map_err(|e| WalletError::Signing(e.to_string()))?;
    if bundle_address != envelope.account {
        return Err(WalletError::Signing(
            "credential bundle does not control the sending account".into(),
        ));
    }

    let mut fields = envelope.fields()?;
    let public_key = bundle
        .public_key_bytes()
        .map_err(|e| WalletError::Signing(e.to_string()))?;
    fields.set(codec::SIGNING_PUB_KEY, FieldValue::Blob(public_key.to_vec()));

    let signing_data = fields.signing_data()?;
    let signature = bundle.sign(&signing_data)?;
    fields.set(codec::TXN_SIGNATURE, FieldValue::Blob(signature));

    let blob = fields.serialize()?;
    let hash = codec::transaction_hash(&blob);
    envelope.hash = Some(hash.clone());

    Ok(SignedBlob {
        tx_blob: hex::encode_upper(&blob),
        hash,
        last_ledger_sequence: envelope.last_ledger_sequence,
    })
}

/// Builds envelopes from ledger data and signs them.
pub struct TransactionSigner {
    client: Arc<LedgerClient>,
    config: SignerConfig,
}

impl TransactionSigner {
    pub fn new(client: Arc<LedgerClient>, config: SignerConfig) -> Self {
        Self { client, config }
    }

    /// Fill in sequence, fee and expiry for `template` sent from `account`.
    pub async fn build(&self, template: TxTemplate, account: &str) -> WalletResult<TransactionEnvelope> {
        if decode_address(account).is_none() {
            return Err(WalletError::Serialization(format!(
                "invalid account address '{}'",
                account
            )));
        }
        template.validate(account)?;

        let (sequence, validated, fee) = tokio::try_join!(
            self.client.account_sequence(account),
            self.client.validated_ledger_index(),
            self.client.fee(),
        )?;

        let fee_drops = fee.base_fee_drops.max(self.config.min_fee_drops);
        if fee_drops > self.config.max_fee_drops {
            tracing::warn!(
                fee_drops,
                max_fee_drops = self.config.max_fee_drops,
                "Network fee above ceiling"
            );
            return Err(WalletError::FeeTooHigh {
                current_drops: fee_drops,
                max_drops: self.config.max_fee_drops,
            });
        }

        let last_ledger_sequence = validated.saturating_add(self.config.expiry_window);

        tracing::debug!(
            account,
            transaction_type = template.transaction_type(),
            sequence,
            fee_drops,
            last_ledger_sequence,
            "Built transaction"
        );

        Ok(TransactionEnvelope {
            account: account.to_string(),
            template,
            sequence,
            fee_drops,
            last_ledger_sequence,
            state: SubmissionState::Pending,
            hash: None,
        })
    }

    /// Serialize and sign; the bundle is discarded on return.
    pub fn sign(
        &self,
        envelope: &mut TransactionEnvelope,
        bundle: CredentialBundle,
    ) -> WalletResult<SignedBlob> {
        let signed = sign_envelope(envelope, bundle)?;
        tracing::info!(hash = %signed.hash, account = %envelope.account, "Signed transaction");
        Ok(signed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::keys::{KeyAlgorithm, Keypair, ED25519_PREFIX};
    use zeroize::Zeroizing;

    const DEST: &str = "rHb9CJAWyB4rj91VRWn96DkukG4bwdtyTh";

    fn bundle(pair: &Keypair) -> CredentialBundle {
        CredentialBundle::new(
            pair.public_key.clone(),
            Zeroizing::new(pair.private_key.to_string()),
        )
        .unwrap()
    }

    fn envelope(account: &str, template: TxTemplate) -> TransactionEnvelope {
        TransactionEnvelope {
            account: account.to_string(),
            template,
            sequence: 7,
            fee_drops: 12,
            last_ledger_sequence: 108,
            state: SubmissionState::Pending,
            hash: None,
        }
    }

    #[test]
    fn test_sign_payment() {
        let pair = Keypair::generate();
        let account = pair.address().unwrap();
        let mut env = envelope(&account, TxTemplate::payment(DEST, Amount::Xrp(1_000_000), Some(42)));

        let signed = sign_envelope(&mut env, bundle(&pair)).unwrap();
        assert_eq!(env.hash.as_deref(), Some(signed.hash.as_str()));
        assert_eq!(signed.last_ledger_sequence, 108);
        // TransactionType Payment, then Flags.
        assert!(signed.tx_blob.starts_with("120000220000000024"));
        assert!(signed.tx_blob.contains(&format!("7321{}", &pair.public_key)));
        assert!(pair.public_key.starts_with(ED25519_PREFIX));
    }

    #[test]
    fn test_sign_payment_with_secp256k1() {
        let pair = Keypair::generate_with(KeyAlgorithm::Secp256k1);
        let account = pair.address().unwrap();
        let mut env = envelope(&account, TxTemplate::payment(DEST, Amount::Xrp(1_000_000), None));

        let signed = sign_envelope(&mut env, bundle(&pair)).unwrap();
        assert!(signed.tx_blob.contains(&format!("7321{}", &pair.public_key)));
        // TxnSignature follows SigningPubKey and holds a DER sequence.
        let blob = hex::decode(&signed.tx_blob).unwrap();
        let key_at = signed.tx_blob.find(&format!("7321{}", &pair.public_key)).unwrap() / 2;
        let sig_at = key_at + 2 + 33;
        assert_eq!(blob[sig_at], 0x74);
        let len = blob[sig_at + 1] as usize;
        let der = &blob[sig_at + 2..sig_at + 2 + len];
        assert!(k256::ecdsa::Signature::from_der(der).is_ok());
        assert_eq!(codec::transaction_hash(&blob), signed.hash);
    }

    #[test]
    fn test_signature_is_deterministic_per_envelope() {
        let pair = Keypair::generate();
        let account = pair.address().unwrap();
        let template = TxTemplate::payment(DEST, Amount::Xrp(5), None);

        let a = sign_envelope(&mut envelope(&account, template.clone()), bundle(&pair)).unwrap();
        let b = sign_envelope(&mut envelope(&account, template), bundle(&pair)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_sign_rejects_foreign_bundle() {
        let pair = Keypair::generate();
        let other = Keypair::generate();
        let mut env = envelope(&pair.address().unwrap(), TxTemplate::payment(DEST, Amount::Xrp(5), None));
        let err = sign_envelope(&mut env, bundle(&other)).unwrap_err();
        assert!(matches!(err, WalletError::Signing(_)));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_template_validation() {
        let account = Keypair::generate().address().unwrap();
        let zero = TxTemplate::payment(DEST, Amount::Xrp(0), None);
        assert!(matches!(zero.validate(&account), Err(WalletError::Serialization(_))));

        let bad_dest = TxTemplate::payment("rNotAnAddress", Amount::Xrp(1), None);
        assert!(bad_dest.validate(&account).is_err());

        let limit = IssuedAmount::new("1000", "USD", DEST).unwrap();
        TxTemplate::trust_set(limit).validate(&account).unwrap();
    }

    #[test]
    fn test_trust_set_blob() {
        let pair = Keypair::generate();
        let account = pair.address().unwrap();
        let limit = IssuedAmount::new("1000", "USD", DEST).unwrap();
        let mut env = envelope(&account, TxTemplate::trust_set(limit));
        let signed = sign_envelope(&mut env, bundle(&pair)).unwrap();
        assert!(signed.tx_blob.starts_with("120014"));
        assert!(signed.tx_blob.contains("63D5"));
    }
}
