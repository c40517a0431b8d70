//! Ledger transaction pipeline.
//!
//! # Data Flow
//! ```text
//! TxTemplate (payment or trust line)
//!     → TransactionSigner::build (sequence, validated index, fee via LedgerClient)
//!     → TransactionEnvelope
//!     → TransactionSigner::sign (codec.rs + CredentialBundle from the vault)
//!     → SignedBlob
//!     → ResilientSubmitter::submit_and_wait / spawn
//!     → SubmissionOutcome | TransactionExpired | SubmissionRejected | Network
//! ```

pub mod amount;
pub mod codec;
pub mod keys;
pub mod mnemonic;
pub mod result_codes;
pub mod submit;
pub mod transaction;

pub use amount::{Amount, Currency, IssuedAmount, IssuedValue};
pub use keys::{CredentialBundle, KeyAlgorithm, Keypair};
pub use submit::{
    ResilientSubmitter, SubmissionEvent, SubmissionHandle, SubmissionOutcome, SubmissionReport,
};
pub use transaction::{
    EnvelopeSummary, SignedBlob, SubmissionState, TransactionEnvelope, TransactionSigner,
    TxTemplate,
};
