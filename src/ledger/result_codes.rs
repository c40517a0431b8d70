//! Ledger transaction result codes.
//!
//! Codes are grouped by prefix: `tes` success, `tec` failed with fee claimed,
//! `ter` retry, `tef` failure, `tel` local error, `tem` malformed.

/// Family of a transaction result code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultClass {
    Success,
    ClaimedFee,
    Retry,
    Failure,
    Local,
    Malformed,
    Unknown,
}

pub fn classify(code: &str) -> ResultClass {
    match code.get(..3) {
        Some("tes") => ResultClass::Success,
        Some("tec") => ResultClass::ClaimedFee,
        Some("ter") => ResultClass::Retry,
        Some("tef") => ResultClass::Failure,
        Some("tel") => ResultClass::Local,
        Some("tem") => ResultClass::Malformed,
        _ => ResultClass::Unknown,
    }
}

/// `tef` codes meaning the transaction (or its sequence) was already applied.
pub fn is_already_applied(code: &str) -> bool {
    matches!(code, "tefPAST_SEQ" | "tefALREADY")
}

/// Preliminary results that can never lead to inclusion in a ledger.
pub fn is_definitive_rejection(code: &str) -> bool {
    match classify(code) {
        ResultClass::Malformed | ResultClass::Local => true,
        ResultClass::Failure => !is_already_applied(code),
        _ => false,
    }
}

/// User-facing text for a result code.
pub fn status_message(code: &str) -> String {
    let specific = match code {
        "tesSUCCESS" => "Transaction completed successfully",
        "tecUNFUNDED_PAYMENT" => "Insufficient funds for this transaction",
        "tecDST_TAG_NEEDED" => "Destination tag required for this transaction",
        "tecNO_DST" => "Destination account does not exist",
        "tecNO_DST_INSUF_XRP" => "Destination account does not exist and the amount is too small to create it",
        "tecNO_PERMISSION" => "Transaction not permitted",
        "tecNO_LINE" => "No trustline exists for the specified currency",
        "tecPATH_DRY" => "No viable payment path (path dry)",
        "tecINSUFFICIENT_RESERVE" => "Not enough XRP reserve to complete this action",
        "tecUNFUNDED_OFFER" => "Offer unfunded",
        "tecNO_AUTH" => "Issuer requires authorization for this trustline",
        "tecINSUF_RESERVE_LINE" => "Not enough reserve to create/modify trustline",
        _ => "",
    };
    if !specific.is_empty() {
        return specific.to_string();
    }

    match classify(code) {
        ResultClass::Success => format!("Transaction successful: {}", code),
        ResultClass::ClaimedFee => format!("Transaction failed: {}", code),
        ResultClass::Malformed => format!("Transaction malformed: {}", code),
        ResultClass::Retry => format!("Transaction retry later: {}", code),
        ResultClass::Failure | ResultClass::Local => format!("Transaction rejected: {}", code),
        ResultClass::Unknown => format!("Transaction status: {}", code),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejection_classes() {
        assert!(is_definitive_rejection("temBAD_AMOUNT"));
        assert!(is_definitive_rejection("telINSUF_FEE_P"));
        assert!(is_definitive_rejection("tefMAX_LEDGER"));
        assert!(!is_definitive_rejection("tefPAST_SEQ"));
        assert!(!is_definitive_rejection("terQUEUED"));
        assert!(!is_definitive_rejection("tecNO_DST"));
        assert!(!is_definitive_rejection("tesSUCCESS"));
    }

    #[test]
    fn test_messages() {
        assert_eq!(status_message("tecNO_LINE"), "No trustline exists for the specified currency");
        assert_eq!(status_message("tecKILLED"), "Transaction failed: tecKILLED");
        assert_eq!(status_message("temBAD_FEE"), "Transaction malformed: temBAD_FEE");
        assert_eq!(status_message("x"), "Transaction status: x");
    }
}
