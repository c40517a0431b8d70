//! Offline repair of incomplete account records.
//!
//! Records that cannot yield an encrypted entry (missing nonce, salt, token,
//! ciphertext or public key) are removed so that a later unlock never trips
//! over them. Complete records are left untouched, whether or not they decrypt.

use serde::Serialize;

use crate::vault::records::{AccountIndex, VaultDocument};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RemovedRecord {
    pub index: AccountIndex,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RepairReport {
    pub removed: Vec<RemovedRecord>,
    pub remaining: usize,
    pub active_index: Option<AccountIndex>,
}

impl RepairReport {
    pub fn changed(&self) -> bool {
        !self.removed.is_empty()
    }
}

/// Remove incomplete records and re-point the active index.
pub fn repair_document(doc: &mut VaultDocument) -> RepairReport {
    let mut removed = Vec::new();
    doc.accounts.retain(|record| match record.entry() {
        Ok(_) => true,
        Err(reason) => {
            tracing::warn!(index = %record.index, reason = %reason, "Removing incomplete vault record");
            removed.push(RemovedRecord {
                index: record.index,
                reason,
            });
            false
        }
    });

    let before = doc.active_index;
    doc.repoint_active();
    if before != doc.active_index {
        tracing::info!(
            from = ?before.map(|i| i.0),
            to = ?doc.active_index.map(|i| i.0),
            "Active account re-pointed"
        );
    }

    RepairReport {
        removed,
        remaining: doc.accounts.len(),
        active_index: doc.active_index,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vault::crypto::{LegacySealed, LEGACY_NONCE_LEN, SALT_LEN};
    use crate::vault::records::StoredAccount;

    fn legacy(index: u32) -> StoredAccount {
        let sealed = LegacySealed {
            salt: [1; SALT_LEN],
            nonce: [2; LEGACY_NONCE_LEN],
            ciphertext: vec![3; 40],
        };
        StoredAccount::legacy(AccountIndex(index), format!("r{}", index), "ED11".into(), &sealed)
    }

    #[test]
    fn test_removes_only_incomplete() {
        let mut broken = legacy(1);
        broken.nonce = None;
        let intact = legacy(2);

        let mut doc = VaultDocument {
            accounts: vec![broken, intact.clone()],
            active_index: Some(AccountIndex(1)),
            ..Default::default()
        };

        let report = repair_document(&mut doc);
        assert_eq!(report.removed.len(), 1);
        assert_eq!(report.removed[0].index, AccountIndex(1));
        assert_eq!(report.removed[0].reason, "missing nonce");
        assert_eq!(doc.accounts, vec![intact]);
        assert_eq!(report.active_index, Some(AccountIndex(2)));
    }

    #[test]
    fn test_clean_document_is_unchanged() {
        let mut doc = VaultDocument {
            accounts: vec![legacy(1), legacy(2)],
            active_index: Some(AccountIndex(2)),
            ..Default::default()
        };
        let report = repair_document(&mut doc);
        assert!(!report.changed());
        assert_eq!(report.active_index, Some(AccountIndex(2)));
    }
}
