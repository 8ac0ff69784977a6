use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Cents, Wallet, WalletId};

pub type LedgerEntryId = Uuid;

/// Direction of a ledger entry relative to its wallet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryType {
    Credit,
    Debit,
}

impl EntryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryType::Credit => "credit",
            EntryType::Debit => "debit",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "credit" => Some(EntryType::Credit),
            "debit" => Some(EntryType::Debit),
            _ => None,
        }
    }
}

impl std::fmt::Display for EntryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One immutable balance-affecting event. Entries are append-only: never
/// updated, never deleted. The audit trail they form is the source of truth
/// from which any wallet balance can be rebuilt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: LedgerEntryId,
    pub wallet_id: WalletId,
    pub entry_type: EntryType,
    pub amount_cents: Cents,
    pub description: String,
    pub reference_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    pub fn credit(
        wallet_id: WalletId,
        amount_cents: Cents,
        description: impl Into<String>,
        reference_id: Option<String>,
    ) -> Self {
        Self::new(wallet_id, EntryType::Credit, amount_cents, description, reference_id)
    }

    pub fn debit(
        wallet_id: WalletId,
        amount_cents: Cents,
        description: impl Into<String>,
        reference_id: Option<String>,
    ) -> Self {
        Self::new(wallet_id, EntryType::Debit, amount_cents, description, reference_id)
    }

    fn new(
        wallet_id: WalletId,
        entry_type: EntryType,
        amount_cents: Cents,
        description: impl Into<String>,
        reference_id: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            wallet_id,
            entry_type,
            amount_cents,
            description: description.into(),
            reference_id,
            created_at: Utc::now(),
        }
    }

    /// Amount with the sign it contributes to the wallet balance.
    pub fn signed_amount(&self) -> Cents {
        match self.entry_type {
            EntryType::Credit => self.amount_cents,
            EntryType::Debit => -self.amount_cents,
        }
    }
}

/// Rebuild a wallet's balance from its ledger entries.
/// Balance = sum of credits - sum of debits.
pub fn balance_from_entries(wallet_id: WalletId, entries: &[LedgerEntry]) -> Cents {
    entries
        .iter()
        .filter(|e| e.wallet_id == wallet_id)
        .map(LedgerEntry::signed_amount)
        .sum()
}

/// One wallet whose stored balance disagrees with its ledger.
#[derive(Debug, Clone)]
pub struct BalanceMismatch {
    pub wallet_id: WalletId,
    pub stored_cents: Cents,
    pub ledger_cents: Cents,
}

/// Outcome of reconciling stored balances against the append-only ledger.
#[derive(Debug, Clone)]
pub struct ReconciliationReport {
    pub wallet_count: i64,
    pub entry_count: i64,
    pub hold_count: i64,
    pub mismatches: Vec<BalanceMismatch>,
    pub negative_balances: i64,
    pub invalid_wallet_refs: i64,
    pub invalid_amounts: i64,
}

impl ReconciliationReport {
    pub fn is_clean(&self) -> bool {
        self.mismatches.is_empty()
            && self.negative_balances == 0
            && self.invalid_wallet_refs == 0
            && self.invalid_amounts == 0
    }
}

/// Compare each wallet's stored balance against the signed sum of its ledger
/// entries, collecting the wallets that disagree.
pub fn find_mismatches(
    wallets: &[Wallet],
    ledger_balances: &std::collections::HashMap<WalletId, Cents>,
) -> Vec<BalanceMismatch> {
    wallets
        .iter()
        .filter_map(|wallet| {
            let ledger_cents = ledger_balances.get(&wallet.id).copied().unwrap_or(0);
            if ledger_cents != wallet.balance_cents {
                Some(BalanceMismatch {
                    wallet_id: wallet.id,
                    stored_cents: wallet.balance_cents,
                    ledger_cents,
                })
            } else {
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signed_amount() {
        let wallet_id = Uuid::new_v4();
        let credit = LedgerEntry::credit(wallet_id, 5000, "Wallet top up", None);
        let debit = LedgerEntry::debit(wallet_id, 2000, "Funds held", None);
        assert_eq!(credit.signed_amount(), 5000);
        assert_eq!(debit.signed_amount(), -2000);
    }

    #[test]
    fn test_balance_from_entries() {
        let wallet_id = Uuid::new_v4();
        let other_wallet = Uuid::new_v4();
        let entries = vec![
            LedgerEntry::credit(wallet_id, 10_000, "Wallet top up", None),
            LedgerEntry::debit(wallet_id, 2_500, "Funds held", Some("booking-1".into())),
            LedgerEntry::credit(other_wallet, 99_999, "Wallet top up", None),
        ];
        assert_eq!(balance_from_entries(wallet_id, &entries), 7_500);
        assert_eq!(balance_from_entries(other_wallet, &entries), 99_999);
        assert_eq!(balance_from_entries(Uuid::new_v4(), &entries), 0);
    }

    #[test]
    fn test_find_mismatches() {
        let mut wallet = Wallet::new(Uuid::new_v4());
        wallet.balance_cents = 1000;

        let mut balances = std::collections::HashMap::new();
        balances.insert(wallet.id, 1000);
        assert!(find_mismatches(std::slice::from_ref(&wallet), &balances).is_empty());

        balances.insert(wallet.id, 900);
        let mismatches = find_mismatches(std::slice::from_ref(&wallet), &balances);
        assert_eq!(mismatches.len(), 1);
        assert_eq!(mismatches[0].stored_cents, 1000);
        assert_eq!(mismatches[0].ledger_cents, 900);
    }
}
